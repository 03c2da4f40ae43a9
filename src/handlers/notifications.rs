use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{enum_field, present};
use crate::db::Collection;
use crate::db::models::{Notification, NotificationKind, new_id};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;
use crate::types::DeleteResponse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub user_id: Option<String>,
    pub unread_only: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    pub id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInput {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationUpdate {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub is_read: Option<bool>,
}

fn not_visible() -> PortalError {
    PortalError::not_found("Notification not found or not accessible")
}

/// GET /api/notifications?userId= -> the user's and broadcast notifications, newest first.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, PortalError> {
    let Some(user_id) = present(query.user_id) else {
        return Err(PortalError::bad_request("userId is required"));
    };
    let unread_only = query.unread_only.as_deref() == Some("true");

    let mut notifications: Vec<Notification> =
        state.store.list(Collection::Notifications).await?;
    notifications.retain(|n| n.visible_to(&user_id) && !(unread_only && n.is_read));
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(notifications))
}

/// POST /api/notifications
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<NotificationInput>,
) -> Result<Json<Notification>, PortalError> {
    let (Some(user_id), Some(title), Some(message), Some(kind)) = (
        present(body.user_id),
        present(body.title),
        present(body.message),
        enum_field::<NotificationKind>(body.kind, "type")?,
    ) else {
        return Err(PortalError::bad_request(
            "userId, title, message and type are required",
        ));
    };

    let notification = Notification {
        id: new_id(),
        user_id,
        title,
        message,
        kind,
        is_read: false,
        link: present(body.link),
        created_at: Utc::now(),
    };
    let created = state
        .store
        .insert(Collection::Notifications, notification)
        .await?;
    info!(notification_id = %created.id, user_id = %created.user_id, "notification created");
    Ok(Json(created))
}

/// PUT /api/notifications -> set the read flag.
pub async fn update(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<NotificationUpdate>,
) -> Result<Json<Notification>, PortalError> {
    let (Some(id), Some(user_id)) = (present(body.id), present(body.user_id)) else {
        return Err(PortalError::bad_request("Notification id and userId are required"));
    };
    let is_read = body.is_read;

    let updated = state
        .store
        .mutate(
            Collection::Notifications,
            move |notifications: &mut Vec<Notification>| {
                let n = notifications
                    .iter_mut()
                    .find(|n| n.id == id && n.visible_to(&user_id))
                    .ok_or_else(not_visible)?;
                if let Some(is_read) = is_read {
                    n.is_read = is_read;
                }
                Ok(n.clone())
            },
        )
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/notifications?id=&userId=
pub async fn delete(
    State(state): State<PortalState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let (Some(id), Some(user_id)) = (present(query.id), present(query.user_id)) else {
        return Err(PortalError::bad_request("Notification id and userId are required"));
    };

    state
        .store
        .mutate(
            Collection::Notifications,
            move |notifications: &mut Vec<Notification>| {
                let idx = notifications
                    .iter()
                    .position(|n| n.id == id && n.visible_to(&user_id))
                    .ok_or_else(not_visible)?;
                notifications.remove(idx);
                Ok(())
            },
        )
        .await?;
    Ok(Json(DeleteResponse::ok()))
}
