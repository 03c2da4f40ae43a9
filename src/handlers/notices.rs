use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{delete_owned, parse_date, present};
use crate::db::Collection;
use crate::db::instant::end_of_day;
use crate::db::models::{Notice, new_id};
use crate::error::PortalError;
use crate::middleware::{ApiJson, CurrentUser};
use crate::router::PortalState;
use crate::types::DeleteResponse;

const DEFAULT_LIFETIME_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeInput {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub important: bool,
    pub expires_at: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    pub id: Option<String>,
    pub user_id: Option<String>,
}

/// Expiry for a new notice. A bare date expires at the end of that day (UTC).
fn resolve_expiry(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let fallback = || now + Duration::days(DEFAULT_LIFETIME_DAYS);
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return fallback();
    };
    if raw.contains('T') {
        return DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| fallback());
    }
    parse_date(raw).and_then(end_of_day).unwrap_or_else(fallback)
}

/// GET /api/notices -> notices that have not expired, newest first.
pub async fn list(State(state): State<PortalState>) -> Result<Json<Vec<Notice>>, PortalError> {
    let now = Utc::now();
    let mut notices: Vec<Notice> = state.store.list(Collection::Notices).await?;
    notices.retain(|n| n.expires_at > now);
    notices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    debug!(count = notices.len(), "active notices");
    Ok(Json(notices))
}

/// POST /api/notices
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<NoticeInput>,
) -> Result<Json<Notice>, PortalError> {
    let (Some(title), Some(content)) = (present(body.title), present(body.content)) else {
        return Err(PortalError::bad_request("Title and content are required"));
    };

    let now = Utc::now();
    let notice = Notice {
        id: new_id(),
        title,
        content,
        important: body.important,
        created_at: now,
        updated_at: now,
        expires_at: resolve_expiry(body.expires_at.as_deref(), now),
        user_id: present(body.user_id).unwrap_or_else(|| "anonymous".to_string()),
        user_name: present(body.user_name).unwrap_or_else(|| "Anonymous".to_string()),
    };
    let created = state.store.insert(Collection::Notices, notice).await?;
    info!(notice_id = %created.id, expires_at = %created.expires_at, "notice created");
    Ok(Json(created))
}

/// DELETE /api/notices?id=&userId=
pub async fn delete(
    State(state): State<PortalState>,
    current: CurrentUser,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("ID parameter is required"));
    };
    let removed: Notice = delete_owned(
        &state.store,
        Collection::Notices,
        &id,
        &current,
        query.user_id.as_deref(),
        "Notice not found",
    )
    .await?;
    info!(notice_id = %removed.id, "notice deleted");
    Ok(Json(DeleteResponse::ok()))
}
