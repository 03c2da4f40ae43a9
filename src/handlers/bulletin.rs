use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{delete_owned, present};
use crate::db::Collection;
use crate::db::models::{BulletinPost, new_id};
use crate::error::PortalError;
use crate::middleware::{ApiJson, CurrentUser};
use crate::router::PortalState;
use crate::types::DeleteResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinInput {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub important: bool,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    pub id: Option<String>,
    pub user_id: Option<String>,
}

/// GET /api/bulletin -> newest first.
pub async fn list(
    State(state): State<PortalState>,
) -> Result<Json<Vec<BulletinPost>>, PortalError> {
    let mut posts: Vec<BulletinPost> = state.store.list(Collection::Bulletin).await?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(posts))
}

/// POST /api/bulletin
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<BulletinInput>,
) -> Result<Json<BulletinPost>, PortalError> {
    let (Some(title), Some(content), Some(user_id), Some(user_name)) = (
        present(body.title),
        present(body.content),
        present(body.user_id),
        present(body.user_name),
    ) else {
        return Err(PortalError::bad_request(
            "Title, content, userId and userName are required",
        ));
    };

    let now = Utc::now();
    let post = BulletinPost {
        id: new_id(),
        title,
        content,
        important: body.important,
        created_at: now,
        updated_at: now,
        user_id,
        user_name,
    };
    let created = state.store.insert(Collection::Bulletin, post).await?;
    info!(post_id = %created.id, "bulletin post created");
    Ok(Json(created))
}

/// DELETE /api/bulletin?id=&userId=
pub async fn delete(
    State(state): State<PortalState>,
    current: CurrentUser,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("ID parameter is required"));
    };
    let removed: BulletinPost = delete_owned(
        &state.store,
        Collection::Bulletin,
        &id,
        &current,
        query.user_id.as_deref(),
        "Bulletin post not found",
    )
    .await?;
    info!(post_id = %removed.id, "bulletin post deleted");
    Ok(Json(DeleteResponse::ok()))
}
