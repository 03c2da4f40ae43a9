use axum::{Json, extract::State};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::present;
use crate::db::Collection;
use crate::db::models::{Comment, Post, new_id};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    pub post_id: Option<String>,
    pub content: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
}

/// GET /api/posts -> newest first, comments inline.
pub async fn list(State(state): State<PortalState>) -> Result<Json<Vec<Post>>, PortalError> {
    let mut posts: Vec<Post> = state.store.list(Collection::Posts).await?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(posts))
}

/// POST /api/posts
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<PostInput>,
) -> Result<Json<Post>, PortalError> {
    let (Some(title), Some(content), Some(author_id), Some(author_name)) = (
        present(body.title),
        present(body.content),
        present(body.author_id),
        present(body.author_name),
    ) else {
        return Err(PortalError::bad_request(
            "Title, content, authorId and authorName are required",
        ));
    };

    let now = Utc::now();
    let post = Post {
        id: new_id(),
        title,
        content,
        author_id,
        author_name,
        created_at: now,
        updated_at: now,
        comments: Vec::new(),
    };
    let created = state.store.insert(Collection::Posts, post).await?;
    info!(post_id = %created.id, "post created");
    Ok(Json(created))
}

/// POST /api/posts/comments -> append a comment to a post.
pub async fn add_comment(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<CommentInput>,
) -> Result<Json<Comment>, PortalError> {
    let (Some(post_id), Some(content), Some(author_id), Some(author_name)) = (
        present(body.post_id),
        present(body.content),
        present(body.author_id),
        present(body.author_name),
    ) else {
        return Err(PortalError::bad_request(
            "postId, content, authorId and authorName are required",
        ));
    };

    let now = Utc::now();
    let comment = Comment {
        id: new_id(),
        content,
        author_id,
        author_name,
        post_id,
        created_at: now,
        updated_at: now,
    };

    let created = state
        .store
        .mutate(Collection::Posts, move |posts: &mut Vec<Post>| {
            let post = posts
                .iter_mut()
                .find(|p| p.id == comment.post_id)
                .ok_or_else(|| PortalError::not_found("Post not found"))?;
            post.comments.push(comment.clone());
            Ok(comment)
        })
        .await?;

    info!(comment_id = %created.id, post_id = %created.post_id, "comment added");
    Ok(Json(created))
}
