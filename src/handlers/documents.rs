use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::present;
use crate::db::Collection;
use crate::db::models::{Document, new_id};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;
use crate::types::DeleteResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// GET /api/documents
pub async fn list(State(state): State<PortalState>) -> Result<Json<Vec<Document>>, PortalError> {
    let mut documents: Vec<Document> = state.store.list(Collection::Documents).await?;
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(documents))
}

/// POST /api/documents -> registers metadata; the file itself lives elsewhere.
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<DocumentInput>,
) -> Result<Json<Document>, PortalError> {
    let (Some(name), Some(kind), Some(file_path)) = (
        present(body.name),
        present(body.kind),
        present(body.file_path),
    ) else {
        return Err(PortalError::bad_request("name, type and filePath are required"));
    };

    let now = Utc::now();
    let document = Document {
        id: new_id(),
        name,
        description: body.description.unwrap_or_default(),
        kind,
        file_path,
        created_at: now,
        updated_at: now,
    };
    let created = state.store.insert(Collection::Documents, document).await?;
    info!(document_id = %created.id, "document registered");
    Ok(Json(created))
}

/// DELETE /api/documents?id=
pub async fn delete(
    State(state): State<PortalState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("ID parameter is required"));
    };
    let removed: Option<Document> = state.store.remove(Collection::Documents, &id).await?;
    if removed.is_none() {
        return Err(PortalError::not_found("Document not found"));
    }
    Ok(Json(DeleteResponse::ok()))
}
