use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::present;
use crate::db::Collection;
use crate::db::models::{Report, ReportUpdate, new_id};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;
use crate::types::DeleteResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuery {
    pub id: Option<String>,
    pub report_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInput {
    pub report_id: Option<String>,
    pub content: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub is_public: Option<bool>,
}

/// GET /api/reports/updates -> one update by `id`, or a report's updates oldest first.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<UpdateQuery>,
) -> Result<Response, PortalError> {
    let id = present(query.id);
    let report_id = present(query.report_id);
    if id.is_none() && report_id.is_none() {
        return Err(PortalError::bad_request(
            "reportId or id parameter is required",
        ));
    }

    let mut updates: Vec<ReportUpdate> = state.store.list(Collection::ReportUpdates).await?;
    if let Some(id) = id {
        return updates
            .into_iter()
            .find(|u| u.id == id)
            .map(|u| Json(u).into_response())
            .ok_or_else(|| PortalError::not_found("Update not found"));
    }
    if let Some(report_id) = report_id {
        updates.retain(|u| u.report_id == report_id);
    }
    updates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(Json(updates).into_response())
}

/// POST /api/reports/updates
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<UpdateInput>,
) -> Result<Json<ReportUpdate>, PortalError> {
    let (Some(report_id), Some(content), Some(author_id), Some(author_name)) = (
        present(body.report_id),
        present(body.content),
        present(body.author_id),
        present(body.author_name),
    ) else {
        return Err(PortalError::bad_request(
            "reportId, content, authorId and authorName are required",
        ));
    };

    let report: Option<Report> = state.store.find(Collection::Reports, &report_id).await?;
    if report.is_none() {
        return Err(PortalError::not_found("Report not found"));
    }

    let update = ReportUpdate {
        id: new_id(),
        report_id,
        content,
        author_id,
        author_name,
        created_at: Utc::now(),
        is_public: body.is_public.unwrap_or(true),
    };
    let created = state.store.insert(Collection::ReportUpdates, update).await?;
    info!(update_id = %created.id, report_id = %created.report_id, "report update added");
    Ok(Json(created))
}

/// DELETE /api/reports/updates?id=
pub async fn delete(
    State(state): State<PortalState>,
    Query(query): Query<UpdateQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("ID parameter is required"));
    };
    let removed: Option<ReportUpdate> = state.store.remove(Collection::ReportUpdates, &id).await?;
    if removed.is_none() {
        return Err(PortalError::not_found("Update not found"));
    }
    Ok(Json(DeleteResponse::ok()))
}
