use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{enum_field, parse_enum, present};
use crate::db::Collection;
use crate::db::models::{Priority, Report, ReportCategory, ReportStatus, new_id};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;
use crate::types::DeleteResponse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub id: Option<String>,
    pub reporter_id: Option<String>,
    pub assigned_to_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub reporter_id: Option<String>,
    pub reporter_name: Option<String>,
    pub location: Option<String>,
    pub assigned_to_id: Option<String>,
    pub assigned_to_name: Option<String>,
    pub conversation_id: Option<String>,
    pub images: Option<Vec<String>>,
}

/// GET /api/reports -> one report by `id`, or a filtered list, newest first.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, PortalError> {
    let mut reports: Vec<Report> = state.store.list(Collection::Reports).await?;

    if let Some(id) = present(query.id) {
        return reports
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| Json(r).into_response())
            .ok_or_else(|| PortalError::not_found("Report not found"));
    }

    if let Some(reporter) = present(query.reporter_id) {
        reports.retain(|r| r.reporter_id == reporter);
    }
    if let Some(assignee) = present(query.assigned_to_id) {
        reports.retain(|r| r.assigned_to_id.as_deref() == Some(assignee.as_str()));
    }
    if let Some(status) = present(query.status) {
        let status = parse_enum::<ReportStatus>(&status);
        reports.retain(|r| Some(r.status) == status);
    }
    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(reports).into_response())
}

/// POST /api/reports
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<ReportInput>,
) -> Result<Json<Report>, PortalError> {
    let (Some(title), Some(description), Some(reporter_id), Some(reporter_name)) = (
        present(body.title),
        present(body.description),
        present(body.reporter_id),
        present(body.reporter_name),
    ) else {
        return Err(PortalError::bad_request(
            "Title, description, reporterId and reporterName are required",
        ));
    };

    let now = Utc::now();
    let report = Report {
        id: new_id(),
        title,
        description,
        category: enum_field::<ReportCategory>(body.category, "category")?.unwrap_or_default(),
        status: ReportStatus::New,
        priority: enum_field::<Priority>(body.priority, "priority")?.unwrap_or_default(),
        reporter_id,
        reporter_name,
        location: present(body.location),
        assigned_to_id: present(body.assigned_to_id),
        assigned_to_name: present(body.assigned_to_name),
        created_at: now,
        updated_at: now,
        resolved_at: None,
        closed_at: None,
        conversation_id: None,
        images: body.images.unwrap_or_default(),
    };
    let created = state.store.insert(Collection::Reports, report).await?;
    info!(report_id = %created.id, category = ?created.category, "report created");
    Ok(Json(created))
}

/// PUT /api/reports?id= -> partial update.
pub async fn update(
    State(state): State<PortalState>,
    Query(query): Query<IdQuery>,
    ApiJson(body): ApiJson<ReportInput>,
) -> Result<Json<Report>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("ID parameter is required"));
    };
    let category = enum_field::<ReportCategory>(body.category, "category")?;
    let status = enum_field::<ReportStatus>(body.status, "status")?;
    let priority = enum_field::<Priority>(body.priority, "priority")?;

    let updated = state
        .store
        .mutate(Collection::Reports, move |reports: &mut Vec<Report>| {
            let report = reports
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| PortalError::not_found("Report not found"))?;
            let now = Utc::now();

            if let Some(title) = present(body.title) {
                report.title = title;
            }
            if let Some(description) = present(body.description) {
                report.description = description;
            }
            if let Some(category) = category {
                report.category = category;
            }
            if let Some(priority) = priority {
                report.priority = priority;
            }
            if let Some(status) = status {
                report.status = status;
                match status {
                    ReportStatus::Resolved => report.resolved_at = Some(now),
                    ReportStatus::Closed => report.closed_at = Some(now),
                    ReportStatus::New | ReportStatus::InProgress => {}
                }
            }
            if let Some(location) = present(body.location) {
                report.location = Some(location);
            }
            if let Some(assignee) = present(body.assigned_to_id) {
                report.assigned_to_id = Some(assignee);
            }
            if let Some(assignee) = present(body.assigned_to_name) {
                report.assigned_to_name = Some(assignee);
            }
            if let Some(conversation) = present(body.conversation_id) {
                report.conversation_id = Some(conversation);
            }
            if let Some(images) = body.images {
                report.images = images;
            }
            report.updated_at = now;
            Ok(report.clone())
        })
        .await?;

    info!(report_id = %updated.id, status = ?updated.status, "report updated");
    Ok(Json(updated))
}

/// DELETE /api/reports?id=
pub async fn delete(
    State(state): State<PortalState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("ID parameter is required"));
    };
    let removed: Option<Report> = state.store.remove(Collection::Reports, &id).await?;
    if removed.is_none() {
        return Err(PortalError::not_found("Report not found"));
    }
    info!(report_id = %id, "report deleted");
    Ok(Json(DeleteResponse::ok()))
}
