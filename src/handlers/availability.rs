use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use super::{enum_field, parse_date, parse_enum, present};
use crate::db::Collection;
use crate::db::models::{Availability, AvailabilityException, DaySchedule, Role, new_id};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;
use crate::service::scheduling::day_view;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityInput {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub role: Option<String>,
    pub weekly_schedule: Option<Vec<DaySchedule>>,
    #[serde(default)]
    pub exceptions: Vec<AvailabilityException>,
}

fn validate_schedule(schedule: &[DaySchedule]) -> Result<(), PortalError> {
    for day in schedule {
        if let Some(slot) = day.slots.iter().find(|s| s.end_time <= s.start_time) {
            return Err(PortalError::bad_request(format!(
                "Time slot {}-{} on {:?} must end after it starts",
                slot.start_time.format("%H:%M"),
                slot.end_time.format("%H:%M"),
                day.day
            )));
        }
    }
    Ok(())
}

/// GET /api/availability -> records, or per-person day views when `date` is given.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Response, PortalError> {
    let mut records: Vec<Availability> = state.store.list(Collection::Availability).await?;

    if let Some(user_id) = present(query.user_id) {
        records.retain(|a| a.user_id == user_id);
    }
    if let Some(role) = present(query.role) {
        let role = parse_enum::<Role>(&role);
        records.retain(|a| Some(a.role) == role);
    }

    if let Some(raw) = present(query.date) {
        let date = parse_date(&raw)
            .ok_or_else(|| PortalError::bad_request(format!("Invalid date: {raw}")))?;
        let views: Vec<_> = records.iter().map(|a| day_view(a, date)).collect();
        return Ok(Json(views).into_response());
    }
    Ok(Json(records).into_response())
}

/// POST /api/availability -> create or replace a person's schedule.
pub async fn upsert(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<AvailabilityInput>,
) -> Result<Json<Availability>, PortalError> {
    let (Some(user_id), Some(user_name), Some(role), Some(weekly_schedule)) = (
        present(body.user_id),
        present(body.user_name),
        enum_field::<Role>(body.role, "role")?,
        body.weekly_schedule,
    ) else {
        return Err(PortalError::bad_request(
            "userId, userName, role and weeklySchedule are required",
        ));
    };
    validate_schedule(&weekly_schedule)?;

    let record = Availability {
        id: new_id(),
        user_id,
        user_name,
        role,
        weekly_schedule,
        exceptions: body.exceptions,
    };

    let (saved, replaced) = state
        .store
        .mutate(
            Collection::Availability,
            move |records: &mut Vec<Availability>| {
                match records.iter_mut().find(|a| a.user_id == record.user_id) {
                    Some(existing) => {
                        let id = std::mem::take(&mut existing.id);
                        *existing = Availability { id, ..record };
                        Ok((existing.clone(), true))
                    }
                    None => {
                        records.push(record.clone());
                        Ok((record, false))
                    }
                }
            },
        )
        .await?;

    info!(user_id = %saved.user_id, replaced, "availability saved");
    Ok(Json(saved))
}
