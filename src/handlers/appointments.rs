use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::{enum_field, parse_date, parse_enum, parse_instant, present};
use crate::db::Collection;
use crate::db::models::{
    Appointment, AppointmentStatus, AppointmentType, Availability, User, new_id,
};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;
use crate::service::scheduling::check_slot;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQuery {
    pub host_id: Option<String>,
    pub attendee_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub host_id: Option<String>,
    #[serde(default)]
    pub attendee_ids: Vec<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: Option<String>,
    pub status: Option<String>,
    pub rejection_reason: Option<String>,
}

/// GET /api/appointments -> filtered, ordered by start time.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<Appointment>>, PortalError> {
    let zone = state.schedule_zone;
    let mut appointments: Vec<Appointment> = state.store.list(Collection::Appointments).await?;

    if let Some(host) = present(query.host_id) {
        appointments.retain(|a| a.host_id == host);
    }
    if let Some(attendee) = present(query.attendee_id) {
        appointments.retain(|a| a.attendee_ids.contains(&attendee));
    }
    if let (Some(from), Some(to)) = (present(query.start_date), present(query.end_date)) {
        let (Some(from), Some(to)) = (parse_bound(&from, zone, false), parse_bound(&to, zone, true))
        else {
            return Err(PortalError::bad_request("Invalid startDate or endDate"));
        };
        appointments.retain(|a| a.start_time >= from && a.start_time <= to);
    }
    appointments.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    Ok(Json(appointments))
}

/// A range bound: a full timestamp, or a bare date covering the whole day.
fn parse_bound(raw: &str, zone: FixedOffset, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Some(at) = parse_instant(raw, zone) {
        return Some(at);
    }
    let date = parse_date(raw)?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::MIN
    };
    zone.from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// POST /api/appointments -> book a slot with a host.
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<AppointmentInput>,
) -> Result<Json<Appointment>, PortalError> {
    let (Some(title), Some(start_raw), Some(end_raw), Some(host_id), Some(kind_raw)) = (
        present(body.title),
        present(body.start_time),
        present(body.end_time),
        present(body.host_id),
        present(body.kind),
    ) else {
        return Err(PortalError::bad_request(
            "title, startTime, endTime, hostId and type are required",
        ));
    };
    let kind = enum_field::<AppointmentType>(Some(kind_raw), "type")?
        .ok_or_else(|| PortalError::bad_request("type is required"))?;
    let status = enum_field::<AppointmentStatus>(body.status, "status")?.unwrap_or_default();

    let zone = state.schedule_zone;
    let (Some(start), Some(end)) = (parse_instant(&start_raw, zone), parse_instant(&end_raw, zone))
    else {
        return Err(PortalError::bad_request("Invalid startTime or endTime"));
    };
    if end <= start {
        return Err(PortalError::bad_request("endTime must be after startTime"));
    }

    let host: User = state
        .store
        .find(Collection::Users, &host_id)
        .await?
        .ok_or_else(|| PortalError::not_found("Host not found"))?;
    let availability: Vec<Availability> = state.store.list(Collection::Availability).await?;

    let now = Utc::now();
    let appointment = Appointment {
        id: new_id(),
        title,
        description: present(body.description).unwrap_or_default(),
        location: present(body.location).unwrap_or_default(),
        start_time: start,
        end_time: end,
        created_at: now,
        updated_at: now,
        kind,
        host_id,
        host_name: host.name,
        attendee_ids: body.attendee_ids,
        status,
        rejection_reason: None,
    };

    // Check and insert under one mailbox turn so two bookings cannot both pass.
    let created = state
        .store
        .mutate(
            Collection::Appointments,
            move |appointments: &mut Vec<Appointment>| {
                check_slot(
                    &appointment.host_id,
                    appointment.start_time,
                    appointment.end_time,
                    appointments,
                    &availability,
                    zone,
                )
                .map_err(|reason| {
                    PortalError::conflict(format!("Time slot is not available: {reason}"))
                })?;
                appointments.push(appointment.clone());
                Ok(appointment)
            },
        )
        .await
        .inspect_err(|e| {
            if let PortalError::Conflict(reason) = e {
                warn!(%reason, "appointment rejected");
            }
        })?;

    info!(
        appointment_id = %created.id,
        host_id = %created.host_id,
        start = %created.start_time,
        "appointment booked"
    );
    Ok(Json(created))
}

/// PATCH /api/appointments -> change the status of an appointment.
pub async fn set_status(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<StatusChange>,
) -> Result<Json<Appointment>, PortalError> {
    let (Some(id), Some(status_raw)) = (present(body.id), present(body.status)) else {
        return Err(PortalError::bad_request("Appointment id and status are required"));
    };
    let status = parse_enum::<AppointmentStatus>(&status_raw).ok_or_else(|| {
        PortalError::bad_request(
            "Invalid status. Valid statuses are: PENDING, CONFIRMED, REJECTED, CANCELLED",
        )
    })?;
    let reason = body.rejection_reason;

    let updated = state
        .store
        .mutate(
            Collection::Appointments,
            move |appointments: &mut Vec<Appointment>| {
                let appointment = appointments
                    .iter_mut()
                    .find(|a| a.id == id)
                    .ok_or_else(|| PortalError::not_found("Appointment not found"))?;
                appointment.status = status;
                appointment.rejection_reason = match status {
                    AppointmentStatus::Rejected => Some(reason.unwrap_or_default()),
                    _ => None,
                };
                appointment.updated_at = Utc::now();
                Ok(appointment.clone())
            },
        )
        .await?;

    info!(appointment_id = %updated.id, status = ?updated.status, "appointment status changed");
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    #[test]
    fn date_bounds_cover_whole_days() {
        let utc = Utc.fix();
        let from = parse_bound("2025-06-02", utc, false).unwrap();
        let to = parse_bound("2025-06-02", utc, true).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
        assert!(to > Utc.with_ymd_and_hms(2025, 6, 2, 23, 59, 59).unwrap());
        assert!(to < Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap());
    }

    #[test]
    fn timestamp_bounds_are_exact() {
        let at = parse_bound("2025-06-02T10:00:00Z", Utc.fix(), true).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap());
    }
}
