//! Appointment slot checks against a host's weekly schedule.
//!
//! Weekly schedules hold wall-clock times without a zone. They are read in a
//! single fixed offset from UTC (`schedule_utc_offset_minutes`).

use chrono::{Datelike, DateTime, FixedOffset, NaiveDate, Offset, Utc};
use thiserror::Error as ThisError;

use crate::db::models::{Appointment, Availability, DayOfWeek};
use crate::types::DayAvailability;

/// Why a requested slot cannot be booked.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SlotUnavailable {
    #[error("The host has not published any availability")]
    NoAvailability,

    #[error("The host is not available on {date}: {reason}")]
    Blocked { date: NaiveDate, reason: String },

    #[error("The host has no time slots on {day:?}")]
    NoSlotsOnDay { day: DayOfWeek },

    #[error("The requested time does not fit within one of the host's time slots")]
    OutsideSlots,

    #[error("The host already has an appointment at this time")]
    Overlaps { appointment_id: String },
}

/// The zone weekly schedules are written in. Out-of-range offsets fall back to UTC.
pub fn schedule_zone(offset_minutes: i32) -> FixedOffset {
    offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Check that `host_id` can take an appointment from `start` to `end`.
///
/// The caller guarantees `start < end`.
pub fn check_slot(
    host_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    appointments: &[Appointment],
    availability: &[Availability],
    zone: FixedOffset,
) -> Result<(), SlotUnavailable> {
    let host = availability
        .iter()
        .find(|a| a.user_id == host_id)
        .ok_or(SlotUnavailable::NoAvailability)?;

    let local_start = start.with_timezone(&zone);
    let local_end = end.with_timezone(&zone);
    let date = local_start.date_naive();

    if let Some(exception) = host.blocked_on(date) {
        return Err(SlotUnavailable::Blocked {
            date,
            reason: exception.reason.clone(),
        });
    }

    let day = DayOfWeek::from(date.weekday());
    let slots = host.slots_on(day);
    if slots.is_empty() {
        return Err(SlotUnavailable::NoSlotsOnDay { day });
    }

    // A booking running past local midnight never fits a single-day slot.
    let same_day = local_end.date_naive() == date;
    let (from, to) = (local_start.time(), local_end.time());
    if !same_day || !slots.iter().any(|s| s.contains(from, to)) {
        return Err(SlotUnavailable::OutsideSlots);
    }

    if let Some(clash) = appointments.iter().find(|a| {
        a.host_id == host_id && a.status.blocks_host() && start < a.end_time && end > a.start_time
    }) {
        return Err(SlotUnavailable::Overlaps {
            appointment_id: clash.id.clone(),
        });
    }

    Ok(())
}

/// What one person offers on `date`.
pub fn day_view(person: &Availability, date: NaiveDate) -> DayAvailability {
    let blocked = person.blocked_on(date);
    let available_slots = match blocked {
        Some(_) => Vec::new(),
        None => person
            .slots_on(DayOfWeek::from(date.weekday()))
            .to_vec(),
    };
    DayAvailability {
        id: person.id.clone(),
        user_id: person.user_id.clone(),
        user_name: person.user_name.clone(),
        role: person.role,
        date,
        available_slots,
        unavailable_reason: blocked.map(|e| e.reason.clone()),
    }
}
