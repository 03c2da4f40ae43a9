//! Timestamps as clients and older data files write them.
//!
//! Rows written by earlier versions of the portal hold whatever the browser
//! sent: RFC 3339, `datetime-local` values without a zone, or bare dates.
//! The serde modules here read all of them and always write RFC 3339.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer, de::Error};

use crate::config::CONFIG;
use crate::service::scheduling::schedule_zone;

/// Parse an instant. RFC 3339 is taken as is; a timestamp without zone is read in `zone`.
pub fn parse_instant(raw: &str, zone: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| zone.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Last second of `date` in UTC.
pub fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    NaiveTime::from_hms_opt(23, 59, 59).map(|t| date.and_time(t).and_utc())
}

/// Offset in which zone-less stored timestamps were written.
fn stored_zone() -> FixedOffset {
    schedule_zone(CONFIG.schedule_utc_offset_minutes)
}

fn serialize_utc<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
}

/// Any instant. A bare date means the start of that day.
pub mod lenient {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        serialize_utc(dt, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        let zone = stored_zone();
        parse_instant(&raw, zone)
            .or_else(|| {
                let midnight = parse_date(&raw)?.and_time(NaiveTime::MIN);
                zone.from_local_datetime(&midnight)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
            })
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`")))
    }
}

/// An expiry. A bare date lasts until the end of that day (UTC).
pub mod expiry {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        serialize_utc(dt, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_instant(&raw, stored_zone())
            .or_else(|| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok().and_then(end_of_day))
            .ok_or_else(|| D::Error::custom(format!("invalid expiry `{raw}`")))
    }
}
