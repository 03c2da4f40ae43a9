//! HTTP handlers, one module per resource.

pub mod appointments;
pub mod auth;
pub mod availability;
pub mod board;
pub mod bulletin;
pub mod documents;
pub mod health;
pub mod messages;
pub mod notices;
pub mod notifications;
pub mod posts;
pub mod report_updates;
pub mod reports;
pub mod users;

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

pub(crate) use crate::db::instant::{parse_date, parse_instant};
use crate::db::models::Owned;
use crate::db::{Collection, Record};
use crate::error::PortalError;
use crate::middleware::{CurrentUser, ensure_owner_or_admin};
use crate::service::store_actor::StoreHandle;

/// A required text field: absent, empty and whitespace-only all count as missing.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Tells an absent field (`None`) apart from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "explicit")]`.
pub(crate) fn explicit<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

/// Parse an enum value from a query or body string. Matching is case-insensitive.
pub(crate) fn parse_enum<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .or_else(|_| serde_json::from_value(serde_json::Value::String(raw.to_uppercase())))
        .or_else(|_| serde_json::from_value(serde_json::Value::String(raw.to_lowercase())))
        .ok()
}

/// An optional enum field of a request body; present but unknown values are a 400.
pub(crate) fn enum_field<T: DeserializeOwned>(
    raw: Option<String>,
    field: &str,
) -> Result<Option<T>, PortalError> {
    match present(raw) {
        None => Ok(None),
        Some(raw) => parse_enum(&raw)
            .map(Some)
            .ok_or_else(|| PortalError::bad_request(format!("Invalid {field}: {raw}"))),
    }
}

/// Remove a record after checking the requester may act on it.
pub(crate) async fn delete_owned<T>(
    store: &StoreHandle,
    collection: Collection,
    id: &str,
    current: &CurrentUser,
    claimed_user_id: Option<&str>,
    not_found: &str,
) -> Result<T, PortalError>
where
    T: DeserializeOwned + Serialize + Record + Owned + Send + 'static,
{
    let existing: T = store
        .find(collection, id)
        .await?
        .ok_or_else(|| PortalError::not_found(not_found))?;
    ensure_owner_or_admin(store, current, claimed_user_id, existing.owner_id()).await?;
    store
        .remove(collection, id)
        .await?
        .ok_or_else(|| PortalError::not_found(not_found))
}
