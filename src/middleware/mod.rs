pub mod auth;
pub mod json;

pub use auth::{CurrentUser, RequireAdmin, RequireUser, ensure_owner_or_admin};
pub use json::ApiJson;
