use std::cmp::Ordering;
use std::sync::LazyLock;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use super::auth::normalize_email;
use super::present;
use crate::auth::hash_password;
use crate::db::Collection;
use crate::db::models::{PublicUser, Role, User, new_id};
use crate::error::PortalError;
use crate::middleware::{ApiJson, RequireAdmin};
use crate::router::PortalState;
use crate::types::{DeleteResponse, Pagination, UserPage};

const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_PAGE_SIZE: usize = 10;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("email regex: {e}"))
});

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub id: Option<String>,
    pub search: Option<String>,
    pub role: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    CreatedAt,
    UpdatedAt,
    Name,
    Email,
    Role,
}

impl SortKey {
    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or_default() {
            "updatedAt" => Self::UpdatedAt,
            "name" => Self::Name,
            "email" => Self::Email,
            "role" => Self::Role,
            _ => Self::CreatedAt,
        }
    }

    fn compare(self, a: &User, b: &User) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            Self::Email => a.email.cmp(&b.email),
            Self::Role => a.role.as_str().cmp(b.role.as_str()),
        }
    }
}

fn positive(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn validate_email(email: &str) -> Result<(), PortalError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(PortalError::bad_request("Invalid email address format"))
    }
}

fn validate_password(password: &str) -> Result<(), PortalError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortalError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn parse_role(raw: &str) -> Result<Role, PortalError> {
    Role::parse(raw).ok_or_else(|| {
        PortalError::bad_request("Invalid role. Valid roles are: USER, COACH, ADMIN")
    })
}

/// GET /api/users -> one user by `id`, or a filtered, sorted page.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<UserQuery>,
) -> Result<Response, PortalError> {
    let mut users: Vec<User> = state.store.list(Collection::Users).await?;

    if let Some(id) = present(query.id) {
        let user = users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| PortalError::not_found("User not found"))?;
        return Ok(Json(PublicUser::from(user)).into_response());
    }

    if let Some(search) = present(query.search) {
        let needle = search.to_lowercase();
        users.retain(|u| {
            u.name.to_lowercase().contains(&needle) || u.email.to_lowercase().contains(&needle)
        });
    }
    if let Some(role) = present(query.role) {
        let role = Role::parse(&role);
        users.retain(|u| Some(u.role) == role);
    }

    let key = SortKey::parse(query.sort_by.as_deref());
    let ascending = query.sort_order.as_deref() == Some("asc");
    users.sort_by(|a, b| {
        let ord = key.compare(a, b);
        if ascending { ord } else { ord.reverse() }
    });

    let pagination = Pagination::new(
        users.len(),
        positive(query.page.as_deref(), 1),
        positive(query.limit.as_deref(), DEFAULT_PAGE_SIZE),
    );
    let page = users[pagination.window()]
        .iter()
        .map(PublicUser::from)
        .collect();

    Ok(Json(UserPage {
        users: page,
        pagination,
    })
    .into_response())
}

/// POST /api/users -> admin creates a user with any role.
pub async fn create(
    State(state): State<PortalState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<UserInput>,
) -> Result<(StatusCode, Json<PublicUser>), PortalError> {
    let (Some(email), Some(password), Some(name)) = (
        present(body.email),
        present(body.password),
        present(body.name),
    ) else {
        return Err(PortalError::bad_request(
            "Email, password and name are required",
        ));
    };
    let email = normalize_email(&email);
    validate_email(&email)?;
    validate_password(&password)?;
    let role = match present(body.role) {
        Some(raw) => parse_role(&raw)?,
        None => Role::User,
    };

    let now = Utc::now();
    let user = User {
        id: new_id(),
        email,
        password: Some(hash_password(&password)?),
        name: name.trim().to_string(),
        role,
        created_at: now,
        updated_at: now,
    };

    let created = state
        .store
        .mutate(Collection::Users, move |users: &mut Vec<User>| {
            if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
                return Err(PortalError::bad_request(
                    "A user with this email address already exists",
                ));
            }
            users.push(user.clone());
            Ok(user)
        })
        .await?;

    info!(admin = %admin.sub, user_id = %created.id, role = %created.role, "user created");
    Ok((StatusCode::CREATED, Json(PublicUser::from(&created))))
}

/// PUT /api/users?id= -> admin partial update.
pub async fn update(
    State(state): State<PortalState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<IdQuery>,
    ApiJson(body): ApiJson<UserInput>,
) -> Result<Json<PublicUser>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("User id is required"));
    };

    let email = present(body.email).map(|e| normalize_email(&e));
    if let Some(email) = &email {
        validate_email(email)?;
    }
    let password_hash = match present(body.password) {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };
    let role = present(body.role).map(|r| parse_role(&r)).transpose()?;
    let name = present(body.name).map(|n| n.trim().to_string());

    let updated = state
        .store
        .mutate(Collection::Users, move |users: &mut Vec<User>| {
            let idx = users
                .iter()
                .position(|u| u.id == id)
                .ok_or_else(|| PortalError::not_found("User not found"))?;

            if let Some(email) = &email
                && users
                    .iter()
                    .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(PortalError::bad_request(
                    "A user with this email address already exists",
                ));
            }

            let user = &mut users[idx];
            if let Some(email) = email {
                user.email = email;
            }
            if let Some(name) = name {
                user.name = name;
            }
            if let Some(role) = role {
                user.role = role;
            }
            if password_hash.is_some() {
                user.password = password_hash;
            }
            user.updated_at = Utc::now();
            Ok(user.clone())
        })
        .await?;

    info!(admin = %admin.sub, user_id = %updated.id, "user updated");
    Ok(Json(PublicUser::from(&updated)))
}

/// DELETE /api/users?id=
pub async fn delete(
    State(state): State<PortalState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("User id is required"));
    };
    let removed: Option<User> = state.store.remove(Collection::Users, &id).await?;
    if removed.is_none() {
        return Err(PortalError::not_found("User not found"));
    }
    info!(admin = %admin.sub, user_id = %id, "user deleted");
    Ok(Json(DeleteResponse::with_id(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(validate_email("resident@portal.nl").is_ok());
        assert!(validate_email("resident@portal").is_err());
        assert!(validate_email("two words@portal.nl").is_err());
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn page_params_fall_back_to_defaults() {
        assert_eq!(positive(Some("3"), 1), 3);
        assert_eq!(positive(Some("0"), 1), 1);
        assert_eq!(positive(Some("abc"), 10), 10);
        assert_eq!(positive(None, 10), 10);
    }

    #[test]
    fn unknown_sort_key_uses_creation_time() {
        assert_eq!(SortKey::parse(Some("password")), SortKey::CreatedAt);
        assert_eq!(SortKey::parse(Some("email")), SortKey::Email);
    }
}
