use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::present;
use crate::auth::{hash_password, needs_rehash, verify_password};
use crate::db::Collection;
use crate::db::models::{PublicUser, Role, User, new_id};
use crate::error::PortalError;
use crate::middleware::{ApiJson, RequireUser};
use crate::router::PortalState;
use crate::types::LoginResponse;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub email: Option<String>,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// POST /api/auth -> self-registration. New accounts are always USER.
pub async fn register(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<RegisterRequest>,
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

    let now = Utc::now();
    let user = User {
        id: new_id(),
        email: normalize_email(&email),
        password: Some(hash_password(&password)?),
        name: name.trim().to_string(),
        role: Role::User,
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

    info!(user_id = %created.id, "user registered");
    Ok((StatusCode::CREATED, Json(PublicUser::from(&created))))
}

/// PUT /api/auth -> login, returns the user and a session token.
pub async fn login(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, PortalError> {
    let (Some(email), Some(password)) = (present(body.email), present(body.password)) else {
        return Err(PortalError::bad_request("Email and password are required"));
    };

    let email = normalize_email(&email);
    let users: Vec<User> = state.store.list(Collection::Users).await?;
    let invalid = || PortalError::unauthorized("Invalid credentials");

    let user = users
        .into_iter()
        .find(|u| u.email.eq_ignore_ascii_case(&email))
        .ok_or_else(invalid)?;
    let hash = user.password.as_deref().ok_or_else(invalid)?;
    if !verify_password(&password, hash) {
        return Err(invalid());
    }
    if needs_rehash(hash) {
        upgrade_hash(&state, &user.id, hash, &password).await;
    }

    let token = state.tokens.issue(&user)?;
    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(Json(LoginResponse {
        user: PublicUser::from(&user),
        token,
    }))
}

/// Replace an older hash after a successful login. Failure only costs the upgrade.
async fn upgrade_hash(state: &PortalState, user_id: &str, old_hash: &str, password: &str) {
    let fresh = match hash_password(password) {
        Ok(fresh) => fresh,
        Err(e) => {
            warn!(user_id, error = %e, "password rehash failed");
            return;
        }
    };
    let (id, old_hash) = (user_id.to_string(), old_hash.to_string());
    let res = state
        .store
        .mutate(Collection::Users, move |users: &mut Vec<User>| {
            // Skip when the password changed in the meantime.
            if let Some(user) = users
                .iter_mut()
                .find(|u| u.id == id && u.password.as_deref() == Some(old_hash.as_str()))
            {
                user.password = Some(fresh);
                user.updated_at = Utc::now();
            }
            Ok(())
        })
        .await;
    match res {
        Ok(()) => info!(user_id, "password hash upgraded to argon2id"),
        Err(e) => warn!(user_id, error = %e, "password hash upgrade not stored"),
    }
}

/// GET /api/auth?email= -> public profile by e-mail.
pub async fn lookup(
    State(state): State<PortalState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<PublicUser>, PortalError> {
    let Some(email) = present(query.email) else {
        return Err(PortalError::bad_request("Email parameter is required"));
    };
    let email = normalize_email(&email);
    let users: Vec<User> = state.store.list(Collection::Users).await?;
    users
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(&email))
        .map(|u| Json(PublicUser::from(u)))
        .ok_or_else(|| PortalError::not_found("User not found"))
}

/// GET /api/auth/me -> the user behind the bearer token.
pub async fn me(
    State(state): State<PortalState>,
    RequireUser(claims): RequireUser,
) -> Result<Json<PublicUser>, PortalError> {
    let user: Option<User> = state.store.find(Collection::Users, &claims.sub).await?;
    user.map(|u| Json(PublicUser::from(&u)))
        .ok_or_else(|| PortalError::not_found("User not found"))
}
