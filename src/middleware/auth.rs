use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::RequestPartsExt;
use axum_extra::TypedHeader;
use axum_extra::typed_header::TypedHeaderRejectionReason;
use headers::Authorization;
use headers::authorization::Bearer;
use tracing::debug;

use crate::auth::{Claims, TokenService};
use crate::db::Collection;
use crate::db::models::{Role, User};
use crate::error::PortalError;
use crate::service::store_actor::StoreHandle;

/// Claims of the bearer token, when the request carries one.
///
/// A missing `Authorization` header yields `CurrentUser(None)`; a present but
/// invalid token is rejected with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Claims>);

impl CurrentUser {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|c| c.sub.as_str())
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    TokenService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let bearer = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
            Ok(TypedHeader(Authorization(bearer))) => bearer,
            Err(rejection) => {
                return match rejection.reason() {
                    TypedHeaderRejectionReason::Missing => Ok(Self(None)),
                    _ => Err(PortalError::unauthorized("Malformed Authorization header")),
                };
            }
        };
        let tokens = TokenService::from_ref(state);
        let claims = tokens.verify(bearer.token()).inspect_err(|e| {
            debug!(error = %e, "bearer token rejected");
        })?;
        Ok(Self(Some(claims)))
    }
}

/// A valid bearer token is required.
#[derive(Debug, Clone)]
pub struct RequireUser(pub Claims);

impl<S> FromRequestParts<S> for RequireUser
where
    TokenService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(claims)) => Ok(Self(claims)),
            CurrentUser(None) => Err(PortalError::unauthorized("Authentication required")),
        }
    }
}

/// A valid bearer token whose user holds the ADMIN role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Claims);

impl<S> FromRequestParts<S> for RequireAdmin
where
    TokenService: FromRef<S>,
    StoreHandle: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(claims) = RequireUser::from_request_parts(parts, state).await?;
        // The stored role wins over the one baked into the token.
        let store = StoreHandle::from_ref(state);
        let user: Option<User> = store.find(Collection::Users, &claims.sub).await?;
        match user {
            Some(u) if u.role == Role::Admin => Ok(Self(claims)),
            Some(_) => Err(PortalError::forbidden("Administrator role required")),
            None => Err(PortalError::unauthorized("Unknown user")),
        }
    }
}

/// Allow the request when the requester owns the record or is an administrator.
///
/// The requester is the token subject, falling back to the `userId` sent with
/// the request when no token is present. Administrator rights are only granted
/// through a token.
pub async fn ensure_owner_or_admin(
    store: &StoreHandle,
    current: &CurrentUser,
    claimed_user_id: Option<&str>,
    owner_id: &str,
) -> Result<(), PortalError> {
    let requester = current
        .user_id()
        .or(claimed_user_id.filter(|id| !id.trim().is_empty()))
        .ok_or_else(|| PortalError::unauthorized("Authentication required"))?;

    if requester == owner_id {
        return Ok(());
    }
    if let Some(subject) = current.user_id() {
        let user: Option<User> = store.find(Collection::Users, subject).await?;
        if user.is_some_and(|u| u.role == Role::Admin) {
            return Ok(());
        }
    }
    Err(PortalError::forbidden(
        "You do not have permission to modify this item",
    ))
}
