use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::PortalError;

/// `Json<T>` whose rejections use the portal error body.
///
/// Oversized bodies stay 413; every other rejection becomes 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(map_rejection(rejection)),
        }
    }
}

fn map_rejection(rejection: JsonRejection) -> PortalError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return PortalError::PayloadTooLarge;
    }
    PortalError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
}
