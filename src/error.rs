use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum PortalError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    Password(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PortalError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PortalError::Unauthorized(_) | PortalError::Token(_) => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            PortalError::Io(_)
            | PortalError::Json(_)
            | PortalError::Password(_)
            | PortalError::StoreUnavailable(_)
            | PortalError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error_body = match self {
            PortalError::BadRequest(message) => ApiErrorBody::new("BAD_REQUEST", message),
            PortalError::Unauthorized(message) => ApiErrorBody::new("UNAUTHORIZED", message),
            PortalError::Token(_) => {
                ApiErrorBody::new("UNAUTHORIZED", "Invalid or expired token.")
            }
            PortalError::Forbidden(message) => ApiErrorBody::new("FORBIDDEN", message),
            PortalError::NotFound(message) => ApiErrorBody::new("NOT_FOUND", message),
            PortalError::Conflict(message) => ApiErrorBody::new("CONFLICT", message),
            PortalError::PayloadTooLarge => {
                ApiErrorBody::new("PAYLOAD_TOO_LARGE", "request body too large")
            }
            internal => {
                error!(error = %internal, "request failed with internal error");
                ApiErrorBody::new("INTERNAL_ERROR", "An internal server error occurred.")
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiErrorBody {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let err = PortalError::StoreUnavailable("mailbox closed".to_string());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains(r#""code":"INTERNAL_ERROR""#));
        assert!(!body.contains("mailbox"));
    }

    #[tokio::test]
    async fn conflict_keeps_its_message() {
        let resp = PortalError::Conflict("slot taken".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains(r#""message":"slot taken""#));
    }
}
