//! Errors returned by the Google API clients

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP client could not be built
    #[error("failed to initialize HTTP client: {0}")]
    Init(String),

    /// Credential file missing or unreadable
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// Access token could not be obtained
    #[error("token exchange failed: {0}")]
    Auth(String),

    #[error("Permission denied. {0}")]
    PermissionDenied(String),

    #[error("request is not authenticated: {0}")]
    Unauthenticated(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success response
    #[error("API returned {code} {status}: {message}")]
    Status {
        code: u16,
        status: String,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Map an error response to a typed error, using the Google error envelope when present
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let (status_name, message) = match envelope {
            Some(ErrorEnvelope { error }) => (error.status, error.message),
            None => (String::new(), body.trim().to_string()),
        };

        match (status, status_name.as_str()) {
            (_, "PERMISSION_DENIED") | (StatusCode::FORBIDDEN, _) => {
                Self::PermissionDenied(message)
            }
            (_, "UNAUTHENTICATED") | (StatusCode::UNAUTHORIZED, _) => {
                Self::Unauthenticated(message)
            }
            (StatusCode::NOT_FOUND, _) => Self::NotFound(message),
            (StatusCode::TOO_MANY_REQUESTS, _) => Self::RateLimited(message),
            _ => Self::Status {
                code: status.as_u16(),
                status: status_name,
                message,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}
