use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Errors surfaced by the HTTP routes, rendered as `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required request field is missing or empty.
    #[error("{0}")]
    BadRequest(String),

    /// No valid access credential in the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Application credentials or settings are missing.
    #[error("{0}")]
    Config(String),

    /// The platform throttled the call; recoverable after `reset_at`.
    #[error("Rate limit exceeded")]
    RateLimited { reset_at: OffsetDateTime },

    #[error("{0}")]
    NotFound(String),

    /// Upstream failure passed through with its status and a generic message.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Classifies an upstream error. `fallback` is the only text the caller
    /// sees for unclassified failures; the detail goes to the log.
    pub(crate) fn upstream(error: crate::Error, fallback: &str) -> Self {
        match error {
            crate::Error::RateLimited { reset_at } => Self::RateLimited { reset_at },
            crate::Error::NotConfigured(what) => Self::Config(format!("{what} is not configured")),
            crate::Error::Upstream {
                operation,
                status: Some(status),
                ref detail,
            } => {
                tracing::warn!(operation, status, detail = %detail, "Upstream call failed");
                match StatusCode::from_u16(status) {
                    Ok(code) if code.is_client_error() || code.is_server_error() => Self::Upstream {
                        status: code,
                        message: fallback.to_string(),
                    },
                    _ => Self::Internal(fallback.to_string()),
                }
            }
            other => {
                tracing::warn!(error = %other, "Upstream call failed");
                Self::Internal(fallback.to_string())
            }
        }
    }
}

/// Whole minutes until `reset_at`, rounded up and never negative.
fn minutes_until(reset_at: OffsetDateTime) -> i64 {
    let seconds = (reset_at - OffsetDateTime::now_utc()).whole_seconds().max(0);
    (seconds + 59) / 60
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            Self::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() }))).into_response()
            }
            Self::Config(ref msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))).into_response()
            }
            Self::RateLimited { reset_at } => {
                let reset_time = reset_at.format(&Rfc3339).unwrap_or_default();
                let body = json!({
                    "error": format!(
                        "Rate limit exceeded. Please try again in {} minutes.",
                        minutes_until(reset_at)
                    ),
                    "resetTime": reset_time,
                });
                (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
            }
            Self::NotFound(ref msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            Self::Upstream { status, ref message } => {
                (status, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal(ref msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))).into_response()
            }
        }
    }
}
