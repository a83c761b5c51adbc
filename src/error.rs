use reqwest::StatusCode;
use time::OffsetDateTime;

const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Failure of a call to the platform or the generation API.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The upstream throttled the caller until `reset_at`.
    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: OffsetDateTime },

    /// The requested account or resource does not exist.
    #[error("not found")]
    NotFound,

    /// The credentials used to sign the request were rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Any other non-success response.
    #[error("{operation} failed (status {status:?}): {detail}")]
    Upstream {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A credential the call needs was never configured for this application.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The response arrived but did not have the expected shape.
    #[error("malformed {operation} response: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },
}

impl Error {
    /// Status code to surface when the error is passed through to a caller.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::NotFound => Some(404),
            Self::Unauthorized => Some(401),
            Self::Upstream { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::NotConfigured(_) | Self::Decode { .. } => None,
        }
    }

    pub(crate) fn decode(operation: &'static str, detail: impl ToString) -> Self {
        Self::Decode {
            operation,
            detail: detail.to_string(),
        }
    }
}

/// Checks the HTTP status; returns the response on success, a classified error otherwise.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited {
            reset_at: rate_limit_reset(response.headers()),
        }),
        StatusCode::UNAUTHORIZED => Err(Error::Unauthorized),
        StatusCode::NOT_FOUND => Err(Error::NotFound),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Upstream {
                operation,
                status: Some(status.as_u16()),
                detail: body,
            })
        }
    }
}

/// Reads the reset epoch from the rate-limit header.
///
/// A missing or unparsable header yields "now", so callers still get a
/// well-formed timestamp to show.
fn rate_limit_reset(headers: &reqwest::header::HeaderMap) -> OffsetDateTime {
    headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}
