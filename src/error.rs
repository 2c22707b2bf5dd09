use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A share code or password failed format validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The share code is already in use on the channel.
    #[error("Share code already in use: {0}")]
    CodeTaken(String),

    /// Decryption produced garbage: wrong password or share code.
    #[error("Wrong password or share code")]
    InvalidCredentials,

    /// The envelope is corrupted or foreign data.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The device could not produce a location fix.
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// The device refused location access.
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    /// Publishing to (or tearing down) the remote channel failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// The key-value store failed or holds a corrupted record.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Too many failed decryption attempts for a share code.
    #[error("Too many failed attempts. Try again in {remaining_minutes} minutes")]
    RateLimited {
        /// Milliseconds until the oldest counted failure leaves the window.
        remaining_ms: i64,
        /// The same delay rounded up to whole minutes.
        remaining_minutes: i64,
    },

    /// No active sharing session exists.
    #[error("No active sharing session")]
    NoActiveSession,

    /// The active session has no auto-stop deadline to extend.
    #[error("Sharing session has no auto-stop deadline")]
    NoDeadline,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// An external call did not resolve within its bound.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The fieldless kind of an [`AppError`], used for branching without
/// inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    CodeTaken,
    InvalidCredentials,
    MalformedEnvelope,
    LocationUnavailable,
    PermissionDenied,
    Publish,
    Storage,
    RateLimited,
    NoActiveSession,
    NoDeadline,
    NotFound,
    Timeout,
    Internal,
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::CodeTaken(_) => ErrorKind::CodeTaken,
            AppError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AppError::MalformedEnvelope(_) => ErrorKind::MalformedEnvelope,
            AppError::LocationUnavailable(_) => ErrorKind::LocationUnavailable,
            AppError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AppError::Publish(_) => ErrorKind::Publish,
            AppError::Storage(_) | AppError::Redis(_) => ErrorKind::Storage,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            AppError::NoActiveSession => ErrorKind::NoActiveSession,
            AppError::NoDeadline => ErrorKind::NoDeadline,
            AppError::NotFound => ErrorKind::NotFound,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Builds a `RateLimited` error from a remaining lock time.
    pub fn rate_limited(remaining_ms: i64) -> Self {
        AppError::RateLimited {
            remaining_ms,
            remaining_minutes: (remaining_ms + 59_999) / 60_000,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry = match self {
            AppError::RateLimited {
                remaining_ms,
                remaining_minutes,
            } => Some((remaining_ms, remaining_minutes)),
            _ => None,
        };

        let (status, message) = match self {
            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::CodeTaken(ref code) => {
                tracing::debug!("Share code taken: {}", code);
                (StatusCode::CONFLICT, "Share code already in use".to_string())
            }

            AppError::InvalidCredentials => {
                tracing::warn!("Decryption failed with supplied credentials");
                (StatusCode::UNAUTHORIZED, "Wrong password or share code".to_string())
            }

            AppError::MalformedEnvelope(ref msg) => {
                tracing::warn!("Malformed envelope: {}", msg);
                (StatusCode::BAD_GATEWAY, "Shared location data is unreadable".to_string())
            }

            AppError::LocationUnavailable(ref msg) => {
                tracing::warn!("Location unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Location unavailable".to_string())
            }

            AppError::PermissionDenied(ref msg) => {
                tracing::warn!("Location permission denied: {}", msg);
                (StatusCode::FORBIDDEN, "Location permission denied".to_string())
            }

            AppError::Publish(ref msg) => {
                tracing::error!("Publish error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Failed to publish location".to_string())
            }

            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }

            AppError::RateLimited { remaining_minutes, .. } => {
                tracing::warn!("Rate limited for {} more minutes", remaining_minutes);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    format!(
                        "Too many failed attempts. Try again in {} minutes",
                        remaining_minutes
                    ),
                )
            }

            AppError::NoActiveSession => {
                tracing::debug!("No active sharing session");
                (StatusCode::NOT_FOUND, "No active sharing session".to_string())
            }

            AppError::NoDeadline => {
                tracing::debug!("Sharing session has no deadline");
                (
                    StatusCode::CONFLICT,
                    "Sharing session has no auto-stop deadline".to_string(),
                )
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Timeout(ref msg) => {
                tracing::warn!("Timed out: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Operation timed out".to_string())
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = match retry {
            Some((remaining_ms, remaining_minutes)) => sonic_rs::to_string(&sonic_rs::json!({
                "error": message,
                "remainingMs": remaining_ms,
                "remainingMinutes": remaining_minutes
            })),
            None => sonic_rs::to_string(&sonic_rs::json!({
                "error": message
            })),
        }
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(http::header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_errors_are_storage_kind() {
        let err = AppError::from(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn rate_limited_rounds_minutes_up() {
        match AppError::rate_limited(60_001) {
            AppError::RateLimited { remaining_minutes, .. } => assert_eq!(remaining_minutes, 2),
            other => panic!("unexpected error: {:?}", other),
        }
        match AppError::rate_limited(0) {
            AppError::RateLimited { remaining_minutes, .. } => assert_eq!(remaining_minutes, 0),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn rate_limited_body_carries_remaining_time() {
        let response = AppError::rate_limited(90_000).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["remainingMs"], 90_000);
        assert_eq!(body["remainingMinutes"], 2);
        assert!(body["error"].as_str().unwrap().contains("2 minutes"));
    }

    #[tokio::test]
    async fn other_bodies_carry_only_the_message() {
        let response = AppError::NotFound.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["error"], "Resource not found");
        assert!(body.get("remainingMs").is_none());
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::rate_limited(1_000).into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::CodeTaken("my-code".into()).into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
