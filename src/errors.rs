use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("API key required")]
    ApiKeyMissing,

    #[error("invalid or expired API key")]
    ApiKeyInvalid,

    #[error("monthly API hit limit exceeded")]
    QuotaExceeded,

    #[error("concurrent connection limit exceeded")]
    ConcurrencyExceeded,

    /// Subscription references a plan that does not exist. Data
    /// integrity violation upstream of the interceptor, not a normal
    /// rejection.
    #[error("subscription {subscription_id} references missing plan {plan_id}")]
    PlanMissing { subscription_id: i64, plan_id: i64 },

    #[error("invalid authorization key")]
    ServiceKeyInvalid,

    #[error("invalid token")]
    TokenInvalid,

    #[error("invalid OTP")]
    OtpInvalid,

    #[error("email already registered")]
    EmailRegistered,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("upstream unreachable: {0}")]
    UpstreamUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::ApiKeyMissing => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "api_key_missing",
                "API key required".to_string(),
            ),
            AppError::ApiKeyInvalid => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "api_key_invalid",
                "invalid or expired API key".to_string(),
            ),
            AppError::QuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "quota_exceeded",
                "monthly API hit limit exceeded".to_string(),
            ),
            AppError::ConcurrencyExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "concurrency_exceeded",
                "concurrent connection limit exceeded".to_string(),
            ),
            AppError::PlanMissing {
                subscription_id,
                plan_id,
            } => {
                tracing::error!(
                    subscription_id,
                    plan_id,
                    "subscription references a missing plan"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "subscription_misconfigured",
                    "subscription is misconfigured".to_string(),
                )
            }
            AppError::ServiceKeyInvalid => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "authorization_key_invalid",
                "invalid authorization key".to_string(),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_invalid",
                "invalid or expired token".to_string(),
            ),
            AppError::OtpInvalid => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "otp_invalid",
                "invalid OTP".to_string(),
            ),
            AppError::EmailRegistered => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "email_registered",
                "email already registered".to_string(),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "not_found",
                format!("{} not found", what),
            ),
            AppError::BadRequest(m) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "bad_request",
                m.clone(),
            ),
            AppError::Upstream(e) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "upstream_failed",
                e.clone(),
            ),
            AppError::UpstreamUnavailable(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_error",
                "upstream_unreachable",
                e.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        // Hint clients how long to back off. The concurrency window is
        // one second; the monthly quota resets much later, but 60s keeps
        // well-behaved clients from hammering the counter queries.
        let retry_after = match self {
            AppError::ConcurrencyExceeded => Some("1"),
            AppError::QuotaExceeded => Some("60"),
            _ => None,
        };
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static(secs));
        }

        response
    }
}
