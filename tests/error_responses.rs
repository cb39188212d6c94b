//! Tests for the gateway error envelope.
//!
//! Every rejection surfaces as `{"error": {"message", "type", "code"}}`
//! with a stable code clients can branch on.

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;

use navgate::errors::AppError;

async fn render(err: AppError) -> (StatusCode, Option<String>, Value) {
    let resp = err.into_response();
    let status = resp.status();
    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    (status, retry_after, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn missing_api_key_is_401_with_stable_code() {
    let (status, retry, body) = render(AppError::ApiKeyMissing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "api_key_missing");
    assert_eq!(body["error"]["type"], "authentication_error");
    assert!(retry.is_none());
}

#[tokio::test]
async fn invalid_api_key_is_401() {
    let (status, _, body) = render(AppError::ApiKeyInvalid).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "api_key_invalid");
}

#[tokio::test]
async fn quota_exceeded_is_429_with_retry_after() {
    let (status, retry, body) = render(AppError::QuotaExceeded).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "quota_exceeded");
    assert_eq!(body["error"]["type"], "rate_limit_error");
    assert_eq!(retry.as_deref(), Some("60"));
}

#[tokio::test]
async fn concurrency_exceeded_is_429_with_one_second_retry() {
    let (status, retry, body) = render(AppError::ConcurrencyExceeded).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "concurrency_exceeded");
    assert_eq!(retry.as_deref(), Some("1"));
}

#[tokio::test]
async fn missing_plan_is_500_and_does_not_leak_ids() {
    let err = AppError::PlanMissing {
        subscription_id: 42,
        plan_id: 7,
    };
    let (status, _, body) = render(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "subscription_misconfigured");
    let msg = body["error"]["message"].as_str().unwrap();
    assert!(!msg.contains("42"));
    assert!(!msg.contains('7'));
}

#[tokio::test]
async fn internal_errors_hide_details() {
    let (status, _, body) = render(AppError::Internal(anyhow::anyhow!("pool exhausted"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "internal_server_error");
    assert_eq!(body["error"]["message"], "internal server error");
}

#[tokio::test]
async fn bad_request_echoes_validation_message() {
    let (status, _, body) =
        render(AppError::BadRequest("q must be at least 2 characters".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "q must be at least 2 characters");
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway() {
    let (status, _, body) = render(AppError::Upstream("Nominatim responded with an error".into())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_failed");
}
