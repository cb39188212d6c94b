//! End-to-end checks on the OTP and token primitives the auth routes
//! are built from.

use navgate::auth::{jwt, otp};
use navgate::models::geo::SearchParams;

#[test]
fn otp_issued_from_fresh_secret_verifies() {
    let secret = otp::generate_secret();
    let code = otp::generate_otp(&secret);
    assert_eq!(code.len(), 6);
    assert!(otp::verify_otp(&secret, &code));
}

#[test]
fn otp_does_not_verify_against_another_secret() {
    let code = otp::generate_otp(&otp::generate_secret());
    assert!(!otp::verify_otp(&otp::generate_secret(), &code));
}

#[test]
fn login_token_round_trips_to_the_same_subject() {
    let token = jwt::issue("shared-secret", "driver@example.com").unwrap();
    let claims = jwt::verify("shared-secret", &token).unwrap();
    assert_eq!(claims.sub, "driver@example.com");
}

#[test]
fn login_token_fails_with_rotated_secret() {
    let token = jwt::issue("old-secret", "driver@example.com").unwrap();
    assert!(jwt::verify("new-secret", &token).is_err());
}

#[test]
fn search_params_enforce_query_and_limit_bounds() {
    let ok: SearchParams = serde_json::from_str(r#"{"q": "bengaluru"}"#).unwrap();
    assert!(ok.validate().is_ok());
    assert_eq!(ok.limit, 10);

    let short: SearchParams = serde_json::from_str(r#"{"q": "b"}"#).unwrap();
    assert!(short.validate().is_err());

    let huge: SearchParams = serde_json::from_str(r#"{"q": "bengaluru", "limit": 500}"#).unwrap();
    assert!(huge.validate().is_err());
}
