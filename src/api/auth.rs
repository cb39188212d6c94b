//! OTP sign-up and login flow.
//!
//! send-otp issues a fresh secret and mails the code; register binds
//! that secret to the new user; login regenerates a code from the
//! stored secret and verify exchanges it for a JWT. User-not-found on
//! the login path is reported in-band so the endpoint does not leak
//! which emails exist through status codes.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::{jwt, otp};
use crate::errors::AppError;
use crate::models::user::{LoginRequest, OtpVerifyRequest, RegisterRequest, SendOtpRequest, UserOut};
use crate::AppState;

pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let otp_secret = otp::generate_secret();
    let code = otp::generate_otp(&otp_secret);

    state
        .mailer
        .send(&req.email, "Your OTP Code", &format!("Your OTP is: {}", code))
        .await
        .map_err(AppError::Internal)?;

    tracing::debug!(email = %req.email, "OTP issued");
    Ok(Json(json!({ "otp_token": otp_secret })))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserOut>, AppError> {
    if state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(AppError::Internal)?
        .is_some()
    {
        return Err(AppError::EmailRegistered);
    }

    if !otp::verify_otp(&req.otp_token, &req.otp) {
        return Err(AppError::OtpInvalid);
    }

    // Keep the secret so later logins can reuse it.
    let user = state
        .db
        .insert_user(&req.name, &req.email, &req.otp_token)
        .await
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = user.id, "user registered");
    Ok(Json(UserOut {
        id: user.id,
        name: user.name,
        email: user.email,
        is_active: user.is_active,
    }))
}

pub async fn login_request_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(AppError::Internal)?;

    let Some(user) = user else {
        return Ok(Json(json!({ "status": false, "msg": "User not found" })));
    };
    let Some(secret) = user.otp_secret else {
        return Ok(Json(json!({ "status": false, "msg": "User not found" })));
    };

    let code = otp::generate_otp(&secret);
    let mailer = state.mailer.clone();
    let email = user.email.clone();
    // Fire and forget: the client gets an immediate ack.
    tokio::spawn(async move {
        if let Err(e) = mailer
            .send(&email, "Your OTP Code", &format!("Your OTP is: {}", code))
            .await
        {
            tracing::error!(%email, "failed to send login OTP: {}", e);
        }
    });

    Ok(Json(json!({ "status": true, "msg": "OTP sent to email" })))
}

pub async fn login_verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OtpVerifyRequest>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(AppError::Internal)?;

    let Some(user) = user else {
        return Ok(Json(json!({ "status": false, "msg": "User not found or OTP not set." })));
    };
    let Some(secret) = user.otp_secret else {
        return Ok(Json(json!({ "status": false, "msg": "User not found or OTP not set." })));
    };

    if !otp::verify_otp(&secret, &req.otp) {
        return Ok(Json(json!({ "status": false, "msg": "Invalid OTP" })));
    }

    let token = jwt::issue(&state.config.jwt_secret, &user.email)?;
    Ok(Json(json!({
        "status": true,
        "access_token": token,
        "token_type": "bearer",
    })))
}
