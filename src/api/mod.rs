use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::middleware::{api_key, user_auth};
use crate::AppState;

pub mod admin;
pub mod auth;
pub mod maps;

/// OTP/registration/login routes. Gated by the shared service key, not
/// by subscription API keys; there is no subscription yet at sign-up.
pub fn auth_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/send-otp", post(auth::send_otp))
        .route("/register", post(auth::register))
        .route("/login/request-otp", post(auth::login_request_otp))
        .route("/login/verify", post(auth::login_verify))
        .layer(middleware::from_fn_with_state(state, service_key_auth))
}

/// Navigation routes under the protected prefix. Layer order matters:
/// the interceptor admits and meters first, then the JWT stage resolves
/// the user, so JWT failures still land in the usage ledger.
pub fn maps_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/user", get(maps::user_details))
        .route("/route", post(maps::get_route))
        .route("/navigation/history", get(maps::navigation_history))
        .route("/tiles/:z/:x/:y", get(maps::get_tile))
        .route("/search", get(maps::search))
        .route("/geocode", get(maps::geocode))
        .route("/reverse-geocode", get(maps::reverse_geocode))
        .route("/photon-search", get(maps::photon_search))
        .route("/unified-search", get(maps::unified_search))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth::require_user,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            api_key::admit_and_forward,
        ))
}

/// Management CRUD over companies, plans, subscriptions and invoices.
pub fn admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/companies",
            get(admin::list_companies).post(admin::create_company),
        )
        .route("/plans", get(admin::list_plans).post(admin::create_plan))
        .route(
            "/subscriptions",
            get(admin::list_subscriptions).post(admin::create_subscription),
        )
        .route(
            "/subscriptions/:id/cancel",
            post(admin::cancel_subscription),
        )
        .route(
            "/invoices",
            get(admin::list_invoices).post(admin::create_invoice),
        )
        .route("/usage/:subscription_id", get(admin::usage_summary))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}

/// `authorization-key` header check for the auth routes.
async fn service_key_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    check_key(req.headers(), "authorization-key", &state.config.service_key)?;
    Ok(next.run(req).await)
}

/// `x-admin-key` header check for the management routes.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    check_key(req.headers(), "x-admin-key", state.config.admin_key())?;
    Ok(next.run(req).await)
}

fn check_key(
    headers: &axum::http::HeaderMap,
    header: &str,
    expected: &str,
) -> Result<(), AppError> {
    let presented = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::ServiceKeyInvalid)?;
    if presented.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::ServiceKeyInvalid)
    }
}
