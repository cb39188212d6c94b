//! Navigation endpoints: routing, tiles, geocoding, history.
//!
//! All of these run behind the API-key interceptor and the user-auth
//! stage; handlers receive the resolved user from request extensions.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::middleware::user_auth::CurrentUser;
use crate::models::geo::{ReverseParams, SearchParams, TileParams};
use crate::models::user::UserOut;
use crate::proxy::routing::{RouteRequest, RouteResponse};
use crate::proxy::tiles::TileStyle;
use crate::store::postgres::NewNavigationLog;
use crate::AppState;

pub async fn user_details(Extension(user): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({
        "status": true,
        "msg": "Authenticated",
        "user": UserOut {
            id: user.id,
            name: user.name,
            email: user.email,
            is_active: user.is_active,
        },
    }))
}

pub async fn get_route(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<RouteRequest>,
) -> Json<RouteResponse> {
    if req.locations.len() < 2 {
        return Json(RouteResponse::failed(
            "At least 2 locations required for routing",
            "Insufficient locations".to_string(),
        ));
    }

    let start_time = Utc::now();
    let response = state.routing.route(&req).await;
    let end_time = Utc::now();

    // History entry per routing call; failure to log never fails the
    // request itself.
    let log = NewNavigationLog {
        user_id: user.id,
        start_place: req.locations[0].label(),
        destination: req.locations[req.locations.len() - 1].label(),
        start_time,
        end_time,
        time_taken_ms: (end_time - start_time).num_milliseconds(),
        directions: response
            .data
            .as_ref()
            .and_then(|d| d.get("trip"))
            .and_then(|t| t.get("summary"))
            .cloned(),
        status: response.status,
        message: response.msg.clone(),
        error: response.error.clone(),
    };
    if let Err(e) = state.db.insert_navigation_log(&log).await {
        tracing::error!(user_id = user.id, "failed to write navigation log: {}", e);
    }

    Json(response)
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

pub async fn navigation_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, AppError> {
    let limit = params.limit.clamp(1, 100);
    let logs = state
        .db
        .list_navigation_logs(user.id, limit)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({
        "status": true,
        "count": logs.len(),
        "results": logs,
    })))
}

pub async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, u32)>,
    Query(params): Query<TileParams>,
) -> Result<Response, AppError> {
    let style = TileStyle::parse(&params.style).ok_or_else(|| {
        AppError::BadRequest("Invalid style parameter. Use 'day' or 'night'.".to_string())
    })?;

    let upstream = state.tiles.fetch(style, z, x, y).await?;

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("image/png"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(e.into()))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    params.validate().map_err(AppError::BadRequest)?;
    let results = state.geo.search(&params.q, params.limit).await?;
    let count = results.as_array().map(|a| a.len()).unwrap_or(0);
    Ok(Json(json!({
        "status": true,
        "msg": "Search successful",
        "count": count,
        "results": results,
    })))
}

pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    params.validate().map_err(AppError::BadRequest)?;
    let results = state.geo.search(&params.q, params.limit).await?;
    let count = results.as_array().map(|a| a.len()).unwrap_or(0);
    Ok(Json(json!({
        "status": true,
        "count": count,
        "results": results,
    })))
}

pub async fn reverse_geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseParams>,
) -> Result<Json<Value>, AppError> {
    let result = state.geo.reverse(params.lat, params.lon).await?;
    Ok(Json(json!({
        "status": true,
        "result": result,
    })))
}

pub async fn photon_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    params.validate().map_err(AppError::BadRequest)?;
    let features = state.geo.photon(&params.q, params.limit).await?;
    Ok(Json(json!({
        "status": true,
        "count": features.len(),
        "results": features,
    })))
}

pub async fn unified_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    params.validate().map_err(AppError::BadRequest)?;
    let results = state
        .geo
        .unified_search(&params.q, params.limit, params.offset)
        .await?;
    Ok(Json(json!({
        "status": true,
        "count": results.len(),
        "results": results,
    })))
}
