//! Management CRUD: companies, plans, subscriptions, invoices, usage.
//!
//! Subscription creation is the only place API keys are minted; the
//! interceptor never writes to any of these tables.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::middleware::api_key::month_start;
use crate::store::postgres::{
    CompanyRow, InvoiceRow, NewCompany, NewInvoice, NewPlan, NewSubscription, PlanRow,
    SubscriptionRow, UsageSummary,
};
use crate::AppState;

/// Opaque bearer credential bound to one subscription.
pub fn generate_api_key() -> String {
    format!("nav_v1_{}", uuid::Uuid::new_v4().simple())
}

// -- Companies --

pub async fn create_company(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewCompany>,
) -> Result<Json<CompanyRow>, AppError> {
    let company = state
        .db
        .insert_company(&req)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(company))
}

pub async fn list_companies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CompanyRow>>, AppError> {
    let companies = state.db.list_companies().await.map_err(AppError::Internal)?;
    Ok(Json(companies))
}

// -- Plans --

pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPlan>,
) -> Result<Json<PlanRow>, AppError> {
    if req.api_hit_limit.is_some_and(|l| l <= 0) {
        return Err(AppError::BadRequest("api_hit_limit must be positive".into()));
    }
    if req.concurrent_connections.is_some_and(|l| l <= 0) {
        return Err(AppError::BadRequest(
            "concurrent_connections must be positive".into(),
        ));
    }
    let plan = state.db.insert_plan(&req).await.map_err(AppError::Internal)?;
    Ok(Json(plan))
}

pub async fn list_plans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PlanRow>>, AppError> {
    let plans = state.db.list_plans().await.map_err(AppError::Internal)?;
    Ok(Json(plans))
}

// -- Subscriptions --

#[derive(Debug, Deserialize)]
pub struct SubscriptionCreate {
    pub company_id: i64,
    pub plan_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_auto_renew")]
    pub auto_renew: bool,
}

fn default_auto_renew() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CompanyFilter {
    pub company_id: Option<i64>,
}

pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubscriptionCreate>,
) -> Result<Json<SubscriptionRow>, AppError> {
    if req.end_date <= req.start_date {
        return Err(AppError::BadRequest("end_date must be after start_date".into()));
    }
    state
        .db
        .get_plan(req.plan_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound("plan"))?;

    let sub = state
        .db
        .insert_subscription(&NewSubscription {
            company_id: req.company_id,
            plan_id: req.plan_id,
            api_key: generate_api_key(),
            start_date: req.start_date,
            end_date: req.end_date,
            auto_renew: req.auto_renew,
        })
        .await
        .map_err(AppError::Internal)?;

    tracing::info!(subscription_id = sub.id, company_id = sub.company_id, "subscription created");
    Ok(Json(sub))
}

pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Json<Vec<SubscriptionRow>>, AppError> {
    let subs = state
        .db
        .list_subscriptions(filter.company_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(subs))
}

pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let cancelled = state
        .db
        .cancel_subscription(id)
        .await
        .map_err(AppError::Internal)?;
    if !cancelled {
        return Err(AppError::NotFound("subscription"));
    }
    Ok(Json(json!({ "status": true, "msg": "Subscription cancelled" })))
}

// -- Invoices --

pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewInvoice>,
) -> Result<Json<InvoiceRow>, AppError> {
    let invoice = state
        .db
        .insert_invoice(&req)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(invoice))
}

pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Json<Vec<InvoiceRow>>, AppError> {
    let invoices = state
        .db
        .list_invoices(filter.company_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(invoices))
}

// -- Usage --

pub async fn usage_summary(
    State(state): State<Arc<AppState>>,
    Path(subscription_id): Path<i64>,
) -> Result<Json<UsageSummary>, AppError> {
    let summary = state
        .db
        .usage_summary(subscription_id, month_start(Utc::now()))
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(summary))
}
