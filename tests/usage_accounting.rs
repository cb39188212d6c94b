//! Integration tests for interceptor admission and usage accounting.
//!
//! These verify the ledger side effects:
//! 1. Rejected requests (missing key, unknown key, exhausted limits)
//!    write no usage record
//! 2. Every admitted request appends exactly one record carrying the
//!    handler's status code, whatever that status is
//!
//! **Requirements:**
//! - PostgreSQL running at DATABASE_URL (migrations are applied on
//!   connect); each test is skipped when the variable is unset.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tower::ServiceExt;

use navgate::api::admin::generate_api_key;
use navgate::middleware::api_key;
use navgate::notification::mailer::Mailer;
use navgate::proxy::{geocode::GeoClient, routing::RoutingClient, tiles::TileClient};
use navgate::store::postgres::{
    NewCompany, NewPlan, NewSubscription, NewUsage, PgStore, SubscriptionRow,
};
use navgate::{config, AppState};

struct Fixture {
    db: PgStore,
    app: Router,
    subscription: SubscriptionRow,
}

fn test_config(database_url: String) -> config::Config {
    config::Config {
        port: 0,
        database_url,
        service_key: "test-service-key".into(),
        admin_key: None,
        jwt_secret: "test-jwt-secret".into(),
        mail_api_url: None,
        mail_from: "no-reply@navgate.local".into(),
        routing_url: "http://127.0.0.1:9".into(),
        tile_url: "http://127.0.0.1:9".into(),
        tile_style_day: "test-style".into(),
        tile_style_night: "maptiler-basic".into(),
        nominatim_url: "http://127.0.0.1:9".into(),
        photon_url: "http://127.0.0.1:9".into(),
    }
}

/// Seed a company, a plan with the given limits, and an active
/// subscription, then build a router with the interceptor in front of
/// two stub handlers.
async fn fixture(
    database_url: &str,
    api_hit_limit: Option<i32>,
    concurrent_connections: Option<i32>,
) -> Fixture {
    let db = PgStore::connect(database_url).await.unwrap();
    db.migrate().await.unwrap();

    let company = db
        .insert_company(&NewCompany {
            name: format!("acme-{}", uuid::Uuid::new_v4().simple()),
            contact_email: "ops@acme.example".into(),
            country: None,
        })
        .await
        .unwrap();

    let plan = db
        .insert_plan(&NewPlan {
            name: format!("plan-{}", uuid::Uuid::new_v4().simple()),
            description: None,
            price_monthly: Decimal::new(4999_00, 2),
            price_annual: None,
            api_hit_limit,
            concurrent_connections,
            per_api_hit_price: None,
        })
        .await
        .unwrap();

    let now = Utc::now();
    let subscription = db
        .insert_subscription(&NewSubscription {
            company_id: company.id,
            plan_id: plan.id,
            api_key: generate_api_key(),
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(30),
            auto_renew: true,
        })
        .await
        .unwrap();

    let cfg = test_config(database_url.to_string());
    let state = Arc::new(AppState {
        db: db.clone(),
        routing: RoutingClient::new(cfg.routing_url.clone()),
        geo: GeoClient::new(cfg.nominatim_url.clone(), cfg.photon_url.clone()),
        tiles: TileClient::new(
            cfg.tile_url.clone(),
            cfg.tile_style_day.clone(),
            cfg.tile_style_night.clone(),
        ),
        mailer: Mailer::new(None, cfg.mail_from.clone()),
        config: cfg,
    });

    let app = Router::new()
        .route("/ping", get(|| async { StatusCode::IM_A_TEAPOT }))
        .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .layer(from_fn_with_state(state.clone(), api_key::admit_and_forward))
        .with_state(state);

    Fixture {
        db,
        app,
        subscription,
    }
}

async fn call(app: &Router, path: &str, api_key: Option<&str>) -> Response {
    let mut req = Request::builder().uri(path);
    if let Some(key) = api_key {
        req = req.header("x-api-key", key);
    }
    app.clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn error_code(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    body["error"]["code"].as_str().unwrap().to_string()
}

async fn ledger_count(db: &PgStore, subscription_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM api_usages WHERE subscription_id = $1")
        .bind(subscription_id)
        .fetch_one(db.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn rejections_write_no_usage_record() {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let fx = fixture(&url, None, None).await;

    let resp = call(&fx.app, "/ping", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(resp).await, "api_key_missing");

    let resp = call(&fx.app, "/ping", Some("nav_v1_doesnotexist")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(resp).await, "api_key_invalid");

    assert_eq!(ledger_count(&fx.db, fx.subscription.id).await, 0);
}

#[tokio::test]
async fn admitted_request_appends_one_record_with_handler_status() {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let fx = fixture(&url, None, None).await;
    let key = fx.subscription.api_key.as_str();

    let resp = call(&fx.app, "/ping", Some(key)).await;
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(ledger_count(&fx.db, fx.subscription.id).await, 1);

    // Handler errors are still metered with the status they produced.
    let resp = call(&fx.app, "/boom", Some(key)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ledger_count(&fx.db, fx.subscription.id).await, 2);

    let rows: Vec<(String, i16, i32)> = sqlx::query_as(
        "SELECT endpoint, status_code, response_time_ms FROM api_usages \
         WHERE subscription_id = $1 ORDER BY id",
    )
    .bind(fx.subscription.id)
    .fetch_all(fx.db.pool())
    .await
    .unwrap();

    assert_eq!(rows[0].0, "/ping");
    assert_eq!(rows[0].1, 418);
    assert!(rows[0].2 >= 0);
    assert_eq!(rows[1].0, "/boom");
    assert_eq!(rows[1].1, 500);
}

#[tokio::test]
async fn exhausted_quota_rejects_and_consumes_nothing() {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let fx = fixture(&url, Some(2), None).await;
    let key = fx.subscription.api_key.as_str();

    // Two records already in the current month exhaust a limit of 2.
    for _ in 0..2 {
        fx.db
            .insert_usage(&NewUsage {
                company_id: fx.subscription.company_id,
                subscription_id: fx.subscription.id,
                endpoint: "/ping".into(),
                status_code: 200,
                response_time_ms: 5,
            })
            .await
            .unwrap();
    }

    let resp = call(&fx.app, "/ping", Some(key)).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(resp).await, "quota_exceeded");
    assert_eq!(ledger_count(&fx.db, fx.subscription.id).await, 2);
}

#[tokio::test]
async fn recent_burst_trips_concurrency_limit() {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let fx = fixture(&url, None, Some(1)).await;
    let key = fx.subscription.api_key.as_str();

    // One record stamped just now fills the 1-second window.
    fx.db
        .insert_usage(&NewUsage {
            company_id: fx.subscription.company_id,
            subscription_id: fx.subscription.id,
            endpoint: "/ping".into(),
            status_code: 200,
            response_time_ms: 5,
        })
        .await
        .unwrap();

    let resp = call(&fx.app, "/ping", Some(key)).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(resp).await, "concurrency_exceeded");
    assert_eq!(ledger_count(&fx.db, fx.subscription.id).await, 1);
}

#[tokio::test]
async fn unlimited_plan_admits_regardless_of_history() {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let fx = fixture(&url, None, None).await;
    let key = fx.subscription.api_key.as_str();

    for _ in 0..5 {
        let resp = call(&fx.app, "/ping", Some(key)).await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    }
    assert_eq!(ledger_count(&fx.db, fx.subscription.id).await, 5);
}
