use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use chrono::{Duration, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use navgate::store::postgres::{NewCompany, NewPlan, NewSubscription, PgStore};
use navgate::{api, cli, config, jobs, notification, proxy, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "navgate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Company { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_company_command(&db, command).await
        }
        Some(cli::Commands::Plan { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_plan_command(&db, command).await
        }
        Some(cli::Commands::Subscription { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_subscription_command(&db, command).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let state = Arc::new(AppState {
        db: db.clone(),
        routing: proxy::routing::RoutingClient::new(cfg.routing_url.clone()),
        geo: proxy::geocode::GeoClient::new(cfg.nominatim_url.clone(), cfg.photon_url.clone()),
        tiles: proxy::tiles::TileClient::new(
            cfg.tile_url.clone(),
            cfg.tile_style_day.clone(),
            cfg.tile_style_night.clone(),
        ),
        mailer: notification::mailer::Mailer::new(cfg.mail_api_url.clone(), cfg.mail_from.clone()),
        config: cfg,
    });

    let app = axum::Router::new()
        .route("/", axum::routing::get(root))
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .nest("/auth", api::auth_router(state.clone()))
        .nest("/api", api::maps_router(state.clone()))
        .nest("/admin", api::admin_router(state.clone()))
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            use axum::http::{HeaderName, Method};
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("authorization-key"),
                    HeaderName::from_static("x-api-key"),
                    HeaderName::from_static("x-admin-key"),
                ])
        })
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    jobs::expiry::spawn(db);
    tracing::info!("Background subscription expiry job started (every 1h)");

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("navgate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "message": "Navigation gateway is running" }))
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with gateway logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        "X-Content-Type-Options",
        axum::http::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "X-Frame-Options",
        axum::http::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        "Cache-Control",
        axum::http::HeaderValue::from_static("no-store"),
    );
    headers.insert(
        "Referrer-Policy",
        axum::http::HeaderValue::from_static("no-referrer"),
    );
    headers.remove("Server");
    resp
}

async fn handle_company_command(db: &PgStore, cmd: cli::CompanyCommands) -> anyhow::Result<()> {
    match cmd {
        cli::CompanyCommands::Create {
            name,
            contact_email,
            country,
        } => {
            let company = db
                .insert_company(&NewCompany {
                    name,
                    contact_email,
                    country,
                })
                .await?;
            println!(
                "Company created:\n  ID:    {}\n  Name:  {}\n  Email: {}",
                company.id, company.name, company.contact_email
            );
        }
        cli::CompanyCommands::List => {
            let companies = db.list_companies().await?;
            if companies.is_empty() {
                println!("No companies found.");
            } else {
                println!("{:<8} {:<28} {:<28} ACTIVE", "ID", "NAME", "EMAIL");
                for c in companies {
                    println!(
                        "{:<8} {:<28} {:<28} {}",
                        c.id, c.name, c.contact_email, c.is_active
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_plan_command(db: &PgStore, cmd: cli::PlanCommands) -> anyhow::Result<()> {
    match cmd {
        cli::PlanCommands::Create {
            name,
            description,
            price_monthly,
            api_hit_limit,
            concurrent_connections,
        } => {
            let price = Decimal::from_str(&price_monthly)
                .map_err(|_| anyhow::anyhow!("invalid price: {}", price_monthly))?;
            if api_hit_limit.is_some_and(|l| l <= 0) {
                anyhow::bail!("api_hit_limit must be positive");
            }
            if concurrent_connections.is_some_and(|l| l <= 0) {
                anyhow::bail!("concurrent_connections must be positive");
            }
            let plan = db
                .insert_plan(&NewPlan {
                    name,
                    description,
                    price_monthly: price,
                    price_annual: None,
                    api_hit_limit,
                    concurrent_connections,
                    per_api_hit_price: None,
                })
                .await?;
            println!(
                "Plan created:\n  ID:    {}\n  Name:  {}\n  Price: {}/month",
                plan.id, plan.name, plan.price_monthly
            );
        }
        cli::PlanCommands::List => {
            let plans = db.list_plans().await?;
            if plans.is_empty() {
                println!("No plans found.");
            } else {
                println!(
                    "{:<8} {:<20} {:<12} {:<12} CONCURRENT",
                    "ID", "NAME", "PRICE/MO", "HIT LIMIT"
                );
                for p in plans {
                    let limit = p
                        .api_hit_limit
                        .map_or_else(|| "unlimited".to_string(), |l| l.to_string());
                    let conc = p
                        .concurrent_connections
                        .map_or_else(|| "unlimited".to_string(), |l| l.to_string());
                    println!(
                        "{:<8} {:<20} {:<12} {:<12} {}",
                        p.id, p.name, p.price_monthly, limit, conc
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_subscription_command(
    db: &PgStore,
    cmd: cli::SubscriptionCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::SubscriptionCommands::Create {
            company_id,
            plan_id,
            days,
        } => {
            db.get_plan(plan_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("plan not found: {}", plan_id))?;

            let now = Utc::now();
            let sub = db
                .insert_subscription(&NewSubscription {
                    company_id,
                    plan_id,
                    api_key: api::admin::generate_api_key(),
                    start_date: now,
                    end_date: now + Duration::days(days),
                    auto_renew: true,
                })
                .await?;
            println!(
                "Subscription created:\n  ID:      {}\n  API key: {}\n  Expires: {}",
                sub.id,
                sub.api_key,
                sub.end_date.format("%Y-%m-%d")
            );
        }
        cli::SubscriptionCommands::List { company_id } => {
            let subs = db.list_subscriptions(company_id).await?;
            if subs.is_empty() {
                println!("No subscriptions found.");
            } else {
                println!(
                    "{:<8} {:<10} {:<8} {:<42} {:<12} EXPIRES",
                    "ID", "COMPANY", "PLAN", "API KEY", "STATUS"
                );
                for s in subs {
                    println!(
                        "{:<8} {:<10} {:<8} {:<42} {:<12} {}",
                        s.id,
                        s.company_id,
                        s.plan_id,
                        s.api_key,
                        s.status,
                        s.end_date.format("%Y-%m-%d")
                    );
                }
            }
        }
        cli::SubscriptionCommands::Cancel { id } => {
            if db.cancel_subscription(id).await? {
                println!("Subscription cancelled.");
            } else {
                println!("Subscription not found or not active.");
            }
        }
    }
    Ok(())
}
