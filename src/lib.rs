//! navgate: navigation API gateway.
//!
//! OTP email authentication, per-company subscription metering, and
//! proxying to routing/geocoding/tile upstreams. The binary in
//! `main.rs` wires the CLI and the server; everything else lives here
//! so integration tests in `tests/` can reach it.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod proxy;
pub mod store;

use store::postgres::PgStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub db: PgStore,
    pub routing: proxy::routing::RoutingClient,
    pub geo: proxy::geocode::GeoClient,
    pub tiles: proxy::tiles::TileClient,
    pub mailer: notification::mailer::Mailer,
    pub config: config::Config,
}
