use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the `authorization-key` header on /auth routes.
    pub service_key: String,
    /// Admin key for /admin routes. Falls back to service_key.
    pub admin_key: Option<String>,
    /// HS256 signing secret for user JWTs.
    pub jwt_secret: String,
    /// HTTP mail relay endpoint. None disables delivery (dev mode).
    pub mail_api_url: Option<String>,
    pub mail_from: String,
    /// Valhalla-compatible routing service.
    pub routing_url: String,
    /// Tile server base URL (style path appended per request).
    pub tile_url: String,
    pub tile_style_day: String,
    pub tile_style_night: String,
    pub nominatim_url: String,
    pub photon_url: String,
}

impl Config {
    /// Returns the admin key for the management API.
    /// Falls back to service_key if NAVGATE_ADMIN_KEY is not set.
    pub fn admin_key(&self) -> &str {
        self.admin_key.as_deref().unwrap_or(&self.service_key)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let jwt_secret =
        std::env::var("NAVGATE_JWT_SECRET").unwrap_or_else(|_| "CHANGE_ME_DEV_ONLY_SECRET".into());

    if jwt_secret == "CHANGE_ME_DEV_ONLY_SECRET" {
        let env_mode = std::env::var("NAVGATE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "NAVGATE_JWT_SECRET is still the insecure placeholder. \
                 Set a proper secret before running in production."
            );
        }
        eprintln!("⚠️  NAVGATE_JWT_SECRET is not set — using insecure placeholder. Set a real secret for production.");
    }

    Ok(Config {
        port: std::env::var("NAVGATE_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/navgate".into()),
        service_key: std::env::var("NAVGATE_SERVICE_KEY")
            .unwrap_or_else(|_| "dev-service-key".into()),
        admin_key: std::env::var("NAVGATE_ADMIN_KEY").ok(),
        jwt_secret,
        mail_api_url: std::env::var("NAVGATE_MAIL_API_URL").ok(),
        mail_from: std::env::var("NAVGATE_MAIL_FROM")
            .unwrap_or_else(|_| "no-reply@navgate.local".into()),
        routing_url: std::env::var("NAVGATE_ROUTING_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3095".into()),
        tile_url: std::env::var("NAVGATE_TILE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3090".into()),
        tile_style_day: std::env::var("NAVGATE_TILE_STYLE_DAY")
            .unwrap_or_else(|_| "test-style".into()),
        tile_style_night: std::env::var("NAVGATE_TILE_STYLE_NIGHT")
            .unwrap_or_else(|_| "maptiler-basic".into()),
        nominatim_url: std::env::var("NAVGATE_NOMINATIM_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8088".into()),
        photon_url: std::env::var("NAVGATE_PHOTON_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:2322".into()),
    })
}
