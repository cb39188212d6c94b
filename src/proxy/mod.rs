pub mod geocode;
pub mod routing;
pub mod tiles;

use std::time::Duration;

/// Shared builder for upstream HTTP clients. Each upstream gets its own
/// total timeout; none of them retry, failures propagate to the caller.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .use_rustls_tls()
        .pool_max_idle_per_host(16)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build HTTP client")
}
