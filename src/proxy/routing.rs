//! Valhalla-compatible routing proxy.
//!
//! Upstream failures are reported in-band in the response body
//! (`status: false` plus an error string) rather than as HTTP errors,
//! so navigation clients get a uniform envelope.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::geo::LocationPoint;

const ROUTING_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RoutingClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub locations: Vec<LocationPoint>,
    #[serde(default = "default_costing")]
    pub costing: String,
}

fn default_costing() -> String {
    "auto".to_string()
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub status: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: true,
            msg: "Route calculated successfully".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(msg: &str, error: String) -> Self {
        Self {
            status: false,
            msg: msg.to_string(),
            data: None,
            error: Some(error),
        }
    }
}

impl RoutingClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: super::http_client(ROUTING_TIMEOUT),
            base_url,
        }
    }

    pub async fn route(&self, request: &RouteRequest) -> RouteResponse {
        let payload = route_payload(request);

        let resp = match self
            .client
            .post(format!("{}/route", self.base_url))
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return RouteResponse::failed(
                    "Request timeout",
                    "Routing service took too long to respond".to_string(),
                );
            }
            Err(e) if e.is_connect() => {
                return RouteResponse::failed(
                    "Service unavailable",
                    "Could not connect to routing service".to_string(),
                );
            }
            Err(e) => {
                tracing::error!("routing request failed: {}", e);
                return RouteResponse::failed(
                    "Internal server error",
                    "An unexpected error occurred".to_string(),
                );
            }
        };

        if !resp.status().is_success() {
            return RouteResponse::failed(
                "Failed to calculate route",
                format!("External service returned status {}", resp.status().as_u16()),
            );
        }

        match resp.json::<Value>().await {
            Ok(data) => RouteResponse::ok(data),
            Err(e) => {
                tracing::error!("routing response was not JSON: {}", e);
                RouteResponse::failed(
                    "Failed to calculate route",
                    "External service returned malformed data".to_string(),
                )
            }
        }
    }
}

/// Build the upstream payload: kilometres, en-US directions, up to three
/// alternate routes.
pub fn route_payload(request: &RouteRequest) -> Value {
    json!({
        "locations": request.locations.iter()
            .map(|loc| json!({"lat": loc.lat, "lon": loc.lon}))
            .collect::<Vec<_>>(),
        "costing": request.costing,
        "directions_options": {
            "units": "kilometers",
            "language": "en-US"
        },
        "alternates": {
            "target_count": 3
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_locations_and_costing() {
        let req = RouteRequest {
            locations: vec![
                LocationPoint { lat: 12.97, lon: 77.59 },
                LocationPoint { lat: 13.08, lon: 80.27 },
            ],
            costing: "bicycle".to_string(),
        };
        let payload = route_payload(&req);
        assert_eq!(payload["costing"], "bicycle");
        assert_eq!(payload["locations"].as_array().unwrap().len(), 2);
        assert_eq!(payload["locations"][0]["lat"], 12.97);
        assert_eq!(payload["directions_options"]["units"], "kilometers");
        assert_eq!(payload["alternates"]["target_count"], 3);
    }

    #[test]
    fn costing_defaults_to_auto() {
        let req: RouteRequest =
            serde_json::from_value(json!({"locations": [{"lat": 1.0, "lon": 2.0}]})).unwrap();
        assert_eq!(req.costing, "auto");
    }
}
