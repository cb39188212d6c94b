//! Geocoding proxies: Nominatim (forward + reverse) and Photon, plus a
//! unified search that pages Photon results and reverse-geocodes each
//! hit in parallel to attach a structured address.

use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};

use crate::errors::AppError;

const GEO_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT_SEARCH: &str = "navgate-search";
const USER_AGENT_PHOTON: &str = "navgate-photon";

#[derive(Clone)]
pub struct GeoClient {
    client: reqwest::Client,
    nominatim_url: String,
    photon_url: String,
}

impl GeoClient {
    pub fn new(nominatim_url: String, photon_url: String) -> Self {
        Self {
            client: super::http_client(GEO_TIMEOUT),
            nominatim_url,
            photon_url,
        }
    }

    /// Nominatim forward geocoding. Returns the raw result array.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Value, AppError> {
        let resp = self
            .client
            .get(format!("{}/search", self.nominatim_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", &limit.to_string()),
                ("addressdetails", "1"),
            ])
            .header("User-Agent", USER_AGENT_SEARCH)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Could not connect to Nominatim: {}", e)))?;

        if !resp.status().is_success() {
            tracing::error!(status = resp.status().as_u16(), "Nominatim search error");
            return Err(AppError::Upstream("Nominatim responded with an error".into()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| AppError::Upstream(format!("Nominatim returned malformed data: {}", e)))
    }

    /// Nominatim reverse lookup. Returns the raw result object.
    pub async fn reverse(&self, lat: f64, lon: f64) -> Result<Value, AppError> {
        let resp = self
            .client
            .get(format!("{}/reverse", self.nominatim_url))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .header("User-Agent", USER_AGENT_SEARCH)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Could not connect to Nominatim: {}", e)))?;

        if !resp.status().is_success() {
            tracing::error!(status = resp.status().as_u16(), "Nominatim reverse error");
            return Err(AppError::Upstream("Reverse geocode failed".into()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| AppError::Upstream(format!("Nominatim returned malformed data: {}", e)))
    }

    /// Photon search. Returns the feature array.
    pub async fn photon(&self, query: &str, limit: u32) -> Result<Vec<Value>, AppError> {
        let resp = self
            .client
            .get(format!("{}/api", self.photon_url))
            .query(&[("q", query), ("limit", &limit.to_string())])
            .header("User-Agent", USER_AGENT_PHOTON)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Could not connect to Photon: {}", e)))?;

        if !resp.status().is_success() {
            tracing::error!(status = resp.status().as_u16(), "Photon search error");
            return Err(AppError::Upstream("Photon search failed".into()));
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| AppError::Upstream(format!("Photon returned malformed data: {}", e)))?;

        Ok(body
            .get("features")
            .and_then(|f| f.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// Photon search with client-side pagination, each page entry
    /// enriched with a Nominatim reverse-geocoded address.
    pub async fn unified_search(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, AppError> {
        // Photon has no offset parameter; over-fetch and slice.
        let features = self.photon(query, limit + offset).await?;
        tracing::info!(raw = features.len(), "Photon returned features");

        let page = page_slice(&features, offset as usize, limit as usize);

        let addresses = join_all(page.iter().map(|feat| self.feature_address(feat))).await;

        Ok(page
            .iter()
            .zip(addresses)
            .map(|(feat, addr)| merge_feature(feat, addr))
            .collect())
    }

    /// Best-effort address for one Photon feature; failures degrade to
    /// an empty object rather than failing the page.
    async fn feature_address(&self, feature: &Value) -> Value {
        let Some((lat, lon)) = feature_coordinates(feature) else {
            return json!({});
        };
        match self.reverse(lat, lon).await {
            Ok(result) => result.get("address").cloned().unwrap_or_else(|| json!({})),
            Err(e) => {
                tracing::warn!(lat, lon, "reverse geocode failed: {}", e);
                json!({})
            }
        }
    }
}

/// GeoJSON order is [lon, lat].
pub fn feature_coordinates(feature: &Value) -> Option<(f64, f64)> {
    let coords = feature.get("geometry")?.get("coordinates")?.as_array()?;
    let lon = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    Some((lat, lon))
}

pub fn page_slice(features: &[Value], offset: usize, limit: usize) -> Vec<Value> {
    features
        .iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect()
}

pub fn merge_feature(feature: &Value, address: Value) -> Value {
    json!({
        "type": feature.get("type"),
        "geometry": feature.get("geometry"),
        "properties": feature.get("properties"),
        "address": address,
    })
}
