//! Map tile proxy: fetches raster tiles from the tile server and
//! streams them through without buffering.

use std::time::Duration;

use crate::errors::AppError;

const TILE_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStyle {
    Day,
    Night,
}

impl TileStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(TileStyle::Day),
            "night" => Some(TileStyle::Night),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct TileClient {
    client: reqwest::Client,
    base_url: String,
    day_style: String,
    night_style: String,
}

impl TileClient {
    pub fn new(base_url: String, day_style: String, night_style: String) -> Self {
        Self {
            client: super::http_client(TILE_TIMEOUT),
            base_url,
            day_style,
            night_style,
        }
    }

    pub fn tile_url(&self, style: TileStyle, z: u32, x: u32, y: u32) -> String {
        let style_id = match style {
            TileStyle::Day => &self.day_style,
            TileStyle::Night => &self.night_style,
        };
        format!("{}/styles/{}/512/{}/{}/{}.png", self.base_url, style_id, z, x, y)
    }

    /// Fetch one tile. The caller streams the response body onward.
    pub async fn fetch(
        &self,
        style: TileStyle,
        z: u32,
        x: u32,
        y: u32,
    ) -> Result<reqwest::Response, AppError> {
        let url = self.tile_url(style, z, x, y);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Could not connect to map tile server: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Failed to fetch tile: {}",
                resp.status().as_u16()
            )));
        }

        Ok(resp)
    }
}
