use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationPoint {
    pub lat: f64,
    pub lon: f64,
}

impl LocationPoint {
    /// "lat,lon" label used in navigation log rows.
    pub fn label(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

/// Query parameters shared by the search endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    10
}

pub const MIN_QUERY_LEN: usize = 2;
pub const MAX_LIMIT: u32 = 50;

impl SearchParams {
    /// Enforce query length and limit bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.q.chars().count() < MIN_QUERY_LEN {
            return Err(format!("query must be at least {} characters", MIN_QUERY_LEN));
        }
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(format!("limit must be between 1 and {}", MAX_LIMIT));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ReverseParams {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct TileParams {
    #[serde(default = "default_style")]
    pub style: String,
}

fn default_style() -> String {
    "day".to_string()
}
