// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::cluster::GridSettings;
use crate::registry::models::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Firebase,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "firebase" => Ok(StoreBackend::Firebase),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which remote store implementation to use
    pub store_backend: StoreBackend,

    /// Realtime Database base URL
    pub store_url: String,

    /// Optional `auth` token appended to store requests
    pub store_auth_token: Option<String>,

    /// Collection holding the marker records
    pub collection: String,

    /// Delay before a dropped subscription is re-opened
    pub reconnect_delay_ms: u64,

    /// Local API bind address (e.g., "127.0.0.1:8080")
    pub local_api_bind: SocketAddr,

    /// Initial map center
    pub default_center_lat: f64,
    pub default_center_lng: f64,

    /// Initial map zoom
    pub default_zoom: u8,

    /// Clustering cell size in pixels
    pub cluster_grid_size: f64,

    /// Zoom level above which markers are never clustered
    pub cluster_max_zoom: u8,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as `load`, reading variables through `var`
    pub fn load_with<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = var("QUESTMAP_CONFIG").unwrap_or_else(|| "config.toml".to_string());

        let mut config: Config = if std::path::Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        // Apply environment variable overrides
        if let Some(val) = var("QUESTMAP_STORE_BACKEND") {
            config.store_backend = val.parse()?;
        }
        if let Some(val) = var("QUESTMAP_STORE_URL") {
            config.store_url = val;
        }
        if let Some(val) = var("QUESTMAP_STORE_AUTH_TOKEN") {
            config.store_auth_token = Some(val);
        }
        if let Some(val) = var("QUESTMAP_COLLECTION") {
            config.collection = val;
        }
        if let Some(val) = var("QUESTMAP_RECONNECT_DELAY_MS") {
            config.reconnect_delay_ms = val.parse()?;
        }
        if let Some(val) = var("QUESTMAP_LOCAL_API_BIND") {
            config.local_api_bind = SocketAddr::from_str(&val)?;
        }
        if let Some(val) = var("QUESTMAP_DEFAULT_CENTER_LAT") {
            config.default_center_lat = val.parse()?;
        }
        if let Some(val) = var("QUESTMAP_DEFAULT_CENTER_LNG") {
            config.default_center_lng = val.parse()?;
        }
        if let Some(val) = var("QUESTMAP_DEFAULT_ZOOM") {
            config.default_zoom = val.parse()?;
        }
        if let Some(val) = var("QUESTMAP_CLUSTER_GRID_SIZE") {
            config.cluster_grid_size = val.parse()?;
        }
        if let Some(val) = var("QUESTMAP_CLUSTER_MAX_ZOOM") {
            config.cluster_max_zoom = val.parse()?;
        }
        if let Some(val) = var("QUESTMAP_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Some(val) = var("QUESTMAP_LOG_JSON") {
            config.log_json = val.parse()?;
        }

        Ok(config)
    }

    pub fn default_center(&self) -> Coordinate {
        Coordinate::new(self.default_center_lat, self.default_center_lng)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn grid_settings(&self) -> GridSettings {
        GridSettings {
            grid_size: self.cluster_grid_size,
            max_zoom: self.cluster_max_zoom,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Firebase,
            store_url: String::from("http://localhost:9000"),
            store_auth_token: None,
            collection: String::from("quests"),
            reconnect_delay_ms: 1000,
            local_api_bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            default_center_lat: 34.098907,
            default_center_lng: -118.327759,
            default_zoom: 10,
            cluster_grid_size: 60.0,
            cluster_max_zoom: 16,
            log_level: String::from("info"),
            log_json: false,
        }
    }
}
