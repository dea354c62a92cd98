use crate::error::DatasetError;
use crate::types::{Year, YearSet};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub dashboard: DashboardConfig,
    pub server: ServerConfig,
    pub tunnel: TunnelConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InputConfig {
    /// JSON or wide CSV; the embedded dataset is used when unset.
    pub dataset: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    /// Falls back to the latest year in the dataset.
    pub default_year: Option<Year>,
    pub title: Option<String>,
    pub color_scale: String,
    pub projection: String,
}

impl DashboardConfig {
    /// The year the selector starts on; must belong to `years`.
    pub fn resolve_default_year(&self, years: &YearSet) -> Result<Year, DatasetError> {
        match self.default_year {
            Some(year) => years.check(year),
            None => Ok(years.latest()),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_year: None,
            title: None,
            color_scale: "Plasma".to_string(),
            projection: "natural earth".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TunnelConfig {
    pub enabled: bool,
    /// Name of the env var holding the ngrok auth token.
    pub authtoken_env: String,
    pub binary: PathBuf,
    pub api_url: String,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            authtoken_env: "NGROK_AUTHTOKEN".to_string(),
            binary: PathBuf::from("ngrok"),
            api_url: "http://127.0.0.1:4040/api/tunnels".to_string(),
            poll_attempts: 20,
            poll_interval_ms: 500,
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Reads `path` when given, otherwise every section takes its defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
