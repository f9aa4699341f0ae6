use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::sync::api::ApiConfig;

const DEFAULT_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub api:  Option<ApiConfig>,
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub interval_seconds: Option<u64>,
    pub auto_sync:        Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            Self::parse(&std::fs::read_to_string(&path)?)
        } else {
            Ok(AppConfig::default())
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Period of the background refresh, or `None` when auto-sync is off.
    pub fn refresh_interval(&self) -> Option<std::time::Duration> {
        let sync = self.sync.clone().unwrap_or(SyncConfig { interval_seconds: None, auto_sync: None });
        if !sync.auto_sync.unwrap_or(true) {
            return None;
        }
        let secs = sync.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECS).max(1);
        Some(std::time::Duration::from_secs(secs))
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("attendcal")
}
