use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{first_seen::FirstSeenKey, poller::PollerConfig};

pub const DEFAULT_PATH: &str = "network-listener.toml";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_dir: PathBuf,
    pub first_seen_path: PathBuf,
    pub first_seen_key: FirstSeenKey,

    pub interval_ms: u64,
    pub scan_timeout_ms: u64,
    // upper bound for the delay between polls after repeated scan failures
    pub max_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            first_seen_path: PathBuf::from("first_seen.json"),
            first_seen_key: FirstSeenKey::default(),
            interval_ms: 1000,
            scan_timeout_ms: 5000,
            max_backoff_ms: 30_000,
        }
    }
}

impl Config {
    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.interval_ms.max(1)),
            scan_timeout: Duration::from_millis(self.scan_timeout_ms.max(1)),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            max_passes: None,
        }
    }
}

pub fn load(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path).context("Failed to read config")?;
    let config = toml::from_str(&data).context("Failed to parse config")?;
    Ok(config)
}

/// An explicitly given config must exist; the default path is optional.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(x) => load(x),
        None => {
            let default = Path::new(DEFAULT_PATH);
            if default.exists() {
                load(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}
