// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{DEFAULT_ITEMS_PER_PAGE, DEFAULT_MAX_ITEM_PAGES, MAX_PER_PAGE};

const ENV_PATH: &str = "MONITOR_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/monitor.toml";

/// Runtime settings for the polling service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Base of the scraping API, e.g. `http://127.0.0.1:8000/api/v1`.
    pub api_base_url: String,
    pub listen_addr: String,
    /// Directory for persisted poll-state and notifications.
    pub state_dir: PathBuf,
    pub stats_interval_secs: u64,
    pub sessions_interval_secs: u64,
    pub items_interval_secs: u64,
    pub items_per_page: usize,
    pub max_item_pages: usize,
    pub session_page_size: usize,
    pub request_timeout_secs: u64,
    /// Extra attempts per failed poll cycle.
    pub fetch_retries: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api/v1".to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
            state_dir: PathBuf::from("state"),
            stats_interval_secs: 15,
            sessions_interval_secs: 15,
            items_interval_secs: 30,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            max_item_pages: DEFAULT_MAX_ITEM_PAGES,
            session_page_size: 5,
            request_timeout_secs: 10,
            fetch_retries: 1,
        }
    }
}

impl MonitorConfig {
    /// Load from an explicit TOML file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        let cfg: Self = toml::from_str(&content)
            .with_context(|| format!("parsing monitor config {}", path.display()))?;
        Ok(cfg.with_env_overrides())
    }

    /// Load using env var + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH
    /// 2) config/monitor.toml
    /// 3) built-in defaults
    ///
    /// Environment overrides apply in every case.
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("MONITOR_CONFIG_PATH points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("MONITOR_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Ok(v) = std::env::var("MONITOR_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Ok(v) = std::env::var("MONITOR_STATE_DIR") {
            self.state_dir = PathBuf::from(v);
        }
        if let Some(v) = env_u64("MONITOR_STATS_INTERVAL_SECS") {
            self.stats_interval_secs = v;
        }
        if let Some(v) = env_u64("MONITOR_SESSIONS_INTERVAL_SECS") {
            self.sessions_interval_secs = v;
        }
        if let Some(v) = env_u64("MONITOR_ITEMS_INTERVAL_SECS") {
            self.items_interval_secs = v;
        }
        self
    }

    pub fn stats_interval(&self) -> Duration {
        secs_at_least_one(self.stats_interval_secs)
    }

    pub fn sessions_interval(&self) -> Duration {
        secs_at_least_one(self.sessions_interval_secs)
    }

    pub fn items_interval(&self) -> Duration {
        secs_at_least_one(self.items_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        secs_at_least_one(self.request_timeout_secs)
    }

    /// Item page size within the API's accepted `per_page` range.
    pub fn items_page_size(&self) -> usize {
        self.items_per_page.clamp(1, MAX_PER_PAGE)
    }

    /// Session page size within the API's accepted `per_page` range.
    pub fn sessions_page_size(&self) -> usize {
        self.session_page_size.clamp(1, MAX_PER_PAGE)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn secs_at_least_one(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: MonitorConfig = toml::from_str(
            r#"
api_base_url = "http://scraper:8000/api/v1"
items_interval_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.api_base_url, "http://scraper:8000/api/v1");
        assert_eq!(cfg.stats_interval_secs, 15);
        assert_eq!(cfg.session_page_size, 5);
        assert_eq!(cfg.items_interval(), Duration::from_secs(1));
    }

    #[test]
    fn page_sizes_stay_within_api_range() {
        let cfg: MonitorConfig = toml::from_str(
            r#"
items_per_page = 500
session_page_size = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.items_page_size(), 100);
        assert_eq!(cfg.sessions_page_size(), 1);
        assert_eq!(MonitorConfig::default().items_page_size(), 100);
        assert_eq!(MonitorConfig::default().sessions_page_size(), 5);
    }
}
