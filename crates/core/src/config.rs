//! Layered configuration: defaults, overridden by a TOML file, overridden by
//! environment variables. Follows the teacher CLI's `RawConfig` /
//! `ResolvedConfig` / `load_config` split.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub metrics_addr: String,
    pub offer_ttl_secs: i64,
    pub top_n: usize,
    pub max_distance_bonus_km: f64,
    pub reconciliation_interval_secs: u64,
    pub scheduled_sweep_interval_secs: u64,
    pub award_full_distance_bonus_when_provider_location_missing: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            database_url: "postgres://localhost/dispatch".to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            metrics_addr: "0.0.0.0:9090".to_string(),
            offer_ttl_secs: 300,
            top_n: 3,
            max_distance_bonus_km: 20.0,
            reconciliation_interval_secs: 60,
            scheduled_sweep_interval_secs: 3600,
            award_full_distance_bonus_when_provider_location_missing: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    database_url: Option<String>,
    listen_addr: Option<String>,
    metrics_addr: Option<String>,
    offer_ttl_secs: Option<i64>,
    top_n: Option<usize>,
    max_distance_bonus_km: Option<f64>,
    reconciliation_interval_secs: Option<u64>,
    scheduled_sweep_interval_secs: Option<u64>,
    award_full_distance_bonus_when_provider_location_missing: Option<bool>,
}

/// Loads config from `path` (or `~/.dispatchd/config.toml` if unset), then
/// applies `DISPATCH_*` environment variable overrides on top.
pub fn load_config(path: Option<&str>) -> Result<DispatchConfig> {
    let config_path = resolve_config_path(path)?;
    let raw = if config_path.exists() {
        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        toml::from_str::<RawConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", config_path.display()))?
    } else {
        RawConfig::default()
    };

    let mut config = DispatchConfig::default();
    if let Some(v) = raw.database_url {
        config.database_url = v;
    }
    if let Some(v) = raw.listen_addr {
        config.listen_addr = v;
    }
    if let Some(v) = raw.metrics_addr {
        config.metrics_addr = v;
    }
    if let Some(v) = raw.offer_ttl_secs {
        config.offer_ttl_secs = v;
    }
    if let Some(v) = raw.top_n {
        config.top_n = v;
    }
    if let Some(v) = raw.max_distance_bonus_km {
        config.max_distance_bonus_km = v;
    }
    if let Some(v) = raw.reconciliation_interval_secs {
        config.reconciliation_interval_secs = v;
    }
    if let Some(v) = raw.scheduled_sweep_interval_secs {
        config.scheduled_sweep_interval_secs = v;
    }
    if let Some(v) = raw.award_full_distance_bonus_when_provider_location_missing {
        config.award_full_distance_bonus_when_provider_location_missing = v;
    }

    if let Ok(v) = std::env::var("DISPATCH_DATABASE_URL") {
        config.database_url = v;
    }
    if let Ok(v) = std::env::var("DISPATCH_LISTEN_ADDR") {
        config.listen_addr = v;
    }
    if let Ok(v) = std::env::var("DISPATCH_METRICS_ADDR") {
        config.metrics_addr = v;
    }

    Ok(config)
}

fn resolve_config_path(path: Option<&str>) -> Result<PathBuf> {
    if let Some(custom) = path {
        return Ok(PathBuf::from(custom));
    }
    if let Some(home) = dirs::home_dir() {
        Ok(home.join(".dispatchd").join("config.toml"))
    } else {
        Err(anyhow!(
            "unable to resolve home directory; pass --config explicitly"
        ))
    }
}
