//! Engine and application configuration.
//!
//! The engine config comes from the plugin Initialize call as a flat
//! string map; the CLI reads the same knobs from
//! `~/.webharvest/webharvest.toml` and drives the engine directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "webharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".webharvest";

// ---------------------------------------------------------------------------
// Engine config
// ---------------------------------------------------------------------------

/// Runtime knobs for the harvest engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// User-Agent sent on every request (including robots.txt).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-fetch timeout in seconds (headers + body).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Honor robots.txt Disallow rules and crawl-delay.
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Max requests per second per host; <= 0 disables the rps floor.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Cap on bytes read from any single response body.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,

    /// Admit loopback/private targets (metadata hosts stay blocked).
    #[serde(default)]
    pub allow_private_ips: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            respect_robots: true,
            rate_limit: default_rate_limit(),
            max_response_size: default_max_response_size(),
            allow_private_ips: false,
        }
    }
}

fn default_user_agent() -> String {
    "Harvester/0.2".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_rate_limit() -> f64 {
    1.0
}
fn default_max_response_size() -> usize {
    10 * 1024 * 1024
}

impl EngineConfig {
    /// Build a config from the Initialize call's string map. Missing
    /// keys take defaults; unparseable values are a config error.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ua) = map.get("user_agent") {
            config.user_agent = ua.clone();
        }
        if let Some(raw) = map.get("timeout") {
            config.timeout_secs = raw
                .parse()
                .map_err(|_| HarvestError::config(format!("invalid timeout: {raw:?}")))?;
        }
        if let Some(raw) = map.get("respect_robots") {
            config.respect_robots = parse_bool(raw)
                .ok_or_else(|| HarvestError::config(format!("invalid respect_robots: {raw:?}")))?;
        }
        if let Some(raw) = map.get("rate_limit") {
            config.rate_limit = raw
                .parse()
                .map_err(|_| HarvestError::config(format!("invalid rate_limit: {raw:?}")))?;
        }
        if let Some(raw) = map.get("max_response_size") {
            config.max_response_size = raw
                .parse()
                .map_err(|_| HarvestError::config(format!("invalid max_response_size: {raw:?}")))?;
        }
        if let Some(raw) = map.get("allow_private_ips") {
            config.allow_private_ips = parse_bool(raw).ok_or_else(|| {
                HarvestError::config(format!("invalid allow_private_ips: {raw:?}"))
            })?;
        }

        Ok(config)
    }

    /// Minimum spacing between requests to one host from the rps knob
    /// alone (robots crawl-delay may stretch it further).
    pub fn min_interval(&self) -> std::time::Duration {
        if self.rate_limit > 0.0 {
            std::time::Duration::from_secs_f64(1.0 / self.rate_limit)
        } else {
            std::time::Duration::ZERO
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// CLI config file (webharvest.toml)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Harvest engine knobs.
    #[serde(default)]
    pub harvest: EngineConfig,

    /// External service endpoints.
    #[serde(default)]
    pub services: ServicesConfig,
}

/// `[services]` section — where the plugin finds its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Attestation sink endpoint (empty = not configured).
    #[serde(default)]
    pub sink_endpoint: String,

    /// Job queue endpoint (empty = not configured).
    #[serde(default)]
    pub queue_endpoint: String,

    /// Name of the env var holding the auth token (never the token itself).
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            sink_endpoint: String::new(),
            queue_endpoint: String::new(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

fn default_auth_token_env() -> String {
    "WEBHARVEST_AUTH_TOKEN".into()
}

/// Get the path to the config directory (`~/.webharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.webharvest/webharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file
/// does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| HarvestError::config(format!("{}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| HarvestError::config(format!("{}: {e}", dir.display())))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content)
        .map_err(|e| HarvestError::config(format!("{}: {e}", path.display())))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_plugin_contract() {
        let config = EngineConfig::default();
        assert_eq!(config.user_agent, "Harvester/0.2");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.respect_robots);
        assert_eq!(config.rate_limit, 1.0);
        assert_eq!(config.max_response_size, 10 * 1024 * 1024);
        assert!(!config.allow_private_ips);
    }

    #[test]
    fn from_map_overrides_and_defaults() {
        let mut map = HashMap::new();
        map.insert("user_agent".to_string(), "TestBot/1.0".to_string());
        map.insert("rate_limit".to_string(), "2.5".to_string());
        map.insert("respect_robots".to_string(), "false".to_string());

        let config = EngineConfig::from_map(&map).expect("parse config map");
        assert_eq!(config.user_agent, "TestBot/1.0");
        assert_eq!(config.rate_limit, 2.5);
        assert!(!config.respect_robots);
        // Untouched keys keep defaults.
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn from_map_rejects_garbage() {
        let mut map = HashMap::new();
        map.insert("max_response_size".to_string(), "lots".to_string());
        let err = EngineConfig::from_map(&map).unwrap_err();
        assert!(err.to_string().contains("max_response_size"));
    }

    #[test]
    fn min_interval_disabled_when_nonpositive() {
        let mut config = EngineConfig::default();
        config.rate_limit = 2.0;
        assert_eq!(config.min_interval().as_millis(), 500);

        config.rate_limit = 0.0;
        assert!(config.min_interval().is_zero());
    }

    #[test]
    fn app_config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.harvest.user_agent, "Harvester/0.2");
        assert_eq!(parsed.services.auth_token_env, "WEBHARVEST_AUTH_TOKEN");
    }

    #[test]
    fn app_config_partial_file() {
        let toml_str = r#"
[harvest]
rate_limit = 0.5

[services]
sink_endpoint = "http://localhost:7433"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.harvest.rate_limit, 0.5);
        assert_eq!(config.harvest.timeout_secs, 30);
        assert_eq!(config.services.sink_endpoint, "http://localhost:7433");
    }
}
