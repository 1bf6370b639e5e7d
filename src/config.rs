use crate::geo::Coordinate;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What the status button does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectPolicy {
    /// Disconnected -> Connecting -> Connected after `connect_delay_ms`
    Delayed,
    /// Flip between Connected and Disconnected
    Instant,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,

    #[serde(default = "default_connect_policy")]
    pub connect_policy: ConnectPolicy,

    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_fallback_center")]
    pub fallback_center: Coordinate,

    #[serde(default = "default_location_permission")]
    pub location_permission: bool,
}

fn default_connect_delay_ms() -> u64 {
    2000
}

fn default_connect_policy() -> ConnectPolicy {
    ConnectPolicy::Delayed
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    concat!("helmet-companion/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_candidates() -> usize {
    5
}

fn default_fallback_center() -> Coordinate {
    Coordinate::new(37.7749, -122.4194)
}

fn default_location_permission() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_delay_ms: default_connect_delay_ms(),
            connect_policy: default_connect_policy(),
            geocoder_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            max_candidates: default_max_candidates(),
            fallback_center: default_fallback_center(),
            location_permission: default_location_permission(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/helmet/config.json)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("helmet").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.geocoder_url.is_empty() {
            return Err(anyhow::anyhow!("geocoder_url cannot be empty"));
        }

        if !self.geocoder_url.starts_with("http://") && !self.geocoder_url.starts_with("https://") {
            return Err(anyhow::anyhow!("geocoder_url must be an http(s) URL"));
        }

        if self.user_agent.is_empty() {
            return Err(anyhow::anyhow!("user_agent cannot be empty"));
        }

        if self.max_candidates == 0 {
            return Err(anyhow::anyhow!("max_candidates must be at least 1"));
        }

        if self.request_timeout == 0 {
            return Err(anyhow::anyhow!("request_timeout must be at least 1 second"));
        }

        if !self.fallback_center.is_valid() {
            return Err(anyhow::anyhow!(
                "fallback_center must have latitude in [-90, 90] and longitude in [-180, 180]"
            ));
        }

        Ok(())
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.connect_delay(), Duration::from_secs(2));
        assert_eq!(config.connect_policy, ConnectPolicy::Delayed);
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helmet").join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.max_candidates, 5);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.geocoder_url, config.geocoder_url);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"connect_policy": "instant", "fallback_center": {"latitude": 48.85, "longitude": 2.35}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.connect_policy, ConnectPolicy::Instant);
        assert_eq!(config.fallback_center, Coordinate::new(48.85, 2.35));
        assert_eq!(config.connect_delay_ms, 2000);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            geocoder_url: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            geocoder_url: "ftp://example.org".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_candidates: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            fallback_center: Coordinate::new(120.0, 0.0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result: std::result::Result<Config, _> =
            serde_json::from_str(r#"{"connect_policy": "eventually"}"#);
        assert!(result.is_err());
    }
}
