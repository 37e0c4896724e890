//! Client configuration
//!
//! Values come from [`ClientConfig::default`], an optional JSON file and the
//! `SIGNALFORM_*` environment variables, applied in that order.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Public SignalFx API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.signalfx.com/v2";
/// Request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Overrides the base URL.
pub const ENV_BASE_URL: &str = "SIGNALFORM_BASE_URL";
/// Supplies the API token.
pub const ENV_API_TOKEN: &str = "SIGNALFORM_API_TOKEN";
/// Overrides the request timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "SIGNALFORM_TIMEOUT_SECS";

/// Connection settings for the SignalFx API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `https://api.signalfx.com/v2`
    pub base_url: String,

    /// Token sent as `X-SF-Token`
    pub api_token: Option<String>,

    /// Per-request timeout
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to deserialize config {}", path.display()))?;
        Ok(config)
    }

    /// Write this config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Overlay values from the process environment. Blank variables are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable source.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(url) = read(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(token) = read(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(secs) = read(ENV_TIMEOUT_SECS).and_then(|value| value.parse::<u64>().ok()) {
            self.timeout_secs = Some(secs);
        }
        self
    }

    /// The token, or a configuration error when none is set.
    pub fn require_token(&self) -> crate::Result<&str> {
        self.api_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                crate::Error::Config(format!(
                    "cannot proceed with an empty API token; set {ENV_API_TOKEN} or pass --api-key"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_point_at_public_api() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_token, None);
        assert_eq!(config.timeout_secs, Some(30));
        assert!(config.require_token().is_err());
    }

    #[test]
    fn save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("signalform.json");

        let config = ClientConfig {
            base_url: "https://api.eu0.signalfx.com/v2".into(),
            api_token: Some("abc".into()),
            timeout_secs: None,
        };
        config.save(&path).unwrap();

        assert_eq!(ClientConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.json");
        std::fs::write(&path, br#"{"api_token": "t"}"#).unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.require_token().unwrap(), "t");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::load(Path::new("/nonexistent/signalform.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/signalform.json"));
    }

    #[test]
    fn overrides_skip_blank_and_unparsable_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_BASE_URL, "  "),
            (ENV_API_TOKEN, " secret "),
            (ENV_TIMEOUT_SECS, "soon"),
        ]);
        let config = ClientConfig::default()
            .with_overrides(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, Some(DEFAULT_TIMEOUT_SECS));
    }
}
