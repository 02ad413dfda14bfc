use crate::errors::{OntapError, OntapResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const APP_NAME: &str = "ontap";
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8787";
pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding [`OntapConfig::api_base`]
pub const ENV_API_BASE: &str = "ONTAP_API_BASE";
/// Environment variable overriding [`OntapConfig::relay_timeout_secs`]
pub const ENV_RELAY_TIMEOUT: &str = "ONTAP_RELAY_TIMEOUT_SECS";

/// Configuration shared by the panel and the privileged relay
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OntapConfig {
    /// Base URL the relay prepends to every fetch path
    pub api_base: String,
    /// How long a relay call may stay unanswered before it fails
    pub relay_timeout_secs: u64,
    /// Send the current page URL along with commands
    pub include_page_url: bool,
    /// Optional tone hint forwarded with rephrase requests
    pub tone: Option<String>,
    /// Directory for persisted threads; in-memory storage when unset
    pub session_dir: Option<PathBuf>,
}

impl Default for OntapConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            relay_timeout_secs: DEFAULT_RELAY_TIMEOUT_SECS,
            include_page_url: true,
            tone: None,
            session_dir: None,
        }
    }
}

impl OntapConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> OntapResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;

        toml::from_str(&content).map_err(|e| {
            OntapError::ParsingError(format!("{}: {}", path.display(), e))
        })
    }

    /// Loads the config file at the default location, then applies `.env` and
    /// environment overrides.
    pub fn load() -> OntapResult<Self> {
        let path = get_default_config_file(APP_NAME)?;
        let mut config = Self::load_from_file(&path)?;
        // A missing .env file is normal
        let _ = dotenvy::dotenv();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> OntapResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            OntapError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;

        Ok(())
    }

    /// Applies overrides from a variable lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> OntapResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.api_base = base;
        }
        if let Some(raw) = lookup(ENV_RELAY_TIMEOUT) {
            self.relay_timeout_secs = raw.trim().parse().map_err(|e| {
                OntapError::ConfigError(format!("Invalid {}: {}", ENV_RELAY_TIMEOUT, e))
            })?;
        }
        Ok(())
    }

    /// The API base without a trailing slash, ready for path concatenation
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> OntapResult<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        OntapError::ConfigError("Could not determine config directory".to_string())
    })?;

    Ok(config_dir.join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> OntapResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
