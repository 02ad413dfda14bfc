use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,chrome-extension://*";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Settings of the command service, read from the environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub port: u16,
    /// Comma-separated list of allowed origins
    pub cors_origins: String,
    /// Requests fail with a 500 while this is unset
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl BackendConfig {
    /// Reads `PORT`, `CORS_ORIGINS`, `OPENAI_API_KEY`, `OPENAI_MODEL` and
    /// `OPENAI_BASE_URL` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = non_empty("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid PORT {:?}: {}", port, e))?;
        }
        if let Some(origins) = non_empty("CORS_ORIGINS") {
            config.cors_origins = origins;
        }
        config.openai_api_key = non_empty("OPENAI_API_KEY");
        if let Some(model) = non_empty("OPENAI_MODEL") {
            config.openai_model = model;
        }
        if let Some(base) = non_empty("OPENAI_BASE_URL") {
            config.openai_base_url = base;
        }

        Ok(config)
    }

    pub fn origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}
