//! Client configuration: YAML file, then environment overrides.

use quote_api::ApiConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_URL: &str = "PRINTQUOTE_API_URL";
pub const ENV_API_TOKEN: &str = "PRINTQUOTE_API_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "PRINTQUOTE_REQUEST_TIMEOUT_SECS";

/// Upper bound for the autosave and polling intervals: one day.
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(String),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Timing for a project editing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReactorConfig {
    /// Quiet period after the last edit before parameters are saved.
    pub autosave_debounce: Duration,
    /// Refetch interval while the model is being analyzed.
    pub poll_interval: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: Duration::from_millis(1500),
            poll_interval: Duration::from_millis(3000),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    /// Absent keeps the HTTP client default.
    pub request_timeout_secs: Option<u64>,
    pub autosave_debounce_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: ApiConfig::default().base_url,
            api_token: None,
            request_timeout_secs: None,
            autosave_debounce_ms: 1500,
            poll_interval_ms: 3000,
        }
    }
}

impl AppConfig {
    /// Load from an optional YAML file, apply process environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_yaml_str(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply overrides from a key lookup (the process environment in [`AppConfig::load`]).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.api_token = Some(token.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: format!("{raw:?}: {e}"),
            })?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_url",
                reason: "must not be empty".into(),
            });
        }
        for (field, ms) in [
            ("autosave_debounce_ms", self.autosave_debounce_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if ms == 0 || ms > MAX_INTERVAL_MS {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be between 1 and {MAX_INTERVAL_MS}"),
                });
            }
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be > 0 when set".into(),
            });
        }
        Ok(())
    }

    pub fn api(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_url.clone(),
            timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn reactor(&self) -> ReactorConfig {
        ReactorConfig {
            autosave_debounce: Duration::from_millis(self.autosave_debounce_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}
