use crate::error::{Result, RoutingError};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Engine tunables.
///
/// Every field has a default, so an empty file (or no file) is valid. Values are
/// layered as defaults < TOML file < `CHANNEL_ROUTER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on submission attempts per match.
    pub max_retries: usize,
    /// Pause between two failover attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Maximum number of evidence files per order.
    pub max_evidence: usize,
    /// How long a redirect page may stay open before it counts as cancelled.
    pub redirect_timeout_secs: u64,
    /// Case-insensitive fragments of upstream messages that mark a failure as transient.
    pub retryable_patterns: Vec<String>,
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            max_evidence: 8,
            redirect_timeout_secs: 300,
            retryable_patterns: vec!["no redirect url".to_string()],
            log_json: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: EngineConfig = builder
            .add_source(
                Environment::with_prefix("CHANNEL_ROUTER")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("retryable_patterns"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(RoutingError::Validation(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.max_evidence == 0 {
            return Err(RoutingError::Validation(
                "max_evidence must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn redirect_timeout(&self) -> Duration {
        Duration::from_secs(self.redirect_timeout_secs)
    }
}
