//! Batcher configuration.
//!
//! Configuration is loaded from an optional YAML file with environment variable
//! overrides. Variables are prefixed with `AZMON_BATCHER_`; nested values use double
//! underscores.
//!
//! ```bash
//! AZMON_BATCHER_MAX_RESOURCES_PER_BATCH=20
//! AZMON_BATCHER_REQUEST_TIMEOUT=45s
//! ```

use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::endpoint::BATCH_API_VERSION;
use crate::group::MAX_RESOURCES_PER_BATCH;
use crate::portal::DEFAULT_PORTAL_URL;

pub const ENV_PREFIX: &str = "AZMON_BATCHER_";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Resource ids per batch request; the service accepts at most 50
    pub max_resources_per_batch: usize,
    /// `api-version` sent to the batch endpoint
    pub api_version: String,
    /// Batch groups executed concurrently
    pub max_concurrent_batches: usize,
    /// Timeout applied by the HTTP client to each batch call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Base URL of the Azure Portal, used for deep links
    pub portal_url: String,
    /// Default tracing filter when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_resources_per_batch: MAX_RESOURCES_PER_BATCH,
            api_version: BATCH_API_VERSION.to_string(),
            max_concurrent_batches: 8,
            request_timeout: Duration::from_secs(30),
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (missing files are ignored) and the environment.
    #[allow(clippy::result_large_err)]
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(path).extract()?;
        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    pub fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            // AZMON_BATCHER_CONFIG names the file itself
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_RESOURCES_PER_BATCH).contains(&self.max_resources_per_batch) {
            return Err(format!(
                "Config validation: max_resources_per_batch must be between 1 and {}, got {}",
                MAX_RESOURCES_PER_BATCH, self.max_resources_per_batch
            ));
        }
        if self.max_concurrent_batches == 0 {
            return Err("Config validation: max_concurrent_batches must be at least 1".to_string());
        }
        if self.api_version.trim().is_empty() {
            return Err("Config validation: api_version must not be empty".to_string());
        }
        Ok(())
    }
}
