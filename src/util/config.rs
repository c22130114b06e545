//! User configuration loaded from `config.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::domain::{NormalizationRules, DEFAULT_FUZZY_THRESHOLD, DEFAULT_PRICE_TTL};
use crate::util::version::{APP_NAME, APP_ORG, APP_QUALIFIER};

const CONFIG_FILENAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory unavailable")]
    StorageUnavailable,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub catalog: CatalogConfig,
    pub capture: CaptureConfig,
    pub normalization: NormalizationRules,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub base_url: String,
    pub market: String,
    /// Upper bound on one batched price request.
    pub timeout_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787/api/".into(),
            market: "jita".into(),
            timeout_secs: 10,
        }
    }
}

impl PricingConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub ttl_secs: u64,
    pub fuzzy_threshold: f64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_PRICE_TTL.as_secs(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl CatalogConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub dedup_window_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

impl CaptureConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.pricing.base_url).map_err(|err| {
            ConfigError::Invalid(format!("pricing.base_url {:?}: {err}", self.pricing.base_url))
        })?;
        if self.pricing.market.trim().is_empty() {
            return Err(ConfigError::Invalid("pricing.market is empty".into()));
        }
        if self.pricing.timeout_secs == 0 {
            return Err(ConfigError::Invalid("pricing.timeout_secs must be positive".into()));
        }
        let threshold = self.catalog.fuzzy_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "catalog.fuzzy_threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "capture.poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Relative joins against the base URL need a trailing slash.
    fn normalized(mut self) -> Self {
        if !self.pricing.base_url.ends_with('/') {
            self.pricing.base_url.push('/');
        }
        self
    }
}

/// `config.json` in the platform config directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
        .ok_or(ConfigError::StorageUnavailable)
}

/// Loads the explicit file, or the default one if it exists, falling back to defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (expand_home(path), true),
        None => (default_config_path()?, false),
    };

    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            return Ok(AppConfig::default());
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };

    let config: AppConfig =
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path, source })?;
    let config = config.normalized();
    config.validate()?;
    Ok(config)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
