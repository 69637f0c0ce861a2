//! Run configuration, loadable from TOML.
//!
//! Every field has a default so an empty file (or no file) is a valid config.
//! The CLI layers its flags on top of whatever the file provides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound for `vendor.pause_secs` (one hour).
pub const MAX_PAUSE_SECS: f64 = 3600.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub vendor: VendorSettings,
    pub paths: PathSettings,
    pub validation: ValidationSettings,
    pub listings: ListingSettings,
    pub ipo: IpoSettings,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vendor.batch_size == 0 {
            return Err(ConfigError::Invalid("vendor.batch_size must be at least 1".into()));
        }
        if self.vendor.workers == 0 {
            return Err(ConfigError::Invalid("vendor.workers must be at least 1".into()));
        }
        let pause = self.vendor.pause_secs;
        if !(0.0..=MAX_PAUSE_SECS).contains(&pause) {
            return Err(ConfigError::Invalid(format!(
                "vendor.pause_secs must be within [0, {MAX_PAUSE_SECS}], got {pause}"
            )));
        }
        let fraction = self.validation.sample_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::Invalid(format!(
                "validation.sample_fraction must be within [0, 1], got {fraction}"
            )));
        }
        if let Some(month) = self.ipo.end_month {
            if !(1..=12).contains(&month) {
                return Err(ConfigError::Invalid(format!(
                    "ipo.end_month must be 1-12, got {month}"
                )));
            }
        }
        Ok(())
    }
}

/// Vendor request pacing and retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorSettings {
    /// Symbols per batch request.
    pub batch_size: usize,
    /// Pause between batches, and the backoff base.
    pub pause_secs: f64,
    /// Retries after a rate-limited attempt, per batch and per fallback symbol.
    pub max_retries: u32,
    /// Pause between single-symbol fallback fetches.
    pub fallback_pause_ms: u64,
    /// Worker threads for the symbols inside one batch.
    pub workers: usize,
    pub request_timeout_secs: u64,
}

impl Default for VendorSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pause_secs: 1.5,
            max_retries: 3,
            fallback_pause_ms: 100,
            workers: 8,
            request_timeout_secs: 30,
        }
    }
}

impl VendorSettings {
    pub fn pause(&self) -> Duration {
        saturating_secs(self.pause_secs)
    }

    pub fn fallback_pause(&self) -> Duration {
        Duration::from_millis(self.fallback_pause_ms)
    }

    /// Wait before retrying after rate-limited attempt number `attempt` (0-based):
    /// `pause * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32);
        saturating_secs(self.pause_secs * factor)
    }
}

/// Seconds to a `Duration`, clamped to `[0, Duration::MAX]`. NaN is zero.
fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub output_dir: PathBuf,
    /// Raw HTTP responses (listing directories, SEC map, IPO months).
    pub cache_dir: PathBuf,
    pub vendor_cache: Option<PathBuf>,
    pub universe_cache: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/outputs"),
            cache_dir: PathBuf::from("data/cache"),
            vendor_cache: Some(PathBuf::from("data/cache/vendor/earliest_yahoo.csv")),
            universe_cache: Some(PathBuf::from("data/cache/universe_cache.csv")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub sample_fraction: f64,
    pub min_sample: usize,
    pub output: PathBuf,
    pub skip: bool,
    /// Fixed seed for reproducible samples; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            sample_fraction: 0.05,
            min_sample: 20,
            output: PathBuf::from("data/outputs/vendor_cache_mismatches.csv"),
            skip: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    pub exclude_etf: bool,
    pub common_only: bool,
    pub with_sec: bool,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            exclude_etf: false,
            common_only: false,
            with_sec: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpoSettings {
    pub enabled: bool,
    pub start_year: i32,
    pub end_year: Option<i32>,
    pub end_month: Option<u32>,
}

impl Default for IpoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start_year: 1998,
            end_year: None,
            end_month: None,
        }
    }
}
