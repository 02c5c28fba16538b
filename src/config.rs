//! Configuration module.
//!
//! Handles loading, validating, and merging configuration. Values are
//! layered: stock defaults, then the config file, then command-line flags.
//! Each layer only needs the keys it wants to override.
//!
//! ## Config File Location
//!
//! `upload-shrink.toml` in the working directory, or any path given with
//! `--config`. The file is optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! size_budget_mb = 10.0   # Target upper bound, 1 MB = 1024*1024 bytes
//! quality = 0.8           # First encode attempt, in (0, 1]
//! min_quality = 0.3       # Quality floor; the last attempt runs here
//! max_dimension = 1920    # Longer side cap in pixels
//!
//! [processing]
//! max_processes = 4       # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{CompressOptions, Quality, SizeBudget};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "upload-shrink.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `upload-shrink.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Budget, quality steps and dimension cap.
    pub compression: CompressionConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

/// Compression settings, in caller-facing units (MB, fractions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Target upper bound in megabytes (1024×1024 bytes).
    pub size_budget_mb: f64,
    /// Starting encoder quality in (0, 1].
    pub quality: f64,
    /// Lowest quality tried before giving up on the budget.
    pub min_quality: f64,
    /// Longer-side cap in pixels.
    pub max_dimension: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            size_budget_mb: 10.0,
            quality: 0.8,
            min_quality: 0.3,
            max_dimension: 1920,
        }
    }
}

impl CompressionConfig {
    /// Convert to the options the compressor takes.
    pub fn options(&self) -> CompressOptions {
        CompressOptions {
            size_budget: SizeBudget::from_megabytes(self.size_budget_mb),
            quality: Quality::from_fraction(self.quality),
            min_quality: Quality::from_fraction(self.min_quality),
            max_dimension: self.max_dimension,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if !(c.size_budget_mb.is_finite() && c.size_budget_mb > 0.0) {
            return Err(ConfigError::Validation(
                "compression.size_budget_mb must be positive".into(),
            ));
        }
        if !(c.quality > 0.0 && c.quality <= 1.0) {
            return Err(ConfigError::Validation(
                "compression.quality must be within (0, 1]".into(),
            ));
        }
        if !(c.min_quality > 0.0 && c.min_quality <= c.quality) {
            return Err(ConfigError::Validation(
                "compression.min_quality must be within (0, quality]".into(),
            ));
        }
        if c.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "compression.max_dimension must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that file and flag overrides merge onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Apply overlays in order onto `base`, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path` (if present) with `overrides` applied on top.
pub fn load_config(path: &Path, overrides: Option<toml::Value>) -> Result<Config, ConfigError> {
    let file = load_raw_config(path)?;
    resolve_config(stock_defaults_value(), file.into_iter().chain(overrides))
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# upload-shrink configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Files smaller than this are passed through untouched. Larger files are
# resized and re-encoded until they fit or quality reaches min_quality.
# 1 MB = 1024 * 1024 bytes.
size_budget_mb = 10.0

# Encoder quality of the first attempt, in (0, 1]. Each further attempt
# lowers it by 0.1. Only JPEG and AVIF honour quality; PNG, WebP and TIFF
# are written losslessly.
quality = 0.8

# Quality floor. The attempt at this quality is returned even when it is
# still over budget.
min_quality = 0.3

# Longer side of the output, in pixels. Larger images are scaled down
# proportionally before encoding.
max_dimension = 1920

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compression workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
