//! Runtime settings.
//!
//! Handles loading, validating and merging `affnav.toml`. Stock defaults are
//! the base layer; a settings file in the working directory (or one passed
//! with `--settings`) is merged on top.
//!
//! ## Settings Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [loader]
//! # base_url = "https://nav.example.com"  # where categories/ is served
//! max_retries = 3
//! retry_delay_ms = 1000     # retry n waits retry_delay_ms * n
//! timeout_ms = 10000
//! preload_first = true
//!
//! [cache]
//! expiry_minutes = 30
//! persist = true
//! dir = ".affnav-cache"
//!
//! [search]
//! debounce_ms = 300
//!
//! [optimization]
//! enabled = true
//! preview_count = 3
//! chunk_size_limit_kb = 100.0
//!
//! [validation]
//! fail_on_warnings = false
//! ```
//!
//! Settings files are sparse: override just the values you want. Unknown
//! keys are rejected to catch typos early.

use crate::loader::LoaderSettings;
use crate::optimize::OptimizationOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SETTINGS_FILE: &str = "affnav.toml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Settings validation error: {0}")]
    Validation(String),
}

/// Settings loaded from `affnav.toml`. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub loader: LoaderSection,
    pub cache: CacheSection,
    pub search: SearchSection,
    pub optimization: OptimizationSection,
    pub validation: ValidationSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderSection {
    /// Origin serving `categories/{i}.json`. Commands that take a URL or
    /// directory argument ignore it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    pub preload_first: bool,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            base_url: None,
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_ms: 10_000,
            preload_first: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    pub expiry_minutes: u64,
    /// Keep loaded chunks between runs.
    pub persist: bool,
    pub dir: PathBuf,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            expiry_minutes: 30,
            persist: true,
            dir: PathBuf::from(".affnav-cache"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSection {
    pub debounce_ms: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl SearchSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizationSection {
    pub enabled: bool,
    pub preview_count: usize,
    pub chunk_size_limit_kb: f64,
}

impl Default for OptimizationSection {
    fn default() -> Self {
        let opts = OptimizationOptions::default();
        Self {
            enabled: opts.enabled,
            preview_count: opts.preview_count,
            chunk_size_limit_kb: opts.chunk_size_limit_kb,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSection {
    /// Table warnings and orphaned chunks fail `import` and `verify`.
    pub fail_on_warnings: bool,
}

impl Settings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.loader.timeout_ms == 0 {
            return Err(SettingsError::Validation(
                "loader.timeout_ms must be non-zero".into(),
            ));
        }
        if self.optimization.preview_count == 0 {
            return Err(SettingsError::Validation(
                "optimization.preview_count must be at least 1".into(),
            ));
        }
        let limit = self.optimization.chunk_size_limit_kb;
        if limit.is_nan() || limit <= 0.0 {
            return Err(SettingsError::Validation(
                "optimization.chunk_size_limit_kb must be positive".into(),
            ));
        }
        if let Some(url) = &self.loader.base_url
            && !crate::validation::validate_url(url)
        {
            return Err(SettingsError::Validation(format!(
                "loader.base_url is not an absolute URL: {url}"
            )));
        }
        Ok(())
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            max_retries: self.loader.max_retries,
            retry_delay: Duration::from_millis(self.loader.retry_delay_ms),
            timeout: Duration::from_millis(self.loader.timeout_ms),
            cache_expiry: Duration::from_secs(self.cache.expiry_minutes * 60),
            preload_first: self.loader.preload_first,
        }
    }

    pub fn optimization_options(&self) -> OptimizationOptions {
        OptimizationOptions {
            enabled: self.optimization.enabled,
            preview_count: self.optimization.preview_count,
            chunk_size_limit_kb: self.optimization.chunk_size_limit_kb,
        }
    }
}

// =============================================================================
// Loading, merging, and validation
// =============================================================================

/// Stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Settings::default()).expect("default settings must serialize")
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

/// Read a settings file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_settings(path: &Path) -> Result<Option<toml::Value>, SettingsError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_settings(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Settings, SettingsError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`, falling back to stock defaults when the file
/// is absent.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    resolve_settings(stock_defaults_value(), load_raw_settings(path)?)
}

/// A fully-commented stock `affnav.toml`. Used by the `gen-config` command.
pub fn stock_config_toml() -> &'static str {
    r##"# affnav settings
# ==============
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Category loading
# ---------------------------------------------------------------------------
[loader]
# Origin serving /categories/{index}.json. Used by `load` when no URL or
# directory is given.
# base_url = "https://nav.example.com"

# Attempts allowed after the first failure before giving up.
max_retries = 3

# Base delay before a retry. Retry n waits retry_delay_ms * n.
retry_delay_ms = 1000

# A fetch still pending after this long fails with a timeout.
timeout_ms = 10000

# Load category 0 as soon as the page is ready.
preload_first = true

# ---------------------------------------------------------------------------
# Category cache
# ---------------------------------------------------------------------------
[cache]
# Cached chunks older than this are fetched again.
expiry_minutes = 30

# Keep loaded chunks between runs.
persist = true

# Directory holding the persisted cache blob.
dir = ".affnav-cache"

# ---------------------------------------------------------------------------
# Search
# ---------------------------------------------------------------------------
[search]
# Keystrokes within this window are coalesced into one search.
debounce_ms = 300

# ---------------------------------------------------------------------------
# Optimizer
# ---------------------------------------------------------------------------
[optimization]
# When false, `optimize` refuses to run and writes nothing.
enabled = true

# Sites kept inline in config-optimized.json per category.
preview_count = 3

# Chunks larger than this are reported.
chunk_size_limit_kb = 100.0

# ---------------------------------------------------------------------------
# Validation
# ---------------------------------------------------------------------------
[validation]
# Treat table import warnings and orphaned chunks as failures.
fail_on_warnings = false
"##
}
