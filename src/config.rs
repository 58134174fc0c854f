//! Configuration module.
//!
//! Handles loading, validating, and merging `config.toml` files. A config
//! file is sparse: stock defaults are the base layer and the file overrides
//! only the keys it names.
//!
//! ## Config File Location
//!
//! `simple-img` reads `config.toml` from the working directory, or the file
//! given with `--config`. Without either, stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! quality = 100             # Encoding quality (0-100)
//!
//! [watermark]
//! offset = 15               # Margin from the border for corner anchors (px)
//! anchor = "bottom-right"   # top-left | top-right | bottom-right | bottom-left | center
//!
//! [render]
//! expires = 0               # Cache lifetime in seconds (0 = no Expires header)
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [[batch.steps]]           # Recipe applied by `simple-img batch`
//! op = "resize"
//! width = 800
//! mode = "ratio"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::batch::Step;
use crate::imaging::{DEFAULT_WATERMARK_OFFSET, Quality, WatermarkAnchor, WatermarkOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImgConfig {
    /// Encoding settings for saved and rendered images.
    pub output: OutputConfig,
    /// Default watermark placement.
    pub watermark: WatermarkConfig,
    /// HTTP caching settings for rendered images.
    pub render: RenderConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Batch recipe.
    pub batch: BatchConfig,
}

impl ImgConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 0-100".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        for (index, step) in self.batch.steps.iter().enumerate() {
            step.validate()
                .map_err(|reason| ConfigError::Validation(format!("batch.steps[{index}]: {reason}")))?;
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.output.quality)
    }

    pub fn watermark_options(&self) -> WatermarkOptions {
        WatermarkOptions {
            offset: self.watermark.offset,
        }
    }
}

/// Encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JPEG quality / PNG compression source (0-100).
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { quality: 100 }
    }
}

/// Watermark defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    /// Margin between the overlay and the base border, in pixels.
    pub offset: i64,
    /// Anchor used when a command or step does not name one.
    pub anchor: WatermarkAnchor,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            offset: DEFAULT_WATERMARK_OFFSET,
            anchor: WatermarkAnchor::default(),
        }
    }
}

/// Caching headers for rendered output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Seconds added to `Last-Modified` for the `Expires` header.
    pub expires: u32,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
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

/// Steps applied to every image by `simple-img batch`, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub steps: Vec<Step>,
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ImgConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a
///   `[[batch.steps]]` list in the overlay replaces the stock one.
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

/// Read a config file as a raw TOML value.
pub fn read_raw_config(file: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(file)?;
    Ok(toml::from_str(&content)?)
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    read_raw_config(&config_path).map(Some)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ImgConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ImgConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<ImgConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Load config from an explicit file. A missing file is an error.
pub fn load_config_file(file: &Path) -> Result<ImgConfig, ConfigError> {
    resolve_config(stock_defaults_value(), Some(read_raw_config(file)?))
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Img Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# simple-img reads ./config.toml, or the file passed with --config.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# 0-100. JPEG uses it directly; PNG maps it to a compression level
# (quality/10 - 1, so 100 = level 9); GIF ignores it.
quality = 100

# ---------------------------------------------------------------------------
# Watermark
# ---------------------------------------------------------------------------
[watermark]
# Margin between the overlay and the image border for corner anchors (px).
offset = 15
# top-left | top-right | bottom-right | bottom-left | center
anchor = "bottom-right"

# ---------------------------------------------------------------------------
# Rendering for HTTP
# ---------------------------------------------------------------------------
[render]
# Cache lifetime in seconds. 0 sends no Expires header.
expires = 0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers for `batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Batch recipe
# ---------------------------------------------------------------------------
# Steps run in order on every image. Available ops:
#
#   op = "resize"            width, height, mode = "strict" | "ratio" | "crop"
#   op = "crop"              x, y, width, height
#   op = "crop-from-center"  width, height
#   op = "watermark"         path, anchor, width, height, offset
#
# [[batch.steps]]
# op = "resize"
# width = 800
# mode = "ratio"
#
# [[batch.steps]]
# op = "watermark"
# path = "logo.png"
# anchor = "bottom-right"
"##
}
