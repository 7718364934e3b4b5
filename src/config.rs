//! Run configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML value, the user file is merged on top, and the result
//! is deserialized and validated into one immutable [`AppConfig`]. Every
//! component receives that value by reference; nothing mutates it during a
//! run. Reloading means loading a new `AppConfig` between batches.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [directories]
//! documents = "documents"   # Table exports (*.json), one per source document
//! images = "images"         # Source rasters, probed as {images}/{identifier}.{ext}
//! markup = "html"           # Companion markup files, matched by document stem
//! output = "output"         # Variants land in {output}/{document_stem}/
//! logs = ".logs"            # Run log, missing-image report, aggregate reports
//!
//! [patterns]
//! code = '^([A-Z]+\d+|THUMBNAIL)'
//!
//! [images]
//! extensions = ["webp", "WEBP", "jpg", "png", "JPG", "PNG"]
//! quality = 100
//! method = 6
//! lossless = true
//!
//! [markup]
//! extension = "html"
//! source_attribute = "data-srcset"
//! img_attribute = "data-src"
//!
//! [sizes]
//! COMFRPTC09 = [[1800, 1200], [1200, 800], [900, 600], [500, 333]]
//!
//! [breakpoints.COMFRPTC12]
//! 1562 = [900, 1800]
//! source_default = 900
//! img_default = 900
//!
//! [replace_order]
//! COMFRPTC09 = [1800, 1200, 900, 500, 900, 900]
//!
//! [carousel]
//! window = 50
//! carousel_marker = "_carousel"
//! standard_marker = "mCommonsectionImgitem"
//! sensitive = { COMFRPTC12 = [1562, 1041] }
//!
//! [no_condition]
//! COMFRPTC23 = { plain = 120, high_resolution = 240 }
//!
//! [processing]
//! max_processes = 4
//!
//! [logging]
//! level = "info"
//! file = "variant-forge.log"
//! ```
//!
//! ## Rule tables replace, settings merge
//!
//! Settings sections merge key-by-key over the stock defaults. The rule
//! tables (`sizes`, `breakpoints`, `replace_order`, `no_condition`,
//! `carousel.sensitive`) are replaced wholesale when the user file defines
//! them, so a user table never inherits stock codes it did not ask for.
//!
//! Unknown keys are rejected to catch typos early.

use crate::rules::{BreakpointRules, NoConditionWidths, SizeSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
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

/// Full run configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub directories: DirectoriesConfig,
    pub patterns: PatternsConfig,
    pub images: ImagesConfig,
    pub markup: MarkupConfig,
    /// Required output sizes per code, in generation order.
    pub sizes: BTreeMap<String, Vec<SizeSpec>>,
    /// Breakpoint rules per code (breakpoint rewriting strategy).
    pub breakpoints: BTreeMap<String, BreakpointRules>,
    /// Width order per code (ordinal rewriting strategy).
    pub replace_order: BTreeMap<String, Vec<u32>>,
    pub carousel: CarouselConfig,
    /// Codes whose condition-less tags get fixed widths instead of the tag default.
    pub no_condition: BTreeMap<String, NoConditionWidths>,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            directories: DirectoriesConfig::default(),
            patterns: PatternsConfig::default(),
            images: ImagesConfig::default(),
            markup: MarkupConfig::default(),
            sizes: default_sizes(),
            breakpoints: default_breakpoints(),
            replace_order: default_replace_order(),
            carousel: CarouselConfig::default(),
            no_condition: BTreeMap::from([(
                "COMFRPTC23".to_string(),
                NoConditionWidths {
                    plain: 120,
                    high_resolution: 240,
                },
            )]),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn sizes(pairs: &[[u32; 2]]) -> Vec<SizeSpec> {
    pairs.iter().copied().map(SizeSpec::from).collect()
}

fn default_sizes() -> BTreeMap<String, Vec<SizeSpec>> {
    let full = [[1800, 1200], [1200, 800], [900, 600], [500, 333]];
    let half = [[900, 600], [500, 333]];
    let flexible = [[900, 0], [500, 0]];
    BTreeMap::from([
        ("COMFRPTC03".to_string(), sizes(&flexible)),
        ("COMFRPTC09".to_string(), sizes(&full)),
        ("COMFRPTC12".to_string(), sizes(&full)),
        ("COMFRPTC13".to_string(), sizes(&[[1200, 900], [900, 600], [500, 333]])),
        ("COMFRPTC14".to_string(), sizes(&[[800, 800], [600, 600], [400, 400]])),
        ("COMFRPTC15".to_string(), sizes(&[[300, 300], [150, 150]])),
        ("COMFRPTC17".to_string(), sizes(&half)),
        ("COMFRPTC21".to_string(), sizes(&[[900, 900], [500, 500]])),
        ("COMFRPTC23".to_string(), sizes(&[[360, 360], [240, 240], [120, 120]])),
        ("COMFRPTC30".to_string(), sizes(&half)),
        ("COMFRPTC34".to_string(), sizes(&full)),
        ("GSTFRPTA15".to_string(), sizes(&flexible)),
        ("THUMBNAIL".to_string(), sizes(&half)),
    ])
}

fn default_breakpoints() -> BTreeMap<String, BreakpointRules> {
    use crate::rules::WidthChoice::Pair;

    let carousel = BreakpointRules {
        widths: BTreeMap::from([(1562, Pair([900, 1800])), (1041, Pair([900, 1200]))]),
        source_default: Some(900),
        img_default: Some(900),
    };
    let icon = BreakpointRules {
        widths: BTreeMap::from([(1440, Pair([240, 360]))]),
        source_default: Some(120),
        img_default: Some(120),
    };
    BTreeMap::from([
        ("COMFRPTC12".to_string(), carousel),
        ("COMFRPTC23".to_string(), icon),
    ])
}

fn default_replace_order() -> BTreeMap<String, Vec<u32>> {
    BTreeMap::from([
        ("COMFRPTC03".to_string(), vec![900, 500, 500]),
        ("COMFRPTC09".to_string(), vec![1800, 1200, 900, 500, 900, 900]),
        ("COMFRPTC13".to_string(), vec![1200, 900, 500, 900, 500]),
        ("COMFRPTC14".to_string(), vec![800, 600, 400, 400]),
        ("COMFRPTC15".to_string(), vec![300, 150, 150]),
        ("COMFRPTC17".to_string(), vec![900, 500, 500]),
        ("COMFRPTC21".to_string(), vec![900, 500, 900]),
        ("COMFRPTC30".to_string(), vec![900, 500, 500]),
        ("COMFRPTC34".to_string(), vec![1800, 1200, 900, 500, 900]),
        ("GSTFRPTA15".to_string(), vec![900, 500, 900]),
    ])
}

impl AppConfig {
    /// Validate config values and cross-table consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 0-100".into(),
            ));
        }
        if self.images.method > 6 {
            return Err(ConfigError::Validation("images.method must be 0-6".into()));
        }
        if self.images.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "images.extensions must not be empty".into(),
            ));
        }
        if self.carousel.window == 0 {
            return Err(ConfigError::Validation(
                "carousel.window must be at least 1".into(),
            ));
        }
        if self.carousel.carousel_marker.is_empty() || self.carousel.standard_marker.is_empty() {
            return Err(ConfigError::Validation(
                "carousel markers must not be empty".into(),
            ));
        }

        Regex::new(&self.patterns.code).map_err(|e| {
            ConfigError::Validation(format!("patterns.code is not a valid regex: {e}"))
        })?;
        let image = Regex::new(&self.patterns.image).map_err(|e| {
            ConfigError::Validation(format!("patterns.image is not a valid regex: {e}"))
        })?;
        if !image
            .capture_names()
            .flatten()
            .any(|name| name == "bracket" || name == "colon")
        {
            return Err(ConfigError::Validation(
                "patterns.image must define a `bracket` or `colon` named group".into(),
            ));
        }

        for (code, specs) in &self.sizes {
            if specs.iter().any(|s| s.width == 0) {
                return Err(ConfigError::Validation(format!(
                    "sizes.{code}: widths must be non-zero"
                )));
            }
        }
        for (code, rules) in &self.breakpoints {
            if rules.all_widths().any(|w| w == 0) {
                return Err(ConfigError::Validation(format!(
                    "breakpoints.{code}: widths must be non-zero"
                )));
            }
        }
        for (code, order) in &self.replace_order {
            if order.contains(&0) {
                return Err(ConfigError::Validation(format!(
                    "replace_order.{code}: widths must be non-zero"
                )));
            }
        }

        let overlapping: Vec<&str> = self
            .breakpoints
            .keys()
            .filter(|code| self.replace_order.contains_key(*code))
            .map(String::as_str)
            .collect();
        if !overlapping.is_empty() {
            return Err(ConfigError::Validation(format!(
                "codes listed in both breakpoints and replace_order: {}",
                overlapping.join(", ")
            )));
        }
        Ok(())
    }

    /// Required output sizes for a code, if the code has any.
    pub fn sizes_for(&self, code: &str) -> Option<&[SizeSpec]> {
        self.sizes.get(code).map(Vec::as_slice)
    }

    /// Path of the run log file.
    pub fn log_file(&self) -> PathBuf {
        self.directories.logs.join(&self.logging.file)
    }
}

/// Directory layout. Relative paths resolve against the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoriesConfig {
    pub documents: PathBuf,
    pub images: PathBuf,
    pub markup: PathBuf,
    pub output: PathBuf,
    pub logs: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            documents: PathBuf::from("documents"),
            images: PathBuf::from("images"),
            markup: PathBuf::from("html"),
            output: PathBuf::from("output"),
            logs: PathBuf::from(".logs"),
        }
    }
}

/// Extraction patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternsConfig {
    /// Anchored code pattern applied to row labels. The first capture group
    /// (or the whole match when there is none) is the code.
    pub code: String,
    /// Identifier pattern applied to each line of each table cell. Must
    /// capture the identifier in a `bracket` and/or `colon` named group.
    pub image: String,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            code: r"^([A-Z]+\d+|THUMBNAIL)".to_string(),
            image: concat!(
                r"[＜<〈]画像(?:名|\d*)?(?:（[^）]*）)?[＞>〉]\s*(?P<bracket>[a-zA-Z0-9\-_]+)",
                r"|画像名[:：]\s*(?P<colon>[a-zA-Z0-9\-_]+)",
            )
            .to_string(),
        }
    }
}

/// Source probing and WebP encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Source extensions, probed in this order.
    pub extensions: Vec<String>,
    /// WebP quality (0 = worst, 100 = best).
    pub quality: u32,
    /// WebP compression effort (0 = fastest, 6 = smallest).
    pub method: u32,
    /// Encode losslessly instead of lossy.
    pub lossless: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            extensions: ["webp", "WEBP", "jpg", "png", "JPG", "PNG"]
                .into_iter()
                .map(String::from)
                .collect(),
            quality: 100,
            method: 6,
            lossless: true,
        }
    }
}

/// Markup discovery and tag attribute names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    /// Companion markup file extension (without the dot).
    pub extension: String,
    /// srcset-like attribute searched on `<source>` tags.
    pub source_attribute: String,
    /// src-like attribute searched on `<img>` tags.
    pub img_attribute: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            extension: "html".to_string(),
            source_attribute: "data-srcset".to_string(),
            img_attribute: "data-src".to_string(),
        }
    }
}

/// Carousel classification for breakpoints with two candidate widths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CarouselConfig {
    /// Lines scanned backwards from a tag.
    pub window: usize,
    /// Token marking carousel context (picks the larger candidate).
    pub carousel_marker: String,
    /// Token marking a standard item (picks the smaller candidate).
    pub standard_marker: String,
    /// Breakpoints per code where high-resolution choices depend on context.
    pub sensitive: BTreeMap<String, Vec<u32>>,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            window: 50,
            carousel_marker: "_carousel".to_string(),
            standard_marker: "mCommonsectionImgitem".to_string(),
            sensitive: BTreeMap::from([("COMFRPTC12".to_string(), vec![1562, 1041])]),
        }
    }
}

impl CarouselConfig {
    pub fn is_sensitive(&self, code: &str, breakpoint: u32) -> bool {
        self.sensitive
            .get(code)
            .is_some_and(|bps| bps.contains(&breakpoint))
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of documents processed in parallel.
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

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` wins when set.
    pub level: String,
    /// Log file name inside the logs directory.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "variant-forge.log".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Dotted paths whose user value replaces the stock value instead of merging.
const REPLACED_TABLES: &[&str] = &[
    "sizes",
    "breakpoints",
    "replace_order",
    "no_condition",
    "carousel.sensitive",
];

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    merge_at(base, overlay, "", &[])
}

/// [`merge_toml`], except the rule tables in [`REPLACED_TABLES`] are taken
/// from `overlay` as a whole.
pub fn merge_config_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    merge_at(base, overlay, "", REPLACED_TABLES)
}

fn merge_at(
    base: toml::Value,
    overlay: toml::Value,
    path: &str,
    replaced: &[&str],
) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let key_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                let merged = match base_table.remove(&key) {
                    Some(_) if replaced.contains(&key_path.as_str()) => overlay_val,
                    Some(base_val) => merge_at(base_val, overlay_val, &key_path, replaced),
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

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_config_values(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# variant-forge configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Settings sections merge over these defaults key by key. The rule tables
# ([sizes], [breakpoints.*], [replace_order], [no_condition] and
# carousel.sensitive) replace the defaults wholesale when present.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directories (relative to the working directory)
# ---------------------------------------------------------------------------
[directories]
# Source documents: JSON table exports, one file per document.
documents = "documents"
# Source rasters, looked up as {images}/{identifier}.{extension}.
images = "images"
# Companion markup files, matched by document stem.
markup = "html"
# Variants are written to {output}/{document_stem}/{identifier}{width}.webp.
output = "output"
# Run log, missing_images.txt, all_image_names.json, all_converted_images.txt.
logs = ".logs"

# ---------------------------------------------------------------------------
# Patterns
# ---------------------------------------------------------------------------
[patterns]
# Anchored code pattern applied to each table's row label.
code = '^([A-Z]+\d+|THUMBNAIL)'
# Identifier pattern applied to every cell line. Needs a `bracket` and/or
# `colon` named group.
image = '[＜<〈]画像(?:名|\d*)?(?:（[^）]*）)?[＞>〉]\s*(?P<bracket>[a-zA-Z0-9\-_]+)|画像名[:：]\s*(?P<colon>[a-zA-Z0-9\-_]+)'

# ---------------------------------------------------------------------------
# Source probing and WebP encoding
# ---------------------------------------------------------------------------
[images]
# Probed in order; the first existing file wins.
extensions = ["webp", "WEBP", "jpg", "png", "JPG", "PNG"]
# WebP quality (0 = worst, 100 = best).
quality = 100
# Compression effort (0 = fastest, 6 = smallest).
method = 6
# Encode losslessly (quality then trades speed for size).
lossless = true

# ---------------------------------------------------------------------------
# Markup
# ---------------------------------------------------------------------------
[markup]
extension = "html"
source_attribute = "data-srcset"
img_attribute = "data-src"

# ---------------------------------------------------------------------------
# Output sizes per code: [width, height]. height = 0 keeps the aspect ratio.
# ---------------------------------------------------------------------------
[sizes]
COMFRPTC03 = [[900, 0], [500, 0]]
COMFRPTC09 = [[1800, 1200], [1200, 800], [900, 600], [500, 333]]
COMFRPTC12 = [[1800, 1200], [1200, 800], [900, 600], [500, 333]]
COMFRPTC13 = [[1200, 900], [900, 600], [500, 333]]
COMFRPTC14 = [[800, 800], [600, 600], [400, 400]]
COMFRPTC15 = [[300, 300], [150, 150]]
COMFRPTC17 = [[900, 600], [500, 333]]
COMFRPTC21 = [[900, 900], [500, 500]]
COMFRPTC23 = [[360, 360], [240, 240], [120, 120]]
COMFRPTC30 = [[900, 600], [500, 333]]
COMFRPTC34 = [[1800, 1200], [1200, 800], [900, 600], [500, 333]]
GSTFRPTA15 = [[900, 0], [500, 0]]
THUMBNAIL = [[900, 600], [500, 333]]

# ---------------------------------------------------------------------------
# Breakpoint rewriting: min-width breakpoint -> width or [low, high].
# Normal resolution picks low, min-resolution: 2dppx picks high.
# A code may appear here or in [replace_order], never both.
# ---------------------------------------------------------------------------
[breakpoints.COMFRPTC12]
1562 = [900, 1800]
1041 = [900, 1200]
source_default = 900
img_default = 900

[breakpoints.COMFRPTC23]
1440 = [240, 360]
source_default = 120
img_default = 120

# ---------------------------------------------------------------------------
# Ordinal rewriting: widths assigned to successive plain file references.
# ---------------------------------------------------------------------------
[replace_order]
COMFRPTC03 = [900, 500, 500]
COMFRPTC09 = [1800, 1200, 900, 500, 900, 900]
COMFRPTC13 = [1200, 900, 500, 900, 500]
COMFRPTC14 = [800, 600, 400, 400]
COMFRPTC15 = [300, 150, 150]
COMFRPTC17 = [900, 500, 500]
COMFRPTC21 = [900, 500, 900]
COMFRPTC30 = [900, 500, 500]
COMFRPTC34 = [1800, 1200, 900, 500, 900]
GSTFRPTA15 = [900, 500, 900]

# ---------------------------------------------------------------------------
# Carousel context. For the listed code/breakpoint pairs a high-resolution
# tag takes the larger width only when the nearest marker above it is the
# carousel marker.
# ---------------------------------------------------------------------------
[carousel]
window = 50
carousel_marker = "_carousel"
standard_marker = "mCommonsectionImgitem"

[carousel.sensitive]
COMFRPTC12 = [1562, 1041]

# ---------------------------------------------------------------------------
# Codes whose tags without any min-width condition get fixed widths.
# ---------------------------------------------------------------------------
[no_condition]
COMFRPTC23 = { plain = 120, high_resolution = 240 }

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum documents processed in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# EnvFilter directive; RUST_LOG overrides it.
level = "info"
# Written inside the logs directory.
file = "variant-forge.log"
"##
}
