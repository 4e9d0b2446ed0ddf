//! Build configuration.
//!
//! Handles loading, validating, and merging `sitepress.toml`. Every key is
//! optional: stock defaults are serialized to a TOML table, the user file is
//! merged on top, and the result is deserialized with unknown keys rejected.
//!
//! ## Configuration Options
//!
//! ```toml
//! [paths]
//! content = "content"       # Markdown + YAML sources
//! pages = "pages"           # HTML pages → dist/pages
//! assets = "assets"         # CSS, JS, images → dist/assets
//! admin = "admin"           # Admin console → dist/admin
//! index = "index.html"      # Root page → dist/index.html
//! output = "dist"           # Build output directory
//! data = "data"             # Compiled JSON, under the assets directory
//!
//! [images]
//! widths = [480, 768, 1200] # Variant widths in pixels
//! min_bytes = 5120          # Smaller sources are left alone
//! avif_quality = 50
//! dirs = ["images"]         # Image roots, relative to dist/assets
//!
//! [html]
//! stylesheet = "css/main.css"  # Relative to assets; source of critical CSS
//! fallback_chars = 3000        # Critical CSS slice when markers are missing
//!
//! [minify]
//! min_chars = 200           # Smaller CSS/JS files are left alone
//!
//! [sitemap]
//! base_url = "https://www.example.com"  # Overrides the CNAME lookup
//! cname = "CNAME"
//!
//! [processing]
//! max_processes = 4         # Image workers (omit for auto = CPU cores)
//! ```

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the project root.
pub const CONFIG_FILENAME: &str = "sitepress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from `sitepress.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Source and output directory names.
    pub paths: PathsConfig,
    /// Image variant generation.
    pub images: ImagesConfig,
    /// Critical CSS inlining.
    pub html: HtmlConfig,
    /// CSS/JS minification.
    pub minify: MinifyConfig,
    /// Sitemap and robots generation.
    pub sitemap: SitemapConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.paths;
        for (key, value) in [
            ("paths.content", &p.content),
            ("paths.pages", &p.pages),
            ("paths.assets", &p.assets),
            ("paths.admin", &p.admin),
            ("paths.index", &p.index),
            ("paths.output", &p.output),
            ("paths.data", &p.data),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        // The output directory is deleted on every build.
        let output = Path::new(p.output.trim());
        if output.is_absolute()
            || output
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ConfigError::Validation(format!(
                "paths.output must be a subdirectory of the project root, got {:?}",
                p.output
            )));
        }
        let out = normal_components(&p.output);
        for (key, source) in [
            ("paths.content", &p.content),
            ("paths.pages", &p.pages),
            ("paths.assets", &p.assets),
            ("paths.admin", &p.admin),
        ] {
            let parts = normal_components(source);
            if out.starts_with(&parts) || parts.starts_with(&out) {
                return Err(ConfigError::Validation(format!(
                    "paths.output {:?} overlaps {key} {:?}",
                    p.output, source
                )));
            }
        }
        // Only the index file itself is copied, so just its directory matters.
        let index_dir = normal_components(&p.index);
        let index_dir = &index_dir[..index_dir.len().saturating_sub(1)];
        if !index_dir.is_empty() && index_dir.starts_with(&out) {
            return Err(ConfigError::Validation(format!(
                "paths.output {:?} would delete the directory of paths.index {:?}",
                p.output, p.index
            )));
        }
        if self.images.widths.is_empty() {
            return Err(ConfigError::Validation(
                "images.widths must not be empty".into(),
            ));
        }
        if self.images.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "images.widths values must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.images.avif_quality) {
            return Err(ConfigError::Validation(
                "images.avif_quality must be 1-100".into(),
            ));
        }
        if self.html.fallback_chars == 0 {
            return Err(ConfigError::Validation(
                "html.fallback_chars must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// The named parts of a relative path, ignoring `.` and trailing slashes.
fn normal_components(path: &str) -> Vec<&OsStr> {
    Path::new(path.trim())
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Directory names, all relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub content: String,
    pub pages: String,
    pub assets: String,
    pub admin: String,
    pub index: String,
    pub output: String,
    /// Compiled data directory, relative to the assets directory.
    pub data: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content: "content".to_string(),
            pages: "pages".to_string(),
            assets: "assets".to_string(),
            admin: "admin".to_string(),
            index: "index.html".to_string(),
            output: "dist".to_string(),
            data: "data".to_string(),
        }
    }
}

/// Image variant settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Target widths; every qualifying source gets each width in each format.
    pub widths: Vec<u32>,
    /// Sources smaller than this many bytes are treated as icons.
    pub min_bytes: u64,
    /// AVIF encoding quality (1 = worst, 100 = best).
    pub avif_quality: u32,
    /// Image roots, relative to the output assets directory.
    pub dirs: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            widths: vec![480, 768, 1200],
            min_bytes: 5 * 1024,
            avif_quality: 50,
            dirs: vec!["images".to_string()],
        }
    }
}

/// Critical CSS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlConfig {
    /// Main stylesheet, relative to the assets directory.
    pub stylesheet: String,
    /// Characters taken from the top of the stylesheet when markers are missing.
    pub fallback_chars: usize,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            stylesheet: "css/main.css".to_string(),
            fallback_chars: 3000,
        }
    }
}

/// Asset minification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyConfig {
    /// Files shorter than this many characters are left untouched.
    pub min_chars: usize,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self { min_chars: 200 }
    }
}

/// Sitemap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapConfig {
    /// Public origin, e.g. `https://www.example.com`.
    pub base_url: Option<String>,
    /// File holding the primary domain, relative to the project root.
    pub cname: String,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            cname: "CNAME".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image workers.
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
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Absolute locations derived from a project root and its config.
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
    pub content: PathBuf,
    pub pages: PathBuf,
    pub assets: PathBuf,
    pub admin: PathBuf,
    pub index: PathBuf,
    pub dist: PathBuf,
    /// Admin directory name inside the output tree (the excluded subtree).
    pub admin_name: String,
    pub assets_name: String,
    pub pages_name: String,
    pub data_name: String,
}

impl Layout {
    pub fn new(root: &Path, config: &BuildConfig) -> Self {
        let p = &config.paths;
        Self {
            root: root.to_path_buf(),
            content: root.join(&p.content),
            pages: root.join(&p.pages),
            assets: root.join(&p.assets),
            admin: root.join(&p.admin),
            index: root.join(&p.index),
            dist: root.join(&p.output),
            admin_name: p.admin.clone(),
            assets_name: p.assets.clone(),
            pages_name: p.pages.clone(),
            data_name: p.data.clone(),
        }
    }

    /// `dist/assets`
    pub fn dist_assets(&self) -> PathBuf {
        self.dist.join(&self.assets_name)
    }

    /// Data directory written by a full build: `dist/assets/data`.
    pub fn dist_data(&self) -> PathBuf {
        self.dist_assets().join(&self.data_name)
    }

    /// Data directory written by the standalone content command: `assets/data`.
    pub fn dev_data(&self) -> PathBuf {
        self.assets.join(&self.data_name)
    }

    /// Public URL path of an asset, e.g. `/assets/css/main.css`.
    pub fn asset_href(&self, relative: &str) -> String {
        format!(
            "/{}/{}",
            self.assets_name.trim_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuildConfig::default()).expect("default config must serialize")
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

/// Parse config text, merge it over the stock defaults, and validate.
pub fn parse_config(text: &str) -> Result<BuildConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(text)?;
    let merged = merge_toml(stock_defaults_value(), overlay);
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// A missing file yields the stock defaults; a present but invalid file is
/// an error.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(BuildConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock `sitepress.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitepress configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directories (relative to the project root)
# ---------------------------------------------------------------------------
[paths]
# Markdown and YAML content sources (content/news/*.md, content/settings/*.yml).
content = "content"
# HTML pages, copied to dist/pages.
pages = "pages"
# Stylesheets, scripts and images, copied to dist/assets.
assets = "assets"
# Admin console, copied to dist/admin and excluded from HTML processing.
admin = "admin"
# Site entry page, copied to dist/index.html.
index = "index.html"
# Build output.
output = "dist"
# Compiled JSON data directory, inside the assets directory.
data = "data"

# ---------------------------------------------------------------------------
# Image variants
# ---------------------------------------------------------------------------
[images]
# Every JPEG/PNG gets a WebP and an AVIF copy at each of these widths.
widths = [480, 768, 1200]
# Sources smaller than this are treated as icons and skipped.
min_bytes = 5120
# AVIF encoding quality (1 = worst, 100 = best). WebP is lossless.
avif_quality = 50
# Image roots, relative to dist/assets.
dirs = ["images"]

# ---------------------------------------------------------------------------
# Critical CSS
# ---------------------------------------------------------------------------
[html]
# Stylesheet holding the /* CRITICAL-START */ ... /* CRITICAL-END */ region.
stylesheet = "css/main.css"
# Characters inlined from the top of the stylesheet when the markers are missing.
fallback_chars = 3000

# ---------------------------------------------------------------------------
# Minification
# ---------------------------------------------------------------------------
[minify]
# CSS/JS files shorter than this are left readable.
min_chars = 200

# ---------------------------------------------------------------------------
# Sitemap
# ---------------------------------------------------------------------------
[sitemap]
# Public origin. When omitted, BASE_URL or the CNAME file is used.
# base_url = "https://www.example.com"
cname = "CNAME"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
