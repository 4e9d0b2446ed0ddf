//! The full dist build.
//!
//! ```text
//! clean → content → copy → images → html → minify → hash → sitemap
//! ```
//!
//! Stages run strictly in order, each reading what the previous one left on
//! disk. Clean, content, copy and minify are essential: their errors abort
//! the build. Images, html, hash and sitemap only improve the output, so a
//! stage-level failure there is logged as `<Stage> skipped: <error>` and the
//! build carries on with the tree as it is.

use crate::assets::{self, MinifyError, MinifyReport};
use crate::config::{BuildConfig, Layout};
use crate::content::{self, ContentError, ContentReport};
use crate::copy::{self, CopyError, CopyReport};
use crate::hash::{self, HashReport};
use crate::html::{self, HtmlReport};
use crate::imaging::{ImageBackend, RustBackend};
use crate::optimize::{self, ImageReport, VariantConfig};
use crate::sitemap::{self, SitemapReport};
use chrono::NaiveDate;
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Copy failed: {0}")]
    Copy(#[from] CopyError),
    #[error("Content compile failed: {0}")]
    Content(#[from] ContentError),
    #[error("Minify failed: {0}")]
    Minify(#[from] MinifyError),
}

/// Results of every stage that ran.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub content: ContentReport,
    pub copy: CopyReport,
    pub images: Option<ImageReport>,
    pub html: Option<HtmlReport>,
    pub minify: MinifyReport,
    pub hash: Option<HashReport>,
    pub sitemap: Option<SitemapReport>,
    /// `(stage, error)` for optional stages that failed.
    pub skipped: Vec<(String, String)>,
}

/// Per-run inputs that don't come from the config file.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub base_url: String,
    /// Date stamped on every sitemap entry.
    pub lastmod: NaiveDate,
}

impl BuildOptions {
    /// Base URL from the environment/config/CNAME, today's date (UTC).
    pub fn resolve(layout: &Layout, config: &BuildConfig) -> Self {
        Self {
            base_url: sitemap::base_url_for(layout, &config.sitemap),
            lastmod: chrono::Utc::now().date_naive(),
        }
    }
}

/// Run an optional stage's result through the skip policy.
fn optional<T, E: Display>(stage: &str, result: Result<T, E>, skipped: &mut Vec<(String, String)>) -> Option<T> {
    match result {
        Ok(report) => Some(report),
        Err(e) => {
            log::warn!("{stage} skipped: {e}");
            skipped.push((stage.to_string(), e.to_string()));
            None
        }
    }
}

/// Image directories to scan, resolved against the output assets.
pub fn image_roots(layout: &Layout, config: &BuildConfig) -> Vec<PathBuf> {
    config
        .images
        .dirs
        .iter()
        .map(|d| layout.dist_assets().join(d))
        .collect()
}

/// Build `layout.dist` from scratch with the production image backend.
pub fn build(layout: &Layout, config: &BuildConfig) -> Result<BuildReport, BuildError> {
    let options = BuildOptions::resolve(layout, config);
    build_with_backend(&RustBackend::new(), layout, config, &options)
}

/// Build using a specific image backend (allows testing with mock).
pub fn build_with_backend(
    backend: &impl ImageBackend,
    layout: &Layout,
    config: &BuildConfig,
    options: &BuildOptions,
) -> Result<BuildReport, BuildError> {
    log::info!("Starting dist build in {}", layout.dist.display());
    let mut skipped = Vec::new();

    copy::clean_output(&layout.dist)?;
    let content = content::compile(&layout.content, &layout.dist_data())?;
    let copy = copy::copy_static(layout)?;

    let images = optional(
        "Image optimization",
        optimize::optimize_images_with_backend(
            backend,
            &image_roots(layout, config),
            &VariantConfig::from_build_config(config),
        ),
        &mut skipped,
    );

    let html = optional(
        "HTML transform",
        html::transform_site(layout, &config.html),
        &mut skipped,
    );

    let minify = assets::minify_assets(&layout.dist_assets(), &config.minify)?;

    let hash = optional(
        "Hashing",
        hash::hash_site(
            &layout.dist,
            &layout.dist_assets(),
            &layout.dist.join(&layout.admin_name),
        ),
        &mut skipped,
    );

    let sitemap = optional(
        "Sitemap generation",
        sitemap::generate_sitemap(layout, &options.base_url, options.lastmod),
        &mut skipped,
    );

    log::info!("Dist build complete");
    Ok(BuildReport {
        content,
        copy,
        images,
        html,
        minify,
        hash,
        sitemap,
        skipped,
    })
}
