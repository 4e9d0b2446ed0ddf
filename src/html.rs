//! Critical CSS inlining and HTML minification.
//!
//! Stage 4 of the dist build. The above-the-fold rules of the main
//! stylesheet are marked in the source:
//!
//! ```css
//! /* CRITICAL-START */
//! body { margin: 0 } .hero { … }
//! /* CRITICAL-END */
//! ```
//!
//! Every page outside the admin console then gets:
//!
//! 1. The region inlined as `<style id="critical-css">` right after `<head>`.
//! 2. Its blocking `<link rel="stylesheet">` to the main stylesheet swapped
//!    for a preload that promotes itself on load, plus a `<noscript>`
//!    fallback for clients without scripting.
//! 3. A minification pass (see [`crate::minify::minify_html`]).
//!
//! Pages without a `</head>` are not documents this stage understands; they
//! are left byte-for-byte unchanged. Pages already carrying the inlined
//! block are left alone too, so the stage can be re-run.

use crate::config::{HtmlConfig, Layout};
use crate::minify::minify_html;
use maud::{Markup, PreEscaped, html};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

const CRITICAL_START: &str = "/* CRITICAL-START */";
const CRITICAL_END: &str = "/* CRITICAL-END */";
const CRITICAL_STYLE_ID: &str = "critical-css";
const SWAP_ONLOAD: &str = "this.onload=null;this.rel='stylesheet'";

static HEAD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("head regex"));
static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("head close regex"));

#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid stylesheet pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Counts for the build summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlReport {
    /// Characters of CSS inlined into each page.
    pub critical_chars: usize,
    pub transformed: usize,
    /// Pages left as they were (no `</head>`, or already transformed).
    pub unchanged: usize,
    pub failed: usize,
}

/// All `.html` files under `root`, sorted, skipping the `exclude` subtree.
pub fn html_files(root: &Path, exclude: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != exclude);
    for entry in walker {
        let entry = entry?;
        let is_html = entry
            .path()
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("html"));
        if entry.file_type().is_file() && is_html {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// The marked critical region, trimmed; or the first `fallback_chars`
/// characters when the markers are missing or out of order.
pub fn extract_critical_css(css: &str, fallback_chars: usize) -> String {
    if let (Some(start), Some(end)) = (css.find(CRITICAL_START), css.find(CRITICAL_END))
        && end > start
    {
        return css[start + CRITICAL_START.len()..end].trim().to_string();
    }
    log::warn!("critical CSS markers missing, using the first {fallback_chars} characters");
    css.chars().take(fallback_chars).collect()
}

fn preload_block(href: &str) -> Markup {
    html! {
        link rel="preload" href=(href) as="style" onload=(PreEscaped(SWAP_ONLOAD));
        noscript { link rel="stylesheet" href=(href); }
    }
}

fn critical_style(css: &str) -> Markup {
    html! {
        style id=(CRITICAL_STYLE_ID) { (PreEscaped(css)) }
    }
}

/// Matches a `<link>` whose `href` ends in the stylesheet path, with any
/// prefix (`/`, `../`, an origin).
fn stylesheet_link_pattern(href: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r#"(?i)<link[^>]+href=["'][^"'>]*{}["'][^>]*>"#,
        regex::escape(href.trim_start_matches('/'))
    ))
}

fn is_transformed(html: &str) -> bool {
    html.contains(&format!(r#"id="{CRITICAL_STYLE_ID}""#))
}

/// Inline `critical`, swap the blocking stylesheet link, and minify.
///
/// Returns `None` when the document is left unchanged.
pub fn transform_html(html: &str, critical: &str, href: &str) -> Option<String> {
    let link = stylesheet_link_pattern(href).ok()?;
    transform_with(html, critical, href, &link)
}

fn transform_with(html: &str, critical: &str, href: &str, link: &Regex) -> Option<String> {
    if !HEAD_CLOSE.is_match(html) || is_transformed(html) {
        return None;
    }

    let mut doc = html.to_string();
    let blocking = link
        .find_iter(&doc)
        .find(|m| !m.as_str().to_ascii_lowercase().contains("preload"))
        .map(|m| m.range());
    if let Some(range) = blocking {
        doc.replace_range(range, &preload_block(href).into_string());
    }

    if let Some(head) = HEAD_OPEN.find(&doc) {
        doc.insert_str(head.end(), &critical_style(critical).into_string());
    }

    Some(minify_html(&doc))
}

/// Read the critical region from the built stylesheet; empty when the file
/// is missing.
fn load_critical(css_path: &Path, fallback_chars: usize) -> String {
    match fs::read_to_string(css_path) {
        Ok(css) => extract_critical_css(&css, fallback_chars),
        Err(e) => {
            log::warn!("{} unavailable for critical CSS: {e}", css_path.display());
            String::new()
        }
    }
}

/// Transform every page of the output tree outside the admin console.
pub fn transform_site(layout: &Layout, config: &HtmlConfig) -> Result<HtmlReport, HtmlError> {
    let critical = load_critical(
        &layout.dist_assets().join(&config.stylesheet),
        config.fallback_chars,
    );
    let href = layout.asset_href(&config.stylesheet);
    let link = stylesheet_link_pattern(&href)?;

    let mut report = HtmlReport {
        critical_chars: critical.chars().count(),
        ..Default::default()
    };
    for path in html_files(&layout.dist, &layout.dist.join(&layout.admin_name))? {
        let rel = path.strip_prefix(&layout.dist).unwrap_or(&path).display().to_string();
        let html = match fs::read_to_string(&path) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("cannot read {rel}: {e}");
                report.failed += 1;
                continue;
            }
        };
        match transform_with(&html, &critical, &href, &link) {
            Some(out) => {
                fs::write(&path, out)?;
                log::info!("Processed {rel}");
                report.transformed += 1;
            }
            None => {
                log::debug!("{rel} left unchanged");
                report.unchanged += 1;
            }
        }
    }
    Ok(report)
}
