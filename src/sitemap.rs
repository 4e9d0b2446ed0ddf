//! `sitemap.xml` and `robots.txt` generation.
//!
//! Stage 7 of the dist build. Every page of the output tree except the admin
//! console becomes a sitemap entry:
//!
//! | Output file | URL |
//! |---|---|
//! | `index.html` | `<base>/` |
//! | `pages/offers.html` | `<base>/offers` |
//! | `pages/about.html` | `<base>/about.html` |
//! | `blog/post.html` | `<base>/blog/post.html` |
//!
//! The home page gets priority `1.0`, everything else `0.7`; all entries
//! change daily and carry the build date as `lastmod`.
//!
//! ## Base URL
//!
//! First match wins:
//!
//! 1. `BASE_URL` environment variable
//! 2. `sitemap.base_url` in `sitepress.toml`
//! 3. `https://` + the contents of the `CNAME` file
//! 4. `https://www.example.com`

use crate::config::{Layout, SitemapConfig};
use crate::html::html_files;
use chrono::NaiveDate;
use maud::{PreEscaped, html};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://www.example.com";
/// Environment variable overriding every other base URL source.
pub const BASE_URL_ENV: &str = "BASE_URL";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapReport {
    pub base_url: String,
    pub urls: Vec<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the public origin, without a trailing slash.
pub fn resolve_base_url(env: Option<&str>, configured: Option<&str>, cname_path: &Path) -> String {
    let cname = fs::read_to_string(cname_path).ok();
    let base = non_empty(env)
        .or(non_empty(configured))
        .map(str::to_string)
        .or_else(|| non_empty(cname.as_deref()).map(|domain| format!("https://{domain}")))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    base.trim_end_matches('/').to_string()
}

/// Public URL of a page given its `/`-separated path relative to the dist root.
pub fn url_for(rel: &str, base: &str, pages_dir: &str) -> String {
    if rel == "index.html" {
        return format!("{base}/");
    }
    match rel.strip_prefix(&format!("{pages_dir}/")) {
        Some(page) if page.eq_ignore_ascii_case("offers.html") => format!("{base}/offers"),
        Some(page) => format!("{base}/{page}"),
        None => format!("{base}/{rel}"),
    }
}

pub fn render_sitemap(urls: &[String], base: &str, lastmod: NaiveDate) -> String {
    let home = format!("{base}/");
    let date = lastmod.format("%Y-%m-%d").to_string();
    let body = html! {
        (PreEscaped(XML_DECLARATION))
        urlset xmlns=(SITEMAP_NS) {
            @for url in urls {
                url {
                    loc { (url) }
                    changefreq { "daily" }
                    lastmod { (date) }
                    priority { @if *url == home { "1.0" } @else { "0.7" } }
                }
            }
        }
    };
    let mut xml = body.into_string();
    xml.push('\n');
    xml
}

pub fn render_robots(base: &str, admin_dir: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /{}/\n\nSitemap: {}/sitemap.xml\n",
        admin_dir.trim_matches('/'),
        base
    )
}

/// Write `sitemap.xml` and `robots.txt` into the dist root.
pub fn generate_sitemap(
    layout: &Layout,
    base_url: &str,
    lastmod: NaiveDate,
) -> Result<SitemapReport, SitemapError> {
    let admin = layout.dist.join(&layout.admin_name);
    let urls: Vec<String> = html_files(&layout.dist, &admin)?
        .iter()
        .map(|path| {
            let rel = path.strip_prefix(&layout.dist).unwrap_or(path);
            let rel: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            url_for(&rel.join("/"), base_url, &layout.pages_name)
        })
        .collect();

    fs::write(
        layout.dist.join("sitemap.xml"),
        render_sitemap(&urls, base_url, lastmod),
    )?;
    fs::write(
        layout.dist.join("robots.txt"),
        render_robots(base_url, &layout.admin_name),
    )?;
    log::info!("Sitemap entries: {}", urls.len());

    Ok(SitemapReport {
        base_url: base_url.to_string(),
        urls,
    })
}

/// Resolve the base URL from the environment, config, and CNAME file.
pub fn base_url_for(layout: &Layout, config: &SitemapConfig) -> String {
    let env = std::env::var(BASE_URL_ENV).ok();
    resolve_base_url(
        env.as_deref(),
        config.base_url.as_deref(),
        &layout.root.join(&config.cname),
    )
}
