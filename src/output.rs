//! CLI output formatting for all pipeline stages.
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: they only look at the report they are given.
//!
//! Every report follows the same two-level shape: a header line naming the
//! stage result, then indented detail lines. Counts that are zero are left
//! out so a clean run stays short.
//!
//! # Output Format
//!
//! ## Content
//!
//! ```text
//! Content → dist/assets/data
//!     websites: 2 records
//!     news: 5 records (3 public)
//!     settings: hero, contact (missing: offers-page)
//! ```
//!
//! ## Copy
//!
//! ```text
//! Copied 42 files (1.3 MB)
//!     index.html: 1 file
//!     pages: 6 files
//!     assets: 35 files
//!     missing: admin
//! ```
//!
//! ## Images
//!
//! ```text
//! Images: 12 sources
//!     created: 60
//!     existing: 12
//!     below threshold: 3
//! ```
//!
//! ## Build
//!
//! The build summary prints each stage in order, then the stages that were
//! skipped:
//!
//! ```text
//! Skipped
//!     Sitemap generation: IO error: permission denied
//! ```
//!
//! ## List
//!
//! ```text
//! 001 Spring launch
//!     Id: spring-launch
//!     Status: published
//!     Date: 2024-03-01
//! ```

use crate::assets::MinifyReport;
use crate::content::{ContentKind, ContentReport};
use crate::copy::{CopyReport, CopyStats};
use crate::hash::HashReport;
use crate::html::HtmlReport;
use crate::optimize::ImageReport;
use crate::pipeline::BuildReport;
use crate::sitemap::SitemapReport;

/// Format a 1-based index as a zero-padded 3-digit string.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Indentation prefix for a given depth (4 spaces per level).
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Human-readable byte size: `512 B`, `4.2 KB`, `1.3 MB`.
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

/// `label: count` detail lines, skipping zero counts.
fn counts(pairs: &[(&str, usize)]) -> Vec<String> {
    pairs
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(label, n)| format!("{}{}: {}", indent(1), label, n))
        .collect()
}

// ============================================================================
// Content
// ============================================================================

pub fn format_content_report(report: &ContentReport) -> Vec<String> {
    let mut lines = vec![format!("Content \u{2192} {}", report.data_dir.display())];
    for kind in &report.kinds {
        let records = plural(kind.total, "record");
        if kind.kind.is_filtered() {
            lines.push(format!(
                "{}{}: {} ({} public)",
                indent(1),
                kind.kind,
                records,
                kind.public
            ));
        } else {
            lines.push(format!("{}{}: {}", indent(1), kind.kind, records));
        }
    }

    let found: Vec<&str> = report
        .settings
        .iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| name.as_str())
        .collect();
    let missing: Vec<&str> = report
        .settings
        .iter()
        .filter(|(_, present)| !*present)
        .map(|(name, _)| name.as_str())
        .collect();
    if !report.settings.is_empty() {
        let mut line = format!("{}settings: {}", indent(1), found.join(", "));
        if !missing.is_empty() {
            if !found.is_empty() {
                line.push(' ');
            }
            line.push_str(&format!("(missing: {})", missing.join(", ")));
        }
        lines.push(line);
    }
    lines
}

pub fn print_content_report(report: &ContentReport) {
    for line in format_content_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Copy
// ============================================================================

fn section_line(name: &str, stats: &CopyStats) -> String {
    format!("{}{}: {}", indent(1), name, plural(stats.files, "file"))
}

pub fn format_copy_report(report: &CopyReport) -> Vec<String> {
    let total = report.total();
    let mut lines = vec![format!(
        "Copied {} ({})",
        plural(total.files, "file"),
        format_bytes(total.bytes)
    )];
    for (name, stats) in &report.sections {
        lines.push(section_line(name, stats));
    }
    if !report.missing.is_empty() {
        lines.push(format!("{}missing: {}", indent(1), report.missing.join(", ")));
    }
    lines
}

pub fn print_copy_report(report: &CopyReport) {
    for line in format_copy_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Images
// ============================================================================

pub fn format_image_report(report: &ImageReport) -> Vec<String> {
    let mut lines = vec![format!("Images: {}", plural(report.sources, "source"))];
    lines.extend(counts(&[
        ("created", report.created),
        ("existing", report.existing),
        ("below threshold", report.below_threshold),
        ("failed", report.failed),
    ]));
    lines
}

pub fn print_image_report(report: &ImageReport) {
    for line in format_image_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// HTML
// ============================================================================

pub fn format_html_report(report: &HtmlReport) -> Vec<String> {
    let mut lines = vec![format!(
        "HTML: {} transformed ({} chars critical CSS)",
        plural(report.transformed, "page"),
        report.critical_chars
    )];
    lines.extend(counts(&[
        ("unchanged", report.unchanged),
        ("failed", report.failed),
    ]));
    lines
}

pub fn print_html_report(report: &HtmlReport) {
    for line in format_html_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Minify
// ============================================================================

pub fn format_minify_report(report: &MinifyReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Minified {} (saved {})",
        plural(report.minified, "file"),
        format_bytes(report.bytes_saved as u64)
    )];
    lines.extend(counts(&[
        ("too small", report.tiny),
        ("no gain", report.no_gain),
        ("failed", report.failed),
    ]));
    lines
}

pub fn print_minify_report(report: &MinifyReport) {
    for line in format_minify_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Hash
// ============================================================================

pub fn format_hash_report(report: &HashReport) -> Vec<String> {
    vec![
        format!("Hashed {}", plural(report.hashed, "asset")),
        format!("{}manifest: {} entries", indent(1), report.manifest_entries),
        format!(
            "{}rewritten: {}",
            indent(1),
            plural(report.pages_rewritten, "page")
        ),
    ]
}

pub fn print_hash_report(report: &HashReport) {
    for line in format_hash_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Sitemap
// ============================================================================

pub fn format_sitemap_report(report: &SitemapReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Sitemap: {} \u{2192} {}",
        plural(report.urls.len(), "URL"),
        report.base_url
    )];
    for url in &report.urls {
        lines.push(format!("{}{}", indent(1), url));
    }
    lines
}

pub fn print_sitemap_report(report: &SitemapReport) {
    for line in format_sitemap_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format the summary of a full build: every stage that ran, in order,
/// followed by the stages that were skipped.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = format_content_report(&report.content);
    lines.extend(format_copy_report(&report.copy));
    if let Some(images) = &report.images {
        lines.extend(format_image_report(images));
    }
    if let Some(html) = &report.html {
        lines.extend(format_html_report(html));
    }
    lines.extend(format_minify_report(&report.minify));
    if let Some(hash) = &report.hash {
        lines.extend(format_hash_report(hash));
    }
    if let Some(sitemap) = &report.sitemap {
        lines.push(format!(
            "Sitemap: {} \u{2192} {}",
            plural(sitemap.urls.len(), "URL"),
            sitemap.base_url
        ));
    }
    if !report.skipped.is_empty() {
        lines.push("Skipped".to_string());
        for (stage, error) in &report.skipped {
            lines.push(format!("{}{}: {}", indent(1), stage, error));
        }
    }
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// List
// ============================================================================

fn field<'a>(record: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Format a queried record list, one entity per record.
///
/// Records lead with their position and display name; identity, status and
/// date follow as context lines when present.
pub fn format_list(kind: ContentKind, records: &serde_json::Value) -> Vec<String> {
    let items = records.as_array().map(Vec::as_slice).unwrap_or_default();
    if items.is_empty() {
        return vec![format!("No {kind} found")];
    }

    let mut lines = Vec::new();
    for (i, record) in items.iter().enumerate() {
        let id = field(record, "id").or_else(|| field(record, "slug"));
        let name = field(record, "title")
            .or_else(|| field(record, "name"))
            .or(id)
            .unwrap_or("(untitled)");
        lines.push(format!("{} {}", format_index(i + 1), name));
        if let Some(id) = id {
            lines.push(format!("{}Id: {}", indent(1), id));
        }
        if let Some(status) = field(record, "status") {
            lines.push(format!("{}Status: {}", indent(1), status));
        }
        if let Some(date) = field(record, "date").or_else(|| field(record, "createdAt")) {
            lines.push(format!("{}Date: {}", indent(1), date));
        }
    }
    lines
}

pub fn print_list(kind: ContentKind, records: &serde_json::Value) {
    for line in format_list(kind, records) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::KindSummary;
    use serde_json::json;
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn plural_handles_one() {
        assert_eq!(plural(1, "file"), "1 file");
        assert_eq!(plural(0, "file"), "0 files");
        assert_eq!(plural(3, "file"), "3 files");
    }

    #[test]
    fn format_bytes_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    // =========================================================================
    // Stage report tests
    // =========================================================================

    #[test]
    fn content_report_lists_kinds_and_settings() {
        let report = ContentReport {
            data_dir: PathBuf::from("dist/assets/data"),
            kinds: vec![
                KindSummary {
                    kind: ContentKind::Websites,
                    total: 1,
                    public: 1,
                },
                KindSummary {
                    kind: ContentKind::News,
                    total: 5,
                    public: 3,
                },
            ],
            settings: vec![("hero".into(), true), ("contact".into(), false)],
        };
        let lines = format_content_report(&report);
        assert_eq!(lines[0], "Content \u{2192} dist/assets/data");
        assert_eq!(lines[1], "    websites: 1 record");
        assert_eq!(lines[2], "    news: 5 records (3 public)");
        assert_eq!(lines[3], "    settings: hero (missing: contact)");
    }

    #[test]
    fn copy_report_shows_sections_and_missing() {
        let report = CopyReport {
            sections: vec![
                (
                    "index.html".into(),
                    CopyStats {
                        dirs: 0,
                        files: 1,
                        bytes: 100,
                    },
                ),
                (
                    "pages".into(),
                    CopyStats {
                        dirs: 1,
                        files: 2,
                        bytes: 2000,
                    },
                ),
            ],
            missing: vec!["admin".into()],
        };
        let lines = format_copy_report(&report);
        assert_eq!(
            lines,
            vec![
                "Copied 3 files (2.0 KB)",
                "    index.html: 1 file",
                "    pages: 2 files",
                "    missing: admin",
            ]
        );
    }

    #[test]
    fn image_report_omits_zero_counts() {
        let report = ImageReport {
            sources: 2,
            created: 10,
            ..Default::default()
        };
        assert_eq!(
            format_image_report(&report),
            vec!["Images: 2 sources", "    created: 10"]
        );
    }

    #[test]
    fn minify_report_summarizes_savings() {
        let report = MinifyReport {
            minified: 2,
            tiny: 1,
            bytes_saved: 300,
            ..Default::default()
        };
        assert_eq!(
            format_minify_report(&report),
            vec!["Minified 2 files (saved 300 B)", "    too small: 1"]
        );
    }

    #[test]
    fn sitemap_report_lists_urls() {
        let report = SitemapReport {
            base_url: "https://acme.test".into(),
            urls: vec!["https://acme.test/".into()],
        };
        assert_eq!(
            format_sitemap_report(&report),
            vec!["Sitemap: 1 URL \u{2192} https://acme.test", "    https://acme.test/"]
        );
    }

    #[test]
    fn build_report_lists_skipped_stages() {
        let report = BuildReport {
            content: ContentReport {
                data_dir: PathBuf::from("d"),
                kinds: vec![],
                settings: vec![],
            },
            copy: CopyReport::default(),
            images: None,
            html: None,
            minify: MinifyReport::default(),
            hash: None,
            sitemap: None,
            skipped: vec![("Hashing".into(), "disk full".into())],
        };
        let lines = format_build_report(&report);
        let tail = &lines[lines.len() - 2..];
        assert_eq!(tail, ["Skipped", "    Hashing: disk full"]);
        assert!(!lines.iter().any(|l| l.starts_with("Images")));
    }

    // =========================================================================
    // List tests
    // =========================================================================

    #[test]
    fn list_shows_identity_and_context() {
        let records = json!([
            {"id": "launch", "title": "Spring launch", "status": "published", "date": "2024-03-01"},
            {"slug": "acme", "name": "Acme", "createdAt": "2024-01-01"}
        ]);
        let lines = format_list(ContentKind::News, &records);
        assert_eq!(
            lines,
            vec![
                "001 Spring launch",
                "    Id: launch",
                "    Status: published",
                "    Date: 2024-03-01",
                "002 Acme",
                "    Id: acme",
                "    Date: 2024-01-01",
            ]
        );
    }

    #[test]
    fn list_falls_back_to_id() {
        let records = json!([{"id": "only-id"}]);
        let lines = format_list(ContentKind::Services, &records);
        assert_eq!(lines[0], "001 only-id");
    }

    #[test]
    fn empty_list() {
        assert_eq!(
            format_list(ContentKind::Offers, &json!([])),
            vec!["No offers found"]
        );
    }
}
