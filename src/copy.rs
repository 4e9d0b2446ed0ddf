//! Output directory reset and static file copying.
//!
//! Stages 0 and 2 of the dist build. Sources are copied verbatim:
//!
//! ```text
//! index.html  → dist/index.html
//! pages/      → dist/pages/
//! assets/     → dist/assets/      (minus assets/data/)
//! admin/      → dist/admin/
//! ```
//!
//! `assets/data/` holds the JSON written by a standalone `sitepress content`
//! run for local development. The full build compiles fresh data straight
//! into `dist/assets/data/`, so the development copy is never shipped.

use crate::config::Layout;
use std::fs;
use std::io;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub dirs: usize,
    pub files: usize,
    pub bytes: u64,
}

impl AddAssign for CopyStats {
    fn add_assign(&mut self, other: Self) {
        self.dirs += other.dirs;
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Per-section results of [`copy_static`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// `(source name, stats)` for each section that existed.
    pub sections: Vec<(String, CopyStats)>,
    /// Source names that were not found.
    pub missing: Vec<String>,
}

impl CopyReport {
    pub fn total(&self) -> CopyStats {
        let mut total = CopyStats::default();
        for (_, stats) in &self.sections {
            total += *stats;
        }
        total
    }
}

/// Remove `dir` with everything in it and recreate it empty.
pub fn clean_output(dir: &Path) -> Result<(), CopyError> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    log::info!("Cleaned {}", dir.display());
    Ok(())
}

/// Recursively copy `src` into `dst`, skipping the `exclude` paths (and
/// everything below them). Directories are created before their contents.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[PathBuf]) -> Result<CopyStats, CopyError> {
    let mut stats = CopyStats::default();
    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !exclude.iter().any(|x| e.path() == x));

    for entry in walker {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            stats.dirs += 1;
        } else {
            stats.bytes += fs::copy(entry.path(), &target)?;
            stats.files += 1;
        }
    }
    Ok(stats)
}

/// Copy the static sources of a project into its output directory.
///
/// Missing sources are reported and skipped.
pub fn copy_static(layout: &Layout) -> Result<CopyReport, CopyError> {
    let mut report = CopyReport::default();
    fs::create_dir_all(&layout.dist)?;

    let index_name = layout
        .index
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if layout.index.is_file() {
        let bytes = fs::copy(&layout.index, layout.dist.join(&index_name))?;
        log::info!("Copied {index_name}");
        report.sections.push((
            index_name,
            CopyStats {
                dirs: 0,
                files: 1,
                bytes,
            },
        ));
    } else {
        log::warn!("{} not found, skipping", layout.index.display());
        report.missing.push(index_name);
    }

    let data_dir = layout.dev_data();
    let sections = [
        (&layout.pages, &layout.pages_name, Vec::new()),
        (&layout.assets, &layout.assets_name, vec![data_dir]),
        (&layout.admin, &layout.admin_name, Vec::new()),
    ];
    for (src, name, exclude) in sections {
        if !src.is_dir() {
            log::warn!("{} not found, skipping", src.display());
            report.missing.push(name.clone());
            continue;
        }
        let stats = copy_tree(src, &layout.dist.join(name), &exclude)?;
        log::info!("Copied {name} ({} files)", stats.files);
        report.sections.push((name.clone(), stats));
    }
    Ok(report)
}
