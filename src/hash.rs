//! Cache-busting asset hashes.
//!
//! Stage 6 of the dist build. Every stylesheet and script under
//! `dist/assets/` is renamed to embed a short content hash, and every page
//! that references it is rewritten to the new name:
//!
//! ```text
//! dist/assets/css/style.css   →  dist/assets/css/style.3f2a9c01be.css
//! <link href="/assets/css/style.css">  →  <link href="/assets/css/style.3f2a9c01be.css">
//! ```
//!
//! The hash is the first ten hex characters of the SHA-256 of the file
//! bytes, so identical content always maps to the same name. Files whose stem
//! already ends in such a hash are left alone, which makes the stage safe to
//! re-run.
//!
//! ## Manifest
//!
//! The original → hashed mapping is written to `dist/assets/manifest.json`,
//! keyed by dist-root paths:
//!
//! ```json
//! {
//!   "/assets/css/style.css": "/assets/css/style.3f2a9c01be.css"
//! }
//! ```
//!
//! An existing manifest is loaded and merged, so hashing in several passes
//! accumulates entries instead of losing them.
//!
//! ## Rewriting
//!
//! The work is two-phase: all renames happen before any page is touched.
//! Pages are rewritten by plain substring replacement of each key without its
//! leading `/`, longest key first. That covers absolute URLs, root-relative
//! and `../`-relative references alike. Pages inside the admin console are
//! never rewritten.

use crate::html::html_files;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

/// Name of the manifest file within the output assets directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Hex characters of the digest embedded in a filename.
const HASH_LEN: usize = 10;

/// Extensions that get hashed.
const HASHED_EXTENSIONS: &[&str] = &["css", "js"];

static HASHED_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[0-9a-f]{10}$").expect("hashed stem regex"));

#[derive(Error, Debug)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Mapping from original asset URL path to its hashed URL path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: BTreeMap<String, String>,
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the assets directory. Returns an empty manifest if the file
    /// doesn't exist or can't be parsed.
    pub fn load(assets_dir: &Path) -> Self {
        let path = assets_dir.join(MANIFEST_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::new(),
        };
        match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("ignoring unreadable manifest {}: {e}", path.display());
                Self::new()
            }
        }
    }

    /// Save to the assets directory, pretty-printed.
    pub fn save(&self, assets_dir: &Path) -> Result<(), HashError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(assets_dir.join(MANIFEST_FILENAME), json)?;
        Ok(())
    }

    pub fn insert(&mut self, original: String, hashed: String) {
        self.entries.insert(original, hashed);
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    /// Add every entry of `other`, replacing existing keys.
    pub fn merge(&mut self, other: AssetManifest) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries ordered by descending key length, so no key is replaced
    /// inside a longer key that contains it.
    fn longest_first(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        pairs
    }
}

/// Counts for the build summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashReport {
    /// Files renamed in this run.
    pub hashed: usize,
    /// Entries in the merged manifest.
    pub manifest_entries: usize,
    /// Pages whose references changed.
    pub pages_rewritten: usize,
}

/// First ten hex characters of the SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LEN);
    hex
}

/// Whether a file stem already carries a content hash.
pub fn is_hashed(stem: &str) -> bool {
    HASHED_STEM.is_match(stem)
}

/// `dir/style.css` + `abc` → `dir/style.abc.css`
pub fn hashed_name(path: &Path, hash: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, hash, ext.to_string_lossy()),
        None => format!("{}.{}", stem, hash),
    };
    path.with_file_name(name)
}

/// `/`-separated URL path of `path` relative to the dist root.
fn url_path(dist_root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(dist_root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    format!("/{}", parts.join("/"))
}

fn is_hashable(path: &Path) -> bool {
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| HASHED_EXTENSIONS.iter().any(|h| h.eq_ignore_ascii_case(e)));
    let stem_hashed = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(is_hashed);
    ext_ok && !stem_hashed
}

/// Rename every unhashed CSS/JS file under `assets_root` and return the
/// mapping for this run.
pub fn hash_assets(assets_root: &Path, dist_root: &Path) -> Result<AssetManifest, HashError> {
    let mut manifest = AssetManifest::new();
    if !assets_root.is_dir() {
        log::warn!("{} not found, nothing to hash", assets_root.display());
        return Ok(manifest);
    }

    let mut targets = Vec::new();
    for entry in WalkDir::new(assets_root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_hashable(entry.path()) {
            targets.push(entry.into_path());
        }
    }

    for path in targets {
        let bytes = fs::read(&path)?;
        let hashed = hashed_name(&path, &content_hash(&bytes));
        fs::rename(&path, &hashed)?;
        let (from, to) = (url_path(dist_root, &path), url_path(dist_root, &hashed));
        log::info!("Hashed {from} → {to}");
        manifest.insert(from, to);
    }
    Ok(manifest)
}

/// Rewrite references in every HTML file under `dist` outside `admin_dir`.
/// Returns the number of files changed.
pub fn rewrite_html(
    dist: &Path,
    manifest: &AssetManifest,
    admin_dir: &Path,
) -> Result<usize, HashError> {
    if manifest.is_empty() {
        return Ok(0);
    }
    let pairs: Vec<(&str, &str)> = manifest
        .longest_first()
        .into_iter()
        .map(|(k, v)| (k.trim_start_matches('/'), v.trim_start_matches('/')))
        .collect();

    let mut changed = 0;
    for path in html_files(dist, admin_dir)? {
        let original = fs::read_to_string(&path)?;
        let mut html = original.clone();
        for (from, to) in &pairs {
            if html.contains(from) {
                html = html.replace(from, to);
            }
        }
        if html != original {
            fs::write(&path, html)?;
            log::debug!("rewrote asset references in {}", path.display());
            changed += 1;
        }
    }
    Ok(changed)
}

/// Hash the assets of a dist tree, merge the manifest, rewrite pages.
pub fn hash_site(dist: &Path, assets_dir: &Path, admin_dir: &Path) -> Result<HashReport, HashError> {
    let fresh = hash_assets(assets_dir, dist)?;
    let hashed = fresh.len();

    let mut manifest = AssetManifest::load(assets_dir);
    manifest.merge(fresh);
    if assets_dir.is_dir() {
        manifest.save(assets_dir)?;
    }

    let pages_rewritten = rewrite_html(dist, &manifest, admin_dir)?;
    Ok(HashReport {
        hashed,
        manifest_entries: manifest.len(),
        pages_rewritten,
    })
}
