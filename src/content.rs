//! Content compilation: markdown front-matter and YAML settings → JSON data.
//!
//! Stage 1 of the dist build. Each content kind lives in its own directory
//! of markdown files whose front-matter carries the record fields:
//!
//! ```text
//! content/
//! ├── websites/acme.md          # → websites.json (all records)
//! ├── news/launch.md            # → news.json (published only)
//! ├── projects/portal.md        # → projects.json (published only)
//! ├── offers/spring-sale.md     # → offers.json (published/active only)
//! ├── services/web-design.md    # → services.json (active/published only)
//! └── settings/
//!     ├── hero.yml              # → hero.json
//!     ├── contact.yml           # → contact.json
//!     └── offers-page.yml       # → offers-page.json
//! ```
//!
//! Every kind is also written unfiltered to `admin/<kind>.json` inside the
//! data directory so the admin console sees drafts.
//!
//! A missing kind directory compiles to an empty array and a missing settings
//! file to `{}`: absent optional content never fails the build. Malformed
//! front-matter does.

use pulldown_cmark::{Event, MetadataBlockKind, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid front-matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Front-matter in {0} is not a key/value mapping")]
    NotAMapping(PathBuf),
    #[error("Invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Publication status of a content record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Published,
    Active,
    Inactive,
    Archived,
}

impl Status {
    /// Parse a front-matter status value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Whether a record with this status belongs on the public site.
    pub fn is_public(self) -> bool {
        matches!(self, Self::Published | Self::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The content kinds, one source directory and one data file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Websites,
    News,
    Projects,
    Offers,
    Services,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        Self::Websites,
        Self::News,
        Self::Projects,
        Self::Offers,
        Self::Services,
    ];

    /// Source directory name under the content root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Websites => "websites",
            Self::News => "news",
            Self::Projects => "projects",
            Self::Offers => "offers",
            Self::Services => "services",
        }
    }

    /// Data file name, e.g. `news.json`.
    pub fn file_name(self) -> String {
        format!("{}.json", self.dir_name())
    }

    /// Whether the public data file is filtered by status.
    pub fn is_filtered(self) -> bool {
        !matches!(self, Self::Websites)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Singleton settings documents: `content/settings/<name>.yml` → `<name>.json`.
pub const SETTINGS: &[&str] = &["hero", "contact", "offers-page"];

/// Link label used when a news item does not set `linkText`.
pub const DEFAULT_LINK_TEXT: &str = "Learn More →";

/// Default website theme.
pub const DEFAULT_THEME: &str = "teal";

// ============================================================================
// Front-matter
// ============================================================================

/// Parsed front-matter: the YAML mapping at the top of a markdown file.
#[derive(Debug, Clone, Default)]
pub struct FrontMatter(serde_yaml::Mapping);

impl FrontMatter {
    fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.0.get(key)
    }

    /// A scalar field rendered as text. Numbers and booleans are stringified;
    /// null, sequences and mappings are treated as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A text field with a fallback for missing or empty values.
    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// A field passed through as JSON, preserving its type.
    pub fn json(&self, key: &str) -> Option<serde_json::Value> {
        let value = self.get(key)?;
        if value.is_null() {
            return None;
        }
        serde_json::to_value(value).ok()
    }

    /// An integer field; numeric strings are accepted.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            serde_yaml::Value::Number(n) => n.as_i64(),
            serde_yaml::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// A list of strings; a single scalar becomes a one-element list.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(serde_yaml::Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| match item {
                    serde_yaml::Value::String(s) => Some(s.clone()),
                    serde_yaml::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(_) => self.text(key).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Record status with a kind-specific default.
    ///
    /// Unknown values are reported and demoted to draft so they never leak
    /// onto the public site.
    pub fn status(&self, default: Status) -> Status {
        match self.text("status").filter(|s| !s.trim().is_empty()) {
            None => default,
            Some(raw) => Status::parse(&raw).unwrap_or_else(|| {
                log::warn!("unknown status '{raw}', treating as draft");
                Status::Draft
            }),
        }
    }
}

/// Extract the YAML front-matter block from a markdown document.
///
/// Returns the raw YAML text, or `None` when the document does not start
/// with a `---` delimited block.
pub fn front_matter_block(markdown: &str) -> Option<String> {
    let parser = Parser::new_ext(markdown, Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    let mut in_block = false;
    let mut yaml = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::MetadataBlock(MetadataBlockKind::YamlStyle)) => in_block = true,
            Event::End(TagEnd::MetadataBlock(_)) => return Some(yaml),
            Event::Text(text) if in_block => yaml.push_str(&text),
            // Front-matter can only open the document.
            _ if !in_block => return None,
            _ => {}
        }
    }
    None
}

/// Parse the front-matter of a markdown document.
///
/// A document without a front-matter block, or with an empty one, yields an
/// empty mapping so every field falls back to its default.
pub fn parse_front_matter(markdown: &str, path: &Path) -> Result<FrontMatter, ContentError> {
    let Some(yaml) = front_matter_block(markdown) else {
        return Ok(FrontMatter::default());
    };
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(&yaml).map_err(|source| ContentError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;
    match value {
        serde_yaml::Value::Mapping(map) => Ok(FrontMatter(map)),
        serde_yaml::Value::Null => Ok(FrontMatter::default()),
        _ => Err(ContentError::NotAMapping(path.to_path_buf())),
    }
}

// ============================================================================
// Records
// ============================================================================

/// A compiled content record.
pub trait Record: Serialize + Sized {
    const KIND: ContentKind;

    /// Build the record from its source id (file stem) and front-matter.
    fn from_source(id: &str, fm: &FrontMatter) -> Self;

    /// `None` for kinds that are never filtered.
    fn status(&self) -> Option<Status>;

    fn is_public(&self) -> bool {
        self.status().is_none_or(Status::is_public)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Website {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub domain: String,
    pub url: String,
    pub theme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Record for Website {
    const KIND: ContentKind = ContentKind::Websites;

    fn from_source(_id: &str, fm: &FrontMatter) -> Self {
        Self {
            slug: fm.text("slug"),
            name: fm.text("name"),
            domain: fm.text_or("domain", ""),
            url: fm.text_or("url", ""),
            theme: fm.text_or("theme", DEFAULT_THEME),
            created_at: fm.text("createdAt"),
        }
    }

    fn status(&self) -> Option<Status> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct News {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub category: String,
    pub badge: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub link_text: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Record for News {
    const KIND: ContentKind = ContentKind::News;

    fn from_source(id: &str, fm: &FrontMatter) -> Self {
        Self {
            id: id.to_string(),
            website: fm.text("website"),
            title: fm.text("title"),
            description: fm.text("description"),
            status: fm.status(Status::Draft),
            category: fm.text_or("category", ""),
            badge: fm.text_or("badge", ""),
            date: fm.text("date"),
            link_text: fm.text_or("linkText", DEFAULT_LINK_TEXT),
            image: fm.text_or("image", ""),
            created_at: fm.text("createdAt"),
        }
    }

    fn status(&self) -> Option<Status> {
        Some(self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub category: String,
    pub client: String,
    pub project_url: String,
    /// Serialized as `null` when absent.
    pub year: Option<serde_json::Value>,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Record for Project {
    const KIND: ContentKind = ContentKind::Projects;

    fn from_source(id: &str, fm: &FrontMatter) -> Self {
        Self {
            id: id.to_string(),
            website: fm.text("website"),
            title: fm.text("title"),
            description: fm.text("description"),
            status: fm.status(Status::Draft),
            category: fm.text_or("category", ""),
            client: fm.text_or("client", ""),
            project_url: fm.text_or("projectUrl", ""),
            year: fm.json("year"),
            image: fm.text_or("image", ""),
            created_at: fm.text("createdAt"),
        }
    }

    fn status(&self) -> Option<Status> {
        Some(self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub category: String,
    pub discount: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Record for Offer {
    const KIND: ContentKind = ContentKind::Offers;

    fn from_source(id: &str, fm: &FrontMatter) -> Self {
        Self {
            id: id.to_string(),
            website: fm.text("website"),
            title: fm.text("title"),
            description: fm.text("description"),
            status: fm.status(Status::Draft),
            category: fm.text_or("category", ""),
            // Older offers carry the amount under `value`.
            discount: fm
                .text("discount")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fm.text_or("value", "")),
            code: fm.text_or("code", ""),
            expiry: fm.text("expiry"),
            image: fm.text_or("image", ""),
            created_at: fm.text("createdAt"),
        }
    }

    fn status(&self) -> Option<Status> {
        Some(self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub icon: String,
    pub order: i64,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Record for Service {
    const KIND: ContentKind = ContentKind::Services;

    fn from_source(id: &str, fm: &FrontMatter) -> Self {
        Self {
            id: id.to_string(),
            website: fm.text("website"),
            title: fm.text("title"),
            description: fm.text("description"),
            status: fm.status(Status::Active),
            icon: fm.text_or("icon", ""),
            order: fm.integer("order").unwrap_or(0),
            features: fm.list("features"),
            created_at: fm.text("createdAt"),
        }
    }

    fn status(&self) -> Option<Status> {
        Some(self.status)
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Per-kind counts for the build summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSummary {
    pub kind: ContentKind,
    pub total: usize,
    pub public: usize,
}

/// Result of a content compile.
#[derive(Debug, Clone)]
pub struct ContentReport {
    pub data_dir: PathBuf,
    pub kinds: Vec<KindSummary>,
    /// Settings documents and whether a source file was found.
    pub settings: Vec<(String, bool)>,
}

/// List the markdown sources of a kind directory, sorted by filename.
fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>, ContentError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "md"))
        .collect();
    files.sort();
    Ok(files)
}

/// Compile every record of one kind from `<content_dir>/<kind>/`.
///
/// A missing directory yields an empty list.
pub fn compile_dir<R: Record>(content_dir: &Path) -> Result<Vec<R>, ContentError> {
    let dir = content_dir.join(R::KIND.dir_name());
    if !dir.is_dir() {
        log::warn!("no {} directory at {}, skipping", R::KIND, dir.display());
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for path in markdown_files(&dir)? {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = fs::read_to_string(&path)?;
        let fm = parse_front_matter(&text, &path)?;
        log::debug!("compiled {}/{}", R::KIND, id);
        records.push(R::from_source(&id, &fm));
    }
    Ok(records)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ContentError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Compile one kind and write its public and admin data files.
fn emit_kind<R: Record>(
    content_dir: &Path,
    data_dir: &Path,
) -> Result<KindSummary, ContentError> {
    let records: Vec<R> = compile_dir(content_dir)?;
    let public: Vec<&R> = records.iter().filter(|r| r.is_public()).collect();

    let file_name = R::KIND.file_name();
    write_json(&data_dir.join(&file_name), &public)?;
    write_json(&data_dir.join("admin").join(&file_name), &records)?;

    Ok(KindSummary {
        kind: R::KIND,
        total: records.len(),
        public: public.len(),
    })
}

/// Locate `<settings_dir>/<name>.yml` or `.yaml`.
fn settings_source(settings_dir: &Path, name: &str) -> Option<PathBuf> {
    ["yml", "yaml"]
        .iter()
        .map(|ext| settings_dir.join(format!("{name}.{ext}")))
        .find(|p| p.is_file())
}

/// Read a settings YAML file as a JSON value (`{}` for an empty file).
pub fn read_settings(path: &Path) -> Result<serde_json::Value, ContentError> {
    let text = fs::read_to_string(path)?;
    let value: serde_json::Value =
        serde_yaml::from_str(&text).map_err(|source| ContentError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value
    })
}

/// Compile all content kinds and settings from `content_dir` into `data_dir`.
pub fn compile(content_dir: &Path, data_dir: &Path) -> Result<ContentReport, ContentError> {
    fs::create_dir_all(data_dir.join("admin"))?;

    let kinds = vec![
        emit_kind::<Website>(content_dir, data_dir)?,
        emit_kind::<News>(content_dir, data_dir)?,
        emit_kind::<Project>(content_dir, data_dir)?,
        emit_kind::<Offer>(content_dir, data_dir)?,
        emit_kind::<Service>(content_dir, data_dir)?,
    ];

    let settings_dir = content_dir.join("settings");
    let mut settings = Vec::new();
    for name in SETTINGS {
        let (value, found) = match settings_source(&settings_dir, name) {
            Some(path) => (read_settings(&path)?, true),
            None => {
                log::debug!("no {name} settings, writing empty object");
                (serde_json::Value::Object(Default::default()), false)
            }
        };
        write_json(&data_dir.join(format!("{name}.json")), &value)?;
        settings.push((name.to_string(), found));
    }

    Ok(ContentReport {
        data_dir: data_dir.to_path_buf(),
        kinds,
        settings,
    })
}
