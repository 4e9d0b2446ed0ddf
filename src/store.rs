//! Read side of the compiled content.
//!
//! The site's pages query the JSON written by [`crate::content::compile`].
//! [`ContentStore`] is that query layer: it loads each data file at most
//! once per store (a session), then filters and orders records on request.
//!
//! ```no_run
//! use sitepress::store::{ContentQuery, ContentStore};
//!
//! let mut store = ContentStore::new("dist/assets/data");
//! let latest = store.news(&ContentQuery::new().website("acme").limit(3));
//! for item in latest {
//!     println!("{:?}", item.title);
//! }
//! ```
//!
//! Missing or unparsable files are logged and read as empty lists; a page
//! with no data renders empty instead of failing.

use crate::content::{ContentKind, News, Offer, Project, Service, Status, Website};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Fields a query can filter and sort on.
pub trait Listing {
    fn website_slug(&self) -> Option<&str>;
    fn current_status(&self) -> Status;
    fn category_name(&self) -> Option<&str> {
        None
    }
    /// `date`, or `createdAt` when there is no date.
    fn sort_date(&self) -> Option<&str>;
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Listing for News {
    fn website_slug(&self) -> Option<&str> {
        self.website.as_deref()
    }
    fn current_status(&self) -> Status {
        self.status
    }
    fn category_name(&self) -> Option<&str> {
        Some(&self.category)
    }
    fn sort_date(&self) -> Option<&str> {
        non_empty(&self.date).or(non_empty(&self.created_at))
    }
}

impl Listing for Project {
    fn website_slug(&self) -> Option<&str> {
        self.website.as_deref()
    }
    fn current_status(&self) -> Status {
        self.status
    }
    fn category_name(&self) -> Option<&str> {
        Some(&self.category)
    }
    fn sort_date(&self) -> Option<&str> {
        non_empty(&self.created_at)
    }
}

impl Listing for Offer {
    fn website_slug(&self) -> Option<&str> {
        self.website.as_deref()
    }
    fn current_status(&self) -> Status {
        self.status
    }
    fn category_name(&self) -> Option<&str> {
        Some(&self.category)
    }
    fn sort_date(&self) -> Option<&str> {
        non_empty(&self.created_at)
    }
}

impl Listing for Service {
    fn website_slug(&self) -> Option<&str> {
        self.website.as_deref()
    }
    fn current_status(&self) -> Status {
        self.status
    }
    fn sort_date(&self) -> Option<&str> {
        non_empty(&self.created_at)
    }
}

/// Parse a date as authored in front-matter: `2024-01-01`, RFC 3339, or a
/// naive `2024-01-01T10:00:00`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Record filters. Every filter is optional; results are newest first
/// unless [`ContentQuery::unsorted`] is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub website: Option<String>,
    pub status: Option<Status>,
    pub category: Option<String>,
    pub sort_by_date: bool,
    pub limit: Option<usize>,
}

impl Default for ContentQuery {
    fn default() -> Self {
        Self {
            website: None,
            status: None,
            category: None,
            sort_by_date: true,
            limit: None,
        }
    }
}

impl ContentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn website(mut self, slug: impl Into<String>) -> Self {
        self.website = Some(slug.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn unsorted(mut self) -> Self {
        self.sort_by_date = false;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches<T: Listing>(&self, item: &T) -> bool {
        let website_ok = self
            .website
            .as_deref()
            .is_none_or(|w| item.website_slug() == Some(w));
        let status_ok = self.status.is_none_or(|s| item.current_status() == s);
        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|c| item.category_name() == Some(c));
        website_ok && status_ok && category_ok
    }

    /// Filter, order, and truncate `items`.
    pub fn apply<T: Listing>(&self, mut items: Vec<T>) -> Vec<T> {
        items.retain(|item| self.matches(item));
        if self.sort_by_date {
            // Stable; undated records sink to the end.
            items.sort_by_cached_key(|item| {
                std::cmp::Reverse(item.sort_date().and_then(parse_timestamp))
            });
        }
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }
}

/// Cached reader over a data directory.
#[derive(Debug)]
pub struct ContentStore {
    data_dir: PathBuf,
    cache: HashMap<String, serde_json::Value>,
}

impl ContentStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Forget every loaded file.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Load a data file, from the cache when possible. Failed loads are not
    /// cached.
    fn load(&mut self, file: &str) -> Option<&serde_json::Value> {
        if !self.cache.contains_key(file) {
            let path = self.data_dir.join(file);
            let text = match fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("cannot read {}: {e}", path.display());
                    return None;
                }
            };
            let value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("cannot parse {}: {e}", path.display());
                    return None;
                }
            };
            self.cache.insert(file.to_string(), value);
        }
        self.cache.get(file)
    }

    fn records<R: DeserializeOwned>(&mut self, kind: ContentKind) -> Vec<R> {
        let file = kind.file_name();
        let Some(value) = self.load(&file) else {
            return Vec::new();
        };
        match Vec::<R>::deserialize(value) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("unexpected shape in {file}: {e}");
                Vec::new()
            }
        }
    }

    pub fn websites(&mut self) -> Vec<Website> {
        self.records(ContentKind::Websites)
    }

    pub fn website(&mut self, slug: &str) -> Option<Website> {
        self.websites()
            .into_iter()
            .find(|w| w.slug.as_deref() == Some(slug))
    }

    pub fn news(&mut self, query: &ContentQuery) -> Vec<News> {
        query.apply(self.records(ContentKind::News))
    }

    pub fn projects(&mut self, query: &ContentQuery) -> Vec<Project> {
        query.apply(self.records(ContentKind::Projects))
    }

    pub fn offers(&mut self, query: &ContentQuery) -> Vec<Offer> {
        query.apply(self.records(ContentKind::Offers))
    }

    pub fn services(&mut self, query: &ContentQuery) -> Vec<Service> {
        query.apply(self.records(ContentKind::Services))
    }

    /// Query any kind, as JSON. Websites are only filtered by `limit`.
    pub fn list(
        &mut self,
        kind: ContentKind,
        query: &ContentQuery,
    ) -> Result<serde_json::Value, serde_json::Error> {
        fn to_json<T: Serialize>(items: Vec<T>) -> Result<serde_json::Value, serde_json::Error> {
            serde_json::to_value(items)
        }
        match kind {
            ContentKind::Websites => {
                let mut sites = self.websites();
                if let Some(limit) = query.limit {
                    sites.truncate(limit);
                }
                to_json(sites)
            }
            ContentKind::News => to_json(self.news(query)),
            ContentKind::Projects => to_json(self.projects(query)),
            ContentKind::Offers => to_json(self.offers(query)),
            ContentKind::Services => to_json(self.services(query)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn news(id: &str, website: &str, category: &str, date: Option<&str>, created: Option<&str>) -> News {
        News {
            id: id.to_string(),
            website: Some(website.to_string()),
            category: category.to_string(),
            status: Status::Published,
            date: date.map(String::from),
            created_at: created.map(String::from),
            ..News::default()
        }
    }

    fn ids(items: &[News]) -> Vec<&str> {
        items.iter().map(|n| n.id.as_str()).collect()
    }

    // =========================================================================
    // Date parsing
    // =========================================================================

    #[test]
    fn timestamps_in_authored_formats() {
        let day = parse_timestamp("2024-01-01").unwrap();
        assert_eq!(day.to_string(), "2024-01-01 00:00:00");

        let rfc = parse_timestamp("2024-01-01T12:00:00Z").unwrap();
        assert!(rfc > day);

        assert!(parse_timestamp("2024-01-01T08:30:00").is_some());
        assert!(parse_timestamp("next tuesday").is_none());
    }

    // =========================================================================
    // Query
    // =========================================================================

    #[test]
    fn sorts_newest_first_falling_back_to_created_at() {
        let items = vec![
            news("old", "a", "", Some("2023-05-01"), None),
            news("created", "a", "", None, Some("2024-03-01T00:00:00Z")),
            news("new", "a", "", Some("2024-06-01"), Some("2020-01-01")),
            news("undated", "a", "", None, None),
        ];

        let sorted = ContentQuery::new().apply(items);

        assert_eq!(ids(&sorted), vec!["new", "created", "old", "undated"]);
    }

    #[test]
    fn filters_combine() {
        let items = vec![
            news("a1", "acme", "promo", Some("2024-01-01"), None),
            news("a2", "acme", "update", Some("2024-01-02"), None),
            news("b1", "beta", "promo", Some("2024-01-03"), None),
        ];

        let result = ContentQuery::new().website("acme").category("promo").apply(items);

        assert_eq!(ids(&result), vec!["a1"]);
    }

    #[test]
    fn unsorted_keeps_file_order_and_limit_truncates() {
        let items = vec![
            news("x", "a", "", Some("2020-01-01"), None),
            news("y", "a", "", Some("2024-01-01"), None),
            news("z", "a", "", Some("2022-01-01"), None),
        ];

        let result = ContentQuery::new().unsorted().limit(2).apply(items);

        assert_eq!(ids(&result), vec!["x", "y"]);
    }

    #[test]
    fn status_filter() {
        let mut draft = news("d", "a", "", None, None);
        draft.status = Status::Draft;
        let items = vec![draft, news("p", "a", "", None, None)];

        let result = ContentQuery::new().status(Status::Draft).apply(items);

        assert_eq!(ids(&result), vec!["d"]);
    }

    // =========================================================================
    // Store
    // =========================================================================

    fn compiled_store() -> (TempDir, ContentStore) {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("content");
        write(&src, "websites/acme.md", "---\nslug: acme\nname: Acme\n---\n");
        write(
            &src,
            "news/launch.md",
            "---\nstatus: published\ntitle: Launch\nwebsite: acme\ndate: 2024-01-01\n---\n",
        );
        write(
            &src,
            "news/later.md",
            "---\nstatus: published\ntitle: Later\nwebsite: acme\ndate: 2024-02-01\n---\n",
        );
        write(&src, "news/hidden.md", "---\ntitle: Hidden\n---\n");
        write(&src, "services/design.md", "---\ntitle: Design\n---\n");
        let data = tmp.path().join("data");
        content::compile(&src, &data).unwrap();
        (tmp, ContentStore::new(data))
    }

    #[test]
    fn reads_compiled_public_records() {
        let (_tmp, mut store) = compiled_store();

        let items = store.news(&ContentQuery::new());

        let titles: Vec<_> = items.iter().map(|n| n.title.as_deref().unwrap()).collect();
        assert_eq!(titles, vec!["Later", "Launch"]);
        assert_eq!(store.services(&ContentQuery::new()).len(), 1);
    }

    #[test]
    fn website_lookup_by_slug() {
        let (_tmp, mut store) = compiled_store();

        assert_eq!(store.website("acme").unwrap().name.as_deref(), Some("Acme"));
        assert!(store.website("nope").is_none());
    }

    #[test]
    fn loaded_files_are_cached_for_the_session() {
        let (tmp, mut store) = compiled_store();
        assert_eq!(store.news(&ContentQuery::new()).len(), 2);

        fs::write(tmp.path().join("data/news.json"), "[]").unwrap();
        assert_eq!(store.news(&ContentQuery::new()).len(), 2);

        store.clear();
        assert!(store.news(&ContentQuery::new()).is_empty());
    }

    #[test]
    fn missing_and_corrupt_files_read_as_empty() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "offers.json", "{ not json");
        let mut store = ContentStore::new(tmp.path());

        assert!(store.projects(&ContentQuery::new()).is_empty());
        assert!(store.offers(&ContentQuery::new()).is_empty());

        // A fixed file is picked up: failures are not cached.
        write(tmp.path(), "offers.json", r#"[{"id":"spring","status":"active"}]"#);
        assert_eq!(store.offers(&ContentQuery::new()).len(), 1);
    }

    #[test]
    fn list_renders_json() {
        let (_tmp, mut store) = compiled_store();

        let value = store
            .list(ContentKind::News, &ContentQuery::new().limit(1))
            .unwrap();

        assert_eq!(value[0]["title"], "Later");
        assert_eq!(value.as_array().unwrap().len(), 1);
    }
}
