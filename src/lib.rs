//! # Sitepress
//!
//! Content compiler and production build pipeline for a static marketing
//! site. Editors write markdown records with YAML front-matter; the site's
//! pages read the compiled JSON. The build turns the hand-written sources
//! into an optimized tree ready to deploy.
//!
//! # Architecture: Staged Build
//!
//! Every stage reads and writes the filesystem, so each one can also be run
//! on its own from the CLI:
//!
//! ```text
//! 0. Clean     dist/                  removed and recreated
//! 1. Content   content/  →  dist/assets/data/*.json
//! 2. Copy      index.html, pages/, assets/, admin/  →  dist/
//! 3. Images    dist/assets/images  →  <name>-<width>.{avif,webp}
//! 4. HTML      critical CSS inlined, stylesheet deferred, pages minified
//! 5. Minify    dist/assets/{css,js}
//! 6. Hash      assets renamed to <name>.<hash>.<ext>, references rewritten
//! 7. Sitemap   dist/sitemap.xml, dist/robots.txt
//! ```
//!
//! Stages 0, 1, 2 and 5 are essential. Stages 3, 4, 6 and 7 are optional:
//! a failure there is reported as skipped and the build still succeeds.
//! The admin subtree is copied but never transformed, hashed or listed.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `sitepress.toml` loading, validation, merging over stock defaults, project [`config::Layout`] |
//! | [`content`] | Front-matter parsing and per-kind record compilation into JSON |
//! | [`store`] | Read-side queries over compiled JSON with filtering and date ordering |
//! | [`copy`] | Output reset and verbatim static copying |
//! | [`imaging`] | Pure-Rust image operations behind the [`imaging::ImageBackend`] trait |
//! | [`optimize`] | Width-variant planning and parallel generation |
//! | [`html`] | Critical CSS extraction and per-page HTML transform |
//! | [`minify`] | Conservative CSS, JS and HTML minifiers |
//! | [`assets`] | In-place CSS/JS minification of the output assets |
//! | [`hash`] | Content hashing, the asset manifest, and reference rewriting |
//! | [`sitemap`] | Base URL resolution, `sitemap.xml` and `robots.txt` |
//! | [`pipeline`] | The stage sequence and its skip policy |
//! | [`output`] | CLI output formatting for every stage report |
//!
//! # Design Decisions
//!
//! ## Data Lives Next to the Pages
//!
//! The full build compiles content straight into `dist/assets/data/`. A
//! standalone `sitepress content` run writes the same files into
//! `assets/data/` for local development, and the copy stage leaves that
//! directory behind so the development copy is never shipped.
//!
//! ## Re-runnable Hashing
//!
//! Asset names carry the first ten hex digits of their SHA-256. A file that
//! already carries a hash is left alone, so hashing twice is harmless. The
//! manifest maps `/assets/...` paths to their hashed names and is merged with
//! any manifest already on disk.
//!
//! ## Maud for Markup
//!
//! The preload block and the sitemap are rendered with
//! [Maud](https://maud.lambda.xyz/), so every interpolated URL is escaped.

pub mod assets;
pub mod config;
pub mod content;
pub mod copy;
pub mod hash;
pub mod html;
pub mod imaging;
pub mod minify;
pub mod optimize;
pub mod output;
pub mod pipeline;
pub mod sitemap;
pub mod store;
