//! In-place CSS/JS minification of the output assets.
//!
//! Stage 5 of the dist build. Filenames never change here (hashing comes
//! later), so no page needs rewriting. Tiny files stay readable and a file
//! is only overwritten when minification actually shrinks it.

use crate::config::MinifyConfig;
use crate::minify::{minify_css, minify_js};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum MinifyError {
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Css,
    Js,
}

impl AssetKind {
    /// Subdirectory of the assets root holding this kind.
    fn dir(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
        }
    }

    fn extension(self) -> &'static str {
        self.dir()
    }

    fn minify(self, source: &str) -> String {
        match self {
            Self::Css => minify_css(source),
            Self::Js => minify_js(source),
        }
    }
}

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Minified { saved: usize },
    Tiny,
    NoGain,
}

/// Counts for the build summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifyReport {
    pub minified: usize,
    pub tiny: usize,
    pub no_gain: usize,
    pub failed: usize,
    pub bytes_saved: usize,
}

impl MinifyReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Minified { saved } => {
                self.minified += 1;
                self.bytes_saved += saved;
            }
            FileOutcome::Tiny => self.tiny += 1,
            FileOutcome::NoGain => self.no_gain += 1,
        }
    }
}

/// Minify one file in place.
pub fn minify_file(path: &Path, kind: AssetKind, min_chars: usize) -> std::io::Result<FileOutcome> {
    let original = fs::read_to_string(path)?;
    if original.chars().count() < min_chars {
        return Ok(FileOutcome::Tiny);
    }
    let minified = kind.minify(&original);
    if minified.len() < original.len() {
        fs::write(path, &minified)?;
        Ok(FileOutcome::Minified {
            saved: original.len() - minified.len(),
        })
    } else {
        Ok(FileOutcome::NoGain)
    }
}

fn files_of_kind(assets_root: &Path, kind: AssetKind) -> Result<Vec<PathBuf>, walkdir::Error> {
    let dir = assets_root.join(kind.dir());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let matches = entry
            .path()
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(kind.extension()));
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Minify every stylesheet under `css/` and script under `js/`.
pub fn minify_assets(assets_root: &Path, config: &MinifyConfig) -> Result<MinifyReport, MinifyError> {
    let mut report = MinifyReport::default();
    for kind in [AssetKind::Css, AssetKind::Js] {
        for path in files_of_kind(assets_root, kind)? {
            let name = path.strip_prefix(assets_root).unwrap_or(&path).display().to_string();
            match minify_file(&path, kind, config.min_chars) {
                Ok(outcome) => {
                    match outcome {
                        FileOutcome::Minified { saved } => {
                            log::info!("Minified {name} ({saved} bytes saved)")
                        }
                        FileOutcome::Tiny => log::debug!("{name} is tiny, left as is"),
                        FileOutcome::NoGain => log::debug!("{name}: no size gain"),
                    }
                    report.record(outcome);
                }
                Err(e) => {
                    log::warn!("cannot minify {name}: {e}");
                    report.failed += 1;
                }
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn padded_css() -> String {
        let mut css = String::from("/* site styles */\n");
        for i in 0..10 {
            css.push_str(&format!(".item-{i} {{\n    color: red;\n    margin: 0;\n}}\n"));
        }
        css
    }

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn large_css_minified_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("css/main.css");
        write(&path, padded_css().as_bytes());

        let report = minify_assets(tmp.path(), &MinifyConfig::default()).unwrap();

        assert_eq!(report.minified, 1);
        let out = fs::read_to_string(&path).unwrap();
        assert!(out.starts_with(".item-0{color:red;margin:0}.item-1{"));
        assert_eq!(report.bytes_saved, padded_css().len() - out.len());
    }

    #[test]
    fn tiny_files_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("js/config.js");
        let source = "// config\nwindow.X = 1;\n";
        write(&path, source.as_bytes());

        let report = minify_assets(tmp.path(), &MinifyConfig::default()).unwrap();

        assert_eq!(report.tiny, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn already_minified_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("css/min.css");
        let source = ".a{color:red}".repeat(30);
        write(&path, source.as_bytes());

        assert_eq!(
            minify_file(&path, AssetKind::Css, 200).unwrap(),
            FileOutcome::NoGain
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn js_minified_and_nested_dirs_walked() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("js/vendor/app.js");
        let source = "function f() {\n    // explain\n    return 1;\n}\n".repeat(10);
        write(&path, source.as_bytes());

        let report = minify_assets(tmp.path(), &MinifyConfig::default()).unwrap();

        assert_eq!(report.minified, 1);
        let out = fs::read_to_string(&path).unwrap();
        assert!(out.starts_with("function f(){\nreturn 1;\n}\n"));
    }

    #[test]
    fn invalid_utf8_counted_and_batch_continues() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("css/a-broken.css"), &[0xff; 300]);
        write(&tmp.path().join("css/b-good.css"), padded_css().as_bytes());

        let report = minify_assets(tmp.path(), &MinifyConfig::default()).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.minified, 1);
    }

    #[test]
    fn non_utf8_script_left_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let css_path = tmp.path().join("css/main.css");
        let js_path = tmp.path().join("js/legacy.js");
        let mut latin1 = b"// caf\xe9 menu\nvar label = 'd\xe9j\xe0 vu';\n".repeat(10);
        latin1.extend_from_slice(&[0xfe, 0xff]);
        write(&css_path, padded_css().as_bytes());
        write(&js_path, &latin1);

        let report = minify_assets(tmp.path(), &MinifyConfig::default()).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.minified, 1);
        assert!(fs::read_to_string(&css_path).unwrap().len() < padded_css().len());
        assert_eq!(fs::read(&js_path).unwrap(), latin1);
    }

    #[test]
    fn other_files_ignored() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("css/notes.txt"), padded_css().as_bytes());
        write(&tmp.path().join("main.css"), padded_css().as_bytes());

        let report = minify_assets(tmp.path(), &MinifyConfig::default()).unwrap();

        assert_eq!(report, MinifyReport::default());
    }
}
