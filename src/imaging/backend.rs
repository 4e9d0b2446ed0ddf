//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the operations the variant stage
//! needs: identify, and resize to one target or to every target of a source. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize the source and encode it to the output path.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Resize `source` to every target, returning one result per target in
    /// order. Backends that decode should decode `source` only once.
    fn resize_variants(
        &self,
        source: &Path,
        targets: &[ResizeParams],
    ) -> Vec<Result<(), BackendError>> {
        let _ = source;
        targets.iter().map(|params| self.resize(params)).collect()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{OutputFormat, Quality};
    use std::sync::Mutex;

    /// Mock backend that records operations and writes empty output files.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Option<Dimensions>,
        /// Resizes to this format fail instead of writing a file.
        pub fail_format: Option<OutputFormat>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Decode(String),
        Resize {
            source: String,
            output: String,
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                dimensions: Some(Dimensions { width, height }),
                ..Self::default()
            }
        }

        pub fn failing(mut self, format: OutputFormat) -> Self {
            self.fail_format = Some(format);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn decode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Decode(_)))
                .count()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.dimensions
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                quality: params.quality.value(),
            });
            if self.fail_format == Some(params.format) {
                return Err(BackendError::ProcessingFailed("mock encode failure".into()));
            }
            std::fs::write(&params.output, b"")?;
            Ok(())
        }

        fn resize_variants(
            &self,
            source: &Path,
            targets: &[ResizeParams],
        ) -> Vec<Result<(), BackendError>> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(source.to_string_lossy().to_string()));
            targets.iter().map(|params| self.resize(params)).collect()
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(800, 600);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_without_dimensions_fails_identify() {
        let backend = MockBackend::new();
        assert!(backend.identify(Path::new("/x.png")).is_err());
    }

    #[test]
    fn mock_records_resize_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out-480.webp");
        let backend = MockBackend::new();

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 480,
                height: 360,
                format: OutputFormat::WebP,
                quality: Quality::new(80),
            })
            .unwrap();

        assert!(output.exists());
        let ops = backend.get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Resize {
                width: 480,
                height: 360,
                quality: 80,
                ..
            }
        ));
    }

    #[test]
    fn mock_failing_format_errors_without_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out-480.avif");
        let backend = MockBackend::new().failing(OutputFormat::Avif);

        let result = backend.resize(&ResizeParams {
            source: "/source.jpg".into(),
            output: output.clone(),
            width: 480,
            height: 360,
            format: OutputFormat::Avif,
            quality: Quality::default(),
        });

        assert!(result.is_err());
        assert!(!output.exists());
    }
}
