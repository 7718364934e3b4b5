//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and fit.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate for decoding and resizing and `libwebp` (through the `webp` crate)
//! for encoding.

use super::params::FitParams;
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
/// `Sync` because variant generation runs inside rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the source, canvas-fit it into the target box, and write it
    /// as WebP to `params.output`.
    fn fit(&self, params: &FitParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::WebpSettings;
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Shared across rayon workers, hence the mutexes.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Write an empty file at each fit output, so existence checks see it.
        pub touch_outputs: bool,
        /// Widths whose fit call fails.
        pub fail_widths: Vec<u32>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Fit {
            source: String,
            output: String,
            width: u32,
            height: u32,
            quality: u32,
            method: u32,
            lossless: bool,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::default()
            }
        }

        /// A mock whose fit calls create their output files.
        pub fn touching() -> Self {
            Self {
                touch_outputs: true,
                ..Self::default()
            }
        }

        pub fn failing(widths: Vec<u32>) -> Self {
            Self {
                touch_outputs: true,
                fail_widths: widths,
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn fit_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Fit { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn fit(&self, params: &FitParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Fit {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                quality: params.encoding.quality.value(),
                method: params.encoding.method,
                lossless: params.encoding.lossless,
            });

            if self.fail_widths.contains(&params.width) {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock failure at width {}",
                    params.width
                )));
            }
            if self.touch_outputs {
                std::fs::write(&params.output, b"")?;
            }
            Ok(())
        }
    }

    #[test]
    fn mock_identify_pops_queued_dimensions_and_logs_path() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 1800,
            height: 1200,
        }]);

        let dims = backend.identify(Path::new("/images/hero-01.jpg")).unwrap();
        assert_eq!((dims.width, dims.height), (1800, 1200));
        assert!(backend.identify(Path::new("/images/hero-02.jpg")).is_err());

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p.ends_with("hero-01.jpg")));
    }

    #[test]
    fn mock_records_fit() {
        let backend = MockBackend::new();

        backend
            .fit(&FitParams {
                source: "/source.jpg".into(),
                output: "/out/hero1800.webp".into(),
                width: 1800,
                height: 1200,
                encoding: WebpSettings::new(90, 4, false),
            })
            .unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Fit {
                width: 1800,
                height: 1200,
                quality: 90,
                method: 4,
                lossless: false,
                ..
            }
        ));
    }

    #[test]
    fn mock_fails_selected_widths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::failing(vec![900]);
        let params = |width| FitParams {
            source: "/source.jpg".into(),
            output: tmp.path().join(format!("hero{width}.webp")),
            width,
            height: 0,
            encoding: WebpSettings::default(),
        };

        assert!(backend.fit(&params(900)).is_err());
        assert!(!tmp.path().join("hero900.webp").exists());
        backend.fit(&params(500)).unwrap();
        assert!(tmp.path().join("hero500.webp").exists());
        assert_eq!(backend.fit_count(), 2);
    }
}
