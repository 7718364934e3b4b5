//! Reporting sink passed into every pipeline stage.
//!
//! Stages never log through a global. They receive a [`Reporter`] and call
//! `info`/`warn`/`error` for diagnostics and `missing_image` for source
//! rasters that could not be found. The production [`LogReporter`] forwards
//! diagnostics to `tracing` (so they inherit the current document span) and
//! appends misses to a [`MissingImages`] log.
//!
//! ## Missing image log format
//!
//! ```text
//! # missing image files
//! # format: document: identifier
//!
//! doc1: hero-01
//! doc2: banner_kv
//! ```

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const MISSING_IMAGES_FILE: &str = "missing_images.txt";

const MISSING_IMAGES_HEADER: &str = "# missing image files\n# format: document: identifier\n\n";

/// Sink for diagnostics and missing-image reports.
///
/// `Sync` because documents are processed on rayon workers sharing one sink.
pub trait Reporter: Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    /// Record a source raster that does not exist for any probed extension.
    fn missing_image(&self, document: &str, identifier: &str);
}

/// Append-only missing image log, shared across workers.
pub struct MissingImages {
    path: PathBuf,
    file: Mutex<File>,
    count: AtomicUsize,
}

impl MissingImages {
    /// Create (or truncate) the log in `logs_dir` and write its header.
    pub fn create(logs_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(logs_dir)?;
        let path = logs_dir.join(MISSING_IMAGES_FILE);
        let mut file = File::create(&path)?;
        file.write_all(MISSING_IMAGES_HEADER.as_bytes())?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            count: AtomicUsize::new(0),
        })
    }

    pub fn record(&self, document: &str, identifier: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("missing image log lock poisoned"))?;
        writeln!(file, "{document}: {identifier}")?;
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Production reporter: `tracing` for diagnostics, a file for misses.
pub struct LogReporter {
    missing: Option<MissingImages>,
}

impl LogReporter {
    pub fn new(missing: MissingImages) -> Self {
        Self {
            missing: Some(missing),
        }
    }

    /// A reporter that only logs. Misses are logged as errors and not persisted.
    pub fn console() -> Self {
        Self { missing: None }
    }

    /// Number of misses recorded so far.
    pub fn missing_count(&self) -> usize {
        self.missing.as_ref().map_or(0, MissingImages::count)
    }

    pub fn missing_log(&self) -> Option<&Path> {
        self.missing.as_ref().map(MissingImages::path)
    }
}

impl Reporter for LogReporter {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn missing_image(&self, document: &str, identifier: &str) {
        tracing::error!(document, identifier, "source image not found");
        let Some(missing) = &self.missing else {
            return;
        };
        if let Err(e) = missing.record(document, identifier) {
            tracing::error!(
                path = %missing.path().display(),
                "failed to record missing image: {e}"
            );
        }
    }
}
