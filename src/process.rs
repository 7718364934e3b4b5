//! Batch driver.
//!
//! Runs the per-document pipeline over every source document:
//!
//! ```text
//! documents/doc1.json ──scan──▶ records ──rewrite──▶ markup/doc1.html (in place)
//!                                       └─variants─▶ output/doc1/{identifier}{width}.webp
//! ```
//!
//! Documents are independent and run in parallel on the rayon pool. Each one
//! writes only to its own output directory and its own markup file; the
//! missing image log is the only shared sink and serializes its writes.
//!
//! ## Logs
//!
//! ```text
//! .logs/
//! ├── missing_images.txt         # document: identifier, one per miss
//! ├── all_image_names.json       # every ImageRecord, document order
//! └── all_converted_images.txt   # every variant path present after the run
//! ```
//!
//! ## Cancellation
//!
//! A [`CancelFlag`] is checked before each document starts. Documents
//! already running finish; the rest are skipped and the report is marked
//! cancelled.

use crate::code::{CodeError, CodeExtractor};
use crate::config::{AppConfig, ConfigError};
use crate::imaging::{
    Dimensions, ImageBackend, RustBackend, VariantError, VariantGenerator, VariantOutcome,
    VariantStatus, find_source_image,
};
use crate::report::{LogReporter, MissingImages, Reporter};
use crate::rewrite::{DocumentRewriter, RewriteSummary, Strategy, find_markup_file};
use crate::scan::{ScanError, Scanner, discover_documents, document_stem};
use crate::types::ImageRecord;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

pub const IMAGE_NAMES_FILE: &str = "all_image_names.json";
pub const CONVERTED_IMAGES_FILE: &str = "all_converted_images.txt";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("no source documents found in {0}")]
    NoSourceDocuments(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Code pattern error: {0}")]
    Code(#[from] CodeError),
}

/// Which stages run for each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Markup rewrite, then variant generation.
    Run,
    Variants,
    Rewrite,
}

impl Mode {
    pub fn rewrites(self) -> bool {
        matches!(self, Mode::Run | Mode::Rewrite)
    }

    pub fn generates(self) -> bool {
        matches!(self, Mode::Run | Mode::Variants)
    }
}

/// Cooperative cancellation shared between the caller and the batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one document's pipeline.
#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    pub document: String,
    pub records: Vec<ImageRecord>,
    /// `None` when rewriting was not requested or no markup file exists.
    pub rewrite: Option<RewriteSummary>,
    pub variants: Vec<VariantOutcome>,
    /// Identifiers with no source raster.
    pub missing: Vec<String>,
}

impl DocumentReport {
    pub fn count(&self, status: VariantStatus) -> usize {
        self.variants.iter().filter(|v| v.status == status).count()
    }
}

/// Progress events sent while the batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    DocumentFinished(DocumentReport),
    DocumentFailed { document: String, error: String },
    DocumentSkipped { document: String },
}

/// Totals for a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub documents: usize,
    pub failed_documents: usize,
    pub skipped_documents: usize,
    pub cancelled: bool,
    pub records: usize,
    pub substitutions: usize,
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
    pub missing_images: usize,
}

/// Run the batch with the production backend and reporter.
///
/// Truncates the missing image log in the logs directory before starting.
pub fn process(
    config: &AppConfig,
    mode: Mode,
    cancel: &CancelFlag,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    let missing = MissingImages::create(&config.directories.logs)?;
    let reporter = LogReporter::new(missing);
    let backend = RustBackend::new();
    process_with(&backend, &reporter, config, mode, cancel, events)
}

/// Run the batch with an explicit backend and reporter (allows testing with mock).
pub fn process_with(
    backend: &dyn ImageBackend,
    reporter: &dyn Reporter,
    config: &AppConfig,
    mode: Mode,
    cancel: &CancelFlag,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    let documents = discover_documents(&config.directories.documents)?;
    if documents.is_empty() {
        return Err(ProcessError::NoSourceDocuments(
            config.directories.documents.clone(),
        ));
    }
    fs::create_dir_all(&config.directories.logs)?;

    let scanner = Scanner::new(config)?;
    let codes = CodeExtractor::new(&config.patterns.code)?;
    let pipeline = DocumentPipeline {
        config,
        scanner: &scanner,
        codes: &codes,
        backend,
        reporter,
        mode,
    };

    tracing::info!(
        documents = documents.len(),
        ?mode,
        "processing {}",
        config.directories.documents.display()
    );

    let results: Vec<DocumentResult> = documents
        .par_iter()
        .map(|path| {
            let stem = document_stem(path);
            if cancel.is_cancelled() {
                send(&events, ProcessEvent::DocumentSkipped { document: stem });
                return DocumentResult::Skipped;
            }
            let _span = tracing::info_span!("document", document = %stem).entered();
            match pipeline.run(path, &stem) {
                Ok(report) => {
                    send(&events, ProcessEvent::DocumentFinished(report.clone()));
                    DocumentResult::Done(report)
                }
                Err(e) => {
                    reporter.error(&format!("{}: {e}", path.display()));
                    send(
                        &events,
                        ProcessEvent::DocumentFailed {
                            document: stem,
                            error: e.to_string(),
                        },
                    );
                    DocumentResult::Failed
                }
            }
        })
        .collect();

    let mut batch = BatchReport {
        cancelled: cancel.is_cancelled(),
        ..Default::default()
    };
    let mut all_records = Vec::new();
    let mut converted = Vec::new();
    for result in results {
        match result {
            DocumentResult::Done(report) => {
                batch.documents += 1;
                batch.records += report.records.len();
                batch.substitutions += report.rewrite.as_ref().map_or(0, |r| r.substitutions);
                batch.created += report.count(VariantStatus::Created);
                batch.existing += report.count(VariantStatus::Existing);
                batch.failed += report.count(VariantStatus::Failed);
                batch.missing_images += report.missing.len();
                converted.extend(
                    report
                        .variants
                        .iter()
                        .filter(|v| v.status != VariantStatus::Failed)
                        .map(|v| v.path.display().to_string()),
                );
                all_records.extend(report.records);
            }
            DocumentResult::Failed => batch.failed_documents += 1,
            DocumentResult::Skipped => batch.skipped_documents += 1,
        }
    }

    write_aggregate_logs(&config.directories.logs, &all_records, &converted)?;

    tracing::info!(
        documents = batch.documents,
        created = batch.created,
        existing = batch.existing,
        failed = batch.failed,
        missing = batch.missing_images,
        "batch finished"
    );
    Ok(batch)
}

enum DocumentResult {
    Done(DocumentReport),
    Failed,
    Skipped,
}

fn send(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // Receiver gone means nobody is listening; the batch carries on
        tx.send(event).ok();
    }
}

/// Write `all_image_names.json` and `all_converted_images.txt`.
fn write_aggregate_logs(
    logs_dir: &Path,
    records: &[ImageRecord],
    converted: &[String],
) -> Result<(), ProcessError> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(logs_dir.join(IMAGE_NAMES_FILE), json)?;
    fs::write(logs_dir.join(CONVERTED_IMAGES_FILE), converted.join("\n"))?;
    Ok(())
}

/// Shared, read-only state for the per-document pipeline.
struct DocumentPipeline<'a> {
    config: &'a AppConfig,
    scanner: &'a Scanner<'a>,
    codes: &'a CodeExtractor,
    backend: &'a dyn ImageBackend,
    reporter: &'a dyn Reporter,
    mode: Mode,
}

impl DocumentPipeline<'_> {
    fn run(&self, path: &Path, stem: &str) -> Result<DocumentReport, ProcessError> {
        let records = self.scanner.scan_document(path)?;
        self.reporter
            .info(&format!("{} image references", records.len()));

        let mut report = DocumentReport {
            document: stem.to_string(),
            ..Default::default()
        };

        if self.mode.rewrites() {
            report.rewrite = self.rewrite_markup(stem, &records);
        }
        if self.mode.generates() {
            self.generate_variants(stem, &records, &mut report);
        }

        report.records = records;
        Ok(report)
    }

    fn rewrite_markup(&self, stem: &str, records: &[ImageRecord]) -> Option<RewriteSummary> {
        let Some(markup) = find_markup_file(self.config, stem) else {
            self.reporter.info("no markup file, nothing to rewrite");
            return None;
        };
        let rewriter = DocumentRewriter::new(self.config, self.codes);
        match rewriter.rewrite_file(&markup, records, self.reporter) {
            Ok(summary) => Some(summary),
            Err(e) => {
                self.reporter.error(&e.to_string());
                None
            }
        }
    }

    fn generate_variants(&self, stem: &str, records: &[ImageRecord], report: &mut DocumentReport) {
        let generator = VariantGenerator::new(self.backend, self.config);
        let mut seen: HashSet<(String, &str)> = HashSet::new();

        for record in records {
            let identifier = record.image_identifier.as_str();
            let code = match self.codes.extract(&record.row_label) {
                Ok(code) => code,
                Err(e) => {
                    self.reporter
                        .warn(&format!("{identifier}: {e}, no variants generated"));
                    continue;
                }
            };
            if !seen.insert((code.clone(), identifier)) {
                continue;
            }

            match generator.generate(&code, identifier, &record.output_dir, self.reporter) {
                Ok(outcomes) => report.variants.extend(outcomes),
                Err(VariantError::MissingSourceImage { identifier, .. }) => {
                    self.reporter.missing_image(stem, &identifier);
                    report.missing.push(identifier);
                }
                Err(e @ VariantError::UndefinedWidthsForCode(_)) => {
                    self.reporter.warn(&format!("{identifier}: {e}"));
                }
                Err(e) => {
                    self.reporter.error(&format!("{identifier} ({code}): {e}"));
                }
            }
        }
    }
}

/// One record as seen by [`check`].
#[derive(Debug, Clone)]
pub struct CheckedRecord {
    pub record: ImageRecord,
    pub code: Option<String>,
    pub strategy: Option<Strategy>,
    /// Number of sizes the code requires; 0 when the code has none.
    pub sizes: usize,
    pub source: Option<PathBuf>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone)]
pub struct CheckedDocument {
    pub document: String,
    pub markup: Option<PathBuf>,
    pub records: Vec<CheckedRecord>,
    /// Scan failure, if the document could not be read.
    pub error: Option<String>,
}

/// Scan every document and resolve what a run would do, without writing.
pub fn check(config: &AppConfig) -> Result<Vec<CheckedDocument>, ProcessError> {
    check_with(&RustBackend::new(), config)
}

pub fn check_with(
    backend: &dyn ImageBackend,
    config: &AppConfig,
) -> Result<Vec<CheckedDocument>, ProcessError> {
    let documents = discover_documents(&config.directories.documents)?;
    if documents.is_empty() {
        return Err(ProcessError::NoSourceDocuments(
            config.directories.documents.clone(),
        ));
    }
    let scanner = Scanner::new(config)?;
    let codes = CodeExtractor::new(&config.patterns.code)?;

    let checked = documents
        .iter()
        .map(|path| {
            let stem = document_stem(path);
            let markup = find_markup_file(config, &stem);
            match scanner.scan_document(path) {
                Ok(records) => CheckedDocument {
                    records: records
                        .into_iter()
                        .map(|record| check_record(backend, config, &codes, record))
                        .collect(),
                    document: stem,
                    markup,
                    error: None,
                },
                Err(e) => CheckedDocument {
                    document: stem,
                    markup,
                    records: Vec::new(),
                    error: Some(e.to_string()),
                },
            }
        })
        .collect();
    Ok(checked)
}

fn check_record(
    backend: &dyn ImageBackend,
    config: &AppConfig,
    codes: &CodeExtractor,
    record: ImageRecord,
) -> CheckedRecord {
    let code = codes.extract(&record.row_label).ok();
    let strategy = code.as_deref().and_then(|c| Strategy::for_code(config, c));
    let sizes = code
        .as_deref()
        .and_then(|c| config.sizes_for(c))
        .map_or(0, <[_]>::len);
    let source = find_source_image(
        &config.directories.images,
        &record.image_identifier,
        &config.images.extensions,
    );
    let dimensions = source.as_deref().and_then(|s| match backend.identify(s) {
        Ok(dims) => Some(dims),
        Err(e) => {
            tracing::warn!(source = %s.display(), "cannot read source image: {e}");
            None
        }
    });
    CheckedRecord {
        record,
        code,
        strategy,
        sizes,
        source,
        dimensions,
    }
}
