//! CLI output formatting.
//!
//! Every function here is pure: it turns a pipeline result into display
//! lines and leaves printing to the caller. Documents are shown by stem with
//! a positional index; file paths appear as indented context lines.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! 001 doc1 (2 images)
//!     Markup: html/doc1.html
//!     001 hero-01
//!         Code: COMFRPTC09 (breakpoint, 4 sizes)
//!         Source: images/hero-01.jpg (2400x1600)
//!     002 gone-01
//!         Code: COMFRPTC09 (breakpoint, 4 sizes)
//!         Source: missing
//! ```
//!
//! ## Run
//!
//! ```text
//! doc1 (2 images)
//!     Markup: 5 references rewritten
//!     hero-011800.webp: encoded
//!     hero-01900.webp: exists
//!     Missing: gone-01
//! ```

use crate::imaging::VariantStatus;
use crate::process::{BatchReport, CheckedDocument, CheckedRecord, ProcessEvent};
use crate::rewrite::Strategy;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(documents: &[CheckedDocument]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, document) in documents.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            document.document,
            plural(document.records.len(), "image", "images")
        ));
        if let Some(error) = &document.error {
            lines.push(format!("    Error: {error}"));
            continue;
        }
        match &document.markup {
            Some(markup) => lines.push(format!("    Markup: {}", markup.display())),
            None => lines.push("    Markup: none".to_string()),
        }
        for (j, record) in document.records.iter().enumerate() {
            lines.extend(format_checked_record(j + 1, record));
        }
    }
    lines
}

fn format_checked_record(index: usize, checked: &CheckedRecord) -> Vec<String> {
    let mut lines = vec![format!(
        "    {} {}",
        format_index(index),
        checked.record.image_identifier
    )];

    let code_line = match &checked.code {
        None => format!("no code in {:?}", checked.record.row_label),
        Some(code) => {
            let strategy = match checked.strategy {
                Some(Strategy::Breakpoint) => "breakpoint",
                Some(Strategy::Ordinal) => "ordinal",
                None => "no rewrite",
            };
            format!(
                "{code} ({strategy}, {})",
                plural(checked.sizes, "size", "sizes")
            )
        }
    };
    lines.push(format!("        Code: {code_line}"));

    let source_line = match (&checked.source, checked.dimensions) {
        (None, _) => "missing".to_string(),
        (Some(path), Some(dims)) => {
            format!("{} ({}x{})", path.display(), dims.width, dims.height)
        }
        (Some(path), None) => format!("{} (unreadable)", path.display()),
    };
    lines.push(format!("        Source: {source_line}"));
    lines
}

// ============================================================================
// Run
// ============================================================================

/// Format one progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::DocumentFinished(report) => {
            let mut lines = vec![format!(
                "{} ({})",
                report.document,
                plural(report.records.len(), "image", "images")
            )];
            if let Some(rewrite) = &report.rewrite {
                lines.push(format!(
                    "    Markup: {} rewritten",
                    plural(rewrite.substitutions, "reference", "references")
                ));
            }
            for variant in &report.variants {
                let status = match variant.status {
                    VariantStatus::Created => "encoded",
                    VariantStatus::Existing => "exists",
                    VariantStatus::Failed => "failed",
                };
                lines.push(format!("    {}: {status}", file_name(&variant.path)));
            }
            for identifier in &report.missing {
                lines.push(format!("    Missing: {identifier}"));
            }
            lines
        }
        ProcessEvent::DocumentFailed { document, error } => {
            vec![format!("{document}: failed: {error}")]
        }
        ProcessEvent::DocumentSkipped { document } => {
            vec![format!("{document}: skipped (cancelled)")]
        }
    }
}

/// Format the end-of-batch summary.
pub fn format_batch_report(report: &BatchReport, missing_log: Option<&Path>) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Documents: {} processed, {} failed, {} skipped",
            report.documents, report.failed_documents, report.skipped_documents
        ),
        format!(
            "Variants: {} encoded, {} existing, {} failed",
            report.created, report.existing, report.failed
        ),
        format!(
            "Markup: {} rewritten",
            plural(report.substitutions, "reference", "references")
        ),
    ];
    let missing = match missing_log {
        Some(path) if report.missing_images > 0 => {
            format!(
                "Missing images: {} (see {})",
                report.missing_images,
                path.display()
            )
        }
        _ => format!("Missing images: {}", report.missing_images),
    };
    lines.push(missing);
    if report.cancelled {
        lines.push("Cancelled before all documents ran".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Dimensions, VariantOutcome};
    use crate::process::DocumentReport;
    use crate::rewrite::RewriteSummary;
    use crate::types::ImageRecord;
    use std::path::PathBuf;

    fn record(identifier: &str) -> ImageRecord {
        ImageRecord {
            file_name: "doc1.json".to_string(),
            output_dir: PathBuf::from("output/doc1"),
            row_label: "COMFRPTC09".to_string(),
            image_identifier: identifier.to_string(),
        }
    }

    fn outcome(name: &str, width: u32, status: VariantStatus) -> VariantOutcome {
        VariantOutcome {
            width,
            path: PathBuf::from("output/doc1").join(name),
            status,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "image", "images"), "1 image");
        assert_eq!(plural(0, "image", "images"), "0 images");
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_output_lists_records() {
        let documents = vec![CheckedDocument {
            document: "doc1".to_string(),
            markup: Some(PathBuf::from("html/doc1.html")),
            records: vec![
                CheckedRecord {
                    record: record("hero-01"),
                    code: Some("COMFRPTC09".to_string()),
                    strategy: Some(Strategy::Breakpoint),
                    sizes: 4,
                    source: Some(PathBuf::from("images/hero-01.jpg")),
                    dimensions: Some(Dimensions {
                        width: 2400,
                        height: 1600,
                    }),
                },
                CheckedRecord {
                    record: record("gone-01"),
                    code: None,
                    strategy: None,
                    sizes: 0,
                    source: None,
                    dimensions: None,
                },
            ],
            error: None,
        }];

        assert_eq!(
            format_check_output(&documents),
            vec![
                "001 doc1 (2 images)",
                "    Markup: html/doc1.html",
                "    001 hero-01",
                "        Code: COMFRPTC09 (breakpoint, 4 sizes)",
                "        Source: images/hero-01.jpg (2400x1600)",
                "    002 gone-01",
                "        Code: no code in \"COMFRPTC09\"",
                "        Source: missing",
            ]
        );
    }

    #[test]
    fn check_output_shows_scan_error() {
        let documents = vec![CheckedDocument {
            document: "bad".to_string(),
            markup: None,
            records: Vec::new(),
            error: Some("Malformed document".to_string()),
        }];
        assert_eq!(
            format_check_output(&documents),
            vec!["001 bad (0 images)", "    Error: Malformed document"]
        );
    }

    // =========================================================================
    // Run
    // =========================================================================

    #[test]
    fn finished_document_event() {
        let event = ProcessEvent::DocumentFinished(DocumentReport {
            document: "doc1".to_string(),
            records: vec![record("hero-01"), record("gone-01")],
            rewrite: Some(RewriteSummary {
                substitutions: 1,
                identifiers: 1,
                skipped: 0,
            }),
            variants: vec![
                outcome("hero-011800.webp", 1800, VariantStatus::Created),
                outcome("hero-01900.webp", 900, VariantStatus::Existing),
                outcome("hero-01500.webp", 500, VariantStatus::Failed),
            ],
            missing: vec!["gone-01".to_string()],
        });

        assert_eq!(
            format_process_event(&event),
            vec![
                "doc1 (2 images)",
                "    Markup: 1 reference rewritten",
                "    hero-011800.webp: encoded",
                "    hero-01900.webp: exists",
                "    hero-01500.webp: failed",
                "    Missing: gone-01",
            ]
        );
    }

    #[test]
    fn failed_and_skipped_events() {
        let failed = ProcessEvent::DocumentFailed {
            document: "doc2".to_string(),
            error: "bad json".to_string(),
        };
        let skipped = ProcessEvent::DocumentSkipped {
            document: "doc3".to_string(),
        };
        assert_eq!(format_process_event(&failed), vec!["doc2: failed: bad json"]);
        assert_eq!(
            format_process_event(&skipped),
            vec!["doc3: skipped (cancelled)"]
        );
    }

    #[test]
    fn batch_summary_points_at_missing_log() {
        let report = BatchReport {
            documents: 2,
            created: 4,
            existing: 2,
            substitutions: 5,
            missing_images: 1,
            ..Default::default()
        };
        let lines = format_batch_report(&report, Some(Path::new(".logs/missing_images.txt")));
        assert_eq!(
            lines,
            vec![
                "Documents: 2 processed, 0 failed, 0 skipped",
                "Variants: 4 encoded, 2 existing, 0 failed",
                "Markup: 5 references rewritten",
                "Missing images: 1 (see .logs/missing_images.txt)",
            ]
        );
    }

    #[test]
    fn batch_summary_notes_cancellation() {
        let report = BatchReport {
            cancelled: true,
            ..Default::default()
        };
        let lines = format_batch_report(&report, None);
        assert_eq!(lines[3], "Missing images: 0");
        assert_eq!(lines[4], "Cancelled before all documents ran");
    }
}
