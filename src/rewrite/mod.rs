//! Markup rewriting.
//!
//! Each document may have a companion markup file (same stem, in the markup
//! directory). Every image reference in it is rewritten to point at the
//! variant the page actually needs. Two strategies exist and a code uses
//! exactly one of them, picked from table membership:
//!
//! | Strategy | Table | Module |
//! |---|---|---|
//! | [`Strategy::Breakpoint`] | `breakpoints` | [`markup`] |
//! | [`Strategy::Ordinal`] | `replace_order` | [`ordinal`] |
//!
//! Config validation rejects a code listed in both tables.
//!
//! Rewriting is not idempotent. Running it over already rewritten markup
//! would re-resolve suffixed names, so each markup file is rewritten at most
//! once per run.

pub mod markup;
pub mod ordinal;

use crate::code::CodeExtractor;
use crate::config::AppConfig;
use crate::report::Reporter;
use crate::types::ImageRecord;
use markup::MarkupRewriter;
use ordinal::OrdinalReplacer;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("no breakpoint rules for code {0}")]
    UndefinedBreakpointsForCode(String),
    #[error("no replace order for code {0}")]
    UndefinedReplaceOrderForCode(String),
    #[error("cannot resolve a width for {identifier} ({code}) from media query {media_query:?}")]
    UnresolvableMediaQuery {
        code: String,
        identifier: String,
        media_query: String,
    },
    #[error("failed to read markup {path}: {source}")]
    MarkupRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write markup {path}: {source}")]
    MarkupWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid reference pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Rewriting strategy for one code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Breakpoint,
    Ordinal,
}

impl Strategy {
    /// The strategy a code takes part in, if any.
    pub fn for_code(config: &AppConfig, code: &str) -> Option<Self> {
        if config.breakpoints.contains_key(code) {
            Some(Strategy::Breakpoint)
        } else if config.replace_order.contains_key(code) {
            Some(Strategy::Ordinal)
        } else {
            None
        }
    }
}

/// Counts for one rewritten markup file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// References replaced across both strategies.
    pub substitutions: usize,
    /// `(code, identifier)` pairs processed.
    pub identifiers: usize,
    /// Records skipped for lack of a code or a strategy.
    pub skipped: usize,
}

/// Locate a document's companion markup: `{markup_dir}/{stem}.{extension}`.
pub fn find_markup_file(config: &AppConfig, document_stem: &str) -> Option<PathBuf> {
    let path = config
        .directories
        .markup
        .join(format!("{document_stem}.{}", config.markup.extension));
    path.is_file().then_some(path)
}

/// Applies both strategies to one document's markup.
pub struct DocumentRewriter<'a> {
    config: &'a AppConfig,
    codes: &'a CodeExtractor,
    breakpoint: MarkupRewriter<'a>,
    ordinal: OrdinalReplacer<'a>,
}

impl<'a> DocumentRewriter<'a> {
    pub fn new(config: &'a AppConfig, codes: &'a CodeExtractor) -> Self {
        Self {
            config,
            codes,
            breakpoint: MarkupRewriter::new(config),
            ordinal: OrdinalReplacer::new(&config.replace_order),
        }
    }

    /// Rewrite `text` for every record, in record order.
    ///
    /// Each distinct `(code, identifier)` pair is applied once. Per-record
    /// problems are reported and skipped.
    pub fn rewrite_text(
        &self,
        text: &str,
        records: &[ImageRecord],
        reporter: &dyn Reporter,
    ) -> (String, RewriteSummary) {
        let mut text = text.to_string();
        let mut summary = RewriteSummary::default();
        let mut seen: HashSet<(String, &str)> = HashSet::new();

        for record in records {
            let identifier = record.image_identifier.as_str();
            let code = match self.codes.extract(&record.row_label) {
                Ok(code) => code,
                Err(e) => {
                    reporter.warn(&format!("{identifier}: {e}, skipping rewrite"));
                    summary.skipped += 1;
                    continue;
                }
            };
            let Some(strategy) = Strategy::for_code(self.config, &code) else {
                reporter.warn(&format!(
                    "{code} has neither breakpoint rules nor a replace order, skipping rewrite of {identifier}"
                ));
                summary.skipped += 1;
                continue;
            };
            if !seen.insert((code.clone(), identifier)) {
                continue;
            }

            let result = match strategy {
                Strategy::Breakpoint => self
                    .breakpoint
                    .rewrite(&text, &code, identifier, reporter)
                    .map(|(t, subs)| (t, subs.len())),
                Strategy::Ordinal => self
                    .ordinal
                    .rewrite(&text, &code, identifier, reporter)
                    .map(|(t, hits)| (t, hits.len())),
            };
            match result {
                Ok((rewritten, count)) => {
                    if count == 0 {
                        reporter.warn(&format!("no references to {identifier} ({code}) found"));
                    }
                    text = rewritten;
                    summary.substitutions += count;
                    summary.identifiers += 1;
                }
                Err(e) => {
                    reporter.warn(&format!("{identifier} ({code}): {e}"));
                    summary.skipped += 1;
                }
            }
        }

        (text, summary)
    }

    /// Read `path`, rewrite it for `records`, and write it back in place.
    ///
    /// The file is only written when something changed. A failed write
    /// leaves the original untouched.
    pub fn rewrite_file(
        &self,
        path: &Path,
        records: &[ImageRecord],
        reporter: &dyn Reporter,
    ) -> Result<RewriteSummary, RewriteError> {
        let original = fs::read_to_string(path).map_err(|source| RewriteError::MarkupRead {
            path: path.to_path_buf(),
            source,
        })?;

        let (rewritten, summary) = self.rewrite_text(&original, records, reporter);

        if rewritten != original {
            write_replacing(path, &rewritten).map_err(|source| RewriteError::MarkupWrite {
                path: path.to_path_buf(),
                source,
            })?;
            reporter.info(&format!(
                "updated {} ({} references)",
                path.display(),
                summary.substitutions
            ));
        }
        Ok(summary)
    }
}

/// Write through `{name}.tmp` and rename over `path`.
fn write_replacing(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)
}
