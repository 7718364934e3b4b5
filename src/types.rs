//! Shared types passed between the scan, rewrite, and variant stages.
//!
//! [`ImageRecord`] is also the element type of the aggregate
//! `all_image_names.json` report, so its serialized field names are part of
//! the on-disk format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One image reference found in a source document table.
///
/// Produced by the scanner, one per identifier match. Many records from the
/// same table share a `row_label` and therefore resolve to the same code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// File name of the source document (e.g. `doc1.json`).
    pub file_name: String,
    /// Exclusive output directory for this document: `{output}/{stem}`.
    pub output_dir: PathBuf,
    /// Leftmost text of the table's first row, trimmed and newline-stripped.
    pub row_label: String,
    /// Image identifier (file stem of the source raster).
    pub image_identifier: String,
}

/// Which kind of markup tag a reference was found in.
///
/// Selects the `{tag}_default` width in a code's breakpoint rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// `<source>` element with a srcset-like attribute and optional `media`.
    Source,
    /// `<img>` element with a src-like attribute.
    Img,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Source => f.write_str("source"),
            TagKind::Img => f.write_str("img"),
        }
    }
}
