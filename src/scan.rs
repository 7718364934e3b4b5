//! Source document scanning.
//!
//! Stage 1 of the pipeline. Reads table exports from the documents directory
//! and emits one [`ImageRecord`] per image identifier found in a cell.
//!
//! ## Document format
//!
//! A source document is a JSON file holding its tables as rows of cell texts:
//!
//! ```json
//! {
//!   "tables": [
//!     [
//!       ["COMFRPTC09 hero block", "<画像>hero-01\n画像名：hero-02"],
//!       ["caption", "画像名:hero-03"]
//!     ]
//!   ]
//! }
//! ```
//!
//! ## Extraction rules
//!
//! - The row label of a table is the text of its first row's first cell,
//!   trimmed and with newlines removed. Every record from that table shares it.
//! - Every cell of every row is split into lines. Each trimmed, non-empty
//!   line is searched with the image pattern; each match is an identifier.
//! - Identifiers containing `-kv` (or else `_kv`) imply a thumbnail variant
//!   with `-thumbnail` (`_thumbnail`) in its place. When a source image exists
//!   for it, an extra record with row label `THUMBNAIL` is appended.
//! - Files whose names start with `~$` are editor lock files and are skipped.

use crate::config::AppConfig;
use crate::imaging::find_source_image;
use crate::types::ImageRecord;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Row label given to derived thumbnail records.
pub const THUMBNAIL_LABEL: &str = "THUMBNAIL";

const DOCUMENT_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {0}: {1}")]
    Walk(PathBuf, walkdir::Error),
    #[error("Malformed document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid image pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Tables of one source document: tables → rows → cell texts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableDocument {
    #[serde(default)]
    pub tables: Vec<Vec<Vec<String>>>,
}

/// One identifier match, tagged by the notation it was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageMarker {
    /// `＜画像＞hero-01`, `<画像名>hero-01`, `〈画像2（補足）〉hero-01`, ...
    Bracket(String),
    /// `画像名：hero-01` or `画像名:hero-01`.
    Colon(String),
}

impl ImageMarker {
    pub fn identifier(&self) -> &str {
        match self {
            ImageMarker::Bracket(id) | ImageMarker::Colon(id) => id,
        }
    }

    pub fn into_identifier(self) -> String {
        match self {
            ImageMarker::Bracket(id) | ImageMarker::Colon(id) => id,
        }
    }
}

/// Compiled image pattern with `bracket` / `colon` named groups.
#[derive(Debug, Clone)]
pub struct MarkerPattern {
    regex: Regex,
}

impl MarkerPattern {
    pub fn new(pattern: &str) -> Result<Self, ScanError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// All markers in one line, left to right.
    pub fn find_all(&self, line: &str) -> Vec<ImageMarker> {
        self.regex
            .captures_iter(line)
            .filter_map(|caps| {
                let non_empty = |name| {
                    caps.name(name)
                        .map(|m| m.as_str().trim().to_string())
                        .filter(|s| !s.is_empty())
                };
                non_empty("bracket")
                    .map(ImageMarker::Bracket)
                    .or_else(|| non_empty("colon").map(ImageMarker::Colon))
            })
            .collect()
    }
}

/// Discover source documents in `dir` (not recursive), sorted by name.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ScanError::Walk(dir.to_path_buf(), e))?;
        let path = entry.path();
        if entry.file_type().is_file() && is_document(path) {
            documents.push(path.to_path_buf());
        }
    }
    documents.sort();
    Ok(documents)
}

fn is_document(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
    is_json && !name.starts_with("~$") && !name.starts_with('.')
}

/// File stem of a document path, used for output and markup names.
pub fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Thumbnail identifier implied by a key-visual identifier.
pub fn thumbnail_identifier(identifier: &str) -> Option<String> {
    if identifier.contains("-kv") {
        Some(identifier.replace("-kv", "-thumbnail"))
    } else if identifier.contains("_kv") {
        Some(identifier.replace("_kv", "_thumbnail"))
    } else {
        None
    }
}

/// Turns source documents into image records.
pub struct Scanner<'a> {
    config: &'a AppConfig,
    markers: MarkerPattern,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a AppConfig) -> Result<Self, ScanError> {
        Ok(Self {
            config,
            markers: MarkerPattern::new(&config.patterns.image)?,
        })
    }

    /// Read and scan one document file.
    pub fn scan_document(&self, path: &Path) -> Result<Vec<ImageRecord>, ScanError> {
        let content = fs::read_to_string(path)?;
        let document: TableDocument =
            serde_json::from_str(&content).map_err(|source| ScanError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.records(&file_name, &document_stem(path), &document))
    }

    /// Records for an already parsed document, thumbnails appended last.
    pub fn records(&self, file_name: &str, stem: &str, document: &TableDocument) -> Vec<ImageRecord> {
        let output_dir = self.config.directories.output.join(stem);
        let record = |row_label: &str, identifier: String| ImageRecord {
            file_name: file_name.to_string(),
            output_dir: output_dir.clone(),
            row_label: row_label.to_string(),
            image_identifier: identifier,
        };

        let mut records = Vec::new();
        for table in &document.tables {
            let row_label = table
                .first()
                .and_then(|row| row.first())
                .map(|cell| cell.trim().replace(['\n', '\r'], ""))
                .unwrap_or_default();

            for cell in table.iter().flatten() {
                for line in cell.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    for marker in self.markers.find_all(line) {
                        records.push(record(&row_label, marker.into_identifier()));
                    }
                }
            }
        }

        let thumbnails: Vec<ImageRecord> = records
            .iter()
            .filter_map(|r| thumbnail_identifier(&r.image_identifier))
            .filter(|id| {
                find_source_image(
                    &self.config.directories.images,
                    id,
                    &self.config.images.extensions,
                )
                .is_some()
            })
            .map(|id| record(THUMBNAIL_LABEL, id))
            .collect();
        records.extend(thumbnails);
        records
    }
}
