//! Code extraction from table row labels.
//!
//! A code is the structural key (e.g. `COMFRPTC09`) that selects rows in the
//! size, breakpoint, and replace-order tables. It is the leading token of a
//! table's row label, matched by an anchored pattern.

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeError {
    #[error("no code matches row label {0:?}")]
    NoCodeMatch(String),
    #[error("invalid code pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Extracts codes from row labels with a compiled pattern.
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    pattern: Regex,
}

impl CodeExtractor {
    pub fn new(pattern: &str) -> Result<Self, CodeError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Extract the code from a row label.
    ///
    /// Uses the first capture group when the pattern has one, the whole
    /// match otherwise. Labels are matched as given; callers strip newlines
    /// before extraction.
    pub fn extract(&self, row_label: &str) -> Result<String, CodeError> {
        let caps = self
            .pattern
            .captures(row_label)
            .ok_or_else(|| CodeError::NoCodeMatch(row_label.to_string()))?;
        let m = caps
            .get(1)
            .or_else(|| caps.get(0))
            .ok_or_else(|| CodeError::NoCodeMatch(row_label.to_string()))?;
        Ok(m.as_str().to_string())
    }
}
