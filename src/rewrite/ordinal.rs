//! Ordinal markup rewriting.
//!
//! For codes with a replace order, widths are handed out to successive plain
//! references of `{identifier}.{ext}` in document order. A cursor moves
//! forward through the text and never goes back: each width claims the first
//! reference at or after the end of the previous replacement, or fails.

use super::RewriteError;
use crate::report::Reporter;
use regex::Regex;
use std::collections::BTreeMap;

/// One claimed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinalHit {
    pub width: u32,
    /// Byte offset of the replacement in the rewritten text.
    pub offset: usize,
    pub file_name: String,
}

pub struct OrdinalReplacer<'a> {
    order: &'a BTreeMap<String, Vec<u32>>,
}

impl<'a> OrdinalReplacer<'a> {
    pub fn new(order: &'a BTreeMap<String, Vec<u32>>) -> Self {
        Self { order }
    }

    pub fn handles(&self, code: &str) -> bool {
        self.order.contains_key(code)
    }

    /// Replace references to `identifier` following the code's width order.
    ///
    /// A width with no reference left after the cursor is warned about and
    /// skipped; the cursor stays put for the next width.
    pub fn rewrite(
        &self,
        text: &str,
        code: &str,
        identifier: &str,
        reporter: &dyn Reporter,
    ) -> Result<(String, Vec<OrdinalHit>), RewriteError> {
        let widths = self
            .order
            .get(code)
            .ok_or_else(|| RewriteError::UndefinedReplaceOrderForCode(code.to_string()))?;
        let pattern = Regex::new(&format!(
            r"{}\.(?i:jpe?g|png|webp)",
            regex::escape(identifier)
        ))?;

        let mut text = text.to_string();
        let mut cursor = 0;
        let mut hits = Vec::new();

        for &width in widths {
            let Some(range) = find_reference(&pattern, &text, cursor) else {
                reporter.warn(&format!(
                    "no reference to {identifier} left for width {width} ({code})"
                ));
                continue;
            };

            let file_name = format!("{identifier}{width}.webp");
            reporter.info(&format!(
                "{} -> {file_name} ({code} #{})",
                &text[range.clone()],
                hits.len() + 1
            ));
            text.replace_range(range.clone(), &file_name);
            cursor = range.start + file_name.len();
            hits.push(OrdinalHit {
                width,
                offset: range.start,
                file_name,
            });
        }

        Ok((text, hits))
    }
}

/// First whole-identifier match at or after `from`.
///
/// The identifier must not continue a longer name: the character before it
/// cannot be an identifier character and the extension cannot run on into
/// further letters or digits.
pub(super) fn find_reference(
    pattern: &Regex,
    text: &str,
    from: usize,
) -> Option<std::ops::Range<usize>> {
    let mut at = from;
    while at <= text.len() {
        let m = pattern.find_at(text, at)?;
        let before_ok = text[..m.start()]
            .chars()
            .next_back()
            .is_none_or(|c| !is_identifier_char(c));
        let after_ok = text[m.end()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(m.range());
        }
        // Retry one character past this match's start
        at = m.start()
            + text[m.start()..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
    }
    None
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
