//! Static per-code rule tables.
//!
//! Three tables drive everything downstream of code extraction:
//!
//! | Table | Shape | Consumer |
//! |---|---|---|
//! | sizes | `code → [[width, height], ...]` | variant generation |
//! | breakpoints | `code → { breakpoint → width \| [low, high], source_default, img_default }` | breakpoint rewriting |
//! | replace order | `code → [width, ...]` | ordinal rewriting |
//!
//! The tables are loaded once, validated, and never mutated while a batch is
//! running. A code missing from a table means "feature absent for this code".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One required output size. `height == 0` keeps the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct SizeSpec {
    pub width: u32,
    pub height: u32,
}

impl SizeSpec {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<[u32; 2]> for SizeSpec {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<SizeSpec> for [u32; 2] {
    fn from(spec: SizeSpec) -> Self {
        [spec.width, spec.height]
    }
}

/// Width(s) mapped to a breakpoint: a single width, or two candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WidthChoice {
    Single(u32),
    Pair([u32; 2]),
}

impl WidthChoice {
    /// The smaller candidate (or the only one).
    pub fn low(self) -> u32 {
        match self {
            WidthChoice::Single(w) => w,
            WidthChoice::Pair([a, b]) => a.min(b),
        }
    }

    /// The larger candidate (or the only one).
    pub fn high(self) -> u32 {
        match self {
            WidthChoice::Single(w) => w,
            WidthChoice::Pair([a, b]) => a.max(b),
        }
    }

    fn widths(self) -> impl Iterator<Item = u32> {
        let (a, b) = match self {
            WidthChoice::Single(w) => (w, None),
            WidthChoice::Pair([a, b]) => (a, Some(b)),
        };
        std::iter::once(a).chain(b)
    }
}

const SOURCE_DEFAULT_KEY: &str = "source_default";
const IMG_DEFAULT_KEY: &str = "img_default";

/// Breakpoint rules for one code.
///
/// Serialized as a flat table so config files read naturally:
///
/// ```toml
/// [breakpoints.COMFRPTC12]
/// 1562 = [900, 1800]
/// 1041 = [900, 1200]
/// source_default = 900
/// img_default = 900
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, WidthChoice>",
    into = "BTreeMap<String, WidthChoice>"
)]
pub struct BreakpointRules {
    pub widths: BTreeMap<u32, WidthChoice>,
    pub source_default: Option<u32>,
    pub img_default: Option<u32>,
}

impl BreakpointRules {
    pub fn at(&self, breakpoint: u32) -> Option<WidthChoice> {
        self.widths.get(&breakpoint).copied()
    }

    /// Every width this rule set can resolve to.
    pub fn all_widths(&self) -> impl Iterator<Item = u32> + '_ {
        self.widths
            .values()
            .flat_map(|choice| choice.widths())
            .chain(self.source_default)
            .chain(self.img_default)
    }
}

impl TryFrom<BTreeMap<String, WidthChoice>> for BreakpointRules {
    type Error = String;

    fn try_from(raw: BTreeMap<String, WidthChoice>) -> Result<Self, Self::Error> {
        let mut rules = BreakpointRules::default();
        for (key, choice) in raw {
            match key.as_str() {
                SOURCE_DEFAULT_KEY | IMG_DEFAULT_KEY => {
                    let WidthChoice::Single(width) = choice else {
                        return Err(format!("{key} must be a single width, got {choice:?}"));
                    };
                    if key == SOURCE_DEFAULT_KEY {
                        rules.source_default = Some(width);
                    } else {
                        rules.img_default = Some(width);
                    }
                }
                _ => {
                    let breakpoint: u32 = key
                        .parse()
                        .ok()
                        .filter(|&bp| bp > 0)
                        .ok_or_else(|| {
                            format!("breakpoint key '{key}' must be a positive integer")
                        })?;
                    rules.widths.insert(breakpoint, choice);
                }
            }
        }
        Ok(rules)
    }
}

impl From<BreakpointRules> for BTreeMap<String, WidthChoice> {
    fn from(rules: BreakpointRules) -> Self {
        let mut raw: BTreeMap<String, WidthChoice> = rules
            .widths
            .into_iter()
            .map(|(bp, choice)| (bp.to_string(), choice))
            .collect();
        if let Some(w) = rules.source_default {
            raw.insert(SOURCE_DEFAULT_KEY.to_string(), WidthChoice::Single(w));
        }
        if let Some(w) = rules.img_default {
            raw.insert(IMG_DEFAULT_KEY.to_string(), WidthChoice::Single(w));
        }
        raw
    }
}

/// Widths for a code whose tags carry no `min-width` condition at all.
///
/// Overrides the tag default: `plain` when the media query is empty,
/// `high_resolution` when it only says `min-resolution: 2dppx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoConditionWidths {
    pub plain: u32,
    pub high_resolution: u32,
}
