//! Breakpoint resolution.
//!
//! Maps a tag's media query to exactly one target width using the code's
//! breakpoint rules. Only two conditions are read from the query:
//! `(min-width: Npx)` and `min-resolution: 2dppx`. Everything else in the
//! query is ignored.
//!
//! Resolution order for a code with breakpoint rules:
//!
//! 1. No `min-width`: the code's no-condition override if it has one,
//!    otherwise the tag default (`source_default` / `img_default`).
//! 2. `min-width` present and listed: a single width is returned as is. A
//!    pair resolves to its low width at normal resolution and its high width
//!    at high resolution, except for carousel-sensitive breakpoints where
//!    high resolution defers to [`CarouselHeuristic`].
//! 3. `min-width` present but not listed: the tag default.
//!
//! A missing tag default falls back to [`FALLBACK_WIDTH`].

use crate::carousel::CarouselHeuristic;
use crate::config::AppConfig;
use crate::rules::{BreakpointRules, WidthChoice};
use crate::types::TagKind;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Width used when a code's rules have no default for the tag kind.
pub const FALLBACK_WIDTH: u32 = 500;

/// The two conditions extracted from a media query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaQuery {
    pub min_width_px: Option<u32>,
    pub high_resolution: bool,
}

impl MediaQuery {
    /// Parse a media query attribute value. Never fails: anything
    /// unrecognised simply yields no condition.
    pub fn parse(query: &str) -> Self {
        static MIN_WIDTH: OnceLock<Regex> = OnceLock::new();
        static HIGH_RES: OnceLock<Regex> = OnceLock::new();
        let min_width = MIN_WIDTH
            .get_or_init(|| Regex::new(r"\(min-width:\s*(\d+)px\)").expect("valid regex"));
        let high_res = HIGH_RES
            .get_or_init(|| Regex::new(r"min-resolution:\s*2dppx").expect("valid regex"));

        // Digits that overflow still mark the condition as present
        let min_width_px = min_width
            .captures(query)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().parse().unwrap_or(u32::MAX));

        Self {
            min_width_px,
            high_resolution: high_res.is_match(query),
        }
    }
}

/// Which rule produced a resolved width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The breakpoint maps to a single width.
    Single,
    /// Low candidate of a pair at normal resolution.
    NormalResolution,
    /// High candidate of a pair at high resolution.
    HighResolution,
    /// High candidate chosen because the tag sits in a carousel.
    Carousel,
    /// Low candidate chosen because the tag sits in a standard item.
    StandardItem,
    /// The tag kind's default width.
    TagDefault,
    /// The code's fixed width for condition-less tags.
    NoConditionOverride,
    /// [`FALLBACK_WIDTH`], because the tag default is missing.
    Fallback,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::Single => "single width",
            Reason::NormalResolution => "normal resolution",
            Reason::HighResolution => "high resolution",
            Reason::Carousel => "carousel",
            Reason::StandardItem => "standard item",
            Reason::TagDefault => "tag default",
            Reason::NoConditionOverride => "no-condition override",
            Reason::Fallback => "fallback",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub reason: Reason,
}

impl Resolution {
    fn new(width: u32, reason: Reason) -> Self {
        Self { width, reason }
    }
}

/// Picks one width per tag from the breakpoint rules.
pub struct BreakpointResolver<'a> {
    config: &'a AppConfig,
    carousel: CarouselHeuristic<'a>,
}

impl<'a> BreakpointResolver<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            carousel: CarouselHeuristic::new(&config.carousel),
        }
    }

    /// Whether the code takes part in breakpoint rewriting at all.
    pub fn handles(&self, code: &str) -> bool {
        self.config.breakpoints.contains_key(code)
    }

    /// Resolve the width for one tag.
    ///
    /// `markup` and `offset` locate the tag for the carousel check. Returns
    /// `None` only when the code has no breakpoint rules.
    pub fn resolve(
        &self,
        code: &str,
        query: &MediaQuery,
        tag: TagKind,
        markup: &str,
        offset: usize,
    ) -> Option<Resolution> {
        let rules = self.config.breakpoints.get(code)?;

        let Some(breakpoint) = query.min_width_px else {
            if let Some(widths) = self.config.no_condition.get(code) {
                let width = if query.high_resolution {
                    widths.high_resolution
                } else {
                    widths.plain
                };
                return Some(Resolution::new(width, Reason::NoConditionOverride));
            }
            return Some(tag_default(rules, tag));
        };

        let resolution = match rules.at(breakpoint) {
            None => tag_default(rules, tag),
            Some(WidthChoice::Single(width)) => Resolution::new(width, Reason::Single),
            Some(pair) if !query.high_resolution => {
                Resolution::new(pair.low(), Reason::NormalResolution)
            }
            Some(pair) if self.config.carousel.is_sensitive(code, breakpoint) => {
                if self.carousel.is_carousel(markup, offset) {
                    Resolution::new(pair.high(), Reason::Carousel)
                } else {
                    Resolution::new(pair.low(), Reason::StandardItem)
                }
            }
            Some(pair) => Resolution::new(pair.high(), Reason::HighResolution),
        };
        Some(resolution)
    }
}

fn tag_default(rules: &BreakpointRules, tag: TagKind) -> Resolution {
    let default = match tag {
        TagKind::Source => rules.source_default,
        TagKind::Img => rules.img_default,
    };
    match default {
        Some(width) => Resolution::new(width, Reason::TagDefault),
        None => Resolution::new(FALLBACK_WIDTH, Reason::Fallback),
    }
}
