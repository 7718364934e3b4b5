//! Carousel context detection.
//!
//! Some breakpoints map to two candidate widths whose choice at high
//! resolution depends on where the tag sits in the page: inside a carousel
//! the larger width is needed, inside a standard item the smaller one is
//! enough. The markup is not parsed. Instead the lines above the tag are
//! scanned, nearest first, for one of two marker tokens.

use crate::config::CarouselConfig;

/// Positional classifier over raw markup text.
#[derive(Debug, Clone, Copy)]
pub struct CarouselHeuristic<'a> {
    window: usize,
    carousel_marker: &'a str,
    standard_marker: &'a str,
}

impl<'a> CarouselHeuristic<'a> {
    pub fn new(config: &'a CarouselConfig) -> Self {
        Self {
            window: config.window,
            carousel_marker: &config.carousel_marker,
            standard_marker: &config.standard_marker,
        }
    }

    /// Whether the tag starting at byte `offset` sits in carousel context.
    ///
    /// Looks at the text before `offset` split into lines, keeps the last
    /// `window` of them (the tag's own line counts as the nearest, up to the
    /// tag), and walks them backwards. The first line holding either marker
    /// decides; the carousel marker wins when both share a line. No marker
    /// in the window means non-carousel.
    pub fn is_carousel(&self, markup: &str, offset: usize) -> bool {
        let before = markup.get(..offset).unwrap_or(markup);
        let lines: Vec<&str> = before.split('\n').collect();
        let start = lines.len().saturating_sub(self.window);

        for line in lines[start..].iter().rev() {
            if line.contains(self.carousel_marker) {
                return true;
            }
            if line.contains(self.standard_marker) {
                return false;
            }
        }
        false
    }
}
