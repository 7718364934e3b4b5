//! Pure calculation functions for canvas-fit dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Integer math throughout: aspect ratios are compared by cross-multiplying
//! and scaled edges are truncated, never rounded.

/// Fill used for the canvas area not covered by the scaled source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Fully transparent. Used for square targets.
    Transparent,
    /// Opaque white. Used for every other target shape.
    White,
}

/// How to turn a source of a given size into a target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPlan {
    /// Resize straight to these dimensions. No canvas.
    Exact { width: u32, height: u32 },
    /// Resize to `scaled_*`, then paste at (`left`, `top`) on a
    /// `canvas_*` canvas filled with `padding`.
    Letterbox {
        scaled_width: u32,
        scaled_height: u32,
        canvas_width: u32,
        canvas_height: u32,
        left: u32,
        top: u32,
        padding: Padding,
    },
}

impl FitPlan {
    /// Final output dimensions.
    pub fn output_dimensions(&self) -> (u32, u32) {
        match *self {
            FitPlan::Exact { width, height } => (width, height),
            FitPlan::Letterbox {
                canvas_width,
                canvas_height,
                ..
            } => (canvas_width, canvas_height),
        }
    }
}

/// Height that keeps the source aspect ratio at `width`, truncated.
pub fn derive_height(source: (u32, u32), width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return width.max(1);
    }
    ((width as u64 * src_h as u64 / src_w as u64) as u32).max(1)
}

/// Plan a canvas fit of `source` into `target`.
///
/// - Target height 0: derive the height from the source aspect, no padding.
/// - Same aspect ratio: direct resize, no padding.
/// - Otherwise: shrink to fit on the binding edge, center on a canvas of
///   exactly the target size. Square targets pad transparent, others white.
pub fn plan_fit(source: (u32, u32), target: (u32, u32)) -> FitPlan {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if tgt_h == 0 {
        return FitPlan::Exact {
            width: tgt_w,
            height: derive_height(source, tgt_w),
        };
    }

    // src_w / src_h vs tgt_w / tgt_h without floats
    let src_cross = src_w as u64 * tgt_h as u64;
    let tgt_cross = tgt_w as u64 * src_h as u64;

    if src_cross == tgt_cross {
        return FitPlan::Exact {
            width: tgt_w,
            height: tgt_h,
        };
    }

    let (scaled_w, scaled_h) = if src_cross > tgt_cross {
        // Source is wider: width binds
        let h = (tgt_w as u64 * src_h as u64 / src_w.max(1) as u64) as u32;
        (tgt_w, h.clamp(1, tgt_h))
    } else {
        // Source is taller: height binds
        let w = (tgt_h as u64 * src_w as u64 / src_h.max(1) as u64) as u32;
        (w.clamp(1, tgt_w), tgt_h)
    };

    let padding = if tgt_w == tgt_h {
        Padding::Transparent
    } else {
        Padding::White
    };

    FitPlan::Letterbox {
        scaled_width: scaled_w,
        scaled_height: scaled_h,
        canvas_width: tgt_w,
        canvas_height: tgt_h,
        left: (tgt_w - scaled_w) / 2,
        top: (tgt_h - scaled_h) / 2,
        padding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // derive_height tests
    // =========================================================================

    #[test]
    fn derive_height_truncates() {
        // 900 * 667 / 1000 = 600.3
        assert_eq!(derive_height((1000, 667), 900), 600);
        // 500 * 2 / 3 = 333.33
        assert_eq!(derive_height((3000, 2000), 500), 333);
    }

    #[test]
    fn derive_height_never_zero() {
        assert_eq!(derive_height((10000, 1), 100), 1);
    }

    // =========================================================================
    // plan_fit tests
    // =========================================================================

    #[test]
    fn zero_height_keeps_aspect() {
        assert_eq!(
            plan_fit((2000, 1000), (900, 0)),
            FitPlan::Exact {
                width: 900,
                height: 450
            }
        );
    }

    #[test]
    fn same_aspect_is_direct_resize() {
        assert_eq!(
            plan_fit((3600, 2400), (1800, 1200)),
            FitPlan::Exact {
                width: 1800,
                height: 1200
            }
        );
    }

    #[test]
    fn same_aspect_upscale_is_direct_resize() {
        assert_eq!(
            plan_fit((300, 200), (1800, 1200)),
            FitPlan::Exact {
                width: 1800,
                height: 1200
            }
        );
    }

    #[test]
    fn wider_source_letterboxes_top_and_bottom() {
        // 2:1 into 3:2: width binds, 1800 * 1000 / 2000 = 900
        assert_eq!(
            plan_fit((2000, 1000), (1800, 1200)),
            FitPlan::Letterbox {
                scaled_width: 1800,
                scaled_height: 900,
                canvas_width: 1800,
                canvas_height: 1200,
                left: 0,
                top: 150,
                padding: Padding::White,
            }
        );
    }

    #[test]
    fn taller_source_pillarboxes_left_and_right() {
        // 3:4 into 3:2: height binds, 1200 * 600 / 800 = 900
        assert_eq!(
            plan_fit((600, 800), (1800, 1200)),
            FitPlan::Letterbox {
                scaled_width: 900,
                scaled_height: 1200,
                canvas_width: 1800,
                canvas_height: 1200,
                left: 450,
                top: 0,
                padding: Padding::White,
            }
        );
    }

    #[test]
    fn square_target_pads_transparent() {
        let plan = plan_fit((1600, 900), (800, 800));
        // 800 * 900 / 1600 = 450, centered: (800 - 450) / 2 = 175
        assert_eq!(
            plan,
            FitPlan::Letterbox {
                scaled_width: 800,
                scaled_height: 450,
                canvas_width: 800,
                canvas_height: 800,
                left: 0,
                top: 175,
                padding: Padding::Transparent,
            }
        );
    }

    #[test]
    fn odd_remainder_floors_offset() {
        // 4:3 is narrower than 500:333, so height binds:
        // 333 * 400 / 300 = 444, left = (500 - 444) / 2 = 28
        let plan = plan_fit((400, 300), (500, 333));
        assert_eq!(
            plan,
            FitPlan::Letterbox {
                scaled_width: 444,
                scaled_height: 333,
                canvas_width: 500,
                canvas_height: 333,
                left: 28,
                top: 0,
                padding: Padding::White,
            }
        );
    }

    #[test]
    fn output_dimensions_match_target_box() {
        assert_eq!(
            plan_fit((2000, 1000), (1800, 1200)).output_dimensions(),
            (1800, 1200)
        );
        assert_eq!(plan_fit((2000, 1000), (900, 0)).output_dimensions(), (900, 450));
    }
}
