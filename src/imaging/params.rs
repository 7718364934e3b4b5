//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which variants to create) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: WebP encoding quality (0–100, default 100). Clamped on construction.
//! - [`WebpSettings`]: Quality, compression method, and lossless flag for the encoder.
//! - [`FitParams`]: Full specification for one variant: source, output path, target box, encoding.

use crate::config::ImagesConfig;
use std::path::PathBuf;

/// Quality setting for WebP encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(100)
    }
}

/// Encoder settings shared by every variant of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpSettings {
    pub quality: Quality,
    /// Compression effort, 0 (fast) to 6 (small).
    pub method: u32,
    pub lossless: bool,
}

impl WebpSettings {
    pub fn new(quality: u32, method: u32, lossless: bool) -> Self {
        Self {
            quality: Quality::new(quality),
            method: method.min(6),
            lossless,
        }
    }

    pub fn from_config(images: &ImagesConfig) -> Self {
        Self::new(images.quality, images.method, images.lossless)
    }
}

impl Default for WebpSettings {
    fn default() -> Self {
        Self::new(100, 6, true)
    }
}

/// Parameters for one canvas-fit variant.
///
/// `height == 0` keeps the source aspect ratio at `width`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub encoding: WebpSettings,
}
