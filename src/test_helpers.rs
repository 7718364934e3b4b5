//! Shared test utilities.
//!
//! Synthetic rasters written with the `image` crate encoders, plus a
//! temp-dir workspace laid out like a real run.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let ws = Workspace::new();
//! ws.document("doc1", &[&["ALPHA09", "＜画像＞hero-01"]]);
//! create_test_jpeg(&ws.image("hero-01.jpg"), 400, 300);
//! ```

use crate::config::AppConfig;
use image::{ImageEncoder, RgbImage, RgbaImage};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// Write an opaque gradient JPEG.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let writer = BufWriter::new(fs::File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a PNG whose left half is fully transparent.
pub fn create_test_png_rgba(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        let alpha = if x < width / 2 { 0 } else { 255 };
        image::Rgba([200, 40, 40, alpha])
    });
    let writer = BufWriter::new(fs::File::create(path).unwrap());
    image::codecs::png::PngEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
}

// =========================================================================
// Workspace
// =========================================================================

/// Temp directory with the documents/images/markup/output/logs layout and a
/// stock config pointing into it.
pub struct Workspace {
    pub tmp: TempDir,
    pub config: AppConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        let dirs = &mut config.directories;
        dirs.documents = tmp.path().join("documents");
        dirs.images = tmp.path().join("images");
        dirs.markup = tmp.path().join("html");
        dirs.output = tmp.path().join("output");
        dirs.logs = tmp.path().join(".logs");
        for dir in [&dirs.documents, &dirs.images, &dirs.markup] {
            fs::create_dir_all(dir).unwrap();
        }
        Self { tmp, config }
    }

    /// Write `documents/{stem}.json` holding one table with the given rows.
    pub fn document(&self, stem: &str, rows: &[&[&str]]) -> PathBuf {
        let table: Vec<Vec<&str>> = rows.iter().map(|r| r.to_vec()).collect();
        let json = serde_json::json!({ "tables": [table] });
        let path = self
            .config
            .directories
            .documents
            .join(format!("{stem}.json"));
        fs::write(&path, json.to_string()).unwrap();
        path
    }

    /// Path of a source image (not created).
    pub fn image(&self, file_name: &str) -> PathBuf {
        self.config.directories.images.join(file_name)
    }

    /// Write `html/{stem}.html`.
    pub fn markup(&self, stem: &str, content: &str) -> PathBuf {
        let path = self.config.directories.markup.join(format!("{stem}.html"));
        fs::write(&path, content).unwrap();
        path
    }
}
