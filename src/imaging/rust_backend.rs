//! Pure Rust decoding and resizing, `libwebp` encoding.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Canvas + paste | `image::RgbaImage::from_pixel` + `imageops::replace` |
//! | Encode → WebP | `webp::Encoder::encode_advanced` (quality, method, lossless) |
//!
//! The `image` crate only ships a lossless WebP encoder, so encoding goes
//! through `libwebp` to honour the quality and method settings.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{FitPlan, Padding, plan_fit};
use super::params::{FitParams, WebpSettings};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoded source with its detected container format.
struct Source {
    image: DynamicImage,
    format: Option<ImageFormat>,
}

/// Load and decode an image from disk, applying its EXIF orientation.
///
/// The format is sniffed from the file contents, not the extension.
fn load_image(path: &Path) -> Result<Source, BackendError> {
    let decode_err = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    };

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    let mut decoder = reader.into_decoder().map_err(decode_err)?;
    let orientation = decoder.orientation().map_err(decode_err)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    image.apply_orientation(orientation);

    Ok(Source { image, format })
}

/// Bring a non-WebP source to 8-bit RGB or RGBA before resizing.
fn normalize(image: DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.into_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.into_rgb8())
    }
}

/// Apply a fit plan. Keeps an alpha channel when the source has one or the
/// padding is transparent.
fn apply_plan(image: &DynamicImage, plan: FitPlan) -> DynamicImage {
    let source_alpha = image.color().has_alpha();
    match plan {
        FitPlan::Exact { width, height } => image.resize_exact(width, height, FilterType::Lanczos3),
        FitPlan::Letterbox {
            scaled_width,
            scaled_height,
            canvas_width,
            canvas_height,
            left,
            top,
            padding,
        } => {
            let scaled = image
                .resize_exact(scaled_width, scaled_height, FilterType::Lanczos3)
                .into_rgba8();
            let fill = match padding {
                Padding::Transparent => Rgba([255, 255, 255, 0]),
                Padding::White => Rgba([255, 255, 255, 255]),
            };
            let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, fill);
            imageops::replace(&mut canvas, &scaled, left as i64, top as i64);

            let canvas = DynamicImage::ImageRgba8(canvas);
            if source_alpha || padding == Padding::Transparent {
                canvas
            } else {
                DynamicImage::ImageRgb8(canvas.into_rgb8())
            }
        }
    }
}

/// Encode as WebP and write to `path`.
fn save_webp(image: &DynamicImage, path: &Path, settings: WebpSettings) -> Result<(), BackendError> {
    // libwebp only takes 8-bit RGB(A) buffers
    let image = match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image.clone(),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };

    let encoder = webp::Encoder::from_image(&image).map_err(|e| {
        BackendError::ProcessingFailed(format!("WebP encoder setup failed: {}", e))
    })?;
    let mut config = webp::WebPConfig::new()
        .map_err(|_| BackendError::ProcessingFailed("WebP config init failed".into()))?;
    config.lossless = i32::from(settings.lossless);
    config.quality = settings.quality.value() as f32;
    config.method = settings.method as i32;

    let encoded = encoder
        .encode_advanced(&config)
        .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {:?}", e)))?;
    std::fs::write(path, &*encoded)?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn fit(&self, params: &FitParams) -> Result<(), BackendError> {
        let Source { image, format } = load_image(&params.source)?;
        // WebP sources are only resized and padded
        let image = if format == Some(ImageFormat::WebP) {
            image
        } else {
            normalize(image)
        };

        let plan = plan_fit((image.width(), image.height()), (params.width, params.height));
        let fitted = apply_plan(&image, plan);
        save_webp(&fitted, &params.output, params.encoding)
    }
}
