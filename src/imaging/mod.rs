//! Image processing: canvas-fit resize and WebP encoding.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Fit** | Lanczos3 resize + centered canvas paste |
//! | **Encode** | `webp` (libwebp) with configured quality/method/lossless |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for fit geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Variant generation combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{FitPlan, Padding, derive_height, plan_fit};
pub use operations::{
    VariantError, VariantGenerator, VariantOutcome, VariantStatus, find_source_image,
    variant_path,
};
pub use params::{FitParams, Quality, WebpSettings};
pub use rust_backend::RustBackend;
