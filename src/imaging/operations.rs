//! Variant generation.
//!
//! Combines the size table with backend execution: for one
//! `(code, identifier)` pair, locate the source raster and produce one WebP
//! per required size at `{output_dir}/{identifier}{width}.webp`.
//!
//! Generation is idempotent. An output that already exists counts as done
//! and is never re-encoded, so a second run over the same directory only
//! fills gaps.

use super::backend::{BackendError, ImageBackend};
use super::params::{FitParams, WebpSettings};
use crate::config::AppConfig;
use crate::report::Reporter;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VariantError {
    #[error("no sizes defined for code {0}")]
    UndefinedWidthsForCode(String),
    #[error("no source image for {identifier} in {images_dir}")]
    MissingSourceImage {
        identifier: String,
        images_dir: PathBuf,
    },
    #[error("failed to encode {output}: {source}")]
    Encode {
        output: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What happened to one required size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Encoded in this run.
    Created,
    /// Already present on disk; left untouched.
    Existing,
    /// Encoding failed; the remaining sizes were still attempted.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantOutcome {
    pub width: u32,
    pub path: PathBuf,
    pub status: VariantStatus,
}

/// Output path for one variant: `{output_dir}/{identifier}{width}.webp`.
pub fn variant_path(output_dir: &Path, identifier: &str, width: u32) -> PathBuf {
    output_dir.join(format!("{identifier}{width}.webp"))
}

/// Probe `{images_dir}/{identifier}.{ext}` for each extension in order.
pub fn find_source_image(
    images_dir: &Path,
    identifier: &str,
    extensions: &[String],
) -> Option<PathBuf> {
    extensions
        .iter()
        .map(|ext| images_dir.join(format!("{identifier}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Produces the WebP variants of one identifier.
pub struct VariantGenerator<'a> {
    backend: &'a dyn ImageBackend,
    config: &'a AppConfig,
    settings: WebpSettings,
}

impl<'a> VariantGenerator<'a> {
    pub fn new(backend: &'a dyn ImageBackend, config: &'a AppConfig) -> Self {
        Self {
            backend,
            config,
            settings: WebpSettings::from_config(&config.images),
        }
    }

    /// Locate the source raster for an identifier.
    pub fn source_for(&self, identifier: &str) -> Result<PathBuf, VariantError> {
        let images_dir = &self.config.directories.images;
        find_source_image(images_dir, identifier, &self.config.images.extensions).ok_or_else(
            || VariantError::MissingSourceImage {
                identifier: identifier.to_string(),
                images_dir: images_dir.clone(),
            },
        )
    }

    /// Generate every size of `code` for `identifier` into `output_dir`.
    ///
    /// Fails only when the code has no sizes or the source is missing. A
    /// failed encode is reported and recorded as [`VariantStatus::Failed`],
    /// and the next size is attempted.
    pub fn generate(
        &self,
        code: &str,
        identifier: &str,
        output_dir: &Path,
        reporter: &dyn Reporter,
    ) -> Result<Vec<VariantOutcome>, VariantError> {
        let sizes = self
            .config
            .sizes_for(code)
            .ok_or_else(|| VariantError::UndefinedWidthsForCode(code.to_string()))?;
        let source = self.source_for(identifier)?;
        std::fs::create_dir_all(output_dir)?;

        let mut outcomes = Vec::with_capacity(sizes.len());
        for size in sizes {
            let path = variant_path(output_dir, identifier, size.width);

            if path.exists() {
                reporter.info(&format!(
                    "{identifier} at {}px already exists, skipping",
                    size.width
                ));
                outcomes.push(VariantOutcome {
                    width: size.width,
                    path,
                    status: VariantStatus::Existing,
                });
                continue;
            }

            let params = FitParams {
                source: source.clone(),
                output: path.clone(),
                width: size.width,
                height: size.height,
                encoding: self.settings,
            };
            let status = match self.backend.fit(&params) {
                Ok(()) => {
                    reporter.info(&format!(
                        "{} -> {} ({}x{})",
                        source.display(),
                        path.display(),
                        size.width,
                        size.height
                    ));
                    VariantStatus::Created
                }
                Err(e) => {
                    let err = VariantError::Encode {
                        output: path.clone(),
                        source: e,
                    };
                    reporter.error(&format!("{code} {identifier} {}px: {err}", size.width));
                    VariantStatus::Failed
                }
            };
            outcomes.push(VariantOutcome {
                width: size.width,
                path,
                status,
            });
        }

        Ok(outcomes)
    }
}
