//! Shared types for the nightprep enhancement pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can pass frames around
/// without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel intermediates (luminance, mask rasters).
pub use image::GrayImage;

/// Mask value for a trusted pixel.
pub const TRUSTED: u8 = 0;

/// Mask value for an excluded pixel.
pub const EXCLUDED: u8 = 255;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// CLAHE tile grid: the image is split into `columns x rows` tiles,
/// each with its own clipped histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    /// Number of tiles across the image width.
    pub columns: u32,
    /// Number of tiles down the image height.
    pub rows: u32,
}

impl TileGrid {
    /// Create a tile grid.
    #[must_use]
    pub const fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        PipelineConfig::DEFAULT_CLAHE_TILE_GRID
    }
}

/// Tunable parameters for the enhancement pipeline.
///
/// Immutable for the duration of a run and shared read-only by every
/// frame. Missing fields fall back to their defaults when deserialized,
/// so a partial JSON object is a valid config.
///
/// Call [`validate`](Self::validate) (or construct an
/// [`Enhancer`](crate::Enhancer), which does so) before processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gamma exponent. Values below 1.0 brighten dark imagery.
    pub gamma: f64,

    /// CLAHE clip limit, as a multiple of the mean histogram bin height.
    /// Non-positive values disable clipping (plain tiled equalization).
    pub clahe_clip_limit: f32,

    /// CLAHE tile grid.
    pub clahe_tile_grid: TileGrid,

    /// Bilateral filter window diameter in pixels.
    pub bilateral_diameter: u32,

    /// Bilateral filter color-similarity sigma.
    pub bilateral_sigma_color: f32,

    /// Bilateral filter spatial sigma.
    pub bilateral_sigma_space: f32,

    /// Luminance at or above which a pixel is treated as saturated.
    ///
    /// The default of 255 only matches fully clipped pixels. This is a
    /// tuning choice; lower it (e.g. to 245) to also catch near-saturated
    /// glare.
    pub sat_thr: u8,

    /// Luminance at or below which a pixel is treated as deep shadow.
    pub dark_thr: u8,

    /// Side of the square structuring element used to dilate the
    /// saturated-pixel mask. Must be odd.
    pub dilate_bright_k: u32,

    /// Side of the square structuring element used to dilate the
    /// deep-shadow mask. Must be odd.
    pub dilate_dark_k: u32,

    /// Fraction of image rows, counted from the bottom, that are always
    /// excluded (vehicle hood / sensor mount). Rig-specific.
    pub bottom_exclusion_fraction: f64,
}

impl PipelineConfig {
    /// Default gamma exponent.
    pub const DEFAULT_GAMMA: f64 = 0.5;
    /// Default CLAHE clip limit.
    pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 2.0;
    /// Default CLAHE tile grid (8x8).
    pub const DEFAULT_CLAHE_TILE_GRID: TileGrid = TileGrid::new(8, 8);
    /// Default bilateral window diameter.
    pub const DEFAULT_BILATERAL_DIAMETER: u32 = 5;
    /// Default bilateral color sigma.
    pub const DEFAULT_BILATERAL_SIGMA_COLOR: f32 = 75.0;
    /// Default bilateral spatial sigma.
    pub const DEFAULT_BILATERAL_SIGMA_SPACE: f32 = 75.0;
    /// Default saturation threshold.
    pub const DEFAULT_SAT_THR: u8 = 255;
    /// Default deep-shadow threshold.
    pub const DEFAULT_DARK_THR: u8 = 8;
    /// Default bright-mask dilation side.
    pub const DEFAULT_DILATE_BRIGHT_K: u32 = 25;
    /// Default dark-mask dilation side.
    pub const DEFAULT_DILATE_DARK_K: u32 = 5;
    /// Default bottom exclusion fraction (bottom quarter).
    pub const DEFAULT_BOTTOM_EXCLUSION_FRACTION: f64 = 0.25;

    /// Largest accepted dilation side. The structuring element radius
    /// must fit the `u8` radius taken by `imageproc`'s dilation.
    pub const MAX_DILATE_K: u32 = 255;

    /// Largest accepted bilateral window diameter.
    pub const MAX_BILATERAL_DIAMETER: u32 = 255;

    /// Check every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(invalid(format!(
                "gamma must be finite and positive, got {}",
                self.gamma
            )));
        }
        if !self.clahe_clip_limit.is_finite() {
            return Err(invalid(format!(
                "clahe_clip_limit must be finite, got {}",
                self.clahe_clip_limit
            )));
        }
        if self.clahe_tile_grid.columns == 0 || self.clahe_tile_grid.rows == 0 {
            return Err(invalid(format!(
                "clahe_tile_grid must be at least 1x1, got {}x{}",
                self.clahe_tile_grid.columns, self.clahe_tile_grid.rows
            )));
        }
        if self.bilateral_diameter == 0 || self.bilateral_diameter > Self::MAX_BILATERAL_DIAMETER {
            return Err(invalid(format!(
                "bilateral_diameter must be in 1..={}, got {}",
                Self::MAX_BILATERAL_DIAMETER,
                self.bilateral_diameter
            )));
        }
        for (name, sigma) in [
            ("bilateral_sigma_color", self.bilateral_sigma_color),
            ("bilateral_sigma_space", self.bilateral_sigma_space),
        ] {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(invalid(format!(
                    "{name} must be finite and positive, got {sigma}"
                )));
            }
        }
        for (name, k) in [
            ("dilate_bright_k", self.dilate_bright_k),
            ("dilate_dark_k", self.dilate_dark_k),
        ] {
            if k == 0 || k % 2 == 0 || k > Self::MAX_DILATE_K {
                return Err(invalid(format!(
                    "{name} must be an odd value in 1..={}, got {k}",
                    Self::MAX_DILATE_K
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.bottom_exclusion_fraction) {
            return Err(invalid(format!(
                "bottom_exclusion_fraction must be within [0, 1], got {}",
                self.bottom_exclusion_fraction
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> PipelineError {
    PipelineError::InvalidConfig(message)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gamma: Self::DEFAULT_GAMMA,
            clahe_clip_limit: Self::DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_tile_grid: Self::DEFAULT_CLAHE_TILE_GRID,
            bilateral_diameter: Self::DEFAULT_BILATERAL_DIAMETER,
            bilateral_sigma_color: Self::DEFAULT_BILATERAL_SIGMA_COLOR,
            bilateral_sigma_space: Self::DEFAULT_BILATERAL_SIGMA_SPACE,
            sat_thr: Self::DEFAULT_SAT_THR,
            dark_thr: Self::DEFAULT_DARK_THR,
            dilate_bright_k: Self::DEFAULT_DILATE_BRIGHT_K,
            dilate_dark_k: Self::DEFAULT_DILATE_DARK_K,
            bottom_exclusion_fraction: Self::DEFAULT_BOTTOM_EXCLUSION_FRACTION,
        }
    }
}

/// Binary exclusion mask: `0` marks a trusted pixel, `255` an excluded one.
///
/// The wrapped raster can only be built through constructors that write
/// [`TRUSTED`] or [`EXCLUDED`], so no other value ever appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionMask(GrayImage);

impl ExclusionMask {
    /// A mask with every pixel trusted.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        Self(GrayImage::new(dimensions.width, dimensions.height))
    }

    /// Exclude every pixel of `source` for which `excluded` returns `true`.
    #[must_use]
    pub fn from_predicate(source: &GrayImage, excluded: impl Fn(u8) -> bool) -> Self {
        Self(GrayImage::from_fn(source.width(), source.height(), |x, y| {
            image::Luma([binary(excluded(source.get_pixel(x, y).0[0]))])
        }))
    }

    /// Exclude every pixel whose coordinates satisfy `excluded`.
    #[must_use]
    pub fn from_region(dimensions: Dimensions, excluded: impl Fn(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(
            dimensions.width,
            dimensions.height,
            |x, y| image::Luma([binary(excluded(x, y))]),
        ))
    }

    /// Wrap a raster, treating any non-zero pixel as excluded.
    #[must_use]
    pub fn from_nonzero(raster: &GrayImage) -> Self {
        Self::from_predicate(raster, |v| v != TRUSTED)
    }

    /// Pixelwise union (logical OR) with another mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the masks differ
    /// in size.
    pub fn union(&self, other: &Self) -> Result<Self, PipelineError> {
        if self.dimensions() != other.dimensions() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        let mut merged = self.0.clone();
        for (dst, src) in merged.pixels_mut().zip(other.0.pixels()) {
            dst.0[0] |= src.0[0];
        }
        Ok(Self(merged))
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }

    /// Whether the pixel at `(x, y)` is excluded.
    ///
    /// Out-of-bounds coordinates are reported as trusted.
    #[must_use]
    pub fn is_excluded(&self, x: u32, y: u32) -> bool {
        self.0
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == EXCLUDED)
    }

    /// Number of excluded pixels.
    #[must_use]
    pub fn excluded_count(&self) -> u64 {
        self.0
            .pixels()
            .map(|p| u64::from(u8::from(p.0[0] == EXCLUDED)))
            .sum()
    }

    /// Returns `true` if every pixel excluded in `other` is also
    /// excluded in `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.dimensions() == other.dimensions()
            && self
                .0
                .pixels()
                .zip(other.0.pixels())
                .all(|(a, b)| a.0[0] == EXCLUDED || b.0[0] == TRUSTED)
    }

    /// Borrow the underlying single-channel raster.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask and return the underlying raster.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

const fn binary(excluded: bool) -> u8 {
    if excluded { EXCLUDED } else { TRUSTED }
}

/// The two products handed to a sink for every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedFrame {
    /// Gamma-corrected, contrast-equalized, denoised color image.
    pub image: RgbImage,
    /// Exclusion mask with the same dimensions as `image`.
    pub mask: ExclusionMask,
}

impl EnhancedFrame {
    /// Dimensions shared by the image and its mask.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.image)
    }
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved, for inspection and testing.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: decoded input frame.
    pub original: RgbImage,
    /// Stage 1: gamma + CLAHE normalized frame.
    pub normalized: RgbImage,
    /// Stage 2: bilateral-filtered frame (the final enhanced image).
    pub denoised: RgbImage,
    /// Stage 3a: BT.601 luminance of the denoised frame.
    pub luminance: GrayImage,
    /// Stage 3b: dilated saturated-pixel mask.
    pub bright: ExclusionMask,
    /// Stage 3c: dilated deep-shadow mask.
    pub dark: ExclusionMask,
    /// Stage 3d: static bottom-region mask.
    pub bottom: ExclusionMask,
    /// Stage 3e: union of the three sub-masks.
    pub mask: ExclusionMask,
}

impl StagedResult {
    /// Drop the intermediates, keeping only what a sink persists.
    #[must_use]
    pub fn into_enhanced(self) -> EnhancedFrame {
        EnhancedFrame {
            image: self.denoised,
            mask: self.mask,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Two rasters that must share a size do not.
    #[error(
        "dimension mismatch: expected {}x{}, got {}x{}",
        .expected.width,
        .expected.height,
        .actual.width,
        .actual.height
    )]
    DimensionMismatch {
        /// Size of the reference raster.
        expected: Dimensions,
        /// Size of the offending raster.
        actual: Dimensions,
    },
}
