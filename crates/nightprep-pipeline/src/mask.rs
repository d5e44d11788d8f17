//! Exclusion mask: marks pixels downstream consumers should not trust.
//!
//! Three regions are excluded, each built independently and then
//! merged by pixelwise union:
//!
//! - **bright**: saturated pixels (luminance at or above `sat_thr`),
//!   dilated with a `dilate_bright_k` square to cover glare halos
//! - **dark**: deep shadow (luminance at or below `dark_thr`), dilated
//!   with a smaller `dilate_dark_k` square
//! - **bottom**: a fixed band of rows at the bottom of the frame, where
//!   the vehicle hood or sensor mount is
//!
//! This is step 3 in the pipeline, applied to the denoised frame.

use imageproc::distance_transform::Norm;

use crate::grayscale;
use crate::types::{
    Dimensions, ExclusionMask, GrayImage, PipelineConfig, PipelineError, RgbImage,
};

/// Exclude pixels whose luminance is at or above `sat_thr`.
#[must_use = "returns the saturated-pixel mask"]
pub fn threshold_bright(luminance: &GrayImage, sat_thr: u8) -> ExclusionMask {
    ExclusionMask::from_predicate(luminance, |v| v >= sat_thr)
}

/// Exclude pixels whose luminance is at or below `dark_thr`.
#[must_use = "returns the deep-shadow mask"]
pub fn threshold_dark(luminance: &GrayImage, dark_thr: u8) -> ExclusionMask {
    ExclusionMask::from_predicate(luminance, |v| v <= dark_thr)
}

/// Dilate a mask with a `k x k` square structuring element.
///
/// Every excluded pixel grows by `(k - 1) / 2` pixels in each of the
/// eight directions, clipped at the image border. `k` of 0 or 1 leaves
/// the mask unchanged; `k` above
/// [`MAX_DILATE_K`](PipelineConfig::MAX_DILATE_K) is treated as that
/// maximum.
#[must_use = "returns the dilated mask"]
pub fn dilate_square(mask: &ExclusionMask, k: u32) -> ExclusionMask {
    let k = k.min(PipelineConfig::MAX_DILATE_K);
    let radius = u8::try_from(k.saturating_sub(1) / 2).unwrap_or(u8::MAX / 2);
    // The distance transform reports every pixel of an all-background
    // image as "far", but only up to width + height. Small images would
    // then dilate to fully excluded.
    if radius == 0 || mask.excluded_count() == 0 {
        return mask.clone();
    }
    let grown = imageproc::morphology::dilate(mask.as_image(), Norm::LInf, radius);
    ExclusionMask::from_nonzero(&grown)
}

/// Exclude the bottom `fraction` of rows.
///
/// The band starts at row `floor((1 - fraction) * height)` and runs to
/// the last row, across the full width. A fraction of 0 excludes
/// nothing; 1 excludes every row.
#[must_use = "returns the bottom-region mask"]
pub fn bottom_region(dimensions: Dimensions, fraction: f64) -> ExclusionMask {
    let start = bottom_start_row(dimensions.height, fraction);
    ExclusionMask::from_region(dimensions, |_, y| y >= start)
}

/// First excluded row of the bottom band.
#[must_use]
pub fn bottom_start_row(height: u32, fraction: f64) -> u32 {
    let fraction = fraction.clamp(0.0, 1.0);
    let start = ((1.0 - fraction) * f64::from(height)).floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let start = start as u32;
    start.min(height)
}

/// The three sub-masks a full exclusion mask is the union of.
///
/// All three always share one size.
#[derive(Debug, Clone)]
pub struct SubMasks {
    bright: ExclusionMask,
    dark: ExclusionMask,
    bottom: ExclusionMask,
}

impl SubMasks {
    /// Group three sub-masks.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `dark` or `bottom`
    /// differs in size from `bright`.
    pub fn new(
        bright: ExclusionMask,
        dark: ExclusionMask,
        bottom: ExclusionMask,
    ) -> Result<Self, PipelineError> {
        let expected = bright.dimensions();
        for part in [&dark, &bottom] {
            if part.dimensions() != expected {
                return Err(PipelineError::DimensionMismatch {
                    expected,
                    actual: part.dimensions(),
                });
            }
        }
        Ok(Self {
            bright,
            dark,
            bottom,
        })
    }

    /// Dilated saturated-pixel mask.
    #[must_use]
    pub const fn bright(&self) -> &ExclusionMask {
        &self.bright
    }

    /// Dilated deep-shadow mask.
    #[must_use]
    pub const fn dark(&self) -> &ExclusionMask {
        &self.dark
    }

    /// Static bottom band.
    #[must_use]
    pub const fn bottom(&self) -> &ExclusionMask {
        &self.bottom
    }

    /// Shared size of the three parts.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.bright.dimensions()
    }

    /// Take the parts as `(bright, dark, bottom)`.
    #[must_use]
    pub fn into_parts(self) -> (ExclusionMask, ExclusionMask, ExclusionMask) {
        (self.bright, self.dark, self.bottom)
    }

    /// Pixelwise union of all three sub-masks.
    #[must_use]
    pub fn merged(&self) -> ExclusionMask {
        ExclusionMask::from_region(self.dimensions(), |x, y| {
            self.bright.is_excluded(x, y)
                || self.dark.is_excluded(x, y)
                || self.bottom.is_excluded(x, y)
        })
    }
}

/// Build the bright, dark, and bottom sub-masks from a luminance raster.
#[must_use = "returns the sub-masks"]
pub fn build_sub_masks(luminance: &GrayImage, config: &PipelineConfig) -> SubMasks {
    // Every part is sized from `luminance`, so no size check is needed.
    SubMasks {
        bright: dilate_square(
            &threshold_bright(luminance, config.sat_thr),
            config.dilate_bright_k,
        ),
        dark: dilate_square(
            &threshold_dark(luminance, config.dark_thr),
            config.dilate_dark_k,
        ),
        bottom: bottom_region(Dimensions::of(luminance), config.bottom_exclusion_fraction),
    }
}

/// Build the exclusion mask for a (denoised) color frame.
///
/// Same dimensions as `frame`; every pixel is either
/// [`TRUSTED`](crate::types::TRUSTED) or
/// [`EXCLUDED`](crate::types::EXCLUDED).
#[must_use = "returns the exclusion mask"]
pub fn build_exclusion_mask(frame: &RgbImage, config: &PipelineConfig) -> ExclusionMask {
    build_sub_masks(&grayscale::luminance(frame), config).merged()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn gray(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, image::Luma([v]))
    }

    fn point_mask(w: u32, h: u32, px: u32, py: u32) -> ExclusionMask {
        ExclusionMask::from_region(dims(w, h), |x, y| x == px && y == py)
    }

    #[test]
    fn bright_threshold_is_inclusive() {
        let lum = GrayImage::from_fn(3, 1, |x, _| image::Luma([[244, 245, 255][x as usize]]));
        let mask = threshold_bright(&lum, 245);
        assert!(!mask.is_excluded(0, 0));
        assert!(mask.is_excluded(1, 0));
        assert!(mask.is_excluded(2, 0));
    }

    #[test]
    fn dark_threshold_is_inclusive() {
        let lum = GrayImage::from_fn(3, 1, |x, _| image::Luma([[0, 8, 9][x as usize]]));
        let mask = threshold_dark(&lum, 8);
        assert!(mask.is_excluded(0, 0));
        assert!(mask.is_excluded(1, 0));
        assert!(!mask.is_excluded(2, 0));
    }

    #[test]
    fn dilation_of_single_pixel_is_square() {
        let mask = dilate_square(&point_mask(50, 50, 25, 25), 5);
        assert_eq!(mask.excluded_count(), 25);
        for y in 23..=27 {
            for x in 23..=27 {
                assert!(mask.is_excluded(x, y), "({x}, {y}) should be excluded");
            }
        }
        assert!(!mask.is_excluded(22, 25));
        assert!(!mask.is_excluded(25, 28));
    }

    #[test]
    fn dilation_is_clipped_at_border() {
        let mask = dilate_square(&point_mask(10, 10, 0, 0), 5);
        assert_eq!(mask.excluded_count(), 9);
    }

    #[test]
    fn dilation_of_empty_mask_stays_empty() {
        let empty = ExclusionMask::empty(dims(4, 4));
        assert_eq!(dilate_square(&empty, 25).excluded_count(), 0);
    }

    #[test]
    fn unit_kernel_is_identity() {
        let mask = point_mask(8, 8, 3, 4);
        assert_eq!(dilate_square(&mask, 1), mask);
    }

    #[test]
    fn oversized_kernel_is_capped() {
        let strip = point_mask(300, 1, 0, 0);
        // k = 255 grows by 127 on each side, so 128 pixels from the edge.
        assert_eq!(dilate_square(&strip, 255).excluded_count(), 128);
        assert_eq!(dilate_square(&strip, 400), dilate_square(&strip, 255));
        assert_eq!(dilate_square(&strip, u32::MAX), dilate_square(&strip, 255));
    }

    #[test]
    fn dilation_contains_its_input() {
        let mask = ExclusionMask::from_region(dims(30, 20), |x, y| (x * 7 + y * 3) % 11 == 0);
        assert!(dilate_square(&mask, 5).contains(&mask));
    }

    #[test]
    fn bottom_region_starts_at_three_quarters() {
        let mask = bottom_region(dims(10, 100), 0.25);
        assert!(!mask.is_excluded(0, 74));
        assert!(mask.is_excluded(0, 75));
        assert!(mask.is_excluded(9, 99));
        assert_eq!(mask.excluded_count(), 250);
    }

    #[test]
    fn bottom_region_floors_start_row() {
        // floor(0.75 * 10) = 7
        assert_eq!(bottom_start_row(10, 0.25), 7);
        // floor(0.75 * 3) = 2
        assert_eq!(bottom_start_row(3, 0.25), 2);
    }

    #[test]
    fn bottom_region_extremes() {
        assert_eq!(bottom_region(dims(5, 5), 0.0).excluded_count(), 0);
        assert_eq!(bottom_region(dims(5, 5), 1.0).excluded_count(), 25);
    }

    #[test]
    fn saturated_pixel_excludes_25x25_block() {
        let mut lum = gray(100, 100, 128);
        lum.put_pixel(50, 30, image::Luma([255]));
        let subs = build_sub_masks(&lum, &PipelineConfig::default());

        assert_eq!(subs.bright().excluded_count(), 625);
        for y in 18..=42 {
            for x in 38..=62 {
                assert!(subs.bright().is_excluded(x, y), "({x}, {y}) should be excluded");
            }
        }
        assert!(!subs.bright().is_excluded(37, 30));
        assert!(!subs.bright().is_excluded(50, 43));
        assert_eq!(subs.dark().excluded_count(), 0);

        let merged = subs.merged();
        assert!(merged.is_excluded(50, 30));
        assert!(merged.is_excluded(0, 99));
        assert!(!merged.is_excluded(0, 50));
    }

    #[test]
    fn dark_pixel_excludes_5x5_block() {
        let mut lum = gray(40, 40, 128);
        lum.put_pixel(20, 5, image::Luma([3]));
        let subs = build_sub_masks(&lum, &PipelineConfig::default());
        assert_eq!(subs.dark().excluded_count(), 25);
        assert!(subs.dark().is_excluded(18, 3));
        assert!(subs.dark().is_excluded(22, 7));
        assert!(!subs.dark().is_excluded(23, 5));
    }

    #[test]
    fn merged_mask_contains_every_part() {
        let lum = GrayImage::from_fn(60, 40, |x, y| {
            image::Luma([match (x, y) {
                (10, 5) => 255,
                (40, 8) => 2,
                _ => 100,
            }])
        });
        let subs = build_sub_masks(&lum, &PipelineConfig::default());
        let merged = subs.merged();
        assert!(merged.contains(subs.bright()));
        assert!(merged.contains(subs.dark()));
        assert!(merged.contains(subs.bottom()));
    }

    #[test]
    fn sub_masks_of_different_sizes_are_rejected() {
        let result = SubMasks::new(
            ExclusionMask::empty(dims(8, 6)),
            ExclusionMask::empty(dims(8, 6)),
            ExclusionMask::empty(dims(6, 8)),
        );
        assert!(matches!(
            result,
            Err(PipelineError::DimensionMismatch { expected, actual })
                if expected == dims(8, 6) && actual == dims(6, 8)
        ));
    }

    #[test]
    fn merged_mask_is_the_full_union() {
        let d = dims(6, 4);
        let subs = SubMasks::new(
            ExclusionMask::from_region(d, |x, y| x == 0 && y == 0),
            ExclusionMask::from_region(d, |x, y| x == 5 && y == 0),
            ExclusionMask::from_region(d, |_, y| y == 3),
        )
        .unwrap();
        let merged = subs.merged();
        assert_eq!(merged.excluded_count(), 8);
        assert!(merged.is_excluded(0, 0));
        assert!(merged.is_excluded(5, 0));
        assert!(merged.is_excluded(2, 3));
        assert!(!merged.is_excluded(2, 1));
    }

    #[test]
    fn build_exclusion_mask_matches_frame_dimensions() {
        let frame = RgbImage::from_pixel(17, 9, image::Rgb([128, 128, 128]));
        let mask = build_exclusion_mask(&frame, &PipelineConfig::default());
        assert_eq!(mask.dimensions(), dims(17, 9));
    }

    #[test]
    fn lower_saturation_threshold_grows_mask() {
        let lum = GrayImage::from_fn(40, 40, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = 200 + ((x + y) % 56) as u8;
            image::Luma([v])
        });
        let strict = build_sub_masks(&lum, &PipelineConfig::default()).merged();
        let loose = build_sub_masks(
            &lum,
            &PipelineConfig {
                sat_thr: 245,
                ..PipelineConfig::default()
            },
        )
        .merged();
        assert!(loose.contains(&strict));
    }
}
