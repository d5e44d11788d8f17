//! Photometric normalization: gamma correction followed by CLAHE on
//! lightness only.
//!
//! Night frames are mostly dark, so a gamma below 1.0 first lifts the
//! shadows. Local contrast is then equalized on the L channel of
//! L\*a\*b\*, leaving chroma untouched so colors do not shift.
//!
//! This is step 1 in the pipeline, between decode and denoising.

use image::RgbImage;

use crate::clahe;
use crate::color::LabPlanes;
use crate::gamma::GammaLut;
use crate::types::TileGrid;

/// Apply the gamma table, then CLAHE on lightness.
///
/// Output has the same dimensions and channel order as the input.
#[must_use = "returns the normalized image"]
pub fn normalize(frame: &RgbImage, lut: &GammaLut, clip_limit: f32, grid: TileGrid) -> RgbImage {
    let brightened = if lut.is_identity() {
        frame.clone()
    } else {
        lut.apply(frame)
    };
    equalize_lightness(&brightened, clip_limit, grid)
}

/// CLAHE on the L\*a\*b\* lightness channel only.
#[must_use = "returns the equalized image"]
pub fn equalize_lightness(frame: &RgbImage, clip_limit: f32, grid: TileGrid) -> RgbImage {
    let planes = LabPlanes::from_rgb(frame);
    let lightness = clahe::equalize(&planes.lightness, clip_limit, grid);
    planes.with_lightness(lightness).to_rgb()
}
