//! Edge-preserving noise suppression with a bilateral filter.
//!
//! Each output pixel is a weighted mean of its neighbors inside a square
//! window. The weight is the product of a spatial Gaussian on the offset
//! and a range Gaussian on the color difference, so flat regions are
//! smoothed while strong edges (where neighbors differ a lot in color)
//! are left sharp.
//!
//! The three channels share one weight per neighbor: the color
//! difference is the sum of absolute per-channel differences. Window
//! coordinates outside the image are clamped to the border. Filtering
//! runs on an `f32` copy of the frame and rounds back to 8 bits, so flat
//! regions (including fully saturated ones) keep their exact value.
//!
//! This is step 2 in the pipeline, between normalization and mask
//! construction.

use image::{Rgb, Rgb32FImage, RgbImage};
use imageproc::filter::bilateral::{ColorDistance, bilateral_filter};

/// Largest possible color distance (`3 * 255`).
const MAX_COLOR_DISTANCE: usize = 3 * 255;

/// Range kernel over the L1 distance between two RGB pixels with
/// channels in `0.0..=255.0`.
///
/// The Gaussian is tabulated once for every integral distance.
#[derive(Debug, Clone)]
pub struct SumAbsDistance {
    weights: Vec<f32>,
}

impl SumAbsDistance {
    #[must_use]
    pub fn new(sigma_color: f32) -> Self {
        let coeff = -0.5 / (sigma_color * sigma_color);
        let weights = (0..=MAX_COLOR_DISTANCE)
            .map(|d| {
                #[allow(clippy::cast_precision_loss)]
                let d = d as f32;
                (d * d * coeff).exp()
            })
            .collect();
        Self { weights }
    }

    /// Sum of absolute channel differences.
    #[must_use]
    pub fn distance(a: &Rgb<f32>, b: &Rgb<f32>) -> f32 {
        a.0.iter().zip(&b.0).map(|(p, q)| (p - q).abs()).sum()
    }
}

impl ColorDistance<Rgb<f32>> for SumAbsDistance {
    fn color_distance(&self, pixel1: &Rgb<f32>, pixel2: &Rgb<f32>) -> f32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = Self::distance(pixel1, pixel2).round() as usize;
        self.weights.get(index).copied().unwrap_or(0.0)
    }
}

/// Apply a joint-color bilateral filter.
///
/// `diameter` is the window size in pixels; the window spans
/// `diameter / 2` pixels on each side of the center. A radius of zero
/// (diameter 0 or 1), non-positive sigmas and empty frames return the
/// image unchanged.
#[must_use = "returns the filtered image"]
pub fn bilateral(frame: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let radius = u8::try_from(diameter / 2).unwrap_or(u8::MAX);
    let (w, h) = frame.dimensions();
    if radius == 0 || sigma_color <= 0.0 || sigma_space <= 0.0 || w == 0 || h == 0 {
        return frame.clone();
    }

    let widened = Rgb32FImage::from_fn(w, h, |x, y| Rgb(frame.get_pixel(x, y).0.map(f32::from)));
    let filtered = bilateral_filter(&widened, radius, sigma_space, SumAbsDistance::new(sigma_color));
    RgbImage::from_fn(w, h, |x, y| Rgb(filtered.get_pixel(x, y).0.map(to_byte)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
