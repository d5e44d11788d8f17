//! Gamma correction through a precomputed lookup table.
//!
//! The table depends only on the exponent, so it is built once per run
//! (see [`Enhancer`](crate::Enhancer)) and applied to every frame.

use image::RgbImage;

/// 256-entry gamma remap: `lut[i] = trunc(255 * (i / 255)^gamma)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaLut([u8; 256]);

impl GammaLut {
    /// Build the table for `gamma`.
    ///
    /// Callers are expected to pass a finite, positive exponent
    /// ([`PipelineConfig::validate`](crate::PipelineConfig::validate)
    /// enforces this); the result is clamped to `0..=255` regardless.
    #[must_use]
    pub fn new(gamma: f64) -> Self {
        let table = std::array::from_fn(|i| {
            #[allow(clippy::cast_precision_loss)]
            let normalized = i as f64 / 255.0;
            let value = (255.0 * normalized.powf(gamma)).clamp(0.0, 255.0);
            // Truncates toward zero.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let byte = value as u8;
            byte
        });
        Self(table)
    }

    /// Look up a single value.
    #[must_use]
    pub const fn map(&self, value: u8) -> u8 {
        self.0[value as usize]
    }

    /// Returns `true` if the table maps every value to itself.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &v)| usize::from(v) == i)
    }

    /// Remap every channel of every pixel through the table.
    #[must_use = "returns the gamma-corrected image"]
    pub fn apply(&self, frame: &RgbImage) -> RgbImage {
        let mut out = frame.clone();
        for channel in out.iter_mut() {
            *channel = self.map(*channel);
        }
        out
    }
}
