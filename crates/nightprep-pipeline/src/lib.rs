//! nightprep-pipeline: Pure night-frame enhancement pipeline (sans-IO).
//!
//! Turns a dark driving-camera frame into an enhanced color image plus
//! a binary exclusion mask through:
//! gamma -> CLAHE on lightness -> bilateral filter -> exclusion mask.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and image buffers. Directory traversal, file writing,
//! and logging live in `nightprep-io`.

pub mod clahe;
pub mod color;
pub mod denoise;
pub mod diagnostics;
pub mod gamma;
pub mod grayscale;
pub mod mask;
pub mod normalize;
pub mod pipeline;
pub mod types;

pub use diagnostics::{FrameDiagnostics, MaskCoverage};
pub use gamma::GammaLut;
pub use types::{
    Dimensions, EXCLUDED, EnhancedFrame, ExclusionMask, GrayImage, PipelineConfig, PipelineError,
    RgbImage, StagedResult, TRUSTED, TileGrid,
};

use web_time::Instant;

/// A validated configuration plus the tables derived from it.
///
/// Build one per run and share it by reference across frames: the
/// gamma table is computed once here instead of per frame.
#[derive(Debug, Clone)]
pub struct Enhancer {
    config: PipelineConfig,
    lut: GammaLut,
}

impl Enhancer {
    /// Validate `config` and precompute the gamma table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if any parameter is out
    /// of range.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let lut = GammaLut::new(config.gamma);
        Ok(Self { config, lut })
    }

    /// The configuration this enhancer was built with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The precomputed gamma table.
    #[must_use]
    pub const fn gamma_lut(&self) -> &GammaLut {
        &self.lut
    }

    /// Start an incremental pipeline from encoded image bytes.
    pub const fn pipeline(&self, source: Vec<u8>) -> pipeline::Pending<'_> {
        pipeline::Pending::new(self, source)
    }

    /// Start an incremental pipeline from an already decoded frame.
    pub const fn stages(&self, frame: RgbImage) -> pipeline::Decoded<'_> {
        pipeline::Decoded::new(self, frame)
    }

    /// Enhance one frame: normalize, denoise, then build the exclusion
    /// mask from the denoised result.
    ///
    /// The output image and mask have the same dimensions as `frame`.
    #[must_use = "returns the enhanced frame"]
    pub fn enhance(&self, frame: &RgbImage) -> EnhancedFrame {
        self.stages(frame.clone())
            .normalize()
            .denoise()
            .build_mask()
            .into_enhanced()
    }

    /// Like [`enhance`](Self::enhance), also timing each stage and
    /// counting excluded pixels.
    #[must_use = "returns the enhanced frame and its diagnostics"]
    pub fn enhance_with_diagnostics(&self, frame: &RgbImage) -> (EnhancedFrame, FrameDiagnostics) {
        let start = Instant::now();
        let decoded = self.stages(frame.clone());

        let t = Instant::now();
        let normalized = decoded.normalize();
        let normalize = t.elapsed();

        let t = Instant::now();
        let denoised = normalized.denoise();
        let denoise = t.elapsed();

        let t = Instant::now();
        let masked = denoised.build_mask();
        let mask = t.elapsed();

        let coverage = MaskCoverage::measure(masked.parts(), masked.mask());
        let enhanced = masked.into_enhanced();
        let diagnostics = FrameDiagnostics {
            dimensions: enhanced.dimensions(),
            normalize,
            denoise,
            mask,
            total: start.elapsed(),
            coverage,
        };
        (enhanced, diagnostics)
    }
}

/// Decode and enhance a single encoded image.
///
/// Convenience wrapper for one-off use; when processing many frames,
/// build an [`Enhancer`] once and reuse it.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid,
/// [`PipelineError::EmptyInput`] if `image_bytes` is empty, or
/// [`PipelineError::ImageDecode`] if the bytes are not a readable image.
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<EnhancedFrame, PipelineError> {
    let enhancer = Enhancer::new(config.clone())?;
    let frame = grayscale::decode(image_bytes)?;
    Ok(enhancer.enhance(&frame))
}
