//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`Enhancer::enhance`] which runs every step in one call, the
//! stage types here let the caller drive execution one step at a time:
//!
//! ```rust
//! # use nightprep_pipeline::{Enhancer, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let enhancer = Enhancer::new(PipelineConfig::default())?;
//! let staged = enhancer
//!     .pipeline(png)
//!     .decode()?
//!     .normalize()
//!     .denoise()
//!     .build_mask()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline
//! state, carrying all previously computed intermediates. The order of
//! steps is fixed by the types: masks are always built from the
//! denoised frame, never from the raw or merely normalized one.
//!
//! # Memory
//!
//! [`Masked`] holds four full-size color rasters and five single-channel
//! ones. Callers that only need the final image and mask should use
//! [`Enhancer::enhance`] or [`Masked::into_enhanced`].

use crate::Enhancer;
use crate::mask::{self, SubMasks};
use crate::types::{EnhancedFrame, GrayImage, PipelineError, RgbImage, StagedResult};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before the source bytes are decoded.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending<'a> {
    enhancer: &'a Enhancer,
    source: Vec<u8>,
}

impl<'a> Pending<'a> {
    pub(crate) const fn new(enhancer: &'a Enhancer, source: Vec<u8>) -> Self {
        Self { enhancer, source }
    }

    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source bytes and advance to [`Decoded`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if the source is empty, or
    /// [`PipelineError::ImageDecode`] if it is not a readable image.
    pub fn decode(self) -> Result<Decoded<'a>, PipelineError> {
        let original = crate::grayscale::decode(&self.source)?;
        Ok(Decoded::new(self.enhancer, original))
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state holding the decoded 8-bit RGB frame.
#[must_use = "pipeline stages are consumed by advancing, call .normalize() to continue"]
pub struct Decoded<'a> {
    enhancer: &'a Enhancer,
    original: RgbImage,
}

impl<'a> Decoded<'a> {
    pub(crate) const fn new(enhancer: &'a Enhancer, original: RgbImage) -> Self {
        Self { enhancer, original }
    }

    /// The decoded input frame.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Apply gamma and CLAHE, advancing to [`Normalized`].
    pub fn normalize(self) -> Normalized<'a> {
        let config = self.enhancer.config();
        let normalized = crate::normalize::normalize(
            &self.original,
            self.enhancer.gamma_lut(),
            config.clahe_clip_limit,
            config.clahe_tile_grid,
        );
        Normalized {
            enhancer: self.enhancer,
            original: self.original,
            normalized,
        }
    }
}

// ───────────────────────── Stage 2: Normalized ───────────────────────

/// Pipeline state after gamma correction and lightness equalization.
#[must_use = "pipeline stages are consumed by advancing, call .denoise() to continue"]
pub struct Normalized<'a> {
    enhancer: &'a Enhancer,
    original: RgbImage,
    normalized: RgbImage,
}

impl<'a> Normalized<'a> {
    /// The normalized frame.
    #[must_use]
    pub const fn normalized(&self) -> &RgbImage {
        &self.normalized
    }

    /// Apply the bilateral filter, advancing to [`Denoised`].
    pub fn denoise(self) -> Denoised<'a> {
        let config = self.enhancer.config();
        let denoised = crate::denoise::bilateral(
            &self.normalized,
            config.bilateral_diameter,
            config.bilateral_sigma_color,
            config.bilateral_sigma_space,
        );
        Denoised {
            enhancer: self.enhancer,
            original: self.original,
            normalized: self.normalized,
            denoised,
        }
    }
}

// ───────────────────────── Stage 3: Denoised ─────────────────────────

/// Pipeline state after noise suppression. The denoised frame is the
/// final enhanced image.
#[must_use = "pipeline stages are consumed by advancing, call .build_mask() to continue"]
pub struct Denoised<'a> {
    enhancer: &'a Enhancer,
    original: RgbImage,
    normalized: RgbImage,
    denoised: RgbImage,
}

impl Denoised<'_> {
    /// The denoised frame.
    #[must_use]
    pub const fn denoised(&self) -> &RgbImage {
        &self.denoised
    }

    /// Build the exclusion mask from the denoised frame, advancing to
    /// [`Masked`].
    pub fn build_mask(self) -> Masked {
        let luminance = crate::grayscale::luminance(&self.denoised);
        let parts = mask::build_sub_masks(&luminance, self.enhancer.config());
        let mask = parts.merged();
        Masked {
            original: self.original,
            normalized: self.normalized,
            denoised: self.denoised,
            luminance,
            parts,
            mask,
        }
    }
}

// ───────────────────────── Stage 4: Masked ───────────────────────────

/// Final pipeline state: enhanced image plus exclusion mask.
#[must_use = "call .into_result() or .into_enhanced() to take the outputs"]
pub struct Masked {
    original: RgbImage,
    normalized: RgbImage,
    denoised: RgbImage,
    luminance: GrayImage,
    parts: SubMasks,
    mask: crate::types::ExclusionMask,
}

impl Masked {
    /// Luminance raster the thresholds were applied to.
    #[must_use]
    pub const fn luminance(&self) -> &GrayImage {
        &self.luminance
    }

    /// The bright, dark, and bottom sub-masks.
    #[must_use]
    pub const fn parts(&self) -> &SubMasks {
        &self.parts
    }

    /// The merged exclusion mask.
    #[must_use]
    pub const fn mask(&self) -> &crate::types::ExclusionMask {
        &self.mask
    }

    /// Consume the pipeline, keeping every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let (bright, dark, bottom) = self.parts.into_parts();
        StagedResult {
            original: self.original,
            normalized: self.normalized,
            denoised: self.denoised,
            luminance: self.luminance,
            bright,
            dark,
            bottom,
            mask: self.mask,
        }
    }

    /// Consume the pipeline, keeping only what a sink persists.
    #[must_use]
    pub fn into_enhanced(self) -> EnhancedFrame {
        EnhancedFrame {
            image: self.denoised,
            mask: self.mask,
        }
    }
}

// ───────────────────────── Uniform access ────────────────────────────

/// Common metadata for every typed stage.
pub trait PipelineStage {
    /// Short stage name used in logs and diagnostics.
    const NAME: &'static str;
    /// Zero-based position in the pipeline.
    const INDEX: usize;
}

impl PipelineStage for Pending<'_> {
    const NAME: &'static str = "pending";
    const INDEX: usize = 0;
}

impl PipelineStage for Decoded<'_> {
    const NAME: &'static str = "decode";
    const INDEX: usize = 1;
}

impl PipelineStage for Normalized<'_> {
    const NAME: &'static str = "normalize";
    const INDEX: usize = 2;
}

impl PipelineStage for Denoised<'_> {
    const NAME: &'static str = "denoise";
    const INDEX: usize = 3;
}

impl PipelineStage for Masked {
    const NAME: &'static str = "mask";
    const INDEX: usize = 4;
}

/// Number of stages, `Pending` included.
pub const STAGE_COUNT: usize = 5;

/// Enum wrapping all pipeline stages for loop-driven access.
///
/// ```rust
/// # use nightprep_pipeline::{Enhancer, PipelineConfig, PipelineError};
/// # use nightprep_pipeline::pipeline::Stage;
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let enhancer = Enhancer::new(PipelineConfig::default())?;
/// let mut stage = Stage::from(enhancer.pipeline(png));
/// while !stage.is_complete() {
///     stage = stage.advance()?;
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage<'a> {
    /// See [`Pending`].
    Pending(Pending<'a>),
    /// See [`Decoded`].
    Decoded(Decoded<'a>),
    /// See [`Normalized`].
    Normalized(Normalized<'a>),
    /// See [`Denoised`].
    Denoised(Denoised<'a>),
    /// See [`Masked`].
    Masked(Masked),
}

impl Stage<'_> {
    /// Short name of the current stage.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending(_) => Pending::NAME,
            Self::Decoded(_) => Decoded::NAME,
            Self::Normalized(_) => Normalized::NAME,
            Self::Denoised(_) => Denoised::NAME,
            Self::Masked(_) => Masked::NAME,
        }
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Pending(_) => Pending::INDEX,
            Self::Decoded(_) => Decoded::INDEX,
            Self::Normalized(_) => Normalized::INDEX,
            Self::Denoised(_) => Denoised::INDEX,
            Self::Masked(_) => Masked::INDEX,
        }
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Masked(_))
    }

    /// Advance one stage. The final stage is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if decoding fails.
    pub fn advance(self) -> Result<Self, PipelineError> {
        Ok(match self {
            Self::Pending(s) => Self::Decoded(s.decode()?),
            Self::Decoded(s) => Self::Normalized(s.normalize()),
            Self::Normalized(s) => Self::Denoised(s.denoise()),
            Self::Denoised(s) => Self::Masked(s.build_mask()),
            done @ Self::Masked(_) => done,
        })
    }

    /// Run every remaining stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if decoding fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        let mut stage = self;
        loop {
            if let Self::Masked(done) = stage {
                return Ok(done.into_result());
            }
            stage = stage.advance()?;
        }
    }
}

impl<'a> From<Pending<'a>> for Stage<'a> {
    fn from(s: Pending<'a>) -> Self {
        Self::Pending(s)
    }
}

impl<'a> From<Decoded<'a>> for Stage<'a> {
    fn from(s: Decoded<'a>) -> Self {
        Self::Decoded(s)
    }
}

impl<'a> From<Normalized<'a>> for Stage<'a> {
    fn from(s: Normalized<'a>) -> Self {
        Self::Normalized(s)
    }
}

impl<'a> From<Denoised<'a>> for Stage<'a> {
    fn from(s: Denoised<'a>) -> Self {
        Self::Denoised(s)
    }
}

impl From<Masked> for Stage<'_> {
    fn from(s: Masked) -> Self {
        Self::Masked(s)
    }
}
