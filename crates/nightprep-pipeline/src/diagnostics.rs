//! Per-frame diagnostics: stage timings and mask coverage.
//!
//! Collected by [`Enhancer::enhance_with_diagnostics`](crate::Enhancer::enhance_with_diagnostics)
//! for parameter tuning. Mask counts show at a glance whether a
//! threshold or dilation size is excluding too much of a frame.
//!
//! Duration measurements use [`std::time::Duration`]. Timestamps are
//! captured via the `web-time` crate, which falls back to
//! `std::time::Instant` on native targets.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mask::SubMasks;
use crate::types::{Dimensions, ExclusionMask};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected while enhancing one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    /// Frame size.
    pub dimensions: Dimensions,
    /// Gamma + CLAHE.
    #[serde(with = "duration_serde")]
    pub normalize: Duration,
    /// Bilateral filter.
    #[serde(with = "duration_serde")]
    pub denoise: Duration,
    /// Luminance, thresholds, dilation, and union.
    #[serde(with = "duration_serde")]
    pub mask: Duration,
    /// Wall-clock time for the whole frame.
    #[serde(with = "duration_serde")]
    pub total: Duration,
    /// Excluded-pixel counts.
    pub coverage: MaskCoverage,
}

/// How many pixels each part of the exclusion mask covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskCoverage {
    /// Pixels in the frame.
    pub pixel_count: u64,
    /// Pixels excluded by the dilated saturation mask.
    pub bright: u64,
    /// Pixels excluded by the dilated shadow mask.
    pub dark: u64,
    /// Pixels in the bottom band.
    pub bottom: u64,
    /// Pixels excluded by the merged mask.
    pub total: u64,
}

impl MaskCoverage {
    /// Count the pixels covered by each sub-mask and by the merged mask.
    #[must_use]
    pub fn measure(parts: &SubMasks, merged: &ExclusionMask) -> Self {
        Self {
            pixel_count: merged.dimensions().pixel_count(),
            bright: parts.bright().excluded_count(),
            dark: parts.dark().excluded_count(),
            bottom: parts.bottom().excluded_count(),
            total: merged.excluded_count(),
        }
    }

    /// Fraction of the frame that is excluded, in `0.0..=1.0`.
    #[must_use]
    pub fn excluded_ratio(&self) -> f64 {
        if self.pixel_count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.total as f64 / self.pixel_count as f64;
        ratio
    }
}

impl FrameDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Frame Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.dimensions.width, self.dimensions.height, self.coverage.pixel_count,
        ));
        lines.push(format!("Total duration: {:.3}ms", duration_ms(self.total)));
        lines.push(String::new());

        lines.push(format!("{:<16} {:>10} {:>10}", "Stage", "Duration", "% Total"));
        lines.push("-".repeat(40));

        let total_ms = duration_ms(self.total);
        for (name, duration) in [
            ("Normalize", self.normalize),
            ("Denoise", self.denoise),
            ("Mask", self.mask),
        ] {
            let ms = duration_ms(duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Excluded: bright={}  dark={}  bottom={}  |  total={} ({:.1}%)",
            self.coverage.bright,
            self.coverage.dark,
            self.coverage.bottom,
            self.coverage.total,
            self.coverage.excluded_ratio() * 100.0,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
