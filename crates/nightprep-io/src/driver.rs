//! Batch driver: feed every frame of a source through the pipeline and
//! into a sink, one at a time, in source order.
//!
//! Per-frame read and decode failures are logged and skipped. Sink
//! failures abort the run.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;
use std::time::Duration;

use nightprep_pipeline::{Enhancer, FrameDiagnostics, grayscale};
use serde::Serialize;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::IoError;
use crate::sink::FrameSink;
use crate::source::{FrameEntry, FrameSource};

/// Switches for what the driver measures and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Log per-frame elapsed time and the closing timing summary.
    pub timing: bool,
    /// Collect each frame's stage diagnostics into the summary and log
    /// the report at `debug` level.
    pub diagnostics: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timing: true,
            diagnostics: false,
        }
    }
}

/// A frame that was not processed, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFrame {
    /// The source entry.
    pub entry: FrameEntry,
    /// Human-readable reason.
    pub reason: String,
}

/// Stage diagnostics for one processed frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    /// Frame ID (file stem).
    pub id: String,
    /// Source file name.
    pub file: String,
    /// Stage timings and mask coverage.
    #[serde(flatten)]
    pub diagnostics: FrameDiagnostics,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Frames written to the sink.
    pub processed: usize,
    /// Frames that could not be read or decoded.
    pub skipped: Vec<SkippedFrame>,
    /// Wall-clock time of each processed frame (read to sink).
    pub frame_durations: Vec<Duration>,
    /// Wall-clock time of the whole run.
    pub total: Duration,
    /// Per-frame diagnostics, filled only when
    /// [`RunOptions::diagnostics`] is set.
    pub diagnostics: Vec<FrameReport>,
}

impl RunSummary {
    /// Mean time per processed frame, or `None` if nothing was processed.
    #[must_use]
    pub fn average_frame_time(&self) -> Option<Duration> {
        let count = u32::try_from(self.frame_durations.len()).ok()?;
        if count == 0 {
            return None;
        }
        Some(self.frame_durations.iter().sum::<Duration>() / count)
    }

    /// Processed frames per second of frame time, or `None` if nothing
    /// was processed or the frames took no measurable time.
    #[must_use]
    pub fn average_fps(&self) -> Option<f64> {
        let secs = self.average_frame_time()?.as_secs_f64();
        (secs > 0.0).then(|| 1.0 / secs)
    }

    /// One-paragraph timing summary.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = vec![format!(
            "Processed {} frame(s), skipped {} in {:.3}s",
            self.processed,
            self.skipped.len(),
            self.total.as_secs_f64(),
        )];
        if let Some(avg) = self.average_frame_time() {
            lines.push(format!(
                "Average per frame: {:.2}ms",
                avg.as_secs_f64() * 1000.0
            ));
        }
        if let Some(fps) = self.average_fps() {
            lines.push(format!("Average FPS: {fps:.2}"));
        }
        lines.join("\n")
    }

    /// Write the collected per-frame diagnostics to `path` as a JSON
    /// array.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DiagnosticsReport`] if the file cannot be
    /// created, serialized, or flushed.
    pub fn write_diagnostics_json(&self, path: &Path) -> Result<(), IoError> {
        let fail = |source| IoError::DiagnosticsReport {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(|e| fail(serde_json::Error::io(e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.diagnostics).map_err(fail)?;
        writer.flush().map_err(|e| fail(serde_json::Error::io(e)))
    }
}

/// Process every frame of `source` into `sink`.
///
/// An empty source is not an error: a warning is logged and an empty
/// summary returned.
///
/// # Errors
///
/// Returns the sink's [`IoError`] as soon as any write fails. Frames
/// already written stay on disk.
pub fn run(
    source: &impl FrameSource,
    sink: &mut impl FrameSink,
    enhancer: &Enhancer,
    options: RunOptions,
) -> Result<RunSummary, IoError> {
    let start = Instant::now();
    let entries = source.entries();
    let mut summary = RunSummary::default();

    if entries.is_empty() {
        warn!("no images found");
        return Ok(summary);
    }
    info!("found {} image(s)", entries.len());

    let total = entries.len();
    for (index, entry) in entries.iter().enumerate() {
        let frame_start = Instant::now();

        let bytes = match source.read(entry) {
            Ok(bytes) => bytes,
            Err(err) => {
                skip(&mut summary, entry, err.to_string());
                continue;
            }
        };
        let frame = match grayscale::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                skip(&mut summary, entry, err.to_string());
                continue;
            }
        };

        let enhanced = if options.diagnostics {
            let (enhanced, diagnostics) = enhancer.enhance_with_diagnostics(&frame);
            debug!("{}: {}\n{}", entry.id, entry.file_name(), diagnostics.report());
            summary.diagnostics.push(FrameReport {
                id: entry.id.clone(),
                file: entry.file_name(),
                diagnostics,
            });
            enhanced
        } else {
            enhancer.enhance(&frame)
        };

        sink.write(entry, &enhanced)?;

        let elapsed = frame_start.elapsed();
        summary.processed += 1;
        summary.frame_durations.push(elapsed);

        if options.timing {
            info!(
                "[{}/{total}] {} ({:.1}ms)",
                index + 1,
                entry.id,
                elapsed.as_secs_f64() * 1000.0
            );
        } else {
            info!("[{}/{total}] {}", index + 1, entry.id);
        }
    }

    summary.total = start.elapsed();
    if !summary.skipped.is_empty() {
        warn!("skipped {} unreadable frame(s)", summary.skipped.len());
    }
    if options.timing {
        for line in summary.report().lines() {
            info!("{line}");
        }
    }
    Ok(summary)
}

fn skip(summary: &mut RunSummary, entry: &FrameEntry, reason: String) {
    warn!("skipping {}: {reason}", entry.path.display());
    summary.skipped.push(SkippedFrame {
        entry: entry.clone(),
        reason,
    });
}
