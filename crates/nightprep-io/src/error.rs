//! Errors raised while reading frames from disk or writing results.

use std::path::PathBuf;

/// Errors that can occur in the I/O layer.
///
/// [`Read`](Self::Read) is the only per-frame error: the driver logs it
/// and skips the frame. Every other variant aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The input directory is missing or cannot be listed.
    #[error("cannot read input directory {}: {source}", .path.display())]
    InputDirectory {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// A frame file could not be read.
    #[error("cannot read frame {}: {source}", .path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// An output directory could not be created.
    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// An enhanced image or mask could not be encoded or written.
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying encoding or filesystem error.
        source: image::ImageError,
    },

    /// The per-frame diagnostics report could not be written.
    #[error("cannot write diagnostics report {}: {source}", .path.display())]
    DiagnosticsReport {
        /// Report file that failed.
        path: PathBuf,
        /// Underlying serialization or filesystem error.
        source: serde_json::Error,
    },

    /// The output extension does not name a format the sink can encode.
    #[error("unsupported output format for {}", .path.display())]
    UnsupportedFormat {
        /// File whose extension was not recognized.
        path: PathBuf,
    },
}
