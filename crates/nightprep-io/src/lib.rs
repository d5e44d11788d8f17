//! nightprep-io: Filesystem I/O and batch driver for nightprep.
//!
//! Lists input frames from a directory, writes enhanced images and
//! exclusion masks to a paired output layout, and drives the
//! `nightprep-pipeline` enhancer over a whole sequence with logging.

pub mod driver;
pub mod error;
pub mod sink;
pub mod source;

pub use driver::{FrameReport, RunOptions, RunSummary, SkippedFrame, run};
pub use error::IoError;
pub use sink::{DiskSink, FrameSink, OutputLayout, WrittenFrame};
pub use source::{DirectorySource, FrameEntry, FrameSource};
