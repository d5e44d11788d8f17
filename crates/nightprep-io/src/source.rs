//! Where frames come from.
//!
//! [`FrameSource`] is the seam the driver reads through;
//! [`DirectorySource`] is the filesystem implementation used by the CLI.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::IoError;

/// Extensions accepted as input frames (compared case-insensitively).
pub const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// One input frame, identified before it is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    /// Full path of the source file.
    pub path: PathBuf,
    /// Logical frame ID: the file name without its extension.
    pub id: String,
    /// Extension as written in the file name, without the dot.
    pub extension: String,
}

impl FrameEntry {
    /// Build an entry from a path with a recognized frame extension.
    ///
    /// Returns `None` if the path has no UTF-8 stem or its extension is
    /// not one of [`FRAME_EXTENSIONS`].
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if !is_frame_extension(extension) {
            return None;
        }
        let id = path.file_stem()?.to_str()?;
        Some(Self {
            path: path.to_path_buf(),
            id: id.to_owned(),
            extension: extension.to_owned(),
        })
    }

    /// File name of the source, for log lines.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.id.clone(), |n| n.to_string_lossy().into_owned())
    }
}

/// Case-insensitive check against [`FRAME_EXTENSIONS`].
#[must_use]
pub fn is_frame_extension(extension: &str) -> bool {
    FRAME_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
}

/// An ordered collection of frames that can be read one at a time.
pub trait FrameSource {
    /// Frames in processing order.
    fn entries(&self) -> &[FrameEntry];

    /// Read the raw encoded bytes of one frame.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Read`] if the frame cannot be read.
    fn read(&self, entry: &FrameEntry) -> Result<Vec<u8>, IoError>;
}

/// Frames found in a single directory (not recursive).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    entries: Vec<FrameEntry>,
    non_utf8: Vec<PathBuf>,
}

impl DirectorySource {
    /// List the frame files in `dir`, sorted by file name.
    ///
    /// Subdirectories and files with other extensions are ignored.
    /// Files whose names are not valid UTF-8 cannot be given an ID; they
    /// are skipped with a warning and listed by [`Self::non_utf8`].
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InputDirectory`] if `dir` does not exist or
    /// cannot be listed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IoError> {
        let root = dir.as_ref().to_path_buf();
        let listing_error = |source| IoError::InputDirectory {
            path: root.clone(),
            source,
        };

        let mut entries = Vec::new();
        let mut non_utf8 = Vec::new();
        for item in std::fs::read_dir(&root).map_err(listing_error)? {
            let item = item.map_err(listing_error)?;
            let is_file = item.file_type().map_err(listing_error)?.is_file();
            if !is_file {
                continue;
            }
            let path = item.path();
            if let Some(entry) = FrameEntry::from_path(&path) {
                entries.push(entry);
            } else if item.file_name().to_str().is_none() {
                warn!("skipping {}: file name is not valid UTF-8", path.display());
                non_utf8.push(path);
            } else {
                debug!("ignoring {}: not a frame file", path.display());
            }
        }
        entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        non_utf8.sort();

        Ok(Self {
            root,
            entries,
            non_utf8,
        })
    }

    /// The directory this source lists.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files skipped because their names are not valid UTF-8.
    #[must_use]
    pub fn non_utf8(&self) -> &[PathBuf] {
        &self.non_utf8
    }
}

impl FrameSource for DirectorySource {
    fn entries(&self) -> &[FrameEntry] {
        &self.entries
    }

    fn read(&self, entry: &FrameEntry) -> Result<Vec<u8>, IoError> {
        std::fs::read(&entry.path).map_err(|source| IoError::Read {
            path: entry.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_is_case_insensitive() {
        for ext in ["jpg", "JPG", "Jpeg", "png", "PNG", "bmp", "BMP"] {
            assert!(is_frame_extension(ext), "{ext}");
        }
        for ext in ["gif", "tiff", "txt", ""] {
            assert!(!is_frame_extension(ext), "{ext}");
        }
    }

    #[test]
    fn entry_keeps_stem_and_extension_as_written() {
        let entry = FrameEntry::from_path(Path::new("/data/000042.JPG")).unwrap();
        assert_eq!(entry.id, "000042");
        assert_eq!(entry.extension, "JPG");
        assert_eq!(entry.file_name(), "000042.JPG");
    }

    #[test]
    fn entry_rejects_unknown_extension() {
        assert!(FrameEntry::from_path(Path::new("notes.txt")).is_none());
        assert!(FrameEntry::from_path(Path::new("README")).is_none());
    }

    #[test]
    fn open_lists_only_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "c.BMP", "notes.txt", "d.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let source = DirectorySource::open(dir.path()).unwrap();
        let names: Vec<String> = source.entries().iter().map(FrameEntry::file_name).collect();
        assert_eq!(names, ["a.jpg", "b.png", "c.BMP", "d.jpeg"]);
        assert_eq!(source.root(), dir.path());
        assert!(source.non_utf8().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_reported() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.png"), b"x").unwrap();
        let bad = dir.path().join(OsStr::from_bytes(b"frame_\xFF.png"));
        std::fs::write(&bad, b"x").unwrap();

        let source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.entries().len(), 1);
        assert_eq!(source.entries()[0].id, "ok");
        assert_eq!(source.non_utf8(), [bad]);
    }

    #[test]
    fn open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = DirectorySource::open(dir.path().join("missing"));
        assert!(matches!(result, Err(IoError::InputDirectory { .. })));
    }

    #[test]
    fn read_returns_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.png"), b"payload").unwrap();
        let source = DirectorySource::open(dir.path()).unwrap();
        let bytes = source.read(&source.entries()[0]).unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[test]
    fn read_vanished_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        std::fs::write(&path, b"x").unwrap();
        let source = DirectorySource::open(dir.path()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            source.read(&source.entries()[0]),
            Err(IoError::Read { .. })
        ));
    }
}
