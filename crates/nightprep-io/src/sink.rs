//! Where enhanced frames go.
//!
//! Every frame produces two files that share its logical ID:
//!
//! ```text
//! <root>/processed_images/<id>.<source extension>
//! <root>/masks/<id>.png
//! ```
//!
//! Masks are always PNG so the binary values survive unchanged; lossy
//! formats would blur the 0/255 boundary.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, ImageFormat, ImageResult};
use nightprep_pipeline::{EnhancedFrame, RgbImage};

use crate::IoError;
use crate::source::FrameEntry;

/// Subdirectory holding enhanced color images.
pub const IMAGES_DIR: &str = "processed_images";

/// Subdirectory holding exclusion masks.
pub const MASKS_DIR: &str = "masks";

/// JPEG quality for enhanced images written in JPEG format.
pub const JPEG_QUALITY: u8 = 95;

/// Paths of the two files written for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFrame {
    /// Enhanced color image.
    pub image_path: PathBuf,
    /// Exclusion mask.
    pub mask_path: PathBuf,
}

/// Receives each enhanced frame in processing order.
pub trait FrameSink {
    /// Persist the enhanced image and mask for `entry`.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError`] if either output cannot be written. The
    /// driver treats this as fatal.
    fn write(&mut self, entry: &FrameEntry, frame: &EnhancedFrame) -> Result<WrittenFrame, IoError>;
}

/// Output path scheme under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    images: PathBuf,
    masks: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            images: root.join(IMAGES_DIR),
            masks: root.join(MASKS_DIR),
        }
    }

    /// Directory holding enhanced images.
    #[must_use]
    pub fn images_dir(&self) -> &Path {
        &self.images
    }

    /// Directory holding masks.
    #[must_use]
    pub fn masks_dir(&self) -> &Path {
        &self.masks
    }

    /// `processed_images/{id}.{extension}`
    #[must_use]
    pub fn image_path(&self, id: &str, extension: &str) -> PathBuf {
        self.images.join(format!("{id}.{extension}"))
    }

    /// `masks/{id}.png`
    #[must_use]
    pub fn mask_path(&self, id: &str) -> PathBuf {
        self.masks.join(format!("{id}.png"))
    }
}

/// Writes frames to the filesystem using an [`OutputLayout`].
#[derive(Debug, Clone)]
pub struct DiskSink {
    layout: OutputLayout,
}

impl DiskSink {
    /// Create both output directories (and any missing parents) under
    /// `root`. Existing files are overwritten by later writes.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirectory`] if a directory cannot be
    /// created.
    pub fn create(root: impl AsRef<Path>) -> Result<Self, IoError> {
        let layout = OutputLayout::new(root);
        for dir in [layout.images_dir(), layout.masks_dir()] {
            std::fs::create_dir_all(dir).map_err(|source| IoError::OutputDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(Self { layout })
    }

    /// The path scheme this sink writes to.
    #[must_use]
    pub const fn layout(&self) -> &OutputLayout {
        &self.layout
    }
}

impl FrameSink for DiskSink {
    fn write(&mut self, entry: &FrameEntry, frame: &EnhancedFrame) -> Result<WrittenFrame, IoError> {
        let image_path = self.layout.image_path(&entry.id, &entry.extension);
        let format = ImageFormat::from_extension(&entry.extension).ok_or_else(|| {
            IoError::UnsupportedFormat {
                path: image_path.clone(),
            }
        })?;
        save_image(&frame.image, &image_path, format).map_err(|source| IoError::Write {
            path: image_path.clone(),
            source,
        })?;

        let mask_path = self.layout.mask_path(&entry.id);
        frame
            .mask
            .as_image()
            .save_with_format(&mask_path, ImageFormat::Png)
            .map_err(|source| IoError::Write {
                path: mask_path.clone(),
                source,
            })?;

        Ok(WrittenFrame {
            image_path,
            mask_path,
        })
    }
}

/// Encode `image` to `path`, using [`JPEG_QUALITY`] for JPEG output.
fn save_image(image: &RgbImage, path: &Path, format: ImageFormat) -> ImageResult<()> {
    if format != ImageFormat::Jpeg {
        return image.save_with_format(path, format);
    }
    let mut writer = BufWriter::new(File::create(path).map_err(ImageError::IoError)?);
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))?;
    writer.flush().map_err(ImageError::IoError)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nightprep_pipeline::{Dimensions, ExclusionMask, RgbImage};

    use super::*;

    fn entry(name: &str) -> FrameEntry {
        FrameEntry::from_path(Path::new(name)).unwrap()
    }

    fn frame(w: u32, h: u32) -> EnhancedFrame {
        let dims = Dimensions {
            width: w,
            height: h,
        };
        EnhancedFrame {
            image: RgbImage::from_pixel(w, h, image::Rgb([90, 120, 150])),
            mask: ExclusionMask::from_region(dims, |_, y| y >= h / 2),
        }
    }

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("/out");
        assert_eq!(
            layout.image_path("000123", "jpg"),
            Path::new("/out/processed_images/000123.jpg")
        );
        assert_eq!(layout.mask_path("000123"), Path::new("/out/masks/000123.png"));
    }

    #[test]
    fn create_makes_both_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("run").join("nested");
        let sink = DiskSink::create(&root).unwrap();
        assert!(root.join(IMAGES_DIR).is_dir());
        assert!(root.join(MASKS_DIR).is_dir());
        assert_eq!(sink.layout(), &OutputLayout::new(&root));
    }

    #[test]
    fn create_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, b"not a directory").unwrap();
        assert!(matches!(
            DiskSink::create(&root),
            Err(IoError::OutputDirectory { .. })
        ));
    }

    #[test]
    fn write_png_round_trips_image_and_mask() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DiskSink::create(dir.path()).unwrap();
        let enhanced = frame(6, 4);

        let written = sink.write(&entry("frame_07.png"), &enhanced).unwrap();
        assert_eq!(written.image_path, dir.path().join("processed_images/frame_07.png"));
        assert_eq!(written.mask_path, dir.path().join("masks/frame_07.png"));

        let image = image::open(&written.image_path).unwrap().to_rgb8();
        assert_eq!(image, enhanced.image);

        let mask = image::open(&written.mask_path).unwrap();
        assert_eq!(mask.color(), image::ColorType::L8);
        assert_eq!(&mask.to_luma8(), enhanced.mask.as_image());
    }

    #[test]
    fn jpeg_source_keeps_extension_but_mask_is_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DiskSink::create(dir.path()).unwrap();
        let written = sink.write(&entry("000001.JPG"), &frame(16, 16)).unwrap();

        assert_eq!(written.image_path.file_name().unwrap(), "000001.JPG");
        assert_eq!(written.mask_path.file_name().unwrap(), "000001.png");
        let reread = image::open(&written.image_path).unwrap();
        assert_eq!(reread.width(), 16);
        assert_eq!(
            image::ImageFormat::from_path(&written.mask_path).unwrap(),
            ImageFormat::Png
        );
    }

    fn mean_abs_error(a: &RgbImage, b: &RgbImage) -> f64 {
        let total: u64 = a
            .as_raw()
            .iter()
            .zip(b.as_raw())
            .map(|(&x, &y)| u64::from(x.abs_diff(y)))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / a.as_raw().len() as f64;
        mean
    }

    #[test]
    fn jpeg_output_uses_high_quality() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DiskSink::create(dir.path()).unwrap();
        let textured = RgbImage::from_fn(64, 48, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 37 + y * 91) % 251) as u8;
            image::Rgb([v, v.wrapping_mul(3), 255 - v])
        });
        let enhanced = EnhancedFrame {
            image: textured.clone(),
            mask: ExclusionMask::empty(Dimensions {
                width: 64,
                height: 48,
            }),
        };
        let written = sink.write(&entry("000002.jpg"), &enhanced).unwrap();
        let high = image::open(&written.image_path).unwrap().to_rgb8();

        let mut default_quality = Vec::new();
        textured
            .write_to(&mut std::io::Cursor::new(&mut default_quality), ImageFormat::Jpeg)
            .unwrap();
        let low = image::load_from_memory(&default_quality).unwrap().to_rgb8();

        assert!(
            mean_abs_error(&high, &textured) < mean_abs_error(&low, &textured),
            "quality {JPEG_QUALITY} output should be closer to the source than the default"
        );
        assert!(std::fs::metadata(&written.image_path).unwrap().len() > default_quality.len() as u64);
    }

    #[test]
    fn write_into_removed_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DiskSink::create(dir.path()).unwrap();
        std::fs::remove_dir_all(dir.path().join(MASKS_DIR)).unwrap();
        let result = sink.write(&entry("x.bmp"), &frame(3, 3));
        assert!(matches!(result, Err(IoError::Write { .. })));
    }
}
