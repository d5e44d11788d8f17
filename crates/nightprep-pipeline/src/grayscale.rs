//! Image decoding and luminance extraction.
//!
//! [`decode`] turns raw file bytes (PNG, JPEG, BMP) into the 8-bit RGB
//! frame every later stage works on. [`luminance`] collapses a frame to
//! the single grayscale channel the exclusion mask thresholds against.

use image::{GrayImage, RgbImage};

use crate::types::PipelineError;

/// Decode raw image bytes into an 8-bit RGB frame.
///
/// Grayscale, palette, and alpha inputs are expanded or flattened to
/// three channels; channel order is always R, G, B.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Convert an RGB frame to grayscale with the BT.601 luma weights
/// `0.299*R + 0.587*G + 0.114*B`.
///
/// Uses 14-bit fixed-point weights with round-half-up, so pure white
/// maps to exactly 255 and pure black to exactly 0.
#[must_use = "returns the luminance image"]
pub fn luminance(frame: &RgbImage) -> GrayImage {
    const SHIFT: u32 = 14;
    const R: u32 = 4899; // 0.299 * 2^14
    const G: u32 = 9617; // 0.587 * 2^14
    const B: u32 = 1868; // 0.114 * 2^14
    const HALF: u32 = 1 << (SHIFT - 1);

    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let luma = (u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + HALF) >> SHIFT;
        #[allow(clippy::cast_possible_truncation)]
        image::Luma([luma.min(255) as u8])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGB image as PNG bytes.
    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn decode_preserves_channel_order_and_dimensions() {
        let img = RgbImage::from_fn(17, 31, |x, _| {
            if x % 2 == 0 {
                image::Rgb([200, 10, 30])
            } else {
                image::Rgb([5, 6, 7])
            }
        });
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (17, 31));
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 10, 30]);
        assert_eq!(decoded.get_pixel(1, 0).0, [5, 6, 7]);
    }

    #[test]
    fn decode_rgba_drops_alpha() {
        let img = image::RgbaImage::from_fn(2, 2, |_, _| image::Rgba([40, 50, 60, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();

        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.get_pixel(1, 1).0, [40, 50, 60]);
    }

    #[test]
    fn luminance_extremes_are_exact() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let gray = luminance(&img);
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
        assert_eq!(gray.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn luminance_of_neutral_gray_is_identity() {
        for v in [1u8, 8, 9, 128, 181, 254] {
            let img = RgbImage::from_pixel(1, 1, image::Rgb([v, v, v]));
            assert_eq!(luminance(&img).get_pixel(0, 0).0[0], v, "gray {v}");
        }
    }

    #[test]
    fn luminance_weights_green_over_red_over_blue() {
        let lum = |rgb: [u8; 3]| luminance(&RgbImage::from_pixel(1, 1, image::Rgb(rgb))).get_pixel(0, 0).0[0];
        let r = lum([255, 0, 0]);
        let g = lum([0, 255, 0]);
        let b = lum([0, 0, 255]);
        assert_eq!((r, g, b), (76, 150, 29));
    }
}
