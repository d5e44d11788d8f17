//! sRGB <-> CIE L\*a\*b\* conversion for 8-bit frames.
//!
//! Contrast equalization runs on lightness only, so frames are split
//! into an L plane and two untouched chroma planes, then recombined.
//!
//! Lab values are stored in 8 bits the conventional way:
//! `L * 255 / 100`, `a + 128`, `b + 128`. The white point is D65.

use image::{GrayImage, RgbImage};
use palette::white_point::D65;
use palette::{IntoColor, Lab, LinSrgb, Srgb};

type LabD65 = Lab<D65, f32>;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert one 8-bit sRGB pixel to 8-bit encoded Lab.
#[must_use]
pub fn rgb_to_lab8(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| f32::from(c) / 255.0);
    let linear: LinSrgb<f32> = Srgb::new(r, g, b).into_linear();
    let lab: LabD65 = linear.into_color();

    [
        to_byte(lab.l * 255.0 / 100.0),
        to_byte(lab.a + 128.0),
        to_byte(lab.b + 128.0),
    ]
}

/// Convert one 8-bit encoded Lab pixel back to 8-bit sRGB.
///
/// Out-of-gamut results are clamped per channel.
#[must_use]
pub fn lab8_to_rgb(lab: [u8; 3]) -> [u8; 3] {
    let lab = LabD65::new(
        f32::from(lab[0]) * 100.0 / 255.0,
        f32::from(lab[1]) - 128.0,
        f32::from(lab[2]) - 128.0,
    );
    let linear: LinSrgb<f32> = lab.into_color();
    let srgb: Srgb<f32> = Srgb::from_linear(linear);
    let (r, g, b) = srgb.into_components();
    [r, g, b].map(|c| to_byte(c.clamp(0.0, 1.0) * 255.0))
}

/// An RGB frame split into 8-bit Lab planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabPlanes {
    /// Lightness plane, `L * 255 / 100`.
    pub lightness: GrayImage,
    /// Green-red chroma plane, `a + 128`.
    pub a: GrayImage,
    /// Blue-yellow chroma plane, `b + 128`.
    pub b: GrayImage,
}

impl LabPlanes {
    /// Split an RGB frame into Lab planes.
    #[must_use]
    pub fn from_rgb(frame: &RgbImage) -> Self {
        let (w, h) = frame.dimensions();
        let mut lightness = GrayImage::new(w, h);
        let mut a = GrayImage::new(w, h);
        let mut b = GrayImage::new(w, h);
        for (x, y, pixel) in frame.enumerate_pixels() {
            let [l, ca, cb] = rgb_to_lab8(pixel.0);
            lightness.put_pixel(x, y, image::Luma([l]));
            a.put_pixel(x, y, image::Luma([ca]));
            b.put_pixel(x, y, image::Luma([cb]));
        }
        Self { lightness, a, b }
    }

    /// Replace the lightness plane, keeping chroma.
    #[must_use]
    pub fn with_lightness(self, lightness: GrayImage) -> Self {
        Self { lightness, ..self }
    }

    /// Recombine the planes into an RGB frame.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.lightness.width(), self.lightness.height(), |x, y| {
            image::Rgb(lab8_to_rgb([
                self.lightness.get_pixel(x, y).0[0],
                self.a.get_pixel(x, y).0[0],
                self.b.get_pixel(x, y).0[0],
            ]))
        })
    }
}
