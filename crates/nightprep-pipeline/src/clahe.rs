//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is divided into a grid of tiles. Each tile gets its own
//! equalization lookup table built from a clipped histogram, and every
//! pixel is remapped by bilinearly blending the tables of the four
//! nearest tile centers, so tile seams do not show.
//!
//! When the image size is not a multiple of the grid, it is virtually
//! extended with reflect-101 borders (`dcb|abcd|cba`) so all tiles share
//! the same size.
//!
//! Clipped histogram mass is redistributed evenly across all 256 bins as
//! fractional counts. On a flat tile this keeps the table close to the
//! identity instead of pushing the single occupied level toward white.

use image::GrayImage;

use crate::types::TileGrid;

/// Number of histogram bins (one per 8-bit level).
const BINS: usize = 256;

/// Equalize `image` with a clip limit and tile grid.
///
/// `clip_limit` is a multiple of the mean bin height
/// (`tile_area / 256`); the effective per-bin cap is never below one
/// count. Non-positive values disable clipping, giving plain tiled
/// histogram equalization. A tile grid axis of zero is treated as one.
#[must_use = "returns the equalized image"]
pub fn equalize(image: &GrayImage, clip_limit: f32, grid: TileGrid) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }

    let tiles_x = grid.columns.max(1);
    let tiles_y = grid.rows.max(1);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);

    #[allow(clippy::cast_precision_loss)]
    let tile_area = (tile_w * tile_h) as f32;
    let cap = (clip_limit > 0.0).then(|| (clip_limit * tile_area / BINS as f32).max(1.0));

    let luts: Vec<[u8; BINS]> = (0..tiles_y)
        .flat_map(|ty| (0..tiles_x).map(move |tx| (tx, ty)))
        .map(|(tx, ty)| {
            let mut hist = [0.0f32; BINS];
            for py in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect_101(py, h);
                for px in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect_101(px, w);
                    hist[usize::from(image.get_pixel(sx, sy).0[0])] += 1.0;
                }
            }
            if let Some(cap) = cap {
                clip_histogram(&mut hist, cap);
            }
            tile_lut(&hist, tile_area)
        })
        .collect();

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    #[allow(clippy::cast_precision_loss)]
    let (inv_tw, inv_th) = (1.0 / tile_w as f32, 1.0 / tile_h as f32);

    GrayImage::from_fn(w, h, |x, y| {
        let v = usize::from(image.get_pixel(x, y).0[0]);

        #[allow(clippy::cast_precision_loss)]
        let (txf, tyf) = ((x as f32).mul_add(inv_tw, -0.5), (y as f32).mul_add(inv_th, -0.5));
        let (tx0, tx1, xa) = neighbor_tiles(txf, tiles_x);
        let (ty0, ty1, ya) = neighbor_tiles(tyf, tiles_y);

        let top = f32::from(lut_at(tx0, ty0)[v]).mul_add(1.0 - xa, f32::from(lut_at(tx1, ty0)[v]) * xa);
        let bottom = f32::from(lut_at(tx0, ty1)[v]).mul_add(1.0 - xa, f32::from(lut_at(tx1, ty1)[v]) * xa);
        image::Luma([to_byte(top.mul_add(1.0 - ya, bottom * ya))])
    })
}

/// Tile indices on either side of the fractional tile coordinate `t`,
/// clamped to the grid, plus the blend weight of the upper one.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn neighbor_tiles(t: f32, tiles: u32) -> (u32, u32, f32) {
    let floor = t.floor();
    let last = i64::from(tiles) - 1;
    let lower = floor as i64;
    (
        lower.clamp(0, last) as u32,
        (lower + 1).clamp(0, last) as u32,
        t - floor,
    )
}

/// Cap every bin at `cap` and spread the removed mass evenly over all
/// bins.
fn clip_histogram(hist: &mut [f32; BINS], cap: f32) {
    let mut excess = 0.0f32;
    for bin in hist.iter_mut() {
        if *bin > cap {
            excess += *bin - cap;
            *bin = cap;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let share = excess / BINS as f32;
    for bin in hist.iter_mut() {
        *bin += share;
    }
}

/// Build a tile's remap table from its (clipped) histogram.
fn tile_lut(hist: &[f32; BINS], tile_area: f32) -> [u8; BINS] {
    let scale = 255.0 / tile_area;
    let mut cdf = 0.0f32;
    let mut lut = [0u8; BINS];
    for (entry, &count) in lut.iter_mut().zip(hist) {
        cdf += count;
        *entry = to_byte(cdf * scale);
    }
    lut
}

/// Map a coordinate into `0..n` by reflect-101 mirroring.
const fn reflect_101(i: u32, n: u32) -> u32 {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let m = i % period;
    if m < n { m } else { period - m }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
