//! Contrast-limited adaptive histogram equalization on the L* channel.
//!
//! Leaf photos are often shot under patchy sunlight. Equalizing lightness per tile
//! evens that out while a*/b* stay put, so lesion colors survive.

use crate::models::image_types::{EnhancedImage, RawImage};
use lab::Lab;
use rayon::prelude::*;

pub const CLIP_LIMIT: f32 = 2.0;
pub const TILE_GRID: usize = 8;

const BINS: usize = 256;
const LAB_CHUNK: usize = 4096;

/// Equalize lightness and return a fresh image of the same size.
pub fn enhance(raw: &RawImage) -> EnhancedImage {
    let (width, height) = raw.pixels().dimensions();

    let rgbs: Vec<[u8; 3]> = raw.pixels().pixels().map(|p| p.0).collect();
    let mut labs: Vec<Lab> = rgbs
        .par_chunks(LAB_CHUNK)
        .flat_map_iter(lab::rgbs_to_labs)
        .collect();

    let levels: Vec<u8> = labs.iter().map(|c| lightness_to_level(c.l)).collect();
    let equalized = clahe(&levels, width as usize, height as usize, CLIP_LIMIT, TILE_GRID);

    for (color, level) in labs.iter_mut().zip(&equalized) {
        color.l = level_to_lightness(*level);
    }

    let rgbs: Vec<[u8; 3]> = labs
        .par_chunks(LAB_CHUNK)
        .flat_map_iter(lab::labs_to_rgbs)
        .collect();

    let mut pixels = raw.pixels().clone();
    for (pixel, rgb) in pixels.pixels_mut().zip(rgbs) {
        pixel.0 = rgb;
    }

    EnhancedImage::from_pixels(pixels)
}

// L* is 0..=100; equalize on 256 levels like 8-bit Lab.
fn lightness_to_level(l: f32) -> u8 {
    (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8
}

fn level_to_lightness(level: u8) -> f32 {
    level as f32 * 100.0 / 255.0
}

/// CLAHE over a single 8-bit channel laid out row-major.
pub fn clahe(src: &[u8], width: usize, height: usize, clip_limit: f32, grid: usize) -> Vec<u8> {
    if width == 0 || height == 0 {
        return src.to_vec();
    }
    let grid_x = grid.clamp(1, width);
    let grid_y = grid.clamp(1, height);

    let luts: Vec<[u8; BINS]> = (0..grid_y * grid_x)
        .map(|i| {
            let (ty, tx) = (i / grid_x, i % grid_x);
            let (y0, y1) = tile_bounds(ty, grid_y, height);
            let (x0, x1) = tile_bounds(tx, grid_x, width);
            tile_lut(src, width, (x0, x1), (y0, y1), clip_limit)
        })
        .collect();

    let tile_w = width as f32 / grid_x as f32;
    let tile_h = height as f32 / grid_y as f32;
    let x_weights: Vec<(usize, usize, f32)> = (0..width)
        .map(|x| neighbours(x, tile_w, grid_x))
        .collect();

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let (ty1, ty2, ya) = neighbours(y, tile_h, grid_y);
        for (x, value) in row.iter_mut().enumerate() {
            let (tx1, tx2, xa) = x_weights[x];
            let v = src[y * width + x] as usize;

            let top = luts[ty1 * grid_x + tx1][v] as f32 * (1.0 - xa)
                + luts[ty1 * grid_x + tx2][v] as f32 * xa;
            let bottom = luts[ty2 * grid_x + tx1][v] as f32 * (1.0 - xa)
                + luts[ty2 * grid_x + tx2][v] as f32 * xa;

            *value = (top * (1.0 - ya) + bottom * ya).round().clamp(0.0, 255.0) as u8;
        }
    });

    out
}

fn tile_bounds(index: usize, tiles: usize, extent: usize) -> (usize, usize) {
    (index * extent / tiles, (index + 1) * extent / tiles)
}

/// The two tile centres around `pos` and the weight of the second one.
fn neighbours(pos: usize, tile_size: f32, tiles: usize) -> (usize, usize, f32) {
    let t = (pos as f32 + 0.5) / tile_size - 0.5;
    let first = t.floor();
    let weight = t - first;
    let last = tiles as isize - 1;
    let t1 = (first as isize).clamp(0, last) as usize;
    let t2 = (first as isize + 1).clamp(0, last) as usize;
    (t1, t2, weight)
}

fn tile_lut(
    src: &[u8],
    width: usize,
    (x0, x1): (usize, usize),
    (y0, y1): (usize, usize),
    clip_limit: f32,
) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for &v in &src[y * width + x0..y * width + x1] {
            hist[v as usize] += 1;
        }
    }

    let area = ((x1 - x0) * (y1 - y0)) as u32;
    let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

    let mut excess = 0u32;
    for h in hist.iter_mut() {
        if *h > clip {
            excess += *h - clip;
            *h = clip;
        }
    }

    let batch = excess / BINS as u32;
    let mut residual = excess % BINS as u32;
    for h in hist.iter_mut() {
        *h += batch;
    }
    if residual > 0 {
        let step = (BINS / residual as usize).max(1);
        for h in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *h += 1;
            residual -= 1;
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0u32;
    for (entry, h) in lut.iter_mut().zip(hist) {
        sum += h;
        *entry = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn raw(img: RgbImage) -> RawImage {
        RawImage::new(img).unwrap()
    }

    #[test]
    fn keeps_dimensions() {
        let input = raw(RgbImage::from_fn(37, 23, |x, y| {
            Rgb([(x * 6) as u8, (y * 9) as u8, 80])
        }));
        let enhanced = enhance(&input);
        assert_eq!((enhanced.width(), enhanced.height()), (37, 23));
    }

    #[test]
    fn leaves_the_source_untouched() {
        let source = RgbImage::from_fn(40, 40, |x, _| Rgb([x as u8 * 3, 120, 40]));
        let input = raw(source.clone());
        let _ = enhance(&input);
        assert_eq!(input.pixels(), &source);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let input = raw(RgbImage::from_fn(64, 48, |x, y| {
            Rgb([(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8])
        }));
        let once = enhance(&input);
        let twice_a = enhance(&raw(once.pixels().clone()));
        let twice_b = enhance(&raw(once.pixels().clone()));
        assert_eq!(once, enhance(&input));
        assert_eq!(twice_a, twice_b);
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let input = raw(RgbImage::from_pixel(64, 64, Rgb([90, 140, 70])));
        let enhanced = enhance(&input);
        let first = *enhanced.pixels().get_pixel(0, 0);
        assert!(enhanced.pixels().pixels().all(|p| *p == first));
    }

    #[test]
    fn stripes_gain_contrast() {
        let input = raw(RgbImage::from_fn(128, 128, |x, _| {
            if x % 2 == 0 {
                Rgb([100, 100, 100])
            } else {
                Rgb([110, 110, 110])
            }
        }));
        let enhanced = enhance(&input);
        let dark = enhanced.pixels().get_pixel(64, 64)[0] as i32;
        let light = enhanced.pixels().get_pixel(65, 64)[0] as i32;
        assert!(light - dark >= 10, "dark {dark} light {light}");
    }

    #[test]
    fn clahe_handles_grids_larger_than_the_image() {
        let src = vec![10u8, 200, 30, 40, 50, 60];
        let out = clahe(&src, 3, 2, CLIP_LIMIT, TILE_GRID);
        assert_eq!(out.len(), src.len());
    }
}
