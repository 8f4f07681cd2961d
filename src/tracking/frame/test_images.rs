//! Synthetic images shared by the unit tests.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::geometry::Rect;

const BLOCK: u32 = 7;

/// Independent uniform noise per pixel.
pub(crate) fn noise_image(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.gen::<u8>()]))
}

/// Random-intensity square blocks: many corners that survive rotation.
pub(crate) fn textured_image(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let cols = width.div_ceil(BLOCK);
    let rows = height.div_ceil(BLOCK);
    let blocks: Vec<u8> = (0..cols * rows).map(|_| rng.gen::<u8>()).collect();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([blocks[((y / BLOCK) * cols + x / BLOCK) as usize]])
    })
}

pub(crate) fn to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// Paste `rect` of `sample` in the middle of a flat `size x size` canvas and
/// rotate the canvas about its center.
pub(crate) fn rotated_scene(sample: &GrayImage, rect: Rect, size: u32, degrees: f32) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(size, size, Luma([128]));
    let ox = (size - rect.width()) / 2;
    let oy = (size - rect.height()) / 2;
    for y in 0..rect.height() {
        for x in 0..rect.width() {
            let v = *sample.get_pixel(rect.x1 + x, rect.y1 + y);
            canvas.put_pixel(ox + x, oy + y, v);
        }
    }
    if degrees == 0.0 {
        return canvas;
    }
    rotate_about_center(
        &canvas,
        degrees.to_radians(),
        Interpolation::Bilinear,
        Luma([128]),
    )
}
