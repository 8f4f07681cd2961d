//! FAST-9 corner detection with Harris scoring, grid non-maximum suppression
//! and intensity-centroid orientation.

use std::collections::BTreeMap;

use image::GrayImage;

use crate::config::ExtractorConfig;
use crate::geometry::Rect;

/// Distance from the image border inside which no keypoint is reported.
/// Keeps the BRIEF patch and the orientation disc inside the image.
pub const EDGE_THRESHOLD: u32 = 16;

/// Radius of the disc used for the orientation moments.
const ORIENTATION_RADIUS: i32 = 12;

/// 16-pixel Bresenham circle of radius 3, clockwise from the top.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// A detected corner in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Harris response (higher = stronger corner).
    pub response: f32,
    /// Orientation in radians.
    pub angle: f32,
}

pub struct FastDetector {
    threshold: u8,
    cell_size: u32,
    max_features: usize,
    harris_k: f32,
}

impl FastDetector {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            threshold: config.fast_threshold,
            cell_size: config.nms_cell_size.max(1),
            max_features: config.max_features,
            harris_k: config.harris_k,
        }
    }

    /// Detect corners whose location lies inside `region`.
    ///
    /// Output is sorted by descending response, ties broken by position, so
    /// the result is a pure function of the pixels and the parameters.
    pub fn detect(&self, image: &GrayImage, region: &Rect) -> Vec<KeyPoint> {
        let (width, height) = image.dimensions();
        if width <= 2 * EDGE_THRESHOLD || height <= 2 * EDGE_THRESHOLD {
            return Vec::new();
        }

        let x_start = region.x1.max(EDGE_THRESHOLD);
        let y_start = region.y1.max(EDGE_THRESHOLD);
        let x_end = region.x2.min(width - EDGE_THRESHOLD);
        let y_end = region.y2.min(height - EDGE_THRESHOLD);
        if x_start >= x_end || y_start >= y_end {
            return Vec::new();
        }

        // Keep the strongest corner per grid cell.
        let mut cells: BTreeMap<(u32, u32), (u32, u32, f32)> = BTreeMap::new();
        for y in y_start..y_end {
            for x in x_start..x_end {
                if !self.is_fast_corner(image, x, y) {
                    continue;
                }
                let response = self.harris_response(image, x, y);
                let cell = (y / self.cell_size, x / self.cell_size);
                match cells.get(&cell) {
                    Some(&(_, _, best)) if best >= response => {}
                    _ => {
                        cells.insert(cell, (x, y, response));
                    }
                }
            }
        }

        let mut corners: Vec<(u32, u32, f32)> = cells.into_values().collect();
        corners.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then(a.1.cmp(&b.1))
                .then(a.0.cmp(&b.0))
        });
        corners.truncate(self.max_features);

        corners
            .into_iter()
            .map(|(x, y, response)| KeyPoint {
                x: x as f32,
                y: y as f32,
                response,
                angle: orientation(image, x, y),
            })
            .collect()
    }

    /// At least 9 contiguous circle pixels all brighter or all darker than
    /// the center by more than the threshold.
    fn is_fast_corner(&self, image: &GrayImage, x: u32, y: u32) -> bool {
        let center = pixel(image, x as i32, y as i32);
        let t = self.threshold as i16;
        let (x, y) = (x as i32, y as i32);

        // Cardinal pre-test: a 9-arc always covers at least 2 of 0/4/8/12.
        let cardinal = [0usize, 4, 8, 12].map(|i| pixel(image, x + CIRCLE[i].0, y + CIRCLE[i].1));
        let brighter = cardinal.iter().filter(|&&p| p > center + t).count();
        let darker = cardinal.iter().filter(|&&p| p < center - t).count();
        if brighter < 2 && darker < 2 {
            return false;
        }

        let ring: [i16; 16] = std::array::from_fn(|i| pixel(image, x + CIRCLE[i].0, y + CIRCLE[i].1));
        longest_arc(&ring, |p| p > center + t) >= 9 || longest_arc(&ring, |p| p < center - t) >= 9
    }

    /// `det(M) - k * trace(M)^2` over a 7x7 window of central differences.
    fn harris_response(&self, image: &GrayImage, x: u32, y: u32) -> f32 {
        let (x, y) = (x as i32, y as i32);
        let mut sxx = 0.0f32;
        let mut syy = 0.0f32;
        let mut sxy = 0.0f32;
        for dy in -3..=3 {
            for dx in -3..=3 {
                let (px, py) = (x + dx, y + dy);
                let ix = (pixel(image, px + 1, py) - pixel(image, px - 1, py)) as f32 * 0.5;
                let iy = (pixel(image, px, py + 1) - pixel(image, px, py - 1)) as f32 * 0.5;
                sxx += ix * ix;
                syy += iy * iy;
                sxy += ix * iy;
            }
        }
        let det = sxx * syy - sxy * sxy;
        let trace = sxx + syy;
        det - self.harris_k * trace * trace
    }
}

/// Longest run of ring pixels satisfying `pred`, with wrap-around.
fn longest_arc(ring: &[i16; 16], pred: impl Fn(i16) -> bool) -> usize {
    let mut run = 0;
    let mut best = 0;
    for i in 0..32 {
        if pred(ring[i % 16]) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(16)
}

/// Intensity-centroid angle over a disc around `(x, y)`.
fn orientation(image: &GrayImage, x: u32, y: u32) -> f32 {
    let (width, height) = image.dimensions();
    let (x, y) = (x as i32, y as i32);
    let mut m10 = 0.0f32;
    let mut m01 = 0.0f32;
    let r2 = ORIENTATION_RADIUS * ORIENTATION_RADIUS;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let (px, py) = (x + dx, y + dy);
            if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                continue;
            }
            let v = image.get_pixel(px as u32, py as u32).0[0] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

/// Clamped pixel read.
#[inline]
fn pixel(image: &GrayImage, x: i32, y: i32) -> i16 {
    let (width, height) = image.dimensions();
    let x = x.clamp(0, width as i32 - 1) as u32;
    let y = y.clamp(0, height as i32 - 1) as u32;
    image.get_pixel(x, y).0[0] as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn detector() -> FastDetector {
        FastDetector::new(&ExtractorConfig::default())
    }

    fn full(image: &GrayImage) -> Rect {
        Rect::full(image.width(), image.height()).unwrap()
    }

    #[test]
    fn test_uniform_image_has_no_corners() {
        let image = GrayImage::from_pixel(120, 120, Luma([128]));
        assert!(detector().detect(&image, &full(&image)).is_empty());
    }

    #[test]
    fn test_small_image_has_no_corners() {
        let image = GrayImage::from_pixel(30, 30, Luma([128]));
        assert!(detector().detect(&image, &full(&image)).is_empty());
    }

    #[test]
    fn test_bright_square_corners() {
        // A bright square on a dark background has four strong corners.
        let mut image = GrayImage::from_pixel(100, 100, Luma([20]));
        for y in 40..60 {
            for x in 40..60 {
                image.put_pixel(x, y, Luma([230]));
            }
        }
        let kps = detector().detect(&image, &full(&image));
        assert!(!kps.is_empty());
        for corner in [(40.0, 40.0), (59.0, 40.0), (59.0, 59.0), (40.0, 59.0)] {
            assert!(
                kps.iter()
                    .any(|kp| (kp.x - corner.0).abs() <= 3.0 && (kp.y - corner.1).abs() <= 3.0),
                "missing corner near {:?}",
                corner
            );
        }
        // Sorted strongest first.
        for pair in kps.windows(2) {
            assert!(pair[0].response >= pair[1].response);
        }
    }

    #[test]
    fn test_region_restricts_detection() {
        let mut image = GrayImage::from_pixel(100, 100, Luma([20]));
        for y in 40..60 {
            for x in 40..60 {
                image.put_pixel(x, y, Luma([230]));
            }
        }
        let left_half = Rect::new(0, 0, 50, 100).unwrap();
        let kps = detector().detect(&image, &left_half);
        assert!(!kps.is_empty());
        assert!(kps.iter().all(|kp| kp.x < 50.0));
    }

    #[test]
    fn test_longest_arc_wraps() {
        let mut ring = [0i16; 16];
        for i in [13, 14, 15, 0, 1, 2, 3, 4, 5] {
            ring[i] = 10;
        }
        assert_eq!(longest_arc(&ring, |p| p > 5), 9);
        assert_eq!(longest_arc(&[10; 16], |p| p > 5), 16);
    }
}
