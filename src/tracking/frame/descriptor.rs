//! Steered BRIEF descriptors (256 binary intensity tests per keypoint).

use image::GrayImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::detector::KeyPoint;

/// Half-size of the square patch the rotated tests may touch.
pub const PATCH_RADIUS: f32 = 15.0;

/// Sampling pairs are drawn inside this radius so any rotation stays in the patch.
const PATTERN_RADIUS: i32 = 13;

/// Fixed seed: the pattern is part of the descriptor definition.
const PATTERN_SEED: u64 = 0x0b_1e_f0;

pub const DESCRIPTOR_BITS: usize = 256;

/// 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BriefDescriptor(pub [u64; 4]);

impl BriefDescriptor {
    pub fn zeros() -> Self {
        Self([0; 4])
    }

    /// Number of differing bits (0..=256).
    #[inline]
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        (self.0[0] ^ other.0[0]).count_ones()
            + (self.0[1] ^ other.0[1]).count_ones()
            + (self.0[2] ^ other.0[2]).count_ones()
            + (self.0[3] ^ other.0[3]).count_ones()
    }
}

pub struct BriefExtractor {
    pattern: Vec<(f32, f32, f32, f32)>,
}

impl Default for BriefExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BriefExtractor {
    pub fn new() -> Self {
        Self {
            pattern: generate_pattern(),
        }
    }

    /// Describe one keypoint on a (pre-smoothed) image.
    ///
    /// `None` if the rotated patch would leave the image.
    pub fn compute(&self, image: &GrayImage, keypoint: &KeyPoint) -> Option<BriefDescriptor> {
        let (width, height) = image.dimensions();
        let (cx, cy) = (keypoint.x, keypoint.y);
        if cx < PATCH_RADIUS
            || cy < PATCH_RADIUS
            || cx >= width as f32 - PATCH_RADIUS
            || cy >= height as f32 - PATCH_RADIUS
        {
            return None;
        }

        let (sin_a, cos_a) = keypoint.angle.sin_cos();
        let sample = |dx: f32, dy: f32| -> u8 {
            let rx = dx * cos_a - dy * sin_a;
            let ry = dx * sin_a + dy * cos_a;
            let px = (cx + rx).round() as u32;
            let py = (cy + ry).round() as u32;
            image.get_pixel(px, py).0[0]
        };

        let mut bits = [0u64; 4];
        for (i, &(x1, y1, x2, y2)) in self.pattern.iter().enumerate() {
            if sample(x1, y1) < sample(x2, y2) {
                bits[i / 64] |= 1 << (i % 64);
            }
        }
        Some(BriefDescriptor(bits))
    }

    /// Describe every keypoint, dropping the ones too close to the border.
    pub fn compute_all(
        &self,
        image: &GrayImage,
        keypoints: &[KeyPoint],
    ) -> Vec<(KeyPoint, BriefDescriptor)> {
        keypoints
            .iter()
            .filter_map(|kp| self.compute(image, kp).map(|d| (*kp, d)))
            .collect()
    }
}

/// Point pairs drawn uniformly from a disc, deterministic across runs.
fn generate_pattern() -> Vec<(f32, f32, f32, f32)> {
    let mut rng = ChaCha8Rng::seed_from_u64(PATTERN_SEED);
    let r2 = PATTERN_RADIUS * PATTERN_RADIUS;
    let mut point = move || loop {
        let x = rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS);
        let y = rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS);
        if x * x + y * y <= r2 {
            return (x, y);
        }
    };

    let mut pattern = Vec::with_capacity(DESCRIPTOR_BITS);
    while pattern.len() < DESCRIPTOR_BITS {
        let (x1, y1) = point();
        let (x2, y2) = point();
        if (x1, y1) == (x2, y2) {
            continue;
        }
        pattern.push((x1 as f32, y1 as f32, x2 as f32, y2 as f32));
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn kp(x: f32, y: f32, angle: f32) -> KeyPoint {
        KeyPoint {
            x,
            y,
            response: 1.0,
            angle,
        }
    }

    fn gradient_image() -> GrayImage {
        GrayImage::from_fn(100, 100, |x, y| Luma([((x * 3 + y * 7) % 256) as u8]))
    }

    #[test]
    fn test_hamming_distance() {
        let a = BriefDescriptor::zeros();
        let b = BriefDescriptor([u64::MAX; 4]);
        assert_eq!(a.hamming_distance(&a), 0);
        assert_eq!(a.hamming_distance(&b), 256);
        assert_eq!(a.hamming_distance(&BriefDescriptor([1, 0, 0, 1 << 63])), 2);
    }

    #[test]
    fn test_pattern_is_stable() {
        let a = generate_pattern();
        let b = generate_pattern();
        assert_eq!(a.len(), DESCRIPTOR_BITS);
        assert_eq!(a, b);
        for &(x1, y1, x2, y2) in &a {
            assert!(x1 * x1 + y1 * y1 <= (PATTERN_RADIUS * PATTERN_RADIUS) as f32);
            assert!(x2 * x2 + y2 * y2 <= (PATTERN_RADIUS * PATTERN_RADIUS) as f32);
        }
    }

    #[test]
    fn test_border_keypoint_has_no_descriptor() {
        let image = gradient_image();
        let brief = BriefExtractor::new();
        assert!(brief.compute(&image, &kp(5.0, 50.0, 0.0)).is_none());
        assert!(brief.compute(&image, &kp(50.0, 90.0, 0.0)).is_none());
        assert!(brief.compute(&image, &kp(50.0, 50.0, 0.0)).is_some());
    }

    #[test]
    fn test_orientation_changes_descriptor() {
        let image = GrayImage::from_fn(100, 100, |x, _| Luma([if x > 50 { 200 } else { 50 }]));
        let brief = BriefExtractor::new();
        let d0 = brief.compute(&image, &kp(50.0, 50.0, 0.0)).unwrap();
        let d1 = brief
            .compute(&image, &kp(50.0, 50.0, std::f32::consts::FRAC_PI_2))
            .unwrap();
        assert_ne!(d0, d1);
    }

    #[test]
    fn test_compute_all_filters_border() {
        let image = gradient_image();
        let brief = BriefExtractor::new();
        let kps = [kp(2.0, 2.0, 0.0), kp(40.0, 40.0, 0.3), kp(60.0, 30.0, -1.0)];
        let out = brief.compute_all(&image, &kps);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, kps[1]);
        assert_eq!(out[1].0, kps[2]);
    }
}
