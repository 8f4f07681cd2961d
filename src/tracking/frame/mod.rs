//! Frame-level feature processing: FAST detection, BRIEF description and the
//! paired feature set they produce.

pub mod descriptor;
pub mod detector;
pub mod extractor;

#[cfg(test)]
pub(crate) mod test_images;

use nalgebra::Point2;

pub use descriptor::{BriefDescriptor, BriefExtractor};
pub use detector::{FastDetector, KeyPoint};
pub use extractor::DescriptorExtractor;

/// Keypoints with one descriptor each, in the same order.
///
/// Only constructible from `(keypoint, descriptor)` pairs, so the two
/// sequences always have equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    keypoints: Vec<KeyPoint>,
    descriptors: Vec<BriefDescriptor>,
}

impl FeatureSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: Vec<(KeyPoint, BriefDescriptor)>) -> Self {
        let (keypoints, descriptors) = pairs.into_iter().unzip();
        Self {
            keypoints,
            descriptors,
        }
    }

    pub fn keypoints(&self) -> &[KeyPoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[BriefDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Keypoint location as a double-precision point.
    pub fn point(&self, idx: usize) -> Point2<f64> {
        let kp = &self.keypoints[idx];
        Point2::new(kp.x as f64, kp.y as f64)
    }
}
