//! Descriptor extractor: keypoints + descriptors for a region of an image.

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::geometry::Rect;

use super::descriptor::BriefExtractor;
use super::detector::FastDetector;
use super::FeatureSet;

/// Oriented FAST + steered BRIEF, ORB style.
///
/// `extract` has no side effects and returns the same feature set for the
/// same image, rect and configuration.
pub struct DescriptorExtractor {
    detector: FastDetector,
    brief: BriefExtractor,
    blur_sigma: f32,
}

impl DescriptorExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            detector: FastDetector::new(config),
            brief: BriefExtractor::new(),
            blur_sigma: config.blur_sigma,
        }
    }

    /// Features located inside `rect`. An empty set means "not trackable".
    pub fn extract(&self, image: &GrayImage, rect: Rect) -> Result<FeatureSet> {
        let (width, height) = image.dimensions();
        rect.check_within(width, height)?;

        let keypoints = self.detector.detect(image, &rect);
        if keypoints.is_empty() {
            return Ok(FeatureSet::empty());
        }

        let described = if self.blur_sigma > 0.0 {
            let smoothed = gaussian_blur_f32(image, self.blur_sigma);
            self.brief.compute_all(&smoothed, &keypoints)
        } else {
            self.brief.compute_all(image, &keypoints)
        };
        Ok(FeatureSet::from_pairs(described))
    }

    /// Features over the whole image.
    pub fn extract_all(&self, image: &GrayImage) -> Result<FeatureSet> {
        let rect = Rect::full(image.width(), image.height())?;
        self.extract(image, rect)
    }
}
