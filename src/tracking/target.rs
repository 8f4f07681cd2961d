//! Targets: a region of an image together with its extracted features.

use std::sync::Arc;

use image::{imageops, RgbImage};

use crate::config::ExtractorConfig;
use crate::error::{Result, TrackerError};
use crate::geometry::Rect;
use crate::tracking::frame::{DescriptorExtractor, FeatureSet};

/// Registry key of an anonymous target (interactive preview only).
pub const CANDIDATE_KEY: &str = "TrackerObject";

/// An image plus the region selected in it.
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: Arc<RgbImage>,
    pub rect: Rect,
}

impl Sample {
    pub fn new(image: Arc<RgbImage>, rect: Rect) -> Result<Self> {
        rect.check_within(image.width(), image.height())?;
        Ok(Self { image, rect })
    }

    /// Copy of the selected region.
    pub fn crop(&self) -> RgbImage {
        imageops::crop_imm(
            self.image.as_ref(),
            self.rect.x1,
            self.rect.y1,
            self.rect.width(),
            self.rect.height(),
        )
        .to_image()
    }
}

/// Immutable matching template.
///
/// `pickup_rect` is in image coordinates and always lies inside `rect`.
#[derive(Debug, Clone)]
pub struct Target {
    name: Option<String>,
    sample: Sample,
    pickup_rect: Option<Rect>,
    features: Arc<FeatureSet>,
}

impl Target {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name under which the target lives in the registry.
    pub fn registry_key(&self) -> &str {
        self.name.as_deref().unwrap_or(CANDIDATE_KEY)
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn image(&self) -> &Arc<RgbImage> {
        &self.sample.image
    }

    pub fn rect(&self) -> Rect {
        self.sample.rect
    }

    pub fn pickup_rect(&self) -> Option<Rect> {
        self.pickup_rect
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// At least one descriptor was extracted.
    pub fn is_valid(&self) -> bool {
        !self.features.is_empty()
    }

    /// Anonymous targets are previews and never persisted.
    pub fn is_candidate(&self) -> bool {
        self.name.is_none()
    }

    pub fn num_points(&self) -> usize {
        self.features.len()
    }

    /// Same image and features under another name. Features are shared.
    pub fn renamed(&self, name: impl Into<String>) -> Target {
        Target {
            name: Some(name.into()),
            sample: self.sample.clone(),
            pickup_rect: self.pickup_rect,
            features: Arc::clone(&self.features),
        }
    }
}

/// Builds targets by running the extractor over the selected region.
pub struct TargetBuilder {
    extractor: DescriptorExtractor,
}

impl TargetBuilder {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            extractor: DescriptorExtractor::new(config),
        }
    }

    /// Build a target from `rect` of `image`.
    ///
    /// A region without features is not an error: the result simply has
    /// `is_valid() == false`. Errors are reserved for rects outside the
    /// image, a pickup rect outside `rect`, and blank names.
    pub fn build(
        &self,
        image: Arc<RgbImage>,
        rect: Rect,
        name: Option<&str>,
        pickup_rect: Option<Rect>,
    ) -> Result<Target> {
        let name = match name {
            Some(n) if n.trim().is_empty() => {
                return Err(TrackerError::invalid_target(Some(n), "empty name"));
            }
            Some(n) => Some(n.to_owned()),
            None => None,
        };
        let sample = Sample::new(image, rect)?;
        if let Some(pickup) = pickup_rect {
            if !rect.contains_rect(&pickup) {
                return Err(TrackerError::invalid_rect(
                    pickup,
                    format!("pickup rect must lie inside {}", rect),
                ));
            }
        }

        let gray = imageops::grayscale(sample.image.as_ref());
        let features = self.extractor.extract(&gray, rect)?;
        tracing::debug!(
            "Built target {:?} from {}: {} points",
            name.as_deref().unwrap_or(CANDIDATE_KEY),
            rect,
            features.len()
        );

        Ok(Target {
            name,
            sample,
            pickup_rect,
            features: Arc::new(features),
        })
    }

    pub fn extractor(&self) -> &DescriptorExtractor {
        &self.extractor
    }
}
