//! Named objects made of one or more target samples.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::{Result, TrackerError};
use crate::tracking::Target;

/// A physical object the tracker can recognize, described by one or more
/// samples (targets) in insertion order.
#[derive(Debug, Clone)]
pub struct TrackableObject {
    pub name: String,
    samples: Vec<Target>,
}

impl TrackableObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Vec::new(),
        }
    }

    /// Append a sample. It must be valid, named, and carry this object's name.
    pub fn add_sample(&mut self, target: Target) -> Result<()> {
        if !target.is_valid() {
            return Err(TrackerError::invalid_target(
                target.name(),
                "sample has no descriptors",
            ));
        }
        match target.name() {
            None => Err(TrackerError::invalid_target(
                None,
                "candidate targets cannot be stored",
            )),
            Some(n) if n != self.name => Err(TrackerError::invalid_target(
                Some(n),
                format!("sample belongs to {:?}, not {:?}", n, self.name),
            )),
            Some(_) => {
                self.samples.push(target);
                Ok(())
            }
        }
    }

    pub fn samples(&self) -> &[Target] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean point count over all samples, rounded down.
    pub fn average_points(&self) -> usize {
        if self.samples.is_empty() {
            return 0;
        }
        let total: usize = self.samples.iter().map(Target::num_points).sum();
        total / self.samples.len()
    }

    /// Crop of the first sample scaled to fit `max_height` x `max_width`,
    /// keeping its aspect ratio.
    pub fn icon(&self, max_height: u32, max_width: u32) -> Option<RgbImage> {
        let crop = self.samples.first()?.sample().crop();
        let (w, h) = crop.dimensions();
        let scale = (max_width as f64 / w as f64).min(max_height as f64 / h as f64);
        let nw = ((w as f64 * scale).round() as u32).clamp(1, max_width.max(1));
        let nh = ((h as f64 * scale).round() as u32).clamp(1, max_height.max(1));
        Some(imageops::resize(&crop, nw, nh, FilterType::Triangle))
    }
}
