//! Tracker configuration, loadable from YAML.
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides:
//!
//! ```yaml
//! extractor:
//!   fast_threshold: 25
//! matcher:
//!   min_inliers: 20
//! ```

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::RansacParams;
use crate::tracking::matching::{NN_RATIO, TH_HIGH};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub extractor: ExtractorConfig,
    pub matcher: MatcherConfig,
    pub session: SessionConfig,
}

/// Keypoint detection and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Cell size (pixels) of the non-maximum suppression grid.
    pub nms_cell_size: u32,
    /// Upper bound on keypoints per extraction, strongest first.
    pub max_features: usize,
    /// Gaussian sigma applied before sampling BRIEF pairs.
    pub blur_sigma: f32,
    pub harris_k: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            nms_cell_size: 8,
            max_features: 1000,
            blur_sigma: 1.2,
            harris_k: 0.04,
        }
    }
}

/// Descriptor matching and geometric verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Lowe ratio: best distance must be below `nn_ratio * second_best`.
    pub nn_ratio: f32,
    /// Absolute Hamming distance cap for any accepted match.
    pub max_distance: u32,
    /// Matches needed before a homography is attempted.
    pub min_matches: usize,
    /// Inliers needed for a target to be reported as found.
    pub min_inliers: usize,
    pub ransac_iterations: usize,
    pub ransac_threshold: f64,
    pub ransac_confidence: f64,
    pub ransac_seed: u64,
    /// Run Levenberg-Marquardt on the RANSAC inliers.
    pub refine: bool,
    /// Smallest accepted projected quad, in square pixels.
    pub min_quad_area: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            nn_ratio: NN_RATIO,
            max_distance: TH_HIGH,
            min_matches: 10,
            min_inliers: 12,
            ransac_iterations: 500,
            ransac_threshold: 4.0,
            ransac_confidence: 0.995,
            ransac_seed: 0x5eed,
            refine: true,
            min_quad_area: 64.0,
        }
    }
}

impl MatcherConfig {
    pub fn ransac_params(&self) -> RansacParams {
        RansacParams {
            max_iterations: self.ransac_iterations,
            reproj_threshold: self.ransac_threshold,
            confidence: self.ransac_confidence,
        }
    }
}

/// Session plumbing and UI-facing hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Frames buffered for the matching thread; extra frames are dropped.
    pub frame_queue: usize,
    /// Worker poll interval while idle, in milliseconds.
    pub poll_interval_ms: u64,
    /// Point count below which a new sample is flagged as weakly textured.
    pub hint_points: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_queue: 1,
            poll_interval_ms: 20,
            hint_points: 150,
        }
    }
}

impl TrackerConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: TrackerConfig = serde_yaml::from_str(s).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config: TrackerConfig = serde_yaml::from_reader(
            File::open(path).with_context(|| format!("Failed to open {:?}", path))?,
        )
        .with_context(|| format!("Failed to parse {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.matcher.nn_ratio) {
            anyhow::bail!("matcher.nn_ratio must be within [0, 1]");
        }
        if self.matcher.min_matches < crate::geometry::homography::MIN_CORRESPONDENCES {
            anyhow::bail!("matcher.min_matches must be at least 4");
        }
        if self.extractor.nms_cell_size == 0 {
            anyhow::bail!("extractor.nms_cell_size must be positive");
        }
        if self.session.frame_queue == 0 {
            anyhow::bail!("session.frame_queue must be positive");
        }
        Ok(())
    }
}
