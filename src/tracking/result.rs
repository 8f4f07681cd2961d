//! Per-frame match results and diagnostics.
//!
//! These types describe what happened while matching a single frame:
//! - per-target verdicts (found / not found, projected quad, inliers)
//! - frame-level feature counts
//! - timing information for profiling

use std::collections::BTreeMap;

use crate::geometry::{Homography, Quad};

/// Verdict for one target in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMatch {
    pub name: String,
    /// `true` only when the homography passed every acceptance check.
    pub found: bool,
    /// Target rect projected into the frame; `Some` iff `found`.
    pub quad: Option<Quad>,
    /// Projected pickup rect, when the target has one and was found.
    pub pickup_quad: Option<Quad>,
    pub homography: Option<Homography>,
    pub inliers: usize,
    /// Descriptor matches that survived the ratio test.
    pub matches: usize,
}

impl TargetMatch {
    pub fn not_found(name: impl Into<String>, matches: usize, inliers: usize) -> Self {
        Self {
            name: name.into(),
            found: false,
            quad: None,
            pickup_quad: None,
            homography: None,
            inliers,
            matches,
        }
    }
}

/// Everything the matcher produced for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMatches {
    pub frame_id: u64,
    /// Registry generation the frame was matched against.
    pub generation: u64,
    pub results: BTreeMap<String, TargetMatch>,
    pub metrics: MatchMetrics,
    pub timing: TimingStats,
}

impl FrameMatches {
    pub fn empty(frame_id: u64, generation: u64) -> Self {
        Self {
            frame_id,
            generation,
            results: BTreeMap::new(),
            metrics: MatchMetrics::default(),
            timing: TimingStats::zero(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TargetMatch> {
        self.results.get(name)
    }

    pub fn is_found(&self, name: &str) -> bool {
        self.results.get(name).is_some_and(|m| m.found)
    }

    pub fn found(&self) -> impl Iterator<Item = &TargetMatch> {
        self.results.values().filter(|m| m.found)
    }

    pub fn num_found(&self) -> usize {
        self.found().count()
    }
}

/// Scalar metrics useful for debugging match quality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchMetrics {
    pub n_features: usize,
    pub n_targets: usize,
    pub n_found: usize,
}

/// Timing breakdown for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingStats {
    pub total_ms: f64,
    pub extract_ms: f64,
    pub match_ms: f64,
    pub ransac_ms: f64,
}

impl TimingStats {
    pub fn zero() -> Self {
        Self {
            total_ms: 0.0,
            extract_ms: 0.0,
            match_ms: 0.0,
            ransac_ms: 0.0,
        }
    }
}
