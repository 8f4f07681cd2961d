//! Brute-force Hamming matching with Lowe's ratio test.

use std::collections::HashMap;

use crate::config::MatcherConfig;
use crate::tracking::frame::{BriefDescriptor, FeatureSet};

/// Max descriptor distance for acceptance (256-bit descriptors).
pub const TH_HIGH: u32 = 100;
/// Ratio test threshold (best / second best).
pub const NN_RATIO: f32 = 0.75;

/// Hamming distance between two descriptors.
#[inline]
pub fn descriptor_distance(a: &BriefDescriptor, b: &BriefDescriptor) -> u32 {
    a.hamming_distance(b)
}

/// Correspondence between a target feature and a frame feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    /// Index into the target's feature set.
    pub query_idx: usize,
    /// Index into the frame's feature set.
    pub train_idx: usize,
    pub distance: u32,
}

pub struct DescriptorMatcher {
    nn_ratio: f32,
    max_distance: u32,
}

impl DescriptorMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            nn_ratio: config.nn_ratio,
            max_distance: config.max_distance,
        }
    }

    /// Match every query descriptor against all train descriptors.
    ///
    /// A match survives if its distance is within `max_distance` and below
    /// `nn_ratio` times the second-best distance. When several queries pick
    /// the same train feature only the closest one is kept. Output is ordered
    /// by `query_idx`.
    pub fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> Vec<DescriptorMatch> {
        let train_desc = train.descriptors();
        if train_desc.is_empty() {
            return Vec::new();
        }

        let mut best_for_train: HashMap<usize, DescriptorMatch> = HashMap::new();
        for (query_idx, q) in query.descriptors().iter().enumerate() {
            let mut best = u32::MAX;
            let mut second = u32::MAX;
            let mut best_idx = 0;
            for (train_idx, t) in train_desc.iter().enumerate() {
                let d = descriptor_distance(q, t);
                if d < best {
                    second = best;
                    best = d;
                    best_idx = train_idx;
                } else if d < second {
                    second = d;
                }
            }

            if best > self.max_distance {
                continue;
            }
            if second != u32::MAX && (best as f32) >= self.nn_ratio * second as f32 {
                continue;
            }

            let candidate = DescriptorMatch {
                query_idx,
                train_idx: best_idx,
                distance: best,
            };
            match best_for_train.get(&best_idx) {
                Some(existing) if existing.distance <= candidate.distance => {}
                _ => {
                    best_for_train.insert(best_idx, candidate);
                }
            }
        }

        let mut matches: Vec<DescriptorMatch> = best_for_train.into_values().collect();
        matches.sort_by_key(|m| m.query_idx);
        matches
    }
}
