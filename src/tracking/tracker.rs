//! Live matcher and the tracker facade.
//!
//! Each frame is processed independently against a registry snapshot:
//! - extract frame features once
//! - per target: ratio-test descriptor matching
//! - seeded RANSAC homography + optional LM refinement on the inliers
//! - acceptance: enough inliers and a well-conditioned projection

use std::sync::Arc;
use std::time::Instant;

use image::{GrayImage, RgbImage};
use nalgebra::Point2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::{MatcherConfig, TrackerConfig};
use crate::error::Result;
use crate::geometry::homography::{self, MIN_CORRESPONDENCES};
use crate::geometry::Rect;
use crate::tracking::frame::{DescriptorExtractor, FeatureSet};
use crate::tracking::matching::DescriptorMatcher;
use crate::tracking::result::{FrameMatches, MatchMetrics, TargetMatch, TimingStats};
use crate::tracking::target::{Target, TargetBuilder};

/// Matches frames against a set of targets.
pub struct LiveMatcher {
    extractor: DescriptorExtractor,
    matcher: DescriptorMatcher,
    config: MatcherConfig,
}

impl LiveMatcher {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            extractor: DescriptorExtractor::new(&config.extractor),
            matcher: DescriptorMatcher::new(&config.matcher),
            config: config.matcher.clone(),
        }
    }

    /// Match one frame against `targets`.
    ///
    /// Every target gets an entry in the result; only targets passing the
    /// acceptance checks are `found`.
    pub fn process_frame(
        &self,
        frame_id: u64,
        frame: &GrayImage,
        targets: &[Arc<Target>],
        generation: u64,
    ) -> FrameMatches {
        let t_start = Instant::now();

        let t_extract = Instant::now();
        let features = match self.extractor.extract_all(frame) {
            Ok(f) => f,
            Err(e) => {
                debug!("Frame {}: no features ({})", frame_id, e);
                FeatureSet::empty()
            }
        };
        let extract_ms = t_extract.elapsed().as_secs_f64() * 1000.0;

        let mut out = FrameMatches::empty(frame_id, generation);
        let mut match_ms = 0.0;
        let mut ransac_ms = 0.0;
        for target in targets {
            let (result, m_ms, r_ms) = self.match_target(target, &features);
            match_ms += m_ms;
            ransac_ms += r_ms;
            out.results.insert(result.name.clone(), result);
        }

        out.metrics = MatchMetrics {
            n_features: features.len(),
            n_targets: targets.len(),
            n_found: out.num_found(),
        };
        out.timing = TimingStats {
            total_ms: t_start.elapsed().as_secs_f64() * 1000.0,
            extract_ms,
            match_ms,
            ransac_ms,
        };

        debug!(
            "Frame {}: {} features, {}/{} targets found ({:.1} ms)",
            frame_id,
            out.metrics.n_features,
            out.metrics.n_found,
            out.metrics.n_targets,
            out.timing.total_ms
        );
        out
    }

    /// Verdict for a single target plus (match, ransac) timings in ms.
    fn match_target(&self, target: &Target, frame: &FeatureSet) -> (TargetMatch, f64, f64) {
        let name = target.registry_key();

        let t_match = Instant::now();
        let matches = self.matcher.match_features(target.features(), frame);
        let match_ms = t_match.elapsed().as_secs_f64() * 1000.0;

        let min_matches = self.config.min_matches.max(MIN_CORRESPONDENCES);
        if matches.len() < min_matches {
            return (TargetMatch::not_found(name, matches.len(), 0), match_ms, 0.0);
        }

        let t_ransac = Instant::now();
        let src: Vec<Point2<f64>> = matches
            .iter()
            .map(|m| target.features().point(m.query_idx))
            .collect();
        let dst: Vec<Point2<f64>> = matches.iter().map(|m| frame.point(m.train_idx)).collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.ransac_seed);
        let verdict = match homography::ransac(&src, &dst, &self.config.ransac_params(), &mut rng)
        {
            None => TargetMatch::not_found(name, matches.len(), 0),
            Some(estimate) => {
                let h = if self.config.refine {
                    homography::refine(&estimate, &src, &dst)
                } else {
                    estimate.homography
                };
                let th_sq = self.config.ransac_threshold * self.config.ransac_threshold;
                let inliers = src
                    .iter()
                    .zip(dst.iter())
                    .filter(|(s, d)| h.transfer_error_sq(*s, *d) <= th_sq)
                    .count();

                let rect = target.rect();
                let accepted = inliers >= self.config.min_inliers
                    && h.is_well_conditioned(&rect, self.config.min_quad_area);
                match (accepted, h.project_rect(&rect)) {
                    (true, Some(quad)) => TargetMatch {
                        name: name.to_owned(),
                        found: true,
                        quad: Some(quad),
                        pickup_quad: target.pickup_rect().and_then(|p| h.project_rect(&p)),
                        homography: Some(h),
                        inliers,
                        matches: matches.len(),
                    },
                    _ => TargetMatch::not_found(name, matches.len(), inliers),
                }
            }
        };
        let ransac_ms = t_ransac.elapsed().as_secs_f64() * 1000.0;
        (verdict, match_ms, ransac_ms)
    }
}

/// Extractor, target builder and live matcher behind one handle.
pub struct Tracker {
    builder: TargetBuilder,
    matcher: LiveMatcher,
}

impl Tracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            builder: TargetBuilder::new(&config.extractor),
            matcher: LiveMatcher::new(config),
        }
    }

    /// Build a target from a region of `image`; see [`TargetBuilder::build`].
    pub fn get_target(
        &self,
        image: Arc<RgbImage>,
        rect: Rect,
        name: Option<&str>,
        pickup_rect: Option<Rect>,
    ) -> Result<Target> {
        self.builder.build(image, rect, name, pickup_rect)
    }

    pub fn extract(&self, image: &GrayImage, rect: Rect) -> Result<FeatureSet> {
        self.builder.extractor().extract(image, rect)
    }

    pub fn matcher(&self) -> &LiveMatcher {
        &self.matcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::frame::test_images::{noise_image, rotated_scene, textured_image, to_rgb};
    use image::Luma;

    fn tracker() -> Tracker {
        Tracker::new(&TrackerConfig::default())
    }

    fn box_target(tracker: &Tracker) -> (GrayImage, Rect, Arc<Target>) {
        let sample = textured_image(240, 240, 42);
        let rect = Rect::new(20, 20, 220, 220).unwrap();
        let target = tracker
            .get_target(Arc::new(to_rgb(&sample)), rect, Some("Box"), None)
            .unwrap();
        assert!(target.is_valid());
        (sample, rect, Arc::new(target))
    }

    #[test]
    fn test_rotated_target_is_found() {
        let tracker = tracker();
        let (sample, rect, target) = box_target(&tracker);
        let frame = rotated_scene(&sample, rect, 400, 15.0);

        let out = tracker.matcher().process_frame(1, &frame, &[target], 0);
        let m = out.get("Box").unwrap();
        assert!(m.found, "not found: {:?}", m);
        assert!(m.inliers >= MatcherConfig::default().min_inliers);
        let quad = m.quad.unwrap();
        assert_eq!(quad.corners().len(), 4);
        assert!(quad.is_convex());
        let c = quad.center();
        assert!((c.x - 200.0).abs() < 15.0 && (c.y - 200.0).abs() < 15.0, "center {:?}", c);
        assert!((quad.area() - 200.0 * 200.0).abs() < 0.2 * 200.0 * 200.0);
        assert_eq!(out.metrics.n_found, 1);
    }

    #[test]
    fn test_absent_target_not_found() {
        let tracker = tracker();
        let (_, _, target) = box_target(&tracker);

        let unrelated = noise_image(400, 400, 777);
        let out = tracker.matcher().process_frame(2, &unrelated, &[target.clone()], 0);
        let m = out.get("Box").unwrap();
        assert!(!m.found);
        assert!(m.quad.is_none());

        let blank = GrayImage::from_pixel(400, 400, Luma([128]));
        let out = tracker.matcher().process_frame(3, &blank, &[target], 0);
        assert!(!out.is_found("Box"));
        assert_eq!(out.metrics.n_features, 0);
    }

    #[test]
    fn test_no_targets_no_results() {
        let tracker = tracker();
        let frame = textured_image(200, 200, 1);
        let out = tracker.matcher().process_frame(4, &frame, &[], 7);
        assert!(out.results.is_empty());
        assert_eq!(out.generation, 7);
        assert_eq!(out.frame_id, 4);
    }

    #[test]
    fn test_processing_is_deterministic() {
        let tracker = tracker();
        let (sample, rect, target) = box_target(&tracker);
        let frame = rotated_scene(&sample, rect, 400, 10.0);
        let a = tracker.matcher().process_frame(5, &frame, &[target.clone()], 0);
        let b = tracker.matcher().process_frame(5, &frame, &[target], 0);
        assert_eq!(a.results, b.results);
    }

    #[test]
    fn test_two_targets_found_in_one_frame() {
        let tracker = tracker();
        let rect = Rect::new(20, 20, 220, 220).unwrap();
        let sample_a = textured_image(240, 240, 42);
        let sample_b = textured_image(240, 240, 9);
        let target = |sample: &GrayImage, name| {
            let t = tracker
                .get_target(Arc::new(to_rgb(sample)), rect, Some(name), None)
                .unwrap();
            Arc::new(t)
        };
        let targets = [target(&sample_a, "Left"), target(&sample_b, "Right")];

        // Both crops side by side on a flat background.
        let mut frame = GrayImage::from_pixel(500, 300, Luma([128]));
        for (sample, ox) in [(&sample_a, 30), (&sample_b, 270)] {
            for y in 0..rect.height() {
                for x in 0..rect.width() {
                    let v = *sample.get_pixel(rect.x1 + x, rect.y1 + y);
                    frame.put_pixel(ox + x, 50 + y, v);
                }
            }
        }

        let out = tracker.matcher().process_frame(7, &frame, &targets, 0);
        assert_eq!(out.metrics.n_found, 2);
        for (name, cx) in [("Left", 130.0), ("Right", 370.0)] {
            let m = out.get(name).unwrap();
            assert!(m.found, "{} not found: {:?}", name, m);
            let c = m.quad.unwrap().center();
            assert!((c.x - cx).abs() < 5.0 && (c.y - 150.0).abs() < 5.0, "{} center {:?}", name, c);
        }
    }

    #[test]
    fn test_pickup_quad_projected() {
        let tracker = tracker();
        let sample = textured_image(240, 240, 42);
        let rect = Rect::new(20, 20, 220, 220).unwrap();
        let pickup = Rect::new(100, 100, 140, 140).unwrap();
        let target = tracker
            .get_target(Arc::new(to_rgb(&sample)), rect, Some("Box"), Some(pickup))
            .unwrap();
        let frame = rotated_scene(&sample, rect, 400, 0.0);
        let out = tracker.matcher().process_frame(6, &frame, &[Arc::new(target)], 0);
        let m = out.get("Box").unwrap();
        assert!(m.found);
        let c = m.pickup_quad.unwrap().center();
        // Pickup center (120, 120) lands at the canvas center.
        assert!((c.x - 200.0).abs() < 3.0 && (c.y - 200.0).abs() < 3.0, "center {:?}", c);
    }
}
