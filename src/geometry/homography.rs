//! Planar homography estimation: normalized DLT, RANSAC and
//! Levenberg-Marquardt refinement on the inlier set.
//!
//! The model maps target (sample image) points onto frame points:
//!
//! ```text
//! s * [u, v, 1]^T = H * [x, y, 1]^T
//! ```

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{DMatrix, DVector, Dyn, Matrix3, Owned, Point2, Vector3};
use rand::seq::index;
use rand::Rng;

use crate::geometry::{Quad, Rect};

/// Minimum number of correspondences for a homography.
pub const MIN_CORRESPONDENCES: usize = 4;

/// 3x3 projective transform, normalized so that `h[(2, 2)] == 1` when possible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Project a point; `None` when it maps to (or behind) the line at infinity.
    pub fn project(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        let v = self.0 * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < 1e-12 || !v.z.is_finite() {
            return None;
        }
        Some(Point2::new(v.x / v.z, v.y / v.z))
    }

    /// Squared forward transfer error `|H*src - dst|^2`.
    pub fn transfer_error_sq(&self, src: &Point2<f64>, dst: &Point2<f64>) -> f64 {
        match self.project(src) {
            Some(p) => (p - dst).norm_squared(),
            None => f64::INFINITY,
        }
    }

    /// Project all four corners of `rect`.
    pub fn project_rect(&self, rect: &Rect) -> Option<Quad> {
        let corners = rect.corners();
        let mut out = [Point2::origin(); 4];
        for (dst, src) in out.iter_mut().zip(corners.iter()) {
            let v = self.0 * Vector3::new(src.x, src.y, 1.0);
            // Corners must stay in front of the camera (same side as w=1).
            if v.z <= 1e-12 || !v.z.is_finite() {
                return None;
            }
            *dst = Point2::new(v.x / v.z, v.y / v.z);
        }
        Some(Quad(out))
    }

    /// Rejects transforms that would yield a meaningless quad: non-finite
    /// entries, near-singular matrices, flipped or non-convex projections and
    /// projections smaller than `min_area` pixels.
    pub fn is_well_conditioned(&self, rect: &Rect, min_area: f64) -> bool {
        if self.0.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let det = self.0.determinant();
        if !det.is_finite() || det.abs() < 1e-8 {
            return false;
        }
        // Orientation-preserving affine part (no mirror images).
        let affine_det = self.0[(0, 0)] * self.0[(1, 1)] - self.0[(0, 1)] * self.0[(1, 0)];
        if affine_det <= 0.0 {
            return false;
        }
        match self.project_rect(rect) {
            Some(quad) => quad.is_convex() && quad.area() >= min_area,
            None => false,
        }
    }

    fn normalized(m: Matrix3<f64>) -> Option<Self> {
        if m.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let s = m[(2, 2)];
        if s.abs() > 1e-12 {
            Some(Self(m / s))
        } else {
            let n = m.norm();
            if n < 1e-12 {
                None
            } else {
                Some(Self(m / n))
            }
        }
    }
}

/// Hartley normalization: centroid to origin, mean distance sqrt(2).
fn normalizing_transform(points: &[Point2<f64>]) -> Matrix3<f64> {
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(
        scale, 0.0, -scale * cx, //
        0.0, scale, -scale * cy, //
        0.0, 0.0, 1.0,
    )
}

fn apply(t: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let v = t * Vector3::new(p.x, p.y, 1.0);
    Point2::new(v.x / v.z, v.y / v.z)
}

/// Direct linear transform over `src[i] -> dst[i]` (at least 4 pairs).
///
/// A minimal set with three points on one line has no unique solution and
/// gives `None`.
pub fn estimate_dlt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < MIN_CORRESPONDENCES {
        return None;
    }
    if let (Ok(s), Ok(d)) = (<&[Point2<f64>; 4]>::try_from(src), <&[Point2<f64>; 4]>::try_from(dst)) {
        if has_collinear_triple(s) || has_collinear_triple(d) {
            return None;
        }
    }

    let t_src = normalizing_transform(src);
    let t_dst = normalizing_transform(dst);

    // Pad to at least 9 rows so the thin SVD still exposes the null space.
    let rows = (2 * src.len()).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let s = apply(&t_src, s);
        let d = apply(&t_dst, d);
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;
        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = v_t.row(min_idx);
    let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse()?;
    Homography::normalized(t_dst_inv * hn * t_src)
}

/// Parameters for [`ransac`].
#[derive(Debug, Clone, Copy)]
pub struct RansacParams {
    pub max_iterations: usize,
    /// Inlier threshold on the forward transfer error, in pixels.
    pub reproj_threshold: f64,
    /// Early-termination confidence.
    pub confidence: f64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            reproj_threshold: 4.0,
            confidence: 0.995,
        }
    }
}

/// Result of a robust fit.
#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    pub homography: Homography,
    pub inlier_mask: Vec<bool>,
    pub num_inliers: usize,
}

impl HomographyEstimate {
    pub fn inlier_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.inlier_mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
    }
}

fn score(h: &Homography, src: &[Point2<f64>], dst: &[Point2<f64>], th_sq: f64) -> (Vec<bool>, usize) {
    let mask: Vec<bool> = src
        .iter()
        .zip(dst.iter())
        .map(|(s, d)| h.transfer_error_sq(s, d) <= th_sq)
        .collect();
    let n = mask.iter().filter(|&&m| m).count();
    (mask, n)
}

/// Three of the four sample points on one line give a degenerate minimal set.
fn has_collinear_triple(pts: &[Point2<f64>; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES.iter().any(|&(i, j, k)| {
        let (a, b, c) = (pts[i], pts[j], pts[k]);
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        cross.abs() < 1.0
    })
}

fn required_iterations(inlier_ratio: f64, confidence: f64, current: usize) -> usize {
    let p_good = inlier_ratio.powi(MIN_CORRESPONDENCES as i32);
    if p_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    if p_good <= f64::EPSILON {
        return current;
    }
    let n = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if n.is_finite() {
        (n.ceil() as usize).max(1)
    } else {
        current
    }
}

/// Robustly fit `src -> dst` with 4-point RANSAC, then refit on all inliers.
///
/// Deterministic for a given RNG state.
pub fn ransac<R: Rng + ?Sized>(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RansacParams,
    rng: &mut R,
) -> Option<HomographyEstimate> {
    let n = src.len();
    if n != dst.len() || n < MIN_CORRESPONDENCES {
        return None;
    }
    let th_sq = params.reproj_threshold * params.reproj_threshold;

    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut max_iterations = params.max_iterations;
    let mut iter = 0;

    while iter < max_iterations {
        iter += 1;
        let idx = index::sample(rng, n, MIN_CORRESPONDENCES);
        let s = [src[idx.index(0)], src[idx.index(1)], src[idx.index(2)], src[idx.index(3)]];
        let d = [dst[idx.index(0)], dst[idx.index(1)], dst[idx.index(2)], dst[idx.index(3)]];
        if has_collinear_triple(&s) || has_collinear_triple(&d) {
            continue;
        }
        let Some(h) = estimate_dlt(&s, &d) else {
            continue;
        };
        let (mask, count) = score(&h, src, dst, th_sq);
        let better = best.as_ref().map_or(true, |(_, _, c)| count > *c);
        if better {
            max_iterations = max_iterations.min(required_iterations(
                count as f64 / n as f64,
                params.confidence,
                max_iterations,
            ));
            best = Some((h, mask, count));
        }
    }

    let (mut h, mut mask, mut count) = best?;
    if count < MIN_CORRESPONDENCES {
        return None;
    }

    // Refit on the full consensus set; keep it only if it does not lose support.
    let (in_src, in_dst) = select(src, dst, &mask);
    if let Some(refit) = estimate_dlt(&in_src, &in_dst) {
        let (m2, c2) = score(&refit, src, dst, th_sq);
        if c2 >= count {
            h = refit;
            mask = m2;
            count = c2;
        }
    }

    Some(HomographyEstimate {
        homography: h,
        inlier_mask: mask,
        num_inliers: count,
    })
}

fn select(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    mask: &[bool],
) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    src.iter()
        .zip(dst.iter())
        .zip(mask.iter())
        .filter(|(_, &m)| m)
        .map(|((s, d), _)| (*s, *d))
        .unzip()
}

/// Nonlinear least-squares problem over the 8 free entries of H (h22 = 1).
struct HomographyProblem {
    src: Vec<Point2<f64>>,
    dst: Vec<Point2<f64>>,
    params: DVector<f64>,
}

impl HomographyProblem {
    fn new(h: &Homography, src: Vec<Point2<f64>>, dst: Vec<Point2<f64>>) -> Self {
        let m = h.0 / h.0[(2, 2)];
        let params = DVector::from_vec(vec![
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
        ]);
        Self { src, dst, params }
    }

    fn homography(&self) -> Homography {
        let p = &self.params;
        Homography(Matrix3::new(p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], 1.0))
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for HomographyProblem {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let p = &self.params;
        let mut r = DVector::zeros(2 * self.src.len());
        for (i, (s, d)) in self.src.iter().zip(self.dst.iter()).enumerate() {
            let w = p[6] * s.x + p[7] * s.y + 1.0;
            if w.abs() < 1e-12 {
                return None;
            }
            r[2 * i] = (p[0] * s.x + p[1] * s.y + p[2]) / w - d.x;
            r[2 * i + 1] = (p[3] * s.x + p[4] * s.y + p[5]) / w - d.y;
        }
        Some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let p = &self.params;
        let mut j = DMatrix::zeros(2 * self.src.len(), 8);
        for (i, s) in self.src.iter().enumerate() {
            let (x, y) = (s.x, s.y);
            let w = p[6] * x + p[7] * y + 1.0;
            if w.abs() < 1e-12 {
                return None;
            }
            let u = (p[0] * x + p[1] * y + p[2]) / w;
            let v = (p[3] * x + p[4] * y + p[5]) / w;
            let r0 = 2 * i;
            let r1 = r0 + 1;
            j[(r0, 0)] = x / w;
            j[(r0, 1)] = y / w;
            j[(r0, 2)] = 1.0 / w;
            j[(r0, 6)] = -u * x / w;
            j[(r0, 7)] = -u * y / w;
            j[(r1, 3)] = x / w;
            j[(r1, 4)] = y / w;
            j[(r1, 5)] = 1.0 / w;
            j[(r1, 6)] = -v * x / w;
            j[(r1, 7)] = -v * y / w;
        }
        Some(j)
    }
}

fn sum_sq_error(h: &Homography, src: &[Point2<f64>], dst: &[Point2<f64>]) -> f64 {
    src.iter()
        .zip(dst.iter())
        .map(|(s, d)| h.transfer_error_sq(s, d))
        .sum()
}

/// Minimize the transfer error over the inliers of `estimate`.
///
/// Returns the input homography unchanged if the optimizer fails or does not
/// improve the error.
pub fn refine(
    estimate: &HomographyEstimate,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Homography {
    let h0 = estimate.homography;
    if h0.0[(2, 2)].abs() < 1e-12 {
        return h0;
    }
    let (in_src, in_dst) = select(src, dst, &estimate.inlier_mask);
    if in_src.len() < MIN_CORRESPONDENCES + 1 {
        return h0;
    }
    let before = sum_sq_error(&h0, &in_src, &in_dst);

    let problem = HomographyProblem::new(&h0, in_src, in_dst);
    let (problem, report) = LevenbergMarquardt::new().minimize(problem);
    if !report.termination.was_successful() {
        return h0;
    }
    let refined = problem.homography();
    let after = sum_sq_error(&refined, &problem.src, &problem.dst);
    if after.is_finite() && after <= before {
        refined
    } else {
        h0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ground_truth() -> Homography {
        // 15 degree rotation, slight scale, translation, mild perspective.
        let (s, c) = 15f64.to_radians().sin_cos();
        Homography(Matrix3::new(
            1.1 * c, -1.1 * s, 40.0, //
            1.1 * s, 1.1 * c, -12.0, //
            1e-5, -2e-5, 1.0,
        ))
    }

    fn grid_points() -> Vec<Point2<f64>> {
        let mut pts = Vec::new();
        for y in 0..8 {
            for x in 0..8 {
                pts.push(Point2::new(20.0 + x as f64 * 23.0, 15.0 + y as f64 * 19.0 + (x % 3) as f64));
            }
        }
        pts
    }

    fn assert_close(a: &Homography, b: &Homography, pts: &[Point2<f64>], tol: f64) {
        for p in pts {
            let pa = a.project(p).unwrap();
            let pb = b.project(p).unwrap();
            assert!((pa - pb).norm() < tol, "{:?} vs {:?}", pa, pb);
        }
    }

    #[test]
    fn test_dlt_exact() {
        let h = ground_truth();
        let src = grid_points();
        let dst: Vec<_> = src.iter().map(|p| h.project(p).unwrap()).collect();
        let corners = [0, 7, 56, 63];
        let src4: Vec<_> = corners.iter().map(|&i| src[i]).collect();
        let dst4: Vec<_> = corners.iter().map(|&i| dst[i]).collect();
        let est = estimate_dlt(&src4, &dst4).unwrap();
        assert_close(&est, &h, &src, 1e-6);
        let est_all = estimate_dlt(&src, &dst).unwrap();
        assert_close(&est_all, &h, &src, 1e-6);
    }

    #[test]
    fn test_dlt_degenerate_minimal_set() {
        let h = ground_truth();
        let src = grid_points();
        let dst: Vec<_> = src.iter().map(|p| h.project(p).unwrap()).collect();
        // The first three grid points lie on one line.
        assert!(estimate_dlt(&src[..4], &dst[..4]).is_none());
        assert!(estimate_dlt(&src[..5], &dst[..5]).is_some());
    }

    #[test]
    fn test_dlt_too_few_points() {
        let src = grid_points();
        assert!(estimate_dlt(&src[..3], &src[..3]).is_none());
        assert!(estimate_dlt(&src[..5], &src[..4]).is_none());
    }

    #[test]
    fn test_ransac_rejects_outliers() {
        let h = ground_truth();
        let src = grid_points();
        let mut dst: Vec<_> = src.iter().map(|p| h.project(p).unwrap()).collect();
        // Corrupt a quarter of the correspondences.
        for (i, d) in dst.iter_mut().enumerate() {
            if i % 4 == 0 {
                *d = Point2::new(d.x + 60.0 + i as f64, d.y - 35.0);
            }
        }
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let est = ransac(&src, &dst, &RansacParams::default(), &mut rng).unwrap();
        assert_eq!(est.num_inliers, src.len() - src.len() / 4);
        for (i, m) in est.inlier_mask.iter().enumerate() {
            assert_eq!(*m, i % 4 != 0);
        }
        let refined = refine(&est, &src, &dst);
        let good: Vec<_> = est.inlier_indices().map(|i| src[i]).collect();
        assert_close(&refined, &h, &good, 1e-3);
    }

    #[test]
    fn test_ransac_deterministic() {
        let h = ground_truth();
        let src = grid_points();
        let mut dst: Vec<_> = src.iter().map(|p| h.project(p).unwrap()).collect();
        dst[3].x += 50.0;
        let a = ransac(&src, &dst, &RansacParams::default(), &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let b = ransac(&src, &dst, &RansacParams::default(), &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert_eq!(a.inlier_mask, b.inlier_mask);
        assert_eq!(a.homography, b.homography);
    }

    #[test]
    fn test_well_conditioned() {
        let rect = Rect::new(0, 0, 100, 100).unwrap();
        assert!(ground_truth().is_well_conditioned(&rect, 100.0));
        assert!(Homography(Matrix3::identity()).is_well_conditioned(&rect, 100.0));
        // Mirror image.
        let mirror = Homography(Matrix3::new(-1.0, 0.0, 200.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0));
        assert!(!mirror.is_well_conditioned(&rect, 100.0));
        // Collapsed to a line.
        let flat = Homography(Matrix3::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0));
        assert!(!flat.is_well_conditioned(&rect, 100.0));
        // Too small.
        let tiny = Homography(Matrix3::new(0.01, 0.0, 0.0, 0.0, 0.01, 0.0, 0.0, 0.0, 1.0));
        assert!(!tiny.is_well_conditioned(&rect, 100.0));
    }
}
