//! Geometry utilities: regions, quads and homography estimation.

pub mod homography;
pub mod rect;

pub use homography::{Homography, HomographyEstimate, RansacParams, estimate_dlt, ransac, refine};
pub use rect::{Quad, Rect};
