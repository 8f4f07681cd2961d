//! Annotation of camera frames with match results.
//!
//! Layers drawn per found target:
//!     quad        - projected target outline (green, doubled for weight)
//!     corner      - first corner marker, shows the target's orientation
//!     pickup      - projected pickup region (orange)

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::geometry::Quad;
use crate::tracking::FrameMatches;

const QUAD_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CORNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const PICKUP_COLOR: Rgb<u8> = Rgb([255, 160, 0]);

/// Draw every found target of `matches` onto `image`.
pub fn draw_matches(image: &mut RgbImage, matches: &FrameMatches) {
    for m in matches.found() {
        let Some(quad) = &m.quad else { continue };
        draw_quad(image, quad, QUAD_COLOR, 2);
        let first = quad.corners()[0];
        draw_filled_circle_mut(
            image,
            (first.x.round() as i32, first.y.round() as i32),
            4,
            CORNER_COLOR,
        );
        if let Some(pickup) = &m.pickup_quad {
            draw_quad(image, pickup, PICKUP_COLOR, 1);
        }
    }
}

/// Closed outline, `thickness` pixels wide (approximately).
pub fn draw_quad(image: &mut RgbImage, quad: &Quad, color: Rgb<u8>, thickness: u32) {
    let corners = quad.corners();
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        for t in 0..thickness {
            let o = t as f32;
            draw_line_segment_mut(
                image,
                (a.x as f32 + o, a.y as f32),
                (b.x as f32 + o, b.y as f32),
                color,
            );
            draw_line_segment_mut(
                image,
                (a.x as f32, a.y as f32 + o),
                (b.x as f32, b.y as f32 + o),
                color,
            );
        }
    }
}
