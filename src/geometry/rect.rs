//! Axis-aligned regions and projected quadrilaterals.

use std::fmt;
use std::str::FromStr;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Half-open pixel region `[x1, x2) x [y1, y2)`.
///
/// Width and height are always positive; every constructor checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 4]", into = "[u32; 4]")]
pub struct Rect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rect {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self> {
        let rect = Self { x1, y1, x2, y2 };
        if x2 <= x1 || y2 <= y1 {
            return Err(TrackerError::invalid_rect(
                rect,
                "width and height must be positive",
            ));
        }
        Ok(rect)
    }

    /// Whole-image region.
    pub fn full(width: u32, height: u32) -> Result<Self> {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x1 as f32 && x < self.x2 as f32 && y >= self.y1 as f32 && y < self.y2 as f32
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x2 <= width && self.y2 <= height
    }

    /// Fails with `InvalidRect` unless the region lies inside a `width x height` image.
    pub fn check_within(&self, width: u32, height: u32) -> Result<()> {
        if self.fits_within(width, height) {
            Ok(())
        } else {
            Err(TrackerError::invalid_rect(
                *self,
                format!("outside of {}x{} image", width, height),
            ))
        }
    }

    /// Shift by `(dx, dy)`; used to map crop-relative selections back into
    /// image coordinates.
    pub fn translate(&self, dx: u32, dy: u32) -> Rect {
        Rect {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Corners in clockwise order starting top-left.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        let (x1, y1, x2, y2) = (
            self.x1 as f64,
            self.y1 as f64,
            self.x2 as f64,
            self.y2 as f64,
        );
        [
            Point2::new(x1, y1),
            Point2::new(x2, y1),
            Point2::new(x2, y2),
            Point2::new(x1, y2),
        ]
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

impl TryFrom<[u32; 4]> for Rect {
    type Error = TrackerError;

    fn try_from([x1, y1, x2, y2]: [u32; 4]) -> Result<Self> {
        Rect::new(x1, y1, x2, y2)
    }
}

impl From<Rect> for [u32; 4] {
    fn from(r: Rect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

impl FromStr for Rect {
    type Err = TrackerError;

    /// Parses `x1,y1,x2,y2`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| TrackerError::Config(format!("bad rect {:?}: {}", s, e)))?;
        match parts.as_slice() {
            [x1, y1, x2, y2] => Rect::new(*x1, *y1, *x2, *y2),
            _ => Err(TrackerError::Config(format!(
                "bad rect {:?}: expected x1,y1,x2,y2",
                s
            ))),
        }
    }
}

/// Four projected corners of a target rect in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad(pub [Point2<f64>; 4]);

impl Quad {
    pub fn corners(&self) -> &[Point2<f64>; 4] {
        &self.0
    }

    pub fn center(&self) -> Point2<f64> {
        let sum = self
            .0
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / 4.0)
    }

    /// Unsigned area (shoelace).
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    fn signed_area(&self) -> f64 {
        let mut acc = 0.0;
        for i in 0..4 {
            let a = self.0[i];
            let b = self.0[(i + 1) % 4];
            acc += a.x * b.y - b.x * a.y;
        }
        acc * 0.5
    }

    /// True when all turns go the same way and no corner is degenerate.
    pub fn is_convex(&self) -> bool {
        let mut sign = 0.0f64;
        for i in 0..4 {
            let a = self.0[i];
            let b = self.0[(i + 1) % 4];
            let c = self.0[(i + 2) % 4];
            let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
            if !cross.is_finite() || cross.abs() < 1e-9 {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_rejects_empty() {
        assert!(Rect::new(10, 10, 10, 20).is_err());
        assert!(Rect::new(10, 10, 20, 5).is_err());
        assert!(Rect::new(0, 0, 1, 1).is_ok());
    }

    #[test]
    fn test_rect_bounds() {
        let r = Rect::new(10, 20, 110, 70).unwrap();
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 50);
        assert!(r.check_within(110, 70).is_ok());
        assert!(r.check_within(109, 70).is_err());
        assert!(r.contains_point(10.0, 20.0));
        assert!(!r.contains_point(110.0, 20.0));
    }

    #[test]
    fn test_rect_contains_and_translate() {
        let outer = Rect::new(10, 10, 100, 100).unwrap();
        let inner = Rect::new(0, 0, 20, 20).unwrap().translate(10, 10);
        assert_eq!(inner, Rect::new(10, 10, 30, 30).unwrap());
        assert!(outer.contains_rect(&inner));
        assert!(!inner.contains_rect(&outer));
    }

    #[test]
    fn test_rect_parse() {
        let r: Rect = "1, 2,30,40".parse().unwrap();
        assert_eq!(r, Rect::new(1, 2, 30, 40).unwrap());
        assert!("1,2,3".parse::<Rect>().is_err());
        assert!("a,b,c,d".parse::<Rect>().is_err());
        assert_eq!(r.to_string(), "1,2,30,40");
    }

    #[test]
    fn test_rect_yaml_checked() {
        let r: Rect = serde_yaml::from_str("[10, 20, 110, 70]").unwrap();
        assert_eq!(r, Rect::new(10, 20, 110, 70).unwrap());
        assert!(serde_yaml::from_str::<Rect>("[10, 20, 10, 70]").is_err());
        assert_eq!(serde_yaml::to_string(&r).unwrap(), serde_yaml::to_string(&[10, 20, 110, 70]).unwrap());
    }

    #[test]
    fn test_quad_geometry() {
        let r = Rect::new(0, 0, 10, 20).unwrap();
        let q = Quad(r.corners());
        assert!((q.area() - 200.0).abs() < 1e-9);
        assert!(q.is_convex());
        let c = q.center();
        assert!((c.x - 5.0).abs() < 1e-9 && (c.y - 10.0).abs() < 1e-9);

        // Bow-tie: swap two corners.
        let [a, b, c, d] = r.corners();
        let twisted = Quad([a, c, b, d]);
        assert!(!twisted.is_convex());
    }
}
