//! # Pixel-space and sky-space geometry primitives
//!
//! Integer and floating-point bounding boxes ([`Box2I`], [`Box2D`]) used for image regions and
//! patch bounds, and the spherical coordinate type [`SkyCoord`] used for source positions.
//!
//! Conventions follow the usual image-processing ones:
//! - [`Box2I`] is **inclusive on both ends**: a 10×10 image has `min = (0,0)`, `max = (9,9)`.
//! - [`Box2D`] is a continuous region; converting a [`Box2I`] widens it by half a pixel on every
//!   side, so the continuous box covers the full area of the boundary pixels.

use nalgebra::Point2;

use crate::constants::{Degree, Radian, RADEG};

/// An axis-aligned integer bounding box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Box2I {
    min: Point2<i32>,
    max: Point2<i32>,
}

impl Box2I {
    /// Build a box from its inclusive corners.
    ///
    /// An empty or inverted box (`max < min` on either axis) is allowed and contains nothing.
    pub fn new(min: Point2<i32>, max: Point2<i32>) -> Self {
        Self { min, max }
    }

    /// Build a box from its minimum corner and its dimensions in pixels.
    pub fn from_dimensions(min: Point2<i32>, width: i32, height: i32) -> Self {
        Self {
            min,
            max: Point2::new(min.x + width - 1, min.y + height - 1),
        }
    }

    pub fn min(&self) -> Point2<i32> {
        self.min
    }

    pub fn max(&self) -> Point2<i32> {
        self.max
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y + 1
    }

    pub fn contains(&self, point: Point2<i32>) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Grow the box by `amount` pixels on every side (shrink if negative).
    pub fn grow(&self, amount: i32) -> Self {
        Self {
            min: Point2::new(self.min.x - amount, self.min.y - amount),
            max: Point2::new(self.max.x + amount, self.max.y + amount),
        }
    }

    pub fn intersects(&self, other: &Box2I) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

/// An axis-aligned floating-point bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box2D {
    min: Point2<f64>,
    max: Point2<f64>,
}

impl Box2D {
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Point2<f64> {
        self.min
    }

    pub fn max(&self) -> Point2<f64> {
        self.max
    }

    /// Does the box contain the given continuous point?
    ///
    /// Half-open: the minimum edge is included, the maximum edge is not. Adjacent patches'
    /// inner boxes share their boundary line after the half-pixel widening of [`From<Box2I>`],
    /// so a centroid landing exactly on that line must belong to exactly one of them.
    pub fn contains(&self, point: Point2<f64>) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    /// Grow the box by `amount` on every side (shrink if negative).
    pub fn grow(&self, amount: f64) -> Self {
        Self {
            min: Point2::new(self.min.x - amount, self.min.y - amount),
            max: Point2::new(self.max.x + amount, self.max.y + amount),
        }
    }

    pub fn intersects(&self, other: &Box2D) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// The four corners, counter-clockwise from the minimum corner.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }
}

impl From<Box2I> for Box2D {
    /// Widen an integer box to the continuous region covered by its pixels.
    fn from(b: Box2I) -> Self {
        Self {
            min: Point2::new(b.min.x as f64 - 0.5, b.min.y as f64 - 0.5),
            max: Point2::new(b.max.x as f64 + 0.5, b.max.y as f64 + 0.5),
        }
    }
}

/// A position on the sky, stored as right ascension and declination in **radians**.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoord {
    pub ra: Radian,
    pub dec: Radian,
}

impl SkyCoord {
    pub fn new(ra: Radian, dec: Radian) -> Self {
        Self { ra, dec }
    }

    /// Build a coordinate from degrees (convenience for tests and logging round trips).
    pub fn from_degrees(ra: Degree, dec: Degree) -> Self {
        Self {
            ra: ra * RADEG,
            dec: dec * RADEG,
        }
    }

    pub fn ra_deg(&self) -> Degree {
        self.ra / RADEG
    }

    pub fn dec_deg(&self) -> Degree {
        self.dec / RADEG
    }
}
