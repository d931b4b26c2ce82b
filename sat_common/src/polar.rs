//! 2-D polar/Cartesian position support for ring-orbit geometry.
//! note we deliberately do not reach for `nalgebra` here (as the 3-D `cartesian3`
//! module in the original ODIN geo stack does) since a satellite ring is fully
//! described by a single angle and a constant radius.

use serde::{Deserialize, Serialize};

/// a position expressed as (radius, angle) with angle in radians, conventionally
/// normalized into `[0, 2*pi)` by the caller (the orbital tick is the only writer).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPos {
    pub radius: f64,
    pub angle: f64,
}

impl PolarPos {
    pub fn new(radius: f64, angle: f64) -> Self {
        PolarPos { radius, angle }
    }

    pub fn to_cartesian(&self) -> Cartesian2 {
        Cartesian2 {
            x: self.radius * self.angle.cos(),
            y: self.radius * self.angle.sin(),
        }
    }
}

/// Cartesian form of a [`PolarPos`], `r*(cos theta + i*sin theta)` read as (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cartesian2 {
    pub x: f64,
    pub y: f64,
}

impl Cartesian2 {
    pub fn new(x: f64, y: f64) -> Self {
        Cartesian2 { x, y }
    }

    /// magnitude of the difference between two Cartesian points.
    pub fn distance(&self, other: &Cartesian2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[inline]
pub fn normalize_2pi(angle: f64) -> f64 {
    let x = angle % crate::geo_constants::TWO_PI;
    if x < 0.0 {
        x + crate::geo_constants::TWO_PI
    } else {
        x
    }
}
