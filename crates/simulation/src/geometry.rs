//! Planar geometry for mapping camera-space positions onto lot zones.

use serde::{Deserialize, Serialize};

/// Tolerance for the collinearity test on polygon edges. Camera coordinates
/// are pixel-scale floats, so anything below this is measurement noise.
const EDGE_EPSILON: f64 = 1e-9;

/// A point in camera space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Mean of the polygon's vertices. Zone boundaries are convex quads by
/// convention, so this is a usable center for distance comparisons.
pub fn polygon_center(boundary: &[Point]) -> Point {
    let n = boundary.len().max(1) as f64;
    let x = boundary.iter().map(|p| p.x).sum::<f64>() / n;
    let y = boundary.iter().map(|p| p.y).sum::<f64>() / n;
    Point { x, y }
}

/// Tests whether `point` lies inside the polygon described by `boundary`
/// (ordered vertices, any count >= 3). Points exactly on an edge count as
/// inside: a boundary-edge collinearity and bounds check runs first, then a
/// ray-casting parity test decides interior points.
pub fn point_in_polygon(point: Point, boundary: &[Point]) -> bool {
    let n = boundary.len();

    for i in 0..n {
        let p1 = boundary[i];
        let p2 = boundary[(i + 1) % n];
        let cross = (point.y - p1.y) * (p2.x - p1.x) - (point.x - p1.x) * (p2.y - p1.y);
        if cross.abs() < EDGE_EPSILON
            && point.x >= p1.x.min(p2.x)
            && point.x <= p1.x.max(p2.x)
            && point.y >= p1.y.min(p2.y)
            && point.y <= p1.y.max(p2.y)
        {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = boundary[i];
        let pj = boundary[j];
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
