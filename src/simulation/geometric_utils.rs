//! Geometric utility functions for ray casting and collision tests.
//!
//! World space uses screen conventions: `x` grows to the right, `y` grows
//! downwards, and a heading of `0` points "up" (towards negative `y`).

use std::f32::consts::PI;

use geo::{Coord, Line};

/// A point in world space.
pub type Point = Coord<f32>;

/// A line segment between two points. Directed when the direction matters
/// (lane guides), undirected for road borders.
pub type Segment = Line<f32>;

/// Result of a successful segment/segment intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Intersection point.
    pub point: Point,
    /// Fractional position of the point along the first segment (`0` = start, `1` = end).
    pub offset: f32,
}

/// A closed polygon described by its vertices in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon from an ordered list of vertices.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Returns the vertices in order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Iterates over the closed edge loop, wrapping from the last vertex back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Mean of all vertices.
    pub fn centroid(&self) -> Point {
        let origin = Point { x: 0.0, y: 0.0 };
        if self.points.is_empty() {
            return origin;
        }
        let sum = self.points.iter().fold(origin, |acc, p| acc + *p);
        sum / self.points.len() as f32
    }

    /// Largest distance from the centroid to any vertex.
    pub fn radius(&self) -> f32 {
        let c = self.centroid();
        self.points
            .iter()
            .map(|p| distance(c, *p))
            .fold(0.0, f32::max)
    }
}

/// Linear interpolation between `a` and `b`.
///
/// Written as a weighted sum so that `t = 0` yields exactly `a` and `t = 1`
/// yields exactly `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point, b: Point) -> f32 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Intersects segment `AB` with segment `CD`.
///
/// Solves for the parameters `t` (along `AB`) and `u` (along `CD`) with the
/// cross-product form. Touching at an endpoint counts as an intersection.
///
/// # Returns
///
/// The intersection point with `offset = t`, or `None` for parallel or
/// non-overlapping segments.
pub fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Intersection> {
    let t_top = (d.x - c.x) * (a.y - c.y) - (d.y - c.y) * (a.x - c.x);
    let u_top = (c.y - a.y) * (a.x - b.x) - (c.x - a.x) * (a.y - b.y);
    let bottom = (d.y - c.y) * (b.x - a.x) - (d.x - c.x) * (b.y - a.y);

    if bottom == 0.0 {
        return None;
    }

    let t = t_top / bottom;
    let u = u_top / bottom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Intersection {
            point: Point {
                x: lerp(a.x, b.x, t),
                y: lerp(a.y, b.y, t),
            },
            offset: t,
        })
    } else {
        None
    }
}

/// Returns `true` if any edge of `p` intersects any edge of `q`.
///
/// A polygon lying entirely inside the other does not count as intersecting.
pub fn polygons_intersect(p: &Polygon, q: &Polygon) -> bool {
    p.edges().any(|(a, b)| {
        q.edges()
            .any(|(c, d)| segment_intersection(a, b, c, d).is_some())
    })
}

/// Returns `true` if any edge of `polygon` intersects `segment`.
pub fn polygon_touches_segment(polygon: &Polygon, segment: &Segment) -> bool {
    polygon
        .edges()
        .any(|(a, b)| segment_intersection(a, b, segment.start, segment.end).is_some())
}

/// Unit vector a heading points at.
#[inline]
pub fn forward_vector(heading: f32) -> Point {
    Point {
        x: -heading.sin(),
        y: -heading.cos(),
    }
}

/// Heading whose forward vector points along `v`.
#[inline]
pub fn heading_towards(v: Point) -> f32 {
    (-v.x).atan2(-v.y)
}

/// Wraps an angle into `(-PI, PI]`.
pub fn wrap_angle(mut angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}
