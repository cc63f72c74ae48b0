//! Road description handed to the simulation by the world layer.
//!
//! The world generator itself lives outside this crate; the simulation only
//! needs the border segments to collide with, the lane centerlines to spawn
//! on and steer towards, and the traffic lights to stop at.

use std::f32::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometric_utils::{Point, Segment, distance, heading_towards};

/// A directed lane centerline segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneGuide {
    /// Start of the lane segment.
    pub p1: Point,
    /// End of the lane segment (driving direction).
    pub p2: Point,
}

/// Closest point on a lane centerline to some position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneProjection {
    /// Projected point on the centerline.
    pub point: Point,
    /// Parameter of the projected point along the lane (`0..=1`).
    pub t: f32,
    /// Distance from the queried position to `point`.
    pub distance: f32,
    /// Unit driving direction of the lane the point lies on.
    pub direction: Point,
}

impl LaneGuide {
    /// Creates a lane running from `p1` to `p2`.
    pub fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Unit vector along the driving direction. Degenerate lanes point up.
    pub fn direction_vector(&self) -> Point {
        let d = self.p2 - self.p1;
        let len = d.x.hypot(d.y);
        if len > 0.0 {
            d / len
        } else {
            Point { x: 0.0, y: -1.0 }
        }
    }

    /// Point at parameter `t` along the lane.
    pub fn point_at(&self, t: f32) -> Point {
        self.p1 + (self.p2 - self.p1) * t
    }

    /// Projects `p` onto the lane, clamped to the segment.
    pub fn project(&self, p: Point) -> LaneProjection {
        let v = self.p2 - self.p1;
        let w = p - self.p1;
        let vv = v.x * v.x + v.y * v.y;
        let vv = if vv == 0.0 { 1e-6 } else { vv };
        let t = ((v.x * w.x + v.y * w.y) / vv).clamp(0.0, 1.0);
        let point = self.point_at(t);
        LaneProjection {
            point,
            t,
            distance: distance(point, p),
            direction: self.direction_vector(),
        }
    }
}

/// Signal state of a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightState {
    /// Stop.
    Red,
    /// Stop if possible.
    Yellow,
    /// Go.
    Green,
    /// Dark or any other state; ignored.
    #[serde(other)]
    Off,
}

impl LightState {
    /// Whether agents approaching the light must stop.
    pub fn requires_stop(self) -> bool {
        matches!(self, LightState::Red | LightState::Yellow)
    }
}

/// A traffic light placed on the road.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficLight {
    /// Position of the light.
    pub center: Point,
    /// Current signal.
    pub state: LightState,
}

/// Static road geometry for one simulation.
#[derive(Debug, Clone, Default)]
pub struct Road {
    /// Border segments agents collide with and sense.
    pub borders: Vec<Segment>,
    /// Lane centerlines used for spawning and lane keeping.
    pub lane_guides: Vec<LaneGuide>,
    /// Traffic lights.
    pub lights: Vec<TrafficLight>,
}

impl Road {
    /// Creates a road from border segments only.
    pub fn new(borders: Vec<Segment>) -> Self {
        Self {
            borders,
            ..Self::default()
        }
    }

    /// Adds lane centerlines.
    #[must_use]
    pub fn with_lane_guides(mut self, lane_guides: Vec<LaneGuide>) -> Self {
        self.lane_guides = lane_guides;
        self
    }

    /// Adds traffic lights.
    #[must_use]
    pub fn with_lights(mut self, lights: Vec<TrafficLight>) -> Self {
        self.lights = lights;
        self
    }

    /// A straight vertical corridor between `left` and `right`, running from
    /// `bottom` up to `top` (screen coordinates, so `top < bottom`), with one
    /// lane guide along its middle pointing up.
    pub fn straight_corridor(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        let mid = (left + right) / 2.0;
        Self::new(vec![
            Segment::new(Point { x: left, y: top }, Point { x: left, y: bottom }),
            Segment::new(Point { x: right, y: top }, Point { x: right, y: bottom }),
        ])
        .with_lane_guides(vec![LaneGuide::new(
            Point { x: mid, y: bottom },
            Point { x: mid, y: top },
        )])
    }

    /// Nearest projection of `p` onto any lane guide, or `None` without lanes.
    pub fn nearest_lane_projection(&self, p: Point) -> Option<LaneProjection> {
        self.nearest_lane(p).map(|(_, projection)| projection)
    }

    /// Index of the lane guide nearest to `p` with the projection onto it.
    /// Ties go to the lower index.
    pub fn nearest_lane(&self, p: Point) -> Option<(usize, LaneProjection)> {
        self.lane_guides
            .iter()
            .map(|lane| lane.project(p))
            .enumerate()
            .min_by(|a, b| a.1.distance.total_cmp(&b.1.distance))
    }

    /// Picks a spawn position and heading on a random lane, away from its
    /// endpoints. Without lanes every agent starts at `(100, 100)` facing right.
    pub fn spawn_pose<R: Rng + ?Sized>(&self, rng: &mut R) -> (Point, f32) {
        if self.lane_guides.is_empty() {
            return (Point { x: 100.0, y: 100.0 }, -PI / 2.0);
        }
        let lane = &self.lane_guides[rng.random_range(0..self.lane_guides.len())];
        let t = rng.random_range(0.1..0.9);
        (lane.point_at(t), heading_towards(lane.direction_vector()))
    }
}
