//! Ray-cast distance sensor.
//!
//! A fan of rays is cast from the agent every tick; each ray reports the
//! nearest intersection with a road border or another agent's body. The
//! readings become network inputs through [`Sensor::inputs`].

use ndarray::Array1;

use super::geometric_utils::{
    Intersection, Point, Polygon, Segment, forward_vector, lerp, segment_intersection,
};
use super::params::Params;

/// Nearest hit along a ray. `offset` is the fractional distance along the ray.
pub type SensorReading = Intersection;

/// A fan of distance rays attached to an agent.
#[derive(Debug, Clone)]
pub struct Sensor {
    ray_count: usize,
    ray_length: f32,
    ray_spread: f32,
    rays: Vec<Segment>,
    readings: Vec<Option<SensorReading>>,
}

impl Sensor {
    /// Creates a sensor with the ray configuration from `params`.
    pub fn new(params: &Params) -> Self {
        Self::with_rays(params.ray_count, params.ray_length, params.ray_spread)
    }

    /// Creates a sensor with `ray_count` rays of `ray_length` spread over `ray_spread` radians.
    pub fn with_rays(ray_count: usize, ray_length: f32, ray_spread: f32) -> Self {
        Self {
            ray_count,
            ray_length,
            ray_spread,
            rays: Vec::with_capacity(ray_count),
            readings: vec![None; ray_count],
        }
    }

    /// Number of rays.
    pub fn ray_count(&self) -> usize {
        self.ray_count
    }

    /// Maximum reach of each ray.
    pub fn ray_length(&self) -> f32 {
        self.ray_length
    }

    /// Rays cast on the last update, left-most first.
    pub fn rays(&self) -> &[Segment] {
        &self.rays
    }

    /// One reading per ray from the last update.
    pub fn readings(&self) -> &[Option<SensorReading>] {
        &self.readings
    }

    /// Recasts the rays from `origin` and records the nearest hit of each
    /// against `borders` and the edges of `obstacles`.
    pub fn update(&mut self, origin: Point, heading: f32, borders: &[Segment], obstacles: &[&Polygon]) {
        self.cast_rays(origin, heading);
        self.readings = self
            .rays
            .iter()
            .map(|ray| nearest_hit(ray, borders, obstacles))
            .collect();
    }

    /// Network inputs: `1 - offset` per ray, `0` where nothing was hit.
    pub fn inputs(&self) -> Array1<f32> {
        self.readings
            .iter()
            .map(|r| r.map_or(0.0, |hit| 1.0 - hit.offset))
            .collect()
    }

    /// Mean offset of `readings`, counting only rays that hit. `1` when none did.
    pub fn average_offset(readings: &[Option<SensorReading>]) -> f32 {
        let (sum, count) = readings
            .iter()
            .flatten()
            .fold((0.0, 0_usize), |(sum, count), hit| (sum + hit.offset, count + 1));
        if count == 0 { 1.0 } else { sum / count as f32 }
    }

    fn cast_rays(&mut self, origin: Point, heading: f32) {
        self.rays.clear();
        for i in 0..self.ray_count {
            let t = if self.ray_count == 1 {
                0.5
            } else {
                i as f32 / (self.ray_count - 1) as f32
            };
            let angle = lerp(self.ray_spread / 2.0, -self.ray_spread / 2.0, t) + heading;
            let end = origin + forward_vector(angle) * self.ray_length;
            self.rays.push(Segment::new(origin, end));
        }
    }
}

fn nearest_hit(ray: &Segment, borders: &[Segment], obstacles: &[&Polygon]) -> Option<SensorReading> {
    let border_hits = borders
        .iter()
        .filter_map(|b| segment_intersection(ray.start, ray.end, b.start, b.end));
    let body_hits = obstacles.iter().flat_map(|poly| {
        poly.edges()
            .filter_map(|(c, d)| segment_intersection(ray.start, ray.end, c, d))
    });
    border_hits
        .chain(body_hits)
        .reduce(|best, hit| if hit.offset < best.offset { hit } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn pt(x: f32, y: f32) -> Point {
        Point { x, y }
    }

    #[test]
    fn single_ray_points_straight_ahead() {
        let mut sensor = Sensor::with_rays(1, 100.0, PI / 2.0);
        sensor.update(pt(0.0, 0.0), 0.0, &[], &[]);
        let ray = sensor.rays()[0];
        assert!(ray.end.x.abs() < 1e-4);
        assert!((ray.end.y + 100.0).abs() < 1e-4);
    }

    #[test]
    fn rays_fan_from_left_to_right() {
        let mut sensor = Sensor::with_rays(3, 10.0, PI / 2.0);
        sensor.update(pt(0.0, 0.0), 0.0, &[], &[]);
        let rays = sensor.rays();
        assert!(rays[0].end.x < 0.0, "first ray leans left");
        assert!(rays[1].end.x.abs() < 1e-5);
        assert!(rays[2].end.x > 0.0, "last ray leans right");
    }

    #[test]
    fn reports_nearest_of_several_hits() {
        let mut sensor = Sensor::with_rays(1, 100.0, 0.0);
        let borders = [
            Segment::new(pt(-10.0, -80.0), pt(10.0, -80.0)),
            Segment::new(pt(-10.0, -30.0), pt(10.0, -30.0)),
        ];
        sensor.update(pt(0.0, 0.0), 0.0, &borders, &[]);
        let hit = sensor.readings()[0].expect("ray hits a border");
        assert!((hit.offset - 0.3).abs() < 1e-5);
        assert!((sensor.inputs()[0] - 0.7).abs() < 1e-5);
    }

    #[test]
    fn senses_obstacle_bodies() {
        let mut sensor = Sensor::with_rays(1, 100.0, 0.0);
        let body = Polygon::new(vec![pt(-5.0, -55.0), pt(5.0, -55.0), pt(5.0, -45.0), pt(-5.0, -45.0)]);
        sensor.update(pt(0.0, 0.0), 0.0, &[], &[&body]);
        let hit = sensor.readings()[0].expect("ray hits the body");
        assert!((hit.offset - 0.45).abs() < 1e-5);
    }

    #[test]
    fn missing_readings_map_to_zero_input() {
        let mut sensor = Sensor::with_rays(5, 50.0, PI / 2.0);
        sensor.update(pt(0.0, 0.0), 0.0, &[], &[]);
        assert!(sensor.readings().iter().all(Option::is_none));
        assert!(sensor.inputs().iter().all(|&v| v == 0.0));
        assert_eq!(Sensor::average_offset(sensor.readings()), 1.0);
    }
}
