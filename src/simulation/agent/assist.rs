//! Driver assists layered over network output: traffic lights and lane keeping.

use super::super::geometric_utils::{Point, distance, forward_vector, heading_towards, wrap_angle};
use super::super::params::Params;
use super::super::road::{Road, TrafficLight};

/// Whether a red or yellow light lies close ahead of `position`.
pub fn must_stop_for_light(position: Point, heading: f32, lights: &[TrafficLight], params: &Params) -> bool {
    let forward = forward_vector(heading);
    lights
        .iter()
        .filter(|light| light.state.requires_stop())
        .any(|light| {
            let dist = distance(position, light.center);
            if dist > params.light_stop_distance {
                return false;
            }
            let to_light = light.center - position;
            let dot = to_light.x * forward.x + to_light.y * forward.y;
            // a light right under the agent is neither ahead nor behind
            let facing = if dist > 0.0 { dot / dist } else { 0.0 };
            facing > params.light_facing_threshold
        })
}

/// Correction to apply for the current distance from the lane centerline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneKeeping {
    /// Close enough, or no lanes to keep to.
    OnLane,
    /// Steer gently towards the lane.
    Nudge {
        /// Heading error towards the nearest lane point.
        delta: f32,
    },
    /// Force forward, steer hard and cap speed.
    Enforce {
        /// Heading error towards the nearest lane point.
        delta: f32,
    },
    /// Enforce, then place the agent back on the lane.
    Snap {
        /// Heading error towards the nearest lane point.
        delta: f32,
        /// Lane point to move to.
        point: Point,
        /// Heading along the lane's driving direction.
        heading: f32,
    },
}

/// Picks the strongest lane correction enabled in `params` for an agent at
/// `position` facing `heading`.
pub fn lane_keeping(position: Point, heading: f32, road: &Road, params: &Params) -> LaneKeeping {
    if !params.lane_assist && !params.hard_lane_enforcement {
        return LaneKeeping::OnLane;
    }
    let Some(lane) = road.nearest_lane_projection(position) else {
        return LaneKeeping::OnLane;
    };
    let delta = wrap_angle(heading_towards(lane.point - position) - heading);
    let d = lane.distance;
    if params.hard_lane_enforcement && d > params.hard_lane_max_deviation {
        if d > params.hard_lane_max_deviation * params.hard_lane_snap_factor {
            LaneKeeping::Snap {
                delta,
                point: lane.point,
                heading: heading_towards(lane.direction),
            }
        } else {
            LaneKeeping::Enforce { delta }
        }
    } else if params.lane_assist && d > params.lane_assist_threshold {
        LaneKeeping::Nudge { delta }
    } else {
        LaneKeeping::OnLane
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::road::{LaneGuide, LightState};
    use std::f32::consts::PI;

    fn vertical_lane() -> Road {
        Road::default().with_lane_guides(vec![LaneGuide::new(
            Point { x: 0.0, y: 0.0 },
            Point { x: 0.0, y: -1000.0 },
        )])
    }

    #[test]
    fn red_light_ahead_stops() {
        let params = Params::default();
        let light = TrafficLight {
            center: Point { x: 0.0, y: -100.0 },
            state: LightState::Red,
        };
        let origin = Point { x: 0.0, y: 0.0 };
        assert!(must_stop_for_light(origin, 0.0, &[light], &params));
        // behind
        assert!(!must_stop_for_light(origin, PI, &[light], &params));
        let green = TrafficLight {
            state: LightState::Green,
            ..light
        };
        assert!(!must_stop_for_light(origin, 0.0, &[green], &params));
        let far = TrafficLight {
            center: Point { x: 0.0, y: -200.0 },
            ..light
        };
        assert!(!must_stop_for_light(origin, 0.0, &[far], &params));
    }

    #[test]
    fn light_at_own_position_does_not_stop() {
        let params = Params::default();
        let origin = Point { x: 0.0, y: 0.0 };
        let overhead = TrafficLight {
            center: origin,
            state: LightState::Red,
        };
        assert!(!must_stop_for_light(origin, 0.0, &[overhead], &params));
        assert!(!must_stop_for_light(origin, 2.0, &[overhead], &params));
    }

    #[test]
    fn correction_grows_with_distance() {
        let params = Params::default();
        let road = vertical_lane();
        let at = |x: f32| lane_keeping(Point { x, y: -500.0 }, 0.0, &road, &params);
        assert_eq!(at(10.0), LaneKeeping::OnLane);
        assert!(matches!(at(25.0), LaneKeeping::Nudge { delta } if delta > 0.0));
        assert!(matches!(at(-50.0), LaneKeeping::Enforce { delta } if delta < 0.0));
        match at(80.0) {
            LaneKeeping::Snap { point, heading, .. } => {
                assert!(point.x.abs() < 1e-5);
                assert!((point.y + 500.0).abs() < 1e-3);
                assert!(heading.abs() < 1e-6);
            }
            other => panic!("expected a snap, got {other:?}"),
        }
    }

    #[test]
    fn disabled_assists_do_nothing() {
        let params = Params {
            lane_assist: false,
            hard_lane_enforcement: false,
            ..Params::default()
        };
        let keeping = lane_keeping(Point { x: 300.0, y: -500.0 }, 0.0, &vertical_lane(), &params);
        assert_eq!(keeping, LaneKeeping::OnLane);
    }

    #[test]
    fn enforcement_works_without_lane_assist() {
        let params = Params {
            lane_assist: false,
            ..Params::default()
        };
        let road = vertical_lane();
        let drifting = lane_keeping(Point { x: 25.0, y: -500.0 }, 0.0, &road, &params);
        assert_eq!(drifting, LaneKeeping::OnLane);
        let straying = lane_keeping(Point { x: 40.0, y: -500.0 }, 0.0, &road, &params);
        assert!(matches!(straying, LaneKeeping::Enforce { .. }));
    }
}
