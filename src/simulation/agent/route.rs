//! Lane-to-lane targets followed by traffic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::super::geometric_utils::{Point, distance, forward_vector, heading_towards, wrap_angle};
use super::super::road::Road;

/// A target closer than this counts as reached.
pub const TARGET_REACHED_DISTANCE: f32 = 25.0;

/// How far ahead the target sits when there are no lanes to follow.
const OPEN_ROAD_LOOKAHEAD: f32 = 100.0;

/// First target when the spawn point is not on any lane.
const SPAWN_LOOKAHEAD: f32 = 200.0;

/// The end point a traffic agent is heading for and the lane it belongs to.
#[derive(Debug, Clone)]
pub struct LaneRoute {
    lane: Option<usize>,
    target: Point,
    rng: StdRng,
}

impl LaneRoute {
    /// Targets the end of the lane nearest to `position`, or a point straight
    /// ahead when the road has no lanes. `seed` drives later lane choices.
    pub fn starting_at(road: &Road, position: Point, heading: f32, seed: u64) -> Self {
        let rng = StdRng::seed_from_u64(seed);
        match road.nearest_lane(position) {
            Some((index, _)) => Self {
                lane: Some(index),
                target: road.lane_guides[index].p2,
                rng,
            },
            None => Self {
                lane: None,
                target: position + forward_vector(heading) * SPAWN_LOOKAHEAD,
                rng,
            },
        }
    }

    /// Index of the lane being followed.
    pub fn lane(&self) -> Option<usize> {
        self.lane
    }

    /// Point being steered towards.
    pub fn target(&self) -> Point {
        self.target
    }

    /// Picks the next target once the current one is reached or its lane is gone.
    ///
    /// The next lane is drawn at random among lanes starting at the reached
    /// target, or among all lanes when none connect. Without lanes the target
    /// moves [`OPEN_ROAD_LOOKAHEAD`] ahead of the agent.
    pub fn advance(&mut self, road: &Road, position: Point, heading: f32) {
        let lane_gone = self.lane.is_none_or(|index| index >= road.lane_guides.len());
        if !lane_gone && distance(position, self.target) >= TARGET_REACHED_DISTANCE {
            return;
        }
        if road.lane_guides.is_empty() {
            self.lane = None;
            self.target = position + forward_vector(heading) * OPEN_ROAD_LOOKAHEAD;
            return;
        }

        let reached = self.target;
        let linked: Vec<usize> = road
            .lane_guides
            .iter()
            .enumerate()
            .filter(|(_, lane)| distance(lane.p1, reached) < TARGET_REACHED_DISTANCE)
            .map(|(index, _)| index)
            .collect();
        let index = if linked.is_empty() {
            self.rng.random_range(0..road.lane_guides.len())
        } else {
            linked[self.rng.random_range(0..linked.len())]
        };
        self.lane = Some(index);
        self.target = road.lane_guides[index].p2;
    }

    /// Signed heading error towards the target; positive means turn left.
    pub fn steering_delta(&self, position: Point, heading: f32) -> f32 {
        wrap_angle(heading_towards(self.target - position) - heading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::road::LaneGuide;

    fn bent_road() -> Road {
        Road::default().with_lane_guides(vec![
            LaneGuide::new(Point { x: 0.0, y: 0.0 }, Point { x: 0.0, y: -300.0 }),
            LaneGuide::new(Point { x: 0.0, y: -300.0 }, Point { x: 300.0, y: -300.0 }),
        ])
    }

    #[test]
    fn starts_towards_end_of_nearest_lane() {
        let route = LaneRoute::starting_at(&bent_road(), Point { x: 5.0, y: -100.0 }, 0.0, 1);
        assert_eq!(route.lane(), Some(0));
        assert_eq!(route.target(), Point { x: 0.0, y: -300.0 });
    }

    #[test]
    fn reached_target_continues_on_connected_lane() {
        let road = bent_road();
        let mut route = LaneRoute::starting_at(&road, Point { x: 0.0, y: -100.0 }, 0.0, 1);
        route.advance(&road, Point { x: 0.0, y: -200.0 }, 0.0);
        assert_eq!(route.lane(), Some(0));

        route.advance(&road, Point { x: 0.0, y: -290.0 }, 0.0);
        assert_eq!(route.lane(), Some(1));
        assert_eq!(route.target(), Point { x: 300.0, y: -300.0 });
    }

    #[test]
    fn open_road_targets_straight_ahead() {
        let road = Road::default();
        let mut route = LaneRoute::starting_at(&road, Point { x: 0.0, y: 0.0 }, 0.0, 1);
        assert_eq!(route.lane(), None);
        route.advance(&road, Point { x: 0.0, y: -50.0 }, 0.0);
        assert!((route.target().y + 150.0).abs() < 1e-4);
        assert!(route.steering_delta(Point { x: 0.0, y: -50.0 }, 0.0).abs() < 1e-6);
    }

    #[test]
    fn target_to_the_right_steers_right() {
        let route = LaneRoute {
            lane: None,
            target: Point { x: 100.0, y: 0.0 },
            rng: StdRng::seed_from_u64(0),
        };
        let delta = route.steering_delta(Point { x: 0.0, y: 0.0 }, 0.0);
        assert!((delta + std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
