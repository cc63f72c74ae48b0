//! Collision recovery for learning agents.
//!
//! Instead of being taken out of the generation, a learning agent that hits
//! something backs off for the first part of the recovery window and then
//! drives forward again, steering towards the nearest lane centerline.

use super::super::geometric_utils::{Point, heading_towards, wrap_angle};
use super::super::params::Params;
use super::super::road::Road;
use super::super::sensor::{Sensor, SensorReading};

/// Which half of the recovery window an agent is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    /// Backing away from whatever was hit.
    Reversing,
    /// Driving forward back towards the lane.
    Advancing,
}

/// Countdown of an ongoing recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    ticks_left: u32,
}

impl Recovery {
    /// Starts a full recovery window.
    pub fn new(params: &Params) -> Self {
        Self {
            ticks_left: params.recovery_ticks,
        }
    }

    /// Ticks remaining before the recovery may end.
    pub fn ticks_left(&self) -> u32 {
        self.ticks_left
    }

    /// Current phase: the first `recovery_reverse_ticks` ticks reverse.
    pub fn phase(&self, params: &Params) -> RecoveryPhase {
        let advancing_ticks = params.recovery_ticks.saturating_sub(params.recovery_reverse_ticks);
        if self.ticks_left > advancing_ticks {
            RecoveryPhase::Reversing
        } else {
            RecoveryPhase::Advancing
        }
    }

    /// Counts one tick off and reports whether the recovery is over.
    ///
    /// Recovery ends once the timer has run out and the agent is clear of
    /// every obstacle, or as soon as it is back near the lane centerline.
    pub fn advance(&mut self, still_hit: bool, lane_distance: Option<f32>, params: &Params) -> bool {
        self.ticks_left = self.ticks_left.saturating_sub(1);
        let expired = !still_hit && self.ticks_left == 0;
        let near_lane = lane_distance.is_some_and(|d| d < params.recovery_exit_distance);
        expired || near_lane
    }
}

/// Where a recovering agent should steer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoverySteering {
    /// Signed heading error; positive means turn left.
    pub delta: f32,
    /// Distance to the nearest lane point, `None` without lanes.
    pub lane_distance: Option<f32>,
}

/// Aims at the nearest lane point. Without lanes, turns away from the side
/// whose rays report closer obstacles.
pub fn recovery_steering(
    position: Point,
    heading: f32,
    road: &Road,
    readings: &[Option<SensorReading>],
) -> RecoverySteering {
    if let Some(lane) = road.nearest_lane_projection(position) {
        let desired = heading_towards(lane.point - position);
        return RecoverySteering {
            delta: wrap_angle(desired - heading),
            lane_distance: Some(lane.distance),
        };
    }
    // rays are ordered left to right
    let (left, right) = readings.split_at(readings.len() / 2);
    let delta = if Sensor::average_offset(right) < Sensor::average_offset(left) {
        0.5
    } else {
        -0.5
    };
    RecoverySteering {
        delta,
        lane_distance: None,
    }
}
