//! Control inputs and the kinds of drivers that set them.

use ndarray::Array1;

use super::super::brain::NeuralNetwork;
use super::super::sensor::Sensor;
use super::route::LaneRoute;

/// Network outputs above this value switch the matching control on.
pub const OUTPUT_THRESHOLD: f32 = 0.5;

/// The four digital control inputs of a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    /// Accelerate forwards.
    pub forward: bool,
    /// Steer left.
    pub left: bool,
    /// Steer right.
    pub right: bool,
    /// Accelerate backwards.
    pub reverse: bool,
}

impl Controls {
    /// Only `forward` held, as scripted agents drive.
    pub fn forward_only() -> Self {
        Self {
            forward: true,
            ..Self::default()
        }
    }

    /// Thresholds network outputs `[forward, left, right, reverse]` at [`OUTPUT_THRESHOLD`].
    /// Missing outputs read as released.
    pub fn from_outputs(outputs: &Array1<f32>) -> Self {
        let on = |i: usize| outputs.get(i).is_some_and(|&v| v > OUTPUT_THRESHOLD);
        Self {
            forward: on(0),
            left: on(1),
            right: on(2),
            reverse: on(3),
        }
    }

    /// Sets `left`/`right` from a signed heading error: positive turns left.
    pub fn steer_towards(&mut self, delta: f32, threshold: f32) {
        self.left = delta > threshold;
        self.right = delta < -threshold;
    }
}

/// Who drives an agent, together with what that driver needs.
#[derive(Debug, Clone)]
pub enum Driver {
    /// Holds `forward` forever and senses nothing. Damaged on first contact.
    Scripted,
    /// Controls are set from outside; the sensor only feeds assists and display.
    PlayerControlled {
        /// Distance sensor.
        sensor: Sensor,
    },
    /// Steered by its own network. Recovers from collisions instead of being damaged.
    Learning {
        /// Distance sensor feeding the network.
        sensor: Sensor,
        /// The network being evolved.
        brain: NeuralNetwork,
        /// Per-level outputs from the last forward pass.
        activations: Vec<Array1<f32>>,
    },
    /// Traffic steering from lane to lane. Obeys lights, never recovers.
    LaneFollowing {
        /// Distance sensor.
        sensor: Sensor,
        /// Current lane target.
        route: LaneRoute,
        /// Optional network whose controls are used while the way is clear.
        brain: Option<NeuralNetwork>,
    },
}

impl Driver {
    /// The agent's sensor, if it has one.
    pub fn sensor(&self) -> Option<&Sensor> {
        match self {
            Driver::Scripted => None,
            Driver::PlayerControlled { sensor }
            | Driver::Learning { sensor, .. }
            | Driver::LaneFollowing { sensor, .. } => Some(sensor),
        }
    }

    /// The agent's network, if it has one.
    pub fn brain(&self) -> Option<&NeuralNetwork> {
        match self {
            Driver::Learning { brain, .. } => Some(brain),
            Driver::LaneFollowing { brain, .. } => brain.as_ref(),
            Driver::Scripted | Driver::PlayerControlled { .. } => None,
        }
    }

    /// Whether this driver is evolved by the engine.
    pub fn is_learning(&self) -> bool {
        matches!(self, Driver::Learning { .. })
    }

    /// The lane target of traffic drivers.
    pub fn route(&self) -> Option<&LaneRoute> {
        match self {
            Driver::LaneFollowing { route, .. } => Some(route),
            _ => None,
        }
    }
}
