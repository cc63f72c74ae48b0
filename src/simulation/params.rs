//! Simulation parameters.
//!
//! One immutable [`Params`] value is created up front and passed by reference
//! into every constructor and tick function.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of network outputs: forward, left, right, reverse.
pub const CONTROL_COUNT: usize = 4;

/// Rejected parameter values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A count that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    /// A quantity that must be positive is not.
    #[error("{name} must be positive, got {value}")]
    NotPositive {
        /// Field name.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
    /// The mutation rate lies outside `[0, 1]`.
    #[error("mutation rate must lie in [0, 1], got {0}")]
    MutationRate(f32),
    /// More elites than agents.
    #[error("elitism count {elitism} exceeds population size {population}")]
    Elitism {
        /// Requested elites.
        elitism: usize,
        /// Population size.
        population: usize,
    },
    /// The recovery reverse phase does not fit in the recovery window.
    #[error("recovery reverse phase {reverse} must be shorter than recovery window {total}")]
    RecoveryPhase {
        /// Ticks spent reversing.
        reverse: u32,
        /// Total recovery ticks.
        total: u32,
    },
}

/// Failures while reading or writing a parameter file.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// The file could not be read or written.
    #[error("parameter file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid parameter JSON.
    #[error("parameter file is malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// The file parsed but holds unusable values.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Simulation parameters shared by every agent and the evolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Agents per generation.
    pub population_size: usize,
    /// Mutation amount applied to bred offspring (`0..=1`).
    pub mutation_rate: f32,
    /// Top agents copied unmutated into the next generation.
    pub elitism_count: usize,
    /// Agents sampled per tournament during selection.
    pub tournament_size: usize,
    /// Seed for reproducible runs. Drawn from the OS when absent.
    pub rng_seed: Option<u64>,
    /// Ends a generation after this many ticks even if agents are still driving.
    pub generation_tick_limit: Option<u64>,
    /// Finished generations kept in the statistics history.
    pub history_capacity: usize,
    /// Best fitness required before a brain is offered for saving.
    pub min_fitness_for_save: f32,

    /// Agent body width.
    pub car_width: f32,
    /// Agent body length.
    pub car_height: f32,
    /// Top forward speed. Reverse is capped at half of it.
    pub max_speed: f32,
    /// Top speed of non-evolving traffic.
    pub traffic_max_speed: f32,
    /// Speed gained per tick while accelerating.
    pub acceleration: f32,
    /// Speed lost per tick to friction.
    pub friction: f32,
    /// Heading change per tick while steering, in radians.
    pub turn_speed: f32,

    /// Sensor rays per agent, also the network input width.
    pub ray_count: usize,
    /// Reach of each sensor ray.
    pub ray_length: f32,
    /// Total angle covered by the ray fan, in radians.
    pub ray_spread: f32,
    /// Hidden layer width of the network.
    pub hidden_neurons: usize,

    /// Steer learning agents gently back towards the lane centerline.
    pub lane_assist: bool,
    /// Lane deviation that triggers gentle steering.
    pub lane_assist_threshold: f32,
    /// Force learning agents forward when they stall.
    pub auto_run: bool,
    /// Force strong correction when an agent strays far from its lane.
    /// Applies even when `lane_assist` is off.
    pub hard_lane_enforcement: bool,
    /// Lane deviation that triggers strong correction.
    pub hard_lane_max_deviation: f32,
    /// Multiple of `hard_lane_max_deviation` beyond which the agent is snapped back onto the lane.
    pub hard_lane_snap_factor: f32,

    /// Ticks a learning agent spends recovering after a collision.
    pub recovery_ticks: u32,
    /// Ticks at the start of recovery spent reversing.
    pub recovery_reverse_ticks: u32,
    /// Recovery ends early within this distance of the lane centerline.
    pub recovery_exit_distance: f32,

    /// Red or yellow lights closer than this stop an agent.
    pub light_stop_distance: f32,
    /// Minimum cosine between heading and light direction for the light to count as ahead.
    pub light_facing_threshold: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            population_size: 50,
            mutation_rate: 0.1,
            elitism_count: 5,
            tournament_size: 3,
            rng_seed: None,
            generation_tick_limit: None,
            history_capacity: 100,
            min_fitness_for_save: 1000.0,
            car_width: 30.0,
            car_height: 50.0,
            max_speed: 3.0,
            traffic_max_speed: 2.0,
            acceleration: 0.2,
            friction: 0.05,
            turn_speed: 0.03,
            ray_count: 5,
            ray_length: 150.0,
            ray_spread: PI / 2.0,
            hidden_neurons: 6,
            lane_assist: true,
            lane_assist_threshold: 20.0,
            auto_run: true,
            hard_lane_enforcement: true,
            hard_lane_max_deviation: 35.0,
            hard_lane_snap_factor: 1.8,
            recovery_ticks: 90,
            recovery_reverse_ticks: 45,
            recovery_exit_distance: 12.0,
            light_stop_distance: 140.0,
            light_facing_threshold: 0.5,
        }
    }
}

impl Params {
    /// Network layer widths: `[ray_count, hidden_neurons, CONTROL_COUNT]`.
    pub fn layer_widths(&self) -> [usize; 3] {
        [self.ray_count, self.hidden_neurons, CONTROL_COUNT]
    }

    /// Checks that the parameters describe a runnable simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("population_size", self.population_size),
            ("tournament_size", self.tournament_size),
            ("ray_count", self.ray_count),
            ("hidden_neurons", self.hidden_neurons),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        for (name, value) in [
            ("car_width", self.car_width),
            ("car_height", self.car_height),
            ("max_speed", self.max_speed),
            ("traffic_max_speed", self.traffic_max_speed),
            ("acceleration", self.acceleration),
            ("friction", self.friction),
            ("ray_length", self.ray_length),
        ] {
            // also rejects NaN
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::MutationRate(self.mutation_rate));
        }
        if self.elitism_count > self.population_size {
            return Err(ConfigError::Elitism {
                elitism: self.elitism_count,
                population: self.population_size,
            });
        }
        if self.recovery_reverse_ticks > self.recovery_ticks {
            return Err(ConfigError::RecoveryPhase {
                reverse: self.recovery_reverse_ticks,
                total: self.recovery_ticks,
            });
        }
        Ok(())
    }

    /// Saves the parameters to a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save_to_file(&self, path: &str) -> Result<(), ParamsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads parameters from a JSON file and validates them. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not parameter JSON or holds
    /// values [`Params::validate`] rejects.
    pub fn load_from_file(path: &str) -> Result<Self, ParamsError> {
        let json = std::fs::read_to_string(path)?;
        let params: Params = serde_json::from_str(&json)?;
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = Params::default();
        assert_eq!(params.validate(), Ok(()));
        assert_eq!(params.layer_widths(), [5, 6, 4]);
    }

    #[test]
    fn rejects_bad_values() {
        let params = Params {
            elitism_count: 60,
            ..Params::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::Elitism { .. })));

        let params = Params {
            mutation_rate: 1.5,
            ..Params::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::MutationRate(1.5)));

        let params = Params {
            friction: f32::NAN,
            ..Params::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NotPositive { name: "friction", .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let params: Params = serde_json::from_str(r#"{ "population_size": 10, "rng_seed": 7 }"#).unwrap();
        assert_eq!(params.population_size, 10);
        assert_eq!(params.rng_seed, Some(7));
        assert_eq!(params.ray_count, 5);
    }
}
