//! # Road Evo - Evolving Self-Driving Agents
//!
//! The simulation core of a neuro-evolution sandbox: vehicles drive on a road,
//! sense it with distance rays and are steered by small feed-forward networks
//! that are bred generation after generation.
//!
//! ## Features
//!
//! - Segment and polygon intersection geometry
//! - Ray-cast distance sensors
//! - Sigmoid feed-forward networks with crossover and mutation
//! - Vehicle physics, collision handling and collision recovery
//! - Lane assist, lane enforcement and traffic-light stops
//! - Tournament selection with elitism
//! - JSON persistence of parameters and the best network
//!
//! ## Core Modules
//!
//! - [`simulation::agent`] - Vehicles and their per-tick control loop
//! - [`simulation::brain`] - Neural network implementation
//! - [`simulation::evolution`] - Generations, selection and breeding
//! - [`simulation::sensor`] - Distance rays
//! - [`simulation::road`] - Borders, lanes and lights agents drive on

/// Core simulation logic and data structures.
pub mod simulation {
    /// Vehicles, controls, damage and recovery.
    pub mod agent;
    /// Neural network implementation for agent brains.
    pub mod brain;
    /// Population management and genetic breeding.
    pub mod evolution;
    /// Geometric primitives and intersection tests.
    pub mod geometric_utils;
    /// Simulation parameters.
    pub mod params;
    /// Saved best networks.
    pub mod persistence;
    /// Road geometry handed in by the world.
    pub mod road;
    /// Ray-cast distance sensors.
    pub mod sensor;
    /// Obstacle snapshots with k-d tree lookups.
    ///
    /// The [`spatial::ObstacleIndex`] is rebuilt every tick from the traffic
    /// bodies and read by every sensor and collision check of that tick.
    pub mod spatial;
    /// Generation statistics.
    pub mod stats;
}
