//! Saving and loading the best network found so far.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::brain::{NeuralNetwork, TopologyError};
use super::params::Params;

/// Failures while reading or writing a saved brain.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The file could not be read or written.
    #[error("brain file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a valid brain record.
    #[error("brain file is malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// The stored network does not fit the configured agents.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// A network together with where and when it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBrain {
    /// Generation the network drove in.
    pub generation: u32,
    /// Fitness it reached.
    pub fitness: f32,
    /// When the record was made.
    pub timestamp: DateTime<Utc>,
    /// The network itself.
    pub network: NeuralNetwork,
}

impl SavedBrain {
    /// Records `network` as reaching `fitness` in `generation`, stamped now.
    pub fn new(generation: u32, fitness: f32, network: NeuralNetwork) -> Self {
        Self {
            generation,
            fitness,
            timestamp: Utc::now(),
            network,
        }
    }

    /// Checks that the network has the widths `params` asks for.
    pub fn ensure_fits(&self, params: &Params) -> Result<(), TopologyError> {
        let expected = params.layer_widths().to_vec();
        let actual = self.network.widths();
        if actual == expected {
            Ok(())
        } else {
            Err(TopologyError::Mismatch {
                left: actual,
                right: expected,
            })
        }
    }

    /// Saves the record to a JSON file.
    pub fn save_to_file(&self, path: &str) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a record from a JSON file.
    pub fn load_from_file(path: &str) -> Result<Self, PersistenceError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Loads a record and checks it fits the agents described by `params`.
    pub fn load_for(path: &str, params: &Params) -> Result<Self, PersistenceError> {
        let saved = Self::load_from_file(path)?;
        saved.ensure_fits(params)?;
        Ok(saved)
    }
}
