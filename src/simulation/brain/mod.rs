//! Feed-forward neural network used to steer learning agents.
//!
//! The network is a plain stack of [`Level`]s with sigmoid activation and
//! supports the genetic operators the evolution engine needs: deep copy,
//! uniform crossover and interpolating mutation. Topology never changes after
//! construction.

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod level;

pub use level::{Level, sigmoid};

/// Errors raised when network shapes do not line up.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// A network needs at least an input and an output width.
    #[error("a network needs at least two layer widths, got {count}")]
    TooFewLayers {
        /// Number of widths supplied.
        count: usize,
    },
    /// Every layer must contain at least one neuron.
    #[error("layer {index} has zero width")]
    ZeroWidth {
        /// Index into the width sequence.
        index: usize,
    },
    /// Consecutive levels do not chain.
    #[error("level {index} expects {actual} inputs but the previous level produces {expected}")]
    BrokenChain {
        /// Index of the offending level.
        index: usize,
        /// Output width of the previous level.
        expected: usize,
        /// Input width of this level.
        actual: usize,
    },
    /// A level's bias vector does not match its weight matrix.
    #[error("level {index} has {actual} biases for {expected} outputs")]
    BiasLength {
        /// Index of the offending level.
        index: usize,
        /// Number of weight columns.
        expected: usize,
        /// Number of biases.
        actual: usize,
    },
    /// Two networks taking part in the same genetic operation differ in shape.
    #[error("network widths {left:?} and {right:?} differ")]
    Mismatch {
        /// Widths of the first network.
        left: Vec<usize>,
        /// Widths of the second network.
        right: Vec<usize>,
    },
    /// The declared width sequence of a stored network disagrees with its levels.
    #[error("declared widths {declared:?} do not match level widths {actual:?}")]
    DeclaredWidths {
        /// Widths written alongside the levels.
        declared: Vec<usize>,
        /// Widths implied by the levels.
        actual: Vec<usize>,
    },
    /// The network input does not match what the agent feeds it.
    #[error("network takes {actual} inputs but the sensor has {expected} rays")]
    InputWidth {
        /// Number of sensor rays.
        expected: usize,
        /// First layer width.
        actual: usize,
    },
    /// The network output does not match the control set.
    #[error("network produces {actual} outputs but {expected} controls are required")]
    OutputWidth {
        /// Number of controls.
        expected: usize,
        /// Last layer width.
        actual: usize,
    },
}

/// Stored form of a network: the width sequence next to the raw levels.
#[derive(Serialize, Deserialize)]
struct NetworkRecord {
    widths: Vec<usize>,
    levels: Vec<Level>,
}

/// A layered feed-forward network with sigmoid activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkRecord", into = "NetworkRecord")]
pub struct NeuralNetwork {
    levels: Vec<Level>,
}

fn check_widths(widths: &[usize]) -> Result<(), TopologyError> {
    if widths.len() < 2 {
        return Err(TopologyError::TooFewLayers {
            count: widths.len(),
        });
    }
    if let Some(index) = widths.iter().position(|&w| w == 0) {
        return Err(TopologyError::ZeroWidth { index });
    }
    Ok(())
}

impl NeuralNetwork {
    /// Creates a network with the given layer widths, drawing parameters from
    /// the thread-local generator.
    ///
    /// `[n0, n1, ..., nk]` produces `k` levels.
    pub fn new(widths: &[usize]) -> Result<Self, TopologyError> {
        check_widths(widths)?;
        let levels = widths
            .windows(2)
            .map(|pair| Level::new_random(pair[0], pair[1]))
            .collect();
        Ok(Self { levels })
    }

    /// Creates a network with the given layer widths, drawing parameters from `rng`.
    pub fn random_using<R: Rng + ?Sized>(widths: &[usize], rng: &mut R) -> Result<Self, TopologyError> {
        check_widths(widths)?;
        let levels = widths
            .windows(2)
            .map(|pair| Level::random_using(pair[0], pair[1], rng))
            .collect();
        Ok(Self { levels })
    }

    /// Assembles a network from existing levels, checking that they chain.
    pub fn from_levels(levels: Vec<Level>) -> Result<Self, TopologyError> {
        if levels.is_empty() {
            return Err(TopologyError::TooFewLayers { count: 0 });
        }
        for (index, level) in levels.iter().enumerate() {
            if level.biases.len() != level.output_size() {
                return Err(TopologyError::BiasLength {
                    index,
                    expected: level.output_size(),
                    actual: level.biases.len(),
                });
            }
            if index > 0 {
                let expected = levels[index - 1].output_size();
                if level.input_size() != expected {
                    return Err(TopologyError::BrokenChain {
                        index,
                        expected,
                        actual: level.input_size(),
                    });
                }
            }
        }
        let network = Self { levels };
        check_widths(&network.widths())?;
        Ok(network)
    }

    /// Levels from input to output.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Layer widths `[inputs, hidden..., outputs]`.
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = Vec::with_capacity(self.levels.len() + 1);
        if let Some(first) = self.levels.first() {
            widths.push(first.input_size());
        }
        widths.extend(self.levels.iter().map(Level::output_size));
        widths
    }

    /// Width of the input layer.
    pub fn input_size(&self) -> usize {
        self.levels.first().map_or(0, Level::input_size)
    }

    /// Width of the output layer.
    pub fn output_size(&self) -> usize {
        self.levels.last().map_or(0, Level::output_size)
    }

    /// Runs a forward pass through every level.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` does not have [`Self::input_size`] elements.
    #[inline]
    pub fn feed_forward(&self, inputs: &Array1<f32>) -> Array1<f32> {
        let mut output = inputs.clone();
        for level in &self.levels {
            output = level.forward(&output);
        }
        output
    }

    /// Runs a forward pass and returns the output of every level, for visualisation.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` does not have [`Self::input_size`] elements.
    pub fn activations(&self, inputs: &Array1<f32>) -> Vec<Array1<f32>> {
        let mut outputs: Vec<Array1<f32>> = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            let next = level.forward(outputs.last().unwrap_or(inputs));
            outputs.push(next);
        }
        outputs
    }

    /// Deep copy sharing no storage with `self`.
    pub fn copy(&self) -> Self {
        Self {
            levels: self.levels.clone(),
        }
    }

    /// Returns `true` when both networks have identical widths at every layer.
    pub fn same_topology(&self, other: &NeuralNetwork) -> bool {
        self.levels.len() == other.levels.len()
            && self
                .levels
                .iter()
                .zip(&other.levels)
                .all(|(a, b)| a.weights.dim() == b.weights.dim())
    }

    /// Fails with [`TopologyError::Mismatch`] unless both networks share a topology.
    pub fn ensure_same_topology(&self, other: &NeuralNetwork) -> Result<(), TopologyError> {
        if self.same_topology(other) {
            Ok(())
        } else {
            Err(TopologyError::Mismatch {
                left: self.widths(),
                right: other.widths(),
            })
        }
    }

    /// Uniform crossover: every weight and bias comes from either parent with
    /// equal probability. Parents are left untouched.
    pub fn crossover<R: Rng + ?Sized>(
        parent1: &NeuralNetwork,
        parent2: &NeuralNetwork,
        rng: &mut R,
    ) -> Result<Self, TopologyError> {
        Self::crossover_by(parent1, parent2, || rng.random_bool(0.5))
    }

    /// Crossover driven by an explicit decision source: a parameter is taken
    /// from `parent1` whenever `pick_first` returns `true`.
    pub fn crossover_by(
        parent1: &NeuralNetwork,
        parent2: &NeuralNetwork,
        mut pick_first: impl FnMut() -> bool,
    ) -> Result<Self, TopologyError> {
        parent1.ensure_same_topology(parent2)?;
        let levels = parent1
            .levels
            .iter()
            .zip(&parent2.levels)
            .map(|(l1, l2)| Level::crossover_by(l1, l2, &mut pick_first))
            .collect();
        Ok(Self { levels })
    }

    /// Replaces every parameter `v` with `lerp(v, uniform(-1, 1), amount)`.
    ///
    /// `amount = 0` leaves the network unchanged, `amount = 1` fully randomises it.
    pub fn mutate<R: Rng + ?Sized>(&mut self, amount: f32, rng: &mut R) {
        for level in &mut self.levels {
            level.mutate(amount, rng);
        }
    }
}

impl From<NeuralNetwork> for NetworkRecord {
    fn from(network: NeuralNetwork) -> Self {
        Self {
            widths: network.widths(),
            levels: network.levels,
        }
    }
}

impl TryFrom<NetworkRecord> for NeuralNetwork {
    type Error = TopologyError;

    fn try_from(record: NetworkRecord) -> Result<Self, Self::Error> {
        let network = NeuralNetwork::from_levels(record.levels)?;
        let actual = network.widths();
        if actual != record.widths {
            return Err(TopologyError::DeclaredWidths {
                declared: record.widths,
                actual,
            });
        }
        Ok(network)
    }
}
