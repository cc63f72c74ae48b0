//! A single fully-connected level of the feed-forward network.

use ndarray::{Array1, Array2};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::super::geometric_utils::lerp;

/// Logistic activation, maps any finite input into `(0, 1)`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// One level of the network: a weight matrix and a bias vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Weight matrix (`input_size` × `output_size`).
    pub weights: Array2<f32>,
    /// Bias vector (`output_size`). Subtracted from the weighted sum.
    pub biases: Array1<f32>,
}

impl Level {
    /// Creates a new level with weights and biases drawn uniformly from `[-1, 1)`
    /// using the thread-local generator.
    pub fn new_random(input_size: usize, output_size: usize) -> Self {
        Self {
            weights: Array2::random((input_size, output_size), Uniform::new(-1.0_f32, 1.0)),
            biases: Array1::random(output_size, Uniform::new(-1.0_f32, 1.0)),
        }
    }

    /// Creates a new random level drawing from the given generator.
    pub fn random_using<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let weights = Array2::from_shape_fn((input_size, output_size), |_| rng.random_range(-1.0..1.0));
        let biases = Array1::from_shape_fn(output_size, |_| rng.random_range(-1.0..1.0));
        Self { weights, biases }
    }

    /// Number of inputs this level consumes.
    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    /// Number of outputs this level produces.
    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Performs the forward pass: `sigmoid(inputs · weights - biases)`.
    #[inline]
    pub fn forward(&self, inputs: &Array1<f32>) -> Array1<f32> {
        let mut output = inputs.dot(&self.weights);
        output -= &self.biases;
        output.mapv_inplace(sigmoid);
        output
    }

    /// Moves every parameter towards a fresh uniform sample by `amount`.
    ///
    /// Biases are visited before weights, weights in row-major order.
    pub fn mutate<R: Rng + ?Sized>(&mut self, amount: f32, rng: &mut R) {
        self.biases
            .mapv_inplace(|b| lerp(b, rng.random_range(-1.0..1.0), amount));
        self.weights
            .mapv_inplace(|w| lerp(w, rng.random_range(-1.0..1.0), amount));
    }

    /// Builds a child level taking each parameter from `parent1` when
    /// `pick_first` returns `true`, otherwise from `parent2`.
    ///
    /// Shapes must already have been checked by the caller.
    pub(crate) fn crossover_by(
        parent1: &Level,
        parent2: &Level,
        pick_first: &mut impl FnMut() -> bool,
    ) -> Self {
        let biases = Array1::from_shape_fn(parent1.biases.len(), |j| {
            if pick_first() {
                parent1.biases[j]
            } else {
                parent2.biases[j]
            }
        });
        let weights = Array2::from_shape_fn(parent1.weights.dim(), |(i, j)| {
            if pick_first() {
                parent1.weights[[i, j]]
            } else {
                parent2.weights[[i, j]]
            }
        });
        Self { weights, biases }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn forward_subtracts_bias_before_activation() {
        let level = Level {
            weights: array![[1.0, 0.0], [0.0, 2.0]],
            biases: array![0.5, -1.0],
        };
        let out = level.forward(&array![1.0, 0.5]);
        assert!((out[0] - sigmoid(0.5)).abs() < 1e-6);
        assert!((out[1] - sigmoid(2.0)).abs() < 1e-6);
    }

    #[test]
    fn random_level_has_requested_shape_and_range() {
        let level = Level::new_random(5, 3);
        assert_eq!(level.input_size(), 5);
        assert_eq!(level.output_size(), 3);
        assert_eq!(level.biases.len(), 3);
        assert!(level.weights.iter().chain(level.biases.iter()).all(|v| (-1.0..=1.0).contains(v)));
    }
}
