#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use ndarray::{Array1, array};
use rand::SeedableRng;
use rand::rngs::StdRng;
use road_evo::simulation::brain::{NeuralNetwork, TopologyError};
use road_evo::simulation::params::Params;

fn create_test_params() -> Params {
    Params {
        ray_count: 5,
        hidden_neurons: 6,
        rng_seed: Some(42),
        ..Params::default()
    }
}

fn create_test_network(seed: u64) -> NeuralNetwork {
    let params = create_test_params();
    let mut rng = StdRng::seed_from_u64(seed);
    NeuralNetwork::random_using(&params.layer_widths(), &mut rng).unwrap()
}

fn sample_inputs() -> Vec<Array1<f32>> {
    vec![
        array![0.0, 0.0, 0.0, 0.0, 0.0],
        array![1.0, 1.0, 1.0, 1.0, 1.0],
        array![0.2, 0.9, 0.0, 0.35, 0.7],
    ]
}

#[test]
fn test_outputs_in_open_unit_interval() {
    let mut rng = StdRng::seed_from_u64(5);
    let original = create_test_network(1);
    let mut mutated = original.copy();
    mutated.mutate(0.7, &mut rng);
    let crossed = NeuralNetwork::crossover(&original, &create_test_network(2), &mut rng).unwrap();

    for network in [&original, &mutated, &crossed] {
        for inputs in sample_inputs() {
            let outputs = network.feed_forward(&inputs);
            assert_eq!(outputs.len(), 4);
            assert!(outputs.iter().all(|&v| v > 0.0 && v < 1.0), "{outputs:?}");
        }
    }
}

#[test]
fn test_copy_is_independent() {
    let original = create_test_network(3);
    let mut copy = original.copy();
    for inputs in sample_inputs() {
        assert_eq!(original.feed_forward(&inputs), copy.feed_forward(&inputs));
    }

    let before = original.clone();
    let mut rng = StdRng::seed_from_u64(9);
    copy.mutate(1.0, &mut rng);
    assert_eq!(original, before);
    assert_ne!(original, copy);
}

#[test]
fn test_crossover_with_fixed_decisions() {
    let n1 = create_test_network(10);
    let n2 = create_test_network(11);

    let all_first = NeuralNetwork::crossover_by(&n1, &n2, || true).unwrap();
    assert_eq!(all_first, n1);
    let all_second = NeuralNetwork::crossover_by(&n1, &n2, || false).unwrap();
    assert_eq!(all_second, n2);
}

#[test]
fn test_crossover_mixes_parents() {
    let n1 = create_test_network(10);
    let n2 = create_test_network(11);
    let mut toggle = false;
    let child = NeuralNetwork::crossover_by(&n1, &n2, || {
        toggle = !toggle;
        toggle
    })
    .unwrap();
    assert_ne!(child, n1);
    assert_ne!(child, n2);

    // every parameter comes from one of the parents
    for ((c, a), b) in child.levels().iter().zip(n1.levels()).zip(n2.levels()) {
        for ((x, y), z) in c.weights.iter().zip(a.weights.iter()).zip(b.weights.iter()) {
            assert!(x == y || x == z);
        }
        for ((x, y), z) in c.biases.iter().zip(a.biases.iter()).zip(b.biases.iter()) {
            assert!(x == y || x == z);
        }
    }
}

#[test]
fn test_crossover_rejects_mismatched_topology() {
    let mut rng = StdRng::seed_from_u64(0);
    let a = NeuralNetwork::random_using(&[5, 6, 4], &mut rng).unwrap();
    let b = NeuralNetwork::random_using(&[5, 7, 4], &mut rng).unwrap();
    let err = NeuralNetwork::crossover(&a, &b, &mut rng).unwrap_err();
    assert_eq!(
        err,
        TopologyError::Mismatch {
            left: vec![5, 6, 4],
            right: vec![5, 7, 4],
        }
    );
}

#[test]
fn test_mutate_zero_is_noop() {
    let original = create_test_network(4);
    let mut mutated = original.copy();
    let mut rng = StdRng::seed_from_u64(77);
    mutated.mutate(0.0, &mut rng);
    assert_eq!(mutated, original);
}

#[test]
fn test_mutate_one_ignores_prior_values() {
    let mut a = create_test_network(20);
    let mut b = create_test_network(21);
    assert_ne!(a, b);

    // same random draws, different starting parameters
    a.mutate(1.0, &mut StdRng::seed_from_u64(123));
    b.mutate(1.0, &mut StdRng::seed_from_u64(123));
    assert_eq!(a, b);
}

#[test]
fn test_activations_end_with_outputs() {
    let network = create_test_network(6);
    let inputs = array![0.5, 0.1, 0.0, 0.9, 0.3];
    let activations = network.activations(&inputs);
    assert_eq!(activations.len(), 2);
    assert_eq!(activations[0].len(), 6);
    assert_eq!(activations[1], network.feed_forward(&inputs));
}

#[test]
fn test_invalid_widths() {
    assert_eq!(
        NeuralNetwork::new(&[5]).unwrap_err(),
        TopologyError::TooFewLayers { count: 1 }
    );
    assert_eq!(
        NeuralNetwork::new(&[5, 0, 4]).unwrap_err(),
        TopologyError::ZeroWidth { index: 1 }
    );
}

#[test]
fn test_json_round_trip_keeps_topology() {
    let network = create_test_network(8);
    let json = serde_json::to_string(&network).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["widths"], serde_json::json!([5, 6, 4]));

    let restored: NeuralNetwork = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, network);
    assert!(restored.same_topology(&network));
}

#[test]
fn test_json_with_wrong_declared_widths_is_rejected() {
    let network = create_test_network(8);
    let mut value = serde_json::to_value(&network).unwrap();
    value["widths"] = serde_json::json!([5, 7, 4]);
    let result: Result<NeuralNetwork, _> = serde_json::from_value(value);
    assert!(result.is_err());
}
