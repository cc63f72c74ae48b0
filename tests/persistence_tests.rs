#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use road_evo::simulation::brain::NeuralNetwork;
use road_evo::simulation::params::{ConfigError, Params, ParamsError};
use road_evo::simulation::persistence::{PersistenceError, SavedBrain};
use std::fs;

fn create_test_params() -> Params {
    Params {
        population_size: 12,
        mutation_rate: 0.2,
        rng_seed: Some(5),
        ..Params::default()
    }
}

fn create_saved_brain(params: &Params) -> SavedBrain {
    let mut rng = StdRng::seed_from_u64(31);
    let network = NeuralNetwork::random_using(&params.layer_widths(), &mut rng).unwrap();
    SavedBrain::new(7, 1234.5, network)
}

#[test]
fn test_save_and_load_brain() {
    let params = create_test_params();
    let saved = create_saved_brain(&params);
    let path = "test_saved_brain.json";

    saved.save_to_file(path).expect("Failed to save brain");
    let loaded = SavedBrain::load_from_file(path).expect("Failed to load brain");
    fs::remove_file(path).ok();

    assert_eq!(loaded.generation, 7);
    assert_eq!(loaded.fitness, 1234.5);
    assert_eq!(loaded.timestamp, saved.timestamp);
    // full precision survives
    assert_eq!(loaded.network, saved.network);
}

#[test]
fn test_load_for_checks_topology() {
    let params = create_test_params();
    let saved = create_saved_brain(&params);
    let path = "test_saved_brain_topology.json";
    saved.save_to_file(path).expect("Failed to save brain");

    let wider = Params {
        ray_count: 7,
        ..params.clone()
    };
    let fits = SavedBrain::load_for(path, &params);
    let misfit = SavedBrain::load_for(path, &wider);
    fs::remove_file(path).ok();

    assert!(fits.is_ok());
    assert!(matches!(misfit, Err(PersistenceError::Topology(_))));
}

#[test]
fn test_load_nonexistent_file() {
    let result = SavedBrain::load_from_file("nonexistent_brain_file.json");
    assert!(matches!(result, Err(PersistenceError::Io(_))));
}

#[test]
fn test_load_invalid_json() {
    let path = "test_invalid_brain.json";
    fs::write(path, "{ not json").unwrap();
    let result = SavedBrain::load_from_file(path);
    fs::remove_file(path).ok();
    assert!(matches!(result, Err(PersistenceError::Json(_))));
}

#[test]
fn test_save_and_load_params() {
    let params = create_test_params();
    let path = "test_params.json";
    params.save_to_file(path).expect("Failed to save params");
    let loaded = Params::load_from_file(path).expect("Failed to load params");
    fs::remove_file(path).ok();
    assert_eq!(loaded, params);
}

#[test]
fn test_load_invalid_params() {
    let path = "test_invalid_params.json";
    fs::write(path, r#"{ "population_size": 4, "elitism_count": 9 }"#).unwrap();
    let result = Params::load_from_file(path);
    fs::remove_file(path).ok();
    assert!(matches!(
        result,
        Err(ParamsError::Invalid(ConfigError::Elitism {
            elitism: 9,
            population: 4
        }))
    ));
}

#[test]
fn test_params_errors_keep_their_kind() {
    let missing = Params::load_from_file("nonexistent_params_file.json");
    assert!(matches!(missing, Err(ParamsError::Io(_))));

    let path = "test_malformed_params.json";
    fs::write(path, "{ \"population_size\": \"many\" }").unwrap();
    let malformed = Params::load_from_file(path);
    fs::remove_file(path).ok();
    assert!(matches!(malformed, Err(ParamsError::Json(_))));

    // usable as a boxed error in binaries
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(missing.unwrap_err());
    assert!(boxed.to_string().starts_with("parameter file i/o failed"));
}
