use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use road_evo::simulation::evolution::EvolutionEngine;
use road_evo::simulation::geometric_utils::{Point, Segment};
use road_evo::simulation::params::Params;
use road_evo::simulation::persistence::SavedBrain;
use road_evo::simulation::road::Road;

const BRAIN_FILE: &str = "best_brain.json";
const GENERATIONS: u32 = 5;
const UPDATES_PER_FRAME: u32 = 10;
const TRAFFIC_COUNT: usize = 4;

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut params = match std::env::args().nth(1) {
        Some(path) => {
            Params::load_from_file(&path).with_context(|| format!("loading parameters from {path}"))?
        }
        None => Params::default(),
    };
    if params.generation_tick_limit.is_none() {
        params.generation_tick_limit = Some(1500);
    }

    let road = demo_road();
    let mut engine = EvolutionEngine::new(params, &road)?;
    engine.spawn_traffic_on_lanes(&road, TRAFFIC_COUNT);

    if Path::new(BRAIN_FILE).exists() {
        match SavedBrain::load_for(BRAIN_FILE, engine.params()) {
            Ok(saved) => {
                info!(generation = saved.generation, fitness = saved.fitness, "seeding from saved brain");
                engine.seed_population(&saved.network, &road)?;
            }
            Err(e) => warn!(error = %e, "ignoring saved brain"),
        }
    }

    while engine.generation() < GENERATIONS {
        engine.advance(&road, UPDATES_PER_FRAME)?;
    }

    if let Some(best) = engine.saveable_brain() {
        best.save_to_file(BRAIN_FILE)
            .with_context(|| format!("writing {BRAIN_FILE}"))?;
        info!(fitness = best.fitness, path = BRAIN_FILE, "saved best brain");
    }
    for summary in engine.history().summaries() {
        info!(
            generation = summary.generation,
            best = summary.best_fitness,
            average = summary.average_fitness,
            "summary"
        );
    }
    Ok(())
}

/// A long corridor closed at both ends.
fn demo_road() -> Road {
    let (left, right, top, bottom) = (0.0, 240.0, -6000.0, 0.0);
    let mut road = Road::straight_corridor(left, right, top, bottom);
    road.borders.push(Segment::new(Point { x: left, y: top }, Point { x: right, y: top }));
    road.borders
        .push(Segment::new(Point { x: left, y: bottom }, Point { x: right, y: bottom }));
    road
}
