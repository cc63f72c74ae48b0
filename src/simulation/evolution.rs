//! Generational evolution of learning agents.
//!
//! The engine owns the population under evaluation and the lane-following
//! traffic it drives among. Fitness accumulates while ticking; once every agent is
//! damaged (or the optional tick limit is hit) the population is replaced by
//! a bred successor of the same size.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use super::agent::{Agent, LaneRoute};
use super::brain::{NeuralNetwork, TopologyError};
use super::geometric_utils::Point;
use super::params::{ConfigError, Params};
use super::persistence::SavedBrain;
use super::road::Road;
use super::spatial::ObstacleIndex;
use super::stats::{GenerationHistory, GenerationSummary};

/// Failures while building or breeding a population.
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// The parameters are unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A network does not fit the agents or its breeding partner.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// Breeding needs every population member to carry a network.
    #[error("agent {id} has no network to breed from")]
    MissingBrain {
        /// Offending agent.
        id: usize,
    },
    /// There is nothing to evolve.
    #[error("population is empty")]
    EmptyPopulation,
}

/// Runs generations of agents and breeds each from the last.
#[derive(Debug)]
pub struct EvolutionEngine {
    params: Params,
    population: Vec<Agent>,
    traffic: Vec<Agent>,
    /// Start poses of the traffic, restored every generation.
    traffic_spawns: Vec<(Point, f32)>,
    generation: u32,
    ticks: u64,
    next_id: usize,
    history: GenerationHistory,
    best: Option<SavedBrain>,
    rng: StdRng,
}

impl EvolutionEngine {
    /// Creates generation 0: `population_size` learning agents with
    /// independently random networks, spawned on the road's lanes.
    ///
    /// # Errors
    ///
    /// Fails if `params` does not validate.
    pub fn new(params: Params, road: &Road) -> Result<Self, EvolutionError> {
        params.validate()?;
        let mut engine = Self::empty(params);
        let widths = engine.params.layer_widths();
        let mut population = Vec::with_capacity(engine.params.population_size);
        for _ in 0..engine.params.population_size {
            let brain = NeuralNetwork::random_using(&widths, &mut engine.rng)?;
            population.push(engine.spawn_learning(road, brain)?);
        }
        engine.population = population;
        info!(
            generation = 0,
            population = engine.population.len(),
            "generation started"
        );
        Ok(engine)
    }

    /// Creates an engine around an existing population, for example scripted
    /// agents placed by hand.
    ///
    /// Agent ids must be unique. Bred generations use `params.population_size`.
    ///
    /// # Errors
    ///
    /// Fails if `params` does not validate or `population` is empty.
    pub fn with_population(params: Params, population: Vec<Agent>) -> Result<Self, EvolutionError> {
        params.validate()?;
        if population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }
        let mut engine = Self::empty(params);
        engine.next_id = population.iter().map(Agent::id).max().map_or(0, |id| id + 1);
        engine.population = population;
        Ok(engine)
    }

    fn empty(params: Params) -> Self {
        let rng = match params.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            history: GenerationHistory::new(params.history_capacity),
            params,
            population: Vec::new(),
            traffic: Vec::new(),
            traffic_spawns: Vec::new(),
            generation: 0,
            ticks: 0,
            next_id: 0,
            best: None,
            rng,
        }
    }

    fn allocate_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn spawn_learning(&mut self, road: &Road, brain: NeuralNetwork) -> Result<Agent, TopologyError> {
        let (position, heading) = road.spawn_pose(&mut self.rng);
        let id = self.allocate_id();
        Agent::learning(id, position, heading, &self.params, brain)
    }

    /// Adds a lane-following traffic agent capped at `traffic_max_speed`,
    /// heading for the end of the lane nearest to `position`. It is put back
    /// at this pose at the start of every generation.
    pub fn spawn_traffic(&mut self, road: &Road, position: Point, heading: f32) -> usize {
        let id = self.allocate_id();
        let route = LaneRoute::starting_at(road, position, heading, self.rng.random());
        self.traffic_spawns.push((position, heading));
        self.traffic.push(Agent::traffic(id, position, heading, &self.params, route));
        id
    }

    /// Adds `count` traffic agents at random lane positions.
    pub fn spawn_traffic_on_lanes(&mut self, road: &Road, count: usize) {
        for _ in 0..count {
            let (position, heading) = road.spawn_pose(&mut self.rng);
            self.spawn_traffic(road, position, heading);
        }
    }

    fn respawn_traffic(&mut self, road: &Road) {
        let spawns = std::mem::take(&mut self.traffic_spawns);
        self.traffic.clear();
        for (position, heading) in spawns {
            self.spawn_traffic(road, position, heading);
        }
    }

    /// Replaces the population with copies of `brain`, mutating every copy
    /// past the first `elitism_count`.
    ///
    /// # Errors
    ///
    /// Fails if `brain` does not fit the configured sensor and controls.
    pub fn seed_population(&mut self, brain: &NeuralNetwork, road: &Road) -> Result<(), EvolutionError> {
        let mut population = Vec::with_capacity(self.params.population_size);
        for i in 0..self.params.population_size {
            let mut copy = brain.copy();
            if i >= self.params.elitism_count {
                copy.mutate(self.params.mutation_rate, &mut self.rng);
            }
            population.push(self.spawn_learning(road, copy)?);
        }
        self.population = population;
        self.ticks = 0;
        self.respawn_traffic(road);
        info!(generation = self.generation, "population seeded from saved brain");
        Ok(())
    }

    /// Parameters in use.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Agents under evaluation.
    pub fn population(&self) -> &[Agent] {
        &self.population
    }

    /// Mutable access to the population, for player input.
    pub fn population_mut(&mut self) -> &mut [Agent] {
        &mut self.population
    }

    /// Traffic agents.
    pub fn traffic(&self) -> &[Agent] {
        &self.traffic
    }

    /// Current generation number, starting at 0.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Ticks run in the current generation.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Summaries of finished generations.
    pub fn history(&self) -> &GenerationHistory {
        &self.history
    }

    /// Fittest agent of the current population.
    pub fn best_agent(&self) -> Option<&Agent> {
        self.population
            .iter()
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
    }

    /// Best network of any finished generation.
    pub fn best_brain(&self) -> Option<&SavedBrain> {
        self.best.as_ref()
    }

    /// Best network of any finished generation, if it reached `min_fitness_for_save`.
    pub fn saveable_brain(&self) -> Option<&SavedBrain> {
        self.best
            .as_ref()
            .filter(|saved| saved.fitness >= self.params.min_fitness_for_save)
    }

    /// Advances traffic and population by one tick.
    ///
    /// Traffic moves first against a snapshot of the traffic bodies, then the
    /// population moves against a fresh snapshot. Population members do not
    /// see or hit each other.
    pub fn tick(&mut self, road: &Road) {
        let snapshot = self.traffic_snapshot();
        for agent in &mut self.traffic {
            agent.update(road, &snapshot, &self.params);
        }
        let snapshot = self.traffic_snapshot();
        for agent in &mut self.population {
            agent.update(road, &snapshot, &self.params);
        }
        self.ticks += 1;
    }

    fn traffic_snapshot(&self) -> ObstacleIndex {
        ObstacleIndex::build(
            self.traffic
                .iter()
                .map(|agent| (agent.id(), agent.polygon().clone()))
                .collect(),
        )
    }

    /// Whether every agent is damaged or the tick limit has been reached.
    pub fn is_generation_over(&self) -> bool {
        let all_damaged = !self.population.is_empty() && self.population.iter().all(Agent::is_damaged);
        let out_of_time = self
            .params
            .generation_tick_limit
            .is_some_and(|limit| self.ticks >= limit);
        all_damaged || out_of_time
    }

    /// Runs `updates` ticks, then breeds the next generation if this one is over.
    ///
    /// # Returns
    ///
    /// The summary of the finished generation, if one finished.
    pub fn advance(&mut self, road: &Road, updates: u32) -> Result<Option<GenerationSummary>, EvolutionError> {
        for _ in 0..updates {
            self.tick(road);
        }
        if self.is_generation_over() {
            self.evolve(road).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Ends the current generation and replaces the population with a bred one.
    ///
    /// The top `elitism_count` networks are copied unchanged into the first
    /// slots. Every other slot gets the crossover of two parents drawn from a
    /// tournament-selected pool, mutated by `mutation_rate`.
    ///
    /// # Errors
    ///
    /// Fails if a population member has no network or networks disagree in shape.
    pub fn evolve(&mut self, road: &Road) -> Result<GenerationSummary, EvolutionError> {
        let summary = GenerationSummary::from_agents(self.generation, self.ticks, &self.population);
        info!(
            generation = summary.generation,
            best = summary.best_fitness,
            average = summary.average_fitness,
            damaged = summary.damaged,
            ticks = summary.ticks,
            "generation finished"
        );

        let ranked = self.ranked_brains()?;
        self.record_best(&ranked);
        self.population = self.breed(road, &ranked)?;
        self.history.record(summary.clone());
        self.generation += 1;
        self.ticks = 0;
        self.respawn_traffic(road);
        info!(
            generation = self.generation,
            population = self.population.len(),
            "generation started"
        );
        Ok(summary)
    }

    /// `(fitness, network)` of every agent, fittest first. Ties keep population order.
    fn ranked_brains(&self) -> Result<Vec<(f32, NeuralNetwork)>, EvolutionError> {
        if self.population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }
        let mut ranked = self
            .population
            .iter()
            .map(|agent| {
                agent
                    .brain()
                    .map(|brain| (agent.fitness(), brain.copy()))
                    .ok_or(EvolutionError::MissingBrain { id: agent.id() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(ranked)
    }

    fn record_best(&mut self, ranked: &[(f32, NeuralNetwork)]) {
        let Some((fitness, brain)) = ranked.first() else {
            return;
        };
        if self.best.as_ref().is_some_and(|best| best.fitness >= *fitness) {
            return;
        }
        info!(generation = self.generation, fitness, "new best network");
        self.best = Some(SavedBrain::new(self.generation, *fitness, brain.copy()));
    }

    fn breed(&mut self, road: &Road, ranked: &[(f32, NeuralNetwork)]) -> Result<Vec<Agent>, EvolutionError> {
        let size = self.params.population_size;
        let fitness: Vec<f32> = ranked.iter().map(|(f, _)| *f).collect();
        let pool = selection_pool(&fitness, size, self.params.tournament_size, &mut self.rng);

        let mut next = Vec::with_capacity(size);
        for (_, elite) in ranked.iter().take(self.params.elitism_count.min(size)) {
            next.push(self.spawn_learning(road, elite.copy())?);
        }
        let elites = next.len();
        while next.len() < size {
            let p1 = &ranked[pool[self.rng.random_range(0..pool.len())]].1;
            let p2 = &ranked[pool[self.rng.random_range(0..pool.len())]].1;
            let mut child = NeuralNetwork::crossover(p1, p2, &mut self.rng)?;
            child.mutate(self.params.mutation_rate, &mut self.rng);
            next.push(self.spawn_learning(road, child)?);
        }
        debug!(elites, bred = next.len() - elites, "population bred");
        Ok(next)
    }
}

/// Index of the fittest of `tournament_size` entries of `fitness` drawn
/// uniformly with replacement. `None` if there is nothing to draw.
pub fn tournament_select<R: Rng + ?Sized>(fitness: &[f32], tournament_size: usize, rng: &mut R) -> Option<usize> {
    if fitness.is_empty() {
        return None;
    }
    (0..tournament_size)
        .map(|_| rng.random_range(0..fitness.len()))
        .reduce(|best, i| if fitness[i] > fitness[best] { i } else { best })
}

/// Runs `count` tournaments and returns the winners' indices.
pub fn selection_pool<R: Rng + ?Sized>(
    fitness: &[f32],
    count: usize,
    tournament_size: usize,
    rng: &mut R,
) -> Vec<usize> {
    (0..count)
        .filter_map(|_| tournament_select(fitness, tournament_size, rng))
        .collect()
}
