//! Per-generation statistics.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::agent::Agent;

/// Outcome of one finished generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Generation number, starting at 0.
    pub generation: u32,
    /// Highest fitness reached.
    pub best_fitness: f32,
    /// Mean fitness over the population.
    pub average_fitness: f32,
    /// Agents damaged when the generation ended.
    pub damaged: usize,
    /// Population size.
    pub population: usize,
    /// Ticks the generation ran for.
    pub ticks: u64,
}

impl GenerationSummary {
    /// Summarises `agents` at the end of `generation`.
    pub fn from_agents(generation: u32, ticks: u64, agents: &[Agent]) -> Self {
        let best_fitness = agents.iter().map(Agent::fitness).fold(0.0, f32::max);
        let total: f32 = agents.iter().map(Agent::fitness).sum();
        let average_fitness = if agents.is_empty() {
            0.0
        } else {
            total / agents.len() as f32
        };
        Self {
            generation,
            best_fitness,
            average_fitness,
            damaged: agents.iter().filter(|a| a.is_damaged()).count(),
            population: agents.len(),
            ticks,
        }
    }
}

/// Most recent generation summaries, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationHistory {
    summaries: VecDeque<GenerationSummary>,
    capacity: usize,
}

impl Default for GenerationHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl GenerationHistory {
    /// Creates a history keeping at most `capacity` summaries.
    pub fn new(capacity: usize) -> Self {
        Self {
            summaries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a summary, dropping the oldest beyond capacity.
    pub fn record(&mut self, summary: GenerationSummary) {
        self.summaries.push_back(summary);
        while self.summaries.len() > self.capacity {
            self.summaries.pop_front();
        }
    }

    /// Kept summaries, oldest first.
    pub fn summaries(&self) -> &VecDeque<GenerationSummary> {
        &self.summaries
    }

    /// Most recent summary.
    pub fn latest(&self) -> Option<&GenerationSummary> {
        self.summaries.back()
    }

    /// Kept summary with the highest best fitness.
    pub fn best(&self) -> Option<&GenerationSummary> {
        self.summaries
            .iter()
            .max_by(|a, b| a.best_fitness.total_cmp(&b.best_fitness))
    }

    /// Number of kept summaries.
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}
