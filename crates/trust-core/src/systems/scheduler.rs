//! Interaction Scheduler
//!
//! Chooses who interacts with whom this epoch. Alive agents propose in id
//! order to partners sampled by trust; shunned partners are never proposed
//! to and a proposal is refused when the target shuns the proposer.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

use crate::components::agent::{AgentId, LifeState};
use crate::components::social::RelationshipGraph;
use crate::SimRng;

use super::interaction::RunConfig;

/// Resource: this epoch's accepted pairs and the offers each agent received
#[derive(Resource, Debug, Default)]
pub struct Pairings {
    /// (proposer, target), in proposal order
    pub pairs: Vec<(String, String)>,
    /// Proposals received per agent, refused ones included
    pub offers: BTreeMap<String, usize>,
    pub refused: usize,
}

impl Pairings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offers_to(&self, agent_id: &str) -> usize {
        self.offers.get(agent_id).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.offers.clear();
        self.refused = 0;
    }
}

/// Picks an index with probability proportional to its weight.
fn weighted_pick<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    let roll = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if roll < cumulative {
            return i;
        }
    }
    weights.len() - 1
}

/// Draws up to `count` distinct candidates, weighted, without replacement.
pub fn sample_partners<R: Rng>(rng: &mut R, mut candidates: Vec<(String, f64)>, count: usize) -> Vec<String> {
    let mut chosen = Vec::with_capacity(count.min(candidates.len()));
    while chosen.len() < count && !candidates.is_empty() {
        let weights: Vec<f64> = candidates.iter().map(|(_, w)| *w).collect();
        let index = weighted_pick(rng, &weights);
        chosen.push(candidates.remove(index).0);
    }
    chosen
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// System: build this epoch's pairings
pub fn schedule_pairings(
    config: Res<RunConfig>,
    graph: Res<RelationshipGraph>,
    mut rng: ResMut<SimRng>,
    mut pairings: ResMut<Pairings>,
    query: Query<(&AgentId, &LifeState)>,
) {
    pairings.clear();

    let mut alive: Vec<&str> = query
        .iter()
        .filter(|(_, life)| life.alive)
        .map(|(id, _)| id.0.as_str())
        .collect();
    alive.sort_unstable();

    let shun = config.0.thresholds.shun_threshold;
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

    for &proposer in &alive {
        let candidates: Vec<(String, f64)> = alive
            .iter()
            .filter(|&&other| other != proposer)
            .map(|&other| (other.to_string(), graph.trust(proposer, other)))
            .filter(|(_, trust)| *trust >= shun)
            .collect();

        for target in sample_partners(&mut rng.0, candidates, config.0.interactions_per_agent) {
            *pairings.offers.entry(target.clone()).or_insert(0) += 1;
            if graph.trust(&target, proposer) < shun {
                pairings.refused += 1;
                continue;
            }
            if seen.insert(pair_key(proposer, &target)) {
                pairings.pairs.push((proposer.to_string(), target));
            }
        }
    }
}
