//! Social Components
//!
//! Directed pairwise trust between agents.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;

use crate::strategy::Decision;
use crate::trust::clamp_unit;

/// Trust an agent places in someone it has never met
pub const NEUTRAL_TRUST: f64 = 0.5;

/// One agent's view of another
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Smoothed trust in [0, 1]
    pub trust: f64,
    /// Epoch of the most recent interaction
    pub last_interaction: Option<u64>,
    /// The other agent's most recent move toward this one
    pub last_move: Option<Decision>,
    pub interactions: u32,
}

impl Default for Relationship {
    fn default() -> Self {
        Self {
            trust: NEUTRAL_TRUST,
            last_interaction: None,
            last_move: None,
            interactions: 0,
        }
    }
}

impl Relationship {
    /// Moves trust toward 1 for cooperation or 0 for defection.
    pub fn observe(&mut self, partner_move: Decision, epoch: u64, smoothing: f64) {
        let target = if partner_move.is_cooperate() { 1.0 } else { 0.0 };
        let alpha = clamp_unit(smoothing);
        self.trust = clamp_unit(self.trust + alpha * (target - self.trust));
        self.last_interaction = Some(epoch);
        self.last_move = Some(partner_move);
        self.interactions += 1;
    }
}

/// Resource: directed relationships between agents
#[derive(Resource, Debug, Default)]
pub struct RelationshipGraph {
    /// Maps (from_agent_id, to_agent_id) -> Relationship
    relationships: BTreeMap<(String, String), Relationship>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get relationship from one agent to another
    pub fn get(&self, from: &str, to: &str) -> Option<&Relationship> {
        self.relationships.get(&(from.to_string(), to.to_string()))
    }

    /// Create or get relationship (ensures it exists)
    pub fn ensure_relationship(&mut self, from: &str, to: &str) -> &mut Relationship {
        self.relationships
            .entry((from.to_string(), to.to_string()))
            .or_default()
    }

    /// How much `from` trusts `to`; neutral when they have never met.
    pub fn trust(&self, from: &str, to: &str) -> f64 {
        self.get(from, to).map(|r| r.trust).unwrap_or(NEUTRAL_TRUST)
    }

    /// The weaker of the two directions.
    pub fn mutual_trust(&self, a: &str, b: &str) -> f64 {
        self.trust(a, b).min(self.trust(b, a))
    }

    /// Whether the pair interacted within the last `window` epochs, counting `epoch`.
    pub fn interacted_recently(&self, a: &str, b: &str, epoch: u64, window: u64) -> bool {
        [self.get(a, b), self.get(b, a)]
            .into_iter()
            .flatten()
            .filter_map(|r| r.last_interaction)
            .any(|last| epoch.saturating_sub(last) < window)
    }

    /// The last move `partner` made toward `observer`.
    pub fn last_move_toward(&self, observer: &str, partner: &str) -> Option<Decision> {
        self.get(observer, partner).and_then(|r| r.last_move)
    }

    /// Records that `partner` played `partner_move` against `observer`.
    pub fn observe(
        &mut self,
        observer: &str,
        partner: &str,
        partner_move: Decision,
        epoch: u64,
        smoothing: f64,
    ) {
        self.ensure_relationship(observer, partner)
            .observe(partner_move, epoch, smoothing);
    }

    /// Clamps any trust value that left [0, 1]; returns the pairs corrected.
    pub fn sanitize(&mut self) -> Vec<(String, String, f64)> {
        let mut corrected = Vec::new();
        for ((from, to), rel) in self.relationships.iter_mut() {
            if !rel.trust.is_finite() || !(0.0..=1.0).contains(&rel.trust) {
                corrected.push((from.clone(), to.clone(), rel.trust));
                rel.trust = clamp_unit(rel.trust);
            }
        }
        corrected
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}
