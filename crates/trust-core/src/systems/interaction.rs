//! Interaction Phase
//!
//! Each scheduled pair decides its moves from pre-epoch state. Nothing here
//! touches agent components: moves land in the pending `EpochLedger` and are
//! only applied when the epoch settles.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use trust_events::{PopulationConfig, SimTimestamp};

use crate::components::agent::{AgentId, Behavior};
use crate::components::social::RelationshipGraph;
use crate::strategy::{Decision, DecisionContext, Strategy};
use crate::trust::TrustProfile;

use super::scheduler::Pairings;

/// Resource: configuration of the running simulation
#[derive(Resource, Debug, Clone)]
pub struct RunConfig(pub PopulationConfig);

/// Resource: the epoch currently being simulated
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct EpochClock {
    pub epoch: u64,
}

impl EpochClock {
    pub fn timestamp(&self) -> SimTimestamp {
        SimTimestamp::epoch(self.epoch)
    }
}

/// Both moves of one pairwise interaction
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    /// The proposer
    pub initiator: String,
    pub responder: String,
    pub initiator_move: Decision,
    pub responder_move: Decision,
}

impl InteractionRecord {
    pub fn is_mutual(&self) -> bool {
        self.initiator_move.is_cooperate() && self.responder_move.is_cooperate()
    }
}

/// Resource: interactions decided this epoch but not yet settled
#[derive(Resource, Debug, Default)]
pub struct EpochLedger {
    pub records: Vec<InteractionRecord>,
}

impl EpochLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: InteractionRecord) {
        self.records.push(record);
    }

    pub fn drain(&mut self) -> Vec<InteractionRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// System: decide both moves for every scheduled pair
pub fn resolve_interactions(
    config: Res<RunConfig>,
    graph: Res<RelationshipGraph>,
    pairings: Res<Pairings>,
    mut ledger: ResMut<EpochLedger>,
    query: Query<(&AgentId, &Behavior, &TrustProfile)>,
) {
    let agents: BTreeMap<&str, (&Behavior, &TrustProfile)> = query
        .iter()
        .map(|(id, behavior, profile)| (id.0.as_str(), (behavior, profile)))
        .collect();
    let cautious_threshold = config.0.thresholds.cautious_reputation;

    let decide = |me: &str, opponent: &str| -> Option<Decision> {
        let (behavior, _) = agents.get(me)?;
        let (_, opponent_profile) = agents.get(opponent)?;
        let context = DecisionContext {
            history: &behavior.history,
            opponent,
            opponent_last_move: graph.last_move_toward(me, opponent),
            opponent_reputation: opponent_profile.effective(),
            cautious_threshold,
        };
        Some(behavior.archetype.decide(&context))
    };

    for (initiator, responder) in &pairings.pairs {
        let (Some(initiator_move), Some(responder_move)) =
            (decide(initiator, responder), decide(responder, initiator))
        else {
            continue;
        };
        ledger.push(InteractionRecord {
            initiator: initiator.clone(),
            responder: responder.clone(),
            initiator_move,
            responder_move,
        });
    }
}
