//! Snapshot Generation
//!
//! Captures an immutable copy of every agent's public state at the close of
//! each settled epoch.

use bevy_ecs::prelude::*;
use trust_events::{generate_snapshot_id, AgentSnapshot, EpochSnapshot};

use crate::components::agent::{AgentId, Behavior, LifeState, Membership, OfferHistory, Wallet};
use crate::systems::interaction::EpochClock;
use crate::systems::metrics::CurrentMetrics;
use crate::systems::structure::CoalitionRegistry;
use crate::trust::TrustProfile;

/// Resource holding the snapshots taken so far
#[derive(Resource, Debug)]
pub struct SnapshotRecorder {
    next_snapshot_id: u64,
    snapshots: Vec<EpochSnapshot>,
}

impl Default for SnapshotRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        Self {
            next_snapshot_id: 1,
            snapshots: Vec::new(),
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = generate_snapshot_id(self.next_snapshot_id);
        self.next_snapshot_id += 1;
        id
    }

    pub fn push(&mut self, snapshot: EpochSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn snapshots(&self) -> &[EpochSnapshot] {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<&EpochSnapshot> {
        self.snapshots.last()
    }

    pub fn take(&mut self) -> Vec<EpochSnapshot> {
        std::mem::take(&mut self.snapshots)
    }
}

/// System: snapshot the population at the end of the epoch
pub fn capture_snapshot(
    clock: Res<EpochClock>,
    metrics: Res<CurrentMetrics>,
    registry: Res<CoalitionRegistry>,
    mut recorder: ResMut<SnapshotRecorder>,
    query: Query<(&AgentId, &Behavior, &TrustProfile, &Wallet, &LifeState, &Membership, &OfferHistory)>,
) {
    let mut agents: Vec<AgentSnapshot> = query
        .iter()
        .map(|(id, behavior, profile, wallet, life, membership, offers)| AgentSnapshot {
            agent_id: id.0.clone(),
            archetype: behavior.archetype,
            generation: life.generation,
            alive: life.alive,
            talent: profile.talent,
            training: profile.training,
            temperament: profile.temperament,
            consistency: profile.consistency,
            composite_trust: profile.composite(),
            effective_trust: profile.effective(),
            balance: wallet.balance,
            coalition: membership.coalition.clone(),
            isolated: offers.isolated,
        })
        .collect();
    agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));

    let mut snapshot = EpochSnapshot::new(recorder.next_id(), clock.epoch);
    snapshot.agents = agents;
    snapshot.coalitions = registry.snapshots();
    snapshot.metrics = metrics.0.clone();
    recorder.push(snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_events::{Archetype, PopulationConfig};

    use crate::components::agent::AgentBundle;

    #[test]
    fn test_snapshot_ids_sequential() {
        let mut recorder = SnapshotRecorder::new();
        assert_eq!(recorder.next_id(), "snap_000001");
        assert_eq!(recorder.next_id(), "snap_000002");
    }

    #[test]
    fn test_capture_sorted_by_id() {
        let config = PopulationConfig::default();
        let mut world = World::new();
        for i in [2, 0, 1] {
            world.spawn(AgentBundle::new(i, Archetype::Adaptive, &config));
        }
        world.insert_resource(EpochClock { epoch: 4 });
        world.insert_resource(CurrentMetrics::default());
        world.insert_resource(CoalitionRegistry::new());
        world.insert_resource(SnapshotRecorder::new());

        let mut schedule = Schedule::default();
        schedule.add_systems(capture_snapshot);
        schedule.run(&mut world);

        let recorder = world.resource::<SnapshotRecorder>();
        let snapshot = recorder.latest().unwrap();
        assert_eq!(snapshot.snapshot_id, "snap_000001");
        assert_eq!(snapshot.epoch, 4);
        let ids: Vec<&str> = snapshot.agents.iter().map(|a| a.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["agent_000", "agent_001", "agent_002"]);
        assert!(snapshot.agents.iter().all(|a| a.effective_trust <= a.composite_trust));
    }
}
