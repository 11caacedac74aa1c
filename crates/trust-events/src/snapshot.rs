//! Snapshot Types
//!
//! Serialization structs for per-epoch population snapshots.
//!
//! A snapshot is an immutable copy of every agent's public state plus the
//! population metrics at the close of a fully settled epoch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::archetype::Archetype;
use crate::SimTimestamp;

/// Generates a snapshot ID with the given sequence number.
pub fn generate_snapshot_id(sequence: u64) -> String {
    format!("snap_{:06}", sequence)
}

/// Public state of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub archetype: Archetype,
    pub generation: u32,
    pub alive: bool,
    pub talent: f64,
    pub training: f64,
    pub temperament: f64,
    pub consistency: f64,
    pub composite_trust: f64,
    pub effective_trust: f64,
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coalition: Option<String>,
    #[serde(default)]
    pub isolated: bool,
}

/// A coalition as it stood at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalitionSnapshot {
    pub coalition_id: String,
    /// Member agent ids, sorted
    pub members: Vec<String>,
    /// Epoch the coalition formed in
    pub formed_at: u64,
    /// Average mutual trust over internal edges
    pub mean_trust: f64,
}

impl CoalitionSnapshot {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Population statistics for one epoch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationMetrics {
    pub epoch: u64,
    pub alive_count: usize,
    /// Mean effective trust of living agents
    pub mean_trust: f64,
    /// Fraction of this epoch's interactions that were mutual cooperation
    pub cooperation_rate: f64,
    /// Gini coefficient of living agents' balances
    pub gini: f64,
    pub coalition_count: usize,
    pub largest_coalition: usize,
    /// Living agents per archetype
    #[serde(default)]
    pub archetype_counts: BTreeMap<Archetype, usize>,
    pub total_balance: f64,
    pub interactions: usize,
    /// Value destroyed by transfer fees this epoch
    pub fees_burned: f64,
}

/// Complete population snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    pub snapshot_id: String,
    pub timestamp: SimTimestamp,
    pub epoch: u64,
    /// Agents sorted by id
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub coalitions: Vec<CoalitionSnapshot>,
    pub metrics: PopulationMetrics,
}

impl EpochSnapshot {
    pub fn new(snapshot_id: impl Into<String>, epoch: u64) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            timestamp: SimTimestamp::epoch(epoch),
            epoch,
            agents: Vec::new(),
            coalitions: Vec::new(),
            metrics: PopulationMetrics {
                epoch,
                ..PopulationMetrics::default()
            },
        }
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    pub fn alive_agents(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.agents.iter().filter(|a| a.alive)
    }

    /// Coalition the agent belongs to, if any.
    pub fn coalition_of(&self, agent_id: &str) -> Option<&CoalitionSnapshot> {
        self.coalitions
            .iter()
            .find(|c| c.members.iter().any(|m| m == agent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, alive: bool, coalition: Option<&str>) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: id.to_string(),
            archetype: Archetype::Cooperative,
            generation: 1,
            alive,
            talent: 0.5,
            training: 0.5,
            temperament: 0.5,
            consistency: 0.8,
            composite_trust: 0.5,
            effective_trust: 0.32,
            balance: 100.0,
            coalition: coalition.map(str::to_string),
            isolated: false,
        }
    }

    #[test]
    fn test_generate_snapshot_id() {
        assert_eq!(generate_snapshot_id(1), "snap_000001");
        assert_eq!(generate_snapshot_id(42371), "snap_042371");
    }

    #[test]
    fn test_epoch_snapshot_new() {
        let snapshot = EpochSnapshot::new("snap_000003", 3);
        assert_eq!(snapshot.timestamp, SimTimestamp::epoch(3));
        assert_eq!(snapshot.metrics.epoch, 3);
        assert!(snapshot.agents.is_empty());
    }

    #[test]
    fn test_snapshot_lookups() {
        let mut snapshot = EpochSnapshot::new(generate_snapshot_id(1), 1);
        snapshot.agents = vec![
            agent("agent_000", true, Some("coalition_0001")),
            agent("agent_001", false, None),
        ];
        snapshot.coalitions = vec![CoalitionSnapshot {
            coalition_id: "coalition_0001".to_string(),
            members: vec!["agent_000".to_string()],
            formed_at: 1,
            mean_trust: 0.8,
        }];

        assert_eq!(snapshot.alive_agents().count(), 1);
        assert!(snapshot.agent("agent_001").is_some());
        assert_eq!(
            snapshot.coalition_of("agent_000").map(|c| c.coalition_id.as_str()),
            Some("coalition_0001")
        );
        assert!(snapshot.coalition_of("agent_001").is_none());
    }

    #[test]
    fn test_archetype_counts_serialize_by_name() {
        let mut metrics = PopulationMetrics::default();
        metrics.archetype_counts.insert(Archetype::Defecting, 4);
        metrics.archetype_counts.insert(Archetype::Cooperative, 6);
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["archetype_counts"]["cooperative"], 6);
        assert_eq!(json["archetype_counts"]["defecting"], 4);
    }
}
