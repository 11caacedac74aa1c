//! Simulation Result
//!
//! The assembled, read-only output of a population run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::archetype::Archetype;
use crate::config::PopulationConfig;
use crate::event::{Event, EventType};
use crate::snapshot::{EpochSnapshot, PopulationMetrics};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Cancelled before this epoch settled; it is absent from the result
    Aborted { at_epoch: u64 },
}

/// Aggregates over the whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalMetrics {
    pub epochs_completed: u64,
    /// Metrics of the last settled epoch
    pub final_metrics: PopulationMetrics,
    /// Mean final balance per archetype; dead agents count as zero
    pub mean_final_balance: BTreeMap<Archetype, f64>,
    pub total_deaths: usize,
    pub total_rebirths: usize,
    pub coalitions_formed: usize,
    /// Agents that were ever isolated, sorted
    pub isolated_agents: Vec<String>,
    /// Value destroyed by transfer fees over the run
    pub total_burned: f64,
}

/// Complete output of a population run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub config: PopulationConfig,
    /// One snapshot per settled epoch, in order
    pub snapshots: Vec<EpochSnapshot>,
    /// Every event, in the order it was recorded
    pub events: Vec<Event>,
    pub final_metrics: FinalMetrics,
    pub status: RunStatus,
}

impl SimulationResult {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn events_of_type(&self, event_type: EventType) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }

    pub fn snapshot_at(&self, epoch: u64) -> Option<&EpochSnapshot> {
        self.snapshots.iter().find(|s| s.epoch == epoch)
    }

    pub fn last_snapshot(&self) -> Option<&EpochSnapshot> {
        self.snapshots.last()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The event log as JSON lines.
    pub fn events_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&event.to_jsonl()?);
            out.push('\n');
        }
        Ok(out)
    }
}
