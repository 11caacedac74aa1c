//! Event Types
//!
//! Typed records of significant transitions in a run. Every event carries the
//! agents it implicates, a significance tag, and a payload specific to its
//! type. Events serialize to one JSON object per line.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::archetype::Archetype;
use crate::karma::{DeathCause, KarmaTier, StartingConditions};
use crate::timestamp::SimTimestamp;

/// Event type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CoalitionFormed,
    CoalitionDissolved,
    DefectorIsolated,
    TrustCollapse,
    Death,
    Rebirth,
    CooperationSurge,
    SocietyStable,
    Anomaly,
}

impl EventType {
    /// Returns all event type variants.
    pub fn all() -> &'static [EventType] {
        &[
            EventType::CoalitionFormed,
            EventType::CoalitionDissolved,
            EventType::DefectorIsolated,
            EventType::TrustCollapse,
            EventType::Death,
            EventType::Rebirth,
            EventType::CooperationSurge,
            EventType::SocietyStable,
            EventType::Anomaly,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CoalitionFormed => "coalition_formed",
            EventType::CoalitionDissolved => "coalition_dissolved",
            EventType::DefectorIsolated => "defector_isolated",
            EventType::TrustCollapse => "trust_collapse",
            EventType::Death => "death",
            EventType::Rebirth => "rebirth",
            EventType::CooperationSurge => "cooperation_surge",
            EventType::SocietyStable => "society_stable",
            EventType::Anomaly => "anomaly",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much an event matters to a reader of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Routine,
    Notable,
    Major,
    Critical,
}

/// Type-specific payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetails {
    CoalitionFormed {
        coalition_id: String,
        members: Vec<String>,
        /// Average mutual trust over internal edges
        mean_trust: f64,
    },
    CoalitionDissolved {
        coalition_id: String,
        members: Vec<String>,
        /// Epochs the coalition existed for
        lifetime_epochs: u64,
    },
    DefectorIsolated {
        archetype: Archetype,
        /// Offers received per available slot over the isolation window
        incoming_rate: f64,
        /// Share of defections in the agent's recent moves
        defection_rate: f64,
    },
    TrustCollapse {
        effective_score: f64,
        consistency: f64,
    },
    Death {
        cause: DeathCause,
        karma: KarmaTier,
        effective_score: f64,
        generation: u32,
        final_balance: f64,
    },
    Rebirth {
        generation: u32,
        karma: KarmaTier,
        conditions: StartingConditions,
        /// Explicit restart of a lineage that was not offered rebirth
        #[serde(default)]
        restarted: bool,
    },
    CooperationSurge {
        previous_rate: f64,
        current_rate: f64,
    },
    SocietyStable {
        mean_trust: f64,
        cooperation_rate: f64,
        epochs_in_band: usize,
    },
    Anomaly {
        /// Which value or step misbehaved
        subject: String,
        message: String,
        /// Value the offending quantity was clamped to, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clamped_to: Option<f64>,
    },
}

impl EventDetails {
    pub fn event_type(&self) -> EventType {
        match self {
            EventDetails::CoalitionFormed { .. } => EventType::CoalitionFormed,
            EventDetails::CoalitionDissolved { .. } => EventType::CoalitionDissolved,
            EventDetails::DefectorIsolated { .. } => EventType::DefectorIsolated,
            EventDetails::TrustCollapse { .. } => EventType::TrustCollapse,
            EventDetails::Death { .. } => EventType::Death,
            EventDetails::Rebirth { .. } => EventType::Rebirth,
            EventDetails::CooperationSurge { .. } => EventType::CooperationSurge,
            EventDetails::SocietyStable { .. } => EventType::SocietyStable,
            EventDetails::Anomaly { .. } => EventType::Anomaly,
        }
    }

    /// Default significance for this kind of event.
    pub fn significance(&self) -> Significance {
        match self {
            EventDetails::CoalitionFormed { .. } | EventDetails::CoalitionDissolved { .. } => {
                Significance::Notable
            }
            EventDetails::DefectorIsolated { .. } => Significance::Major,
            EventDetails::TrustCollapse { .. } => Significance::Major,
            EventDetails::Death { karma, .. } => match karma {
                KarmaTier::Constrained => Significance::Critical,
                _ => Significance::Major,
            },
            EventDetails::Rebirth { .. } => Significance::Notable,
            EventDetails::CooperationSurge { .. } => Significance::Notable,
            EventDetails::SocietyStable { .. } => Significance::Major,
            EventDetails::Anomaly { .. } => Significance::Routine,
        }
    }
}

/// A complete event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (e.g., "evt_00000042")
    pub event_id: String,
    /// When the event occurred
    pub timestamp: SimTimestamp,
    pub event_type: EventType,
    /// Agents implicated by the event
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    pub significance: Significance,
    pub details: EventDetails,
}

impl Event {
    /// Create a new event; type and significance follow from the details.
    pub fn new(
        event_id: impl Into<String>,
        timestamp: SimTimestamp,
        agents: Vec<String>,
        details: EventDetails,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            event_type: details.event_type(),
            agents,
            significance: details.significance(),
            details,
        }
    }

    pub fn with_significance(mut self, significance: Significance) -> Self {
        self.significance = significance;
        self
    }

    /// Whether the event implicates the given agent.
    pub fn involves(&self, agent_id: &str) -> bool {
        self.agents.iter().any(|a| a == agent_id)
    }

    /// Serializes the event to a single JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an event from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Generates an event ID from a sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}
