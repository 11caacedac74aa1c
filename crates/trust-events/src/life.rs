//! Individual Layer Types
//!
//! Data for a single agent living through repeated lives: the actions it can
//! take, one record per life in its lineage, per-tick snapshots and the
//! assembled result of a session.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, LifeConfig};
use crate::event::Event;
use crate::karma::{DeathCause, KarmaTier, StartingConditions};
use crate::timestamp::SimTimestamp;

/// A data-driven action the agent can take on one tick.
///
/// Cost is scaled by the consistency multiplier, reward by the quality ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeAction {
    pub id: String,
    pub label: String,
    /// Base resource cost
    pub cost: f64,
    /// Full reward at perfect quality
    #[serde(default)]
    pub reward: f64,
    /// Contribution quality in [0, 1]
    #[serde(default)]
    pub quality: f64,
    /// Value sent to a peer through the transfer fee
    #[serde(default)]
    pub transfer: f64,
    #[serde(default)]
    pub talent_delta: f64,
    #[serde(default)]
    pub training_delta: f64,
    #[serde(default)]
    pub temperament_delta: f64,
    #[serde(default)]
    pub consistency_delta: f64,
}

impl LifeAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>, cost: f64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            cost,
            reward: 0.0,
            quality: 0.0,
            transfer: 0.0,
            talent_delta: 0.0,
            training_delta: 0.0,
            temperament_delta: 0.0,
            consistency_delta: 0.0,
        }
    }

    pub fn with_reward(mut self, reward: f64, quality: f64) -> Self {
        self.reward = reward;
        self.quality = quality;
        self
    }

    pub fn with_transfer(mut self, amount: f64) -> Self {
        self.transfer = amount;
        self
    }

    pub fn with_trust(mut self, talent: f64, training: f64, temperament: f64) -> Self {
        self.talent_delta = talent;
        self.training_delta = training;
        self.temperament_delta = temperament;
        self
    }

    pub fn with_consistency(mut self, delta: f64) -> Self {
        self.consistency_delta = delta;
        self
    }

    /// The default action catalogue.
    pub fn catalogue() -> Vec<LifeAction> {
        vec![
            LifeAction::new("contribute_quality", "Contribute careful, high-quality work", 5.0)
                .with_reward(12.0, 0.9)
                .with_trust(0.02, 0.01, 0.01)
                .with_consistency(0.02),
            LifeAction::new("contribute_mediocre", "Contribute passable work", 4.0)
                .with_reward(8.0, 0.6)
                .with_trust(0.0, 0.01, 0.0),
            LifeAction::new("spam", "Flood the network with low-effort content", 1.0)
                .with_reward(6.0, 0.1)
                .with_trust(-0.02, 0.0, -0.06)
                .with_consistency(-0.05),
            LifeAction::new("help_peer", "Send resources to a struggling peer", 2.0)
                .with_transfer(5.0)
                .with_trust(0.0, 0.0, 0.03)
                .with_consistency(0.01),
            LifeAction::new("rest", "Do nothing this tick", 0.5).with_consistency(0.01),
            LifeAction::new("exploit", "Extract value at others' expense", 2.0)
                .with_reward(10.0, 0.75)
                .with_trust(0.0, 0.0, -0.1)
                .with_consistency(-0.1),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("action.cost", self.cost),
            ("action.reward", self.reward),
            ("action.transfer", self.transfer),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidAmount { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(ConfigError::OutOfUnitRange {
                field: "action.quality",
                value: self.quality,
            });
        }
        for (field, value) in [
            ("action.talent_delta", self.talent_delta),
            ("action.training_delta", self.training_delta),
            ("action.temperament_delta", self.temperament_delta),
            ("action.consistency_delta", self.consistency_delta),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }
        Ok(())
    }
}

/// How a life ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifeEnding {
    pub cause: DeathCause,
    pub karma: KarmaTier,
    /// Effective trust at the instant of death
    pub effective_score: f64,
    pub ended_at: u64,
}

/// One life in a lineage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeRecord {
    pub generation: u32,
    /// Step the life began at
    pub started_at: u64,
    pub conditions: StartingConditions,
    pub talent: f64,
    pub training: f64,
    pub temperament: f64,
    pub consistency: f64,
    pub atp: f64,
    pub ticks: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending: Option<LifeEnding>,
}

impl LifeRecord {
    /// A fresh life with every trust sub-dimension set to the starting trust.
    pub fn begin(generation: u32, started_at: u64, conditions: StartingConditions) -> Self {
        Self {
            generation,
            started_at,
            conditions,
            talent: conditions.trust,
            training: conditions.trust,
            temperament: conditions.trust,
            consistency: conditions.ci,
            atp: conditions.atp,
            ticks: 0,
            ending: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.ending.is_none()
    }
}

/// State after one tick of the individual layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub timestamp: SimTimestamp,
    pub action_id: String,
    pub atp: f64,
    pub composite_trust: f64,
    pub effective_trust: f64,
    pub consistency: f64,
    pub cost_paid: f64,
    pub reward_earned: f64,
    pub fee_burned: f64,
    pub alive: bool,
}

/// Complete output of an individual-layer session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeResult {
    pub config: LifeConfig,
    /// Every life lived, oldest first
    pub lineage: Vec<LifeRecord>,
    pub ticks: Vec<TickSnapshot>,
    pub events: Vec<Event>,
    pub total_burned: f64,
}

impl LifeResult {
    pub fn generations(&self) -> u32 {
        self.lineage.last().map(|l| l.generation).unwrap_or(0)
    }

    pub fn current_life(&self) -> Option<&LifeRecord> {
        self.lineage.last()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_valid() {
        let actions = LifeAction::catalogue();
        assert_eq!(actions.len(), 6);
        for action in &actions {
            assert!(action.validate().is_ok(), "{} should be valid", action.id);
        }
    }

    #[test]
    fn test_action_validation() {
        let negative = LifeAction::new("bad", "bad", -1.0);
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::InvalidAmount { field: "action.cost", .. })
        ));
        let quality = LifeAction::new("bad", "bad", 1.0).with_reward(1.0, 1.5);
        assert!(quality.validate().is_err());
    }

    #[test]
    fn test_life_record_begin() {
        let conditions = StartingConditions {
            trust: 0.6,
            atp: 120.0,
            ci: 0.85,
        };
        let life = LifeRecord::begin(2, 40, conditions);
        assert_eq!(life.talent, 0.6);
        assert_eq!(life.training, 0.6);
        assert_eq!(life.temperament, 0.6);
        assert_eq!(life.consistency, 0.85);
        assert_eq!(life.atp, 120.0);
        assert!(life.is_alive());
    }

    #[test]
    fn test_action_defaults_from_json() {
        let action: LifeAction =
            serde_json::from_str(r#"{"id": "wait", "label": "Wait", "cost": 0.25}"#).unwrap();
        assert_eq!(action.reward, 0.0);
        assert_eq!(action.transfer, 0.0);
        assert!(action.validate().is_ok());
    }
}
