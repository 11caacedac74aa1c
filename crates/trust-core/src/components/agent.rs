//! Agent Components
//!
//! Components for population agents: identity, behavior, balance, life
//! status, coalition membership and incoming-offer history.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use trust_events::{Archetype, PopulationConfig, StartingConditions};

use crate::lifecycle::{DeathRecord, Mortal};
use crate::strategy::{Decision, OutcomeWindow};
use crate::trust::TrustProfile;

/// Formats the id of the agent at a spawn index.
pub fn agent_id(index: usize) -> String {
    format!("agent_{:03}", index)
}

/// Unique identifier for an agent
#[derive(Component, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

/// Archetype and the record the strategy decides from
#[derive(Component, Debug, Clone)]
pub struct Behavior {
    pub archetype: Archetype,
    pub history: OutcomeWindow,
    /// Most recent own move, carried across epochs for consistency tracking
    pub last_move: Option<Decision>,
}

impl Behavior {
    pub fn new(archetype: Archetype, window: usize) -> Self {
        Self {
            archetype,
            history: OutcomeWindow::new(window),
            last_move: None,
        }
    }

    /// Forgets everything about the previous life.
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_move = None;
    }
}

/// Resource balance (ATP)
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Wallet {
    pub balance: f64,
}

/// A death waiting to be resolved into rebirth or permanence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Death {
    pub epoch: u64,
    pub record: DeathRecord,
}

/// Life status of an agent's lineage
#[derive(Component, Debug, Clone, PartialEq)]
pub struct LifeState {
    pub generation: u32,
    pub alive: bool,
    /// Epoch the current life began in
    pub born_at: u64,
    /// The most recent death, cleared on rebirth
    pub death: Option<Death>,
    /// Set when the lineage can never return
    pub lineage_closed: bool,
}

impl LifeState {
    pub fn new() -> Self {
        Self {
            generation: 1,
            alive: true,
            born_at: 0,
            death: None,
            lineage_closed: false,
        }
    }

    /// Conditions of the next life if this lineage is due a rebirth at `epoch`.
    pub fn due_rebirth(&self, epoch: u64) -> Option<StartingConditions> {
        if self.alive || self.lineage_closed {
            return None;
        }
        let death = self.death?;
        if death.epoch < epoch {
            death.record.rebirth
        } else {
            None
        }
    }
}

impl Default for LifeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view used by the life-cycle rules.
pub struct Lineage<'a> {
    pub id: &'a AgentId,
    pub life: &'a LifeState,
}

impl Mortal for Lineage<'_> {
    fn agent_id(&self) -> &str {
        &self.id.0
    }

    fn generation(&self) -> u32 {
        self.life.generation
    }

    fn is_alive(&self) -> bool {
        self.life.alive
    }
}

/// Current coalition, if any
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Membership {
    pub coalition: Option<String>,
}

/// Offers received in recent epochs, for isolation detection
#[derive(Component, Debug, Clone, PartialEq)]
pub struct OfferHistory {
    window: usize,
    offers: VecDeque<usize>,
    /// Currently flagged as isolated
    pub isolated: bool,
}

impl OfferHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            offers: VecDeque::with_capacity(window.max(1)),
            isolated: false,
        }
    }

    pub fn record(&mut self, offers: usize) {
        if self.offers.len() == self.window {
            self.offers.pop_front();
        }
        self.offers.push_back(offers);
    }

    /// Whether a full window of epochs has been observed.
    pub fn is_full(&self) -> bool {
        self.offers.len() == self.window
    }

    /// Offers received per available slot over the observed epochs.
    pub fn rate(&self, slots_per_epoch: usize) -> f64 {
        let capacity = slots_per_epoch * self.offers.len();
        if capacity == 0 {
            return 0.0;
        }
        self.offers.iter().sum::<usize>() as f64 / capacity as f64
    }

    pub fn reset(&mut self) {
        self.offers.clear();
        self.isolated = false;
    }
}

/// Everything a freshly spawned agent needs
#[derive(Bundle)]
pub struct AgentBundle {
    pub id: AgentId,
    pub behavior: Behavior,
    pub trust: TrustProfile,
    pub wallet: Wallet,
    pub life: LifeState,
    pub membership: Membership,
    pub offers: OfferHistory,
}

impl AgentBundle {
    pub fn new(index: usize, archetype: Archetype, config: &PopulationConfig) -> Self {
        Self {
            id: AgentId(agent_id(index)),
            behavior: Behavior::new(archetype, config.outcome_window),
            trust: TrustProfile::uniform(config.initial_trust, config.initial_consistency),
            wallet: Wallet {
                balance: config.initial_balance,
            },
            life: LifeState::new(),
            membership: Membership::default(),
            offers: OfferHistory::new(config.thresholds.isolation_window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::process_death;
    use trust_events::DeathCause;

    #[test]
    fn test_agent_id_format() {
        assert_eq!(agent_id(0), "agent_000");
        assert_eq!(agent_id(42), "agent_042");
    }

    #[test]
    fn test_bundle_from_config() {
        let config = PopulationConfig::default();
        let bundle = AgentBundle::new(3, Archetype::Cautious, &config);
        assert_eq!(bundle.id.0, "agent_003");
        assert_eq!(bundle.wallet.balance, 100.0);
        assert_eq!(bundle.trust.talent, 0.5);
        assert_eq!(bundle.trust.consistency, 0.8);
        assert!(bundle.life.alive);
        assert_eq!(bundle.life.generation, 1);
    }

    #[test]
    fn test_offer_rate_over_window() {
        let mut history = OfferHistory::new(3);
        assert_eq!(history.rate(2), 0.0);
        history.record(2);
        history.record(0);
        assert!(!history.is_full());
        history.record(1);
        assert!(history.is_full());
        assert!((history.rate(2) - 0.5).abs() < 1e-9);
        history.record(0);
        // window now [0, 1, 0]
        assert!((history.rate(2) - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_due_rebirth_waits_an_epoch() {
        let id = AgentId(agent_id(1));
        let mut life = LifeState::new();
        let record = process_death(&Lineage { id: &id, life: &life }, DeathCause::Exhaustion, 0.5).unwrap();
        life.alive = false;
        life.death = Some(Death { epoch: 4, record });

        assert!(life.due_rebirth(4).is_none());
        assert!(life.due_rebirth(5).is_some());

        life.lineage_closed = true;
        assert!(life.due_rebirth(5).is_none());
    }
}
