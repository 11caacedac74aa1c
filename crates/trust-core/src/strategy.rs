//! Strategy Module
//!
//! Maps an agent's archetype, its recent history and what it can see of its
//! opponent to a cooperate/defect decision. Decisions are pure: the same
//! context always yields the same move.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use trust_events::Archetype;

/// A move in one pairwise interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Cooperate,
    Defect,
}

impl Decision {
    pub fn is_cooperate(&self) -> bool {
        matches!(self, Decision::Cooperate)
    }
}

/// Result of one past interaction, from the agent's point of view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub partner: String,
    pub own_move: Decision,
    pub partner_move: Decision,
    /// Net resource change the interaction caused
    pub net: f64,
    pub epoch: u64,
}

/// Bounded window of an agent's most recent outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeWindow {
    capacity: usize,
    outcomes: VecDeque<Outcome>,
}

impl OutcomeWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            outcomes: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Appends an outcome, evicting the oldest when full.
    pub fn push(&mut self, outcome: Outcome) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome);
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter()
    }

    /// Last move the given partner played against this agent, if still in the window.
    pub fn last_move_of(&self, partner: &str) -> Option<Decision> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.partner == partner)
            .map(|o| o.partner_move)
    }

    /// Share of this agent's own moves in the window that were defections.
    pub fn defection_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let defections = self
            .outcomes
            .iter()
            .filter(|o| o.own_move == Decision::Defect)
            .count();
        defections as f64 / self.outcomes.len() as f64
    }

    /// Mean net outcome of playing the given move, or `None` if never tried.
    pub fn mean_net(&self, decision: Decision) -> Option<f64> {
        let (sum, count) = self
            .outcomes
            .iter()
            .filter(|o| o.own_move == decision)
            .fold((0.0, 0usize), |(sum, count), o| (sum + o.net, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

/// Everything an agent may look at when choosing a move.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// The deciding agent's own recent outcomes
    pub history: &'a OutcomeWindow,
    pub opponent: &'a str,
    /// The opponent's last move toward this agent, remembered beyond the window
    pub opponent_last_move: Option<Decision>,
    /// The opponent's visible reputation (effective trust)
    pub opponent_reputation: f64,
    /// Reputation a cautious agent needs to see before cooperating
    pub cautious_threshold: f64,
}

/// Chooses a move for one interaction.
pub trait Strategy {
    fn decide(&self, context: &DecisionContext<'_>) -> Decision;
}

impl Strategy for Archetype {
    fn decide(&self, context: &DecisionContext<'_>) -> Decision {
        match self {
            Archetype::Cooperative => Decision::Cooperate,
            Archetype::Defecting => Decision::Defect,
            Archetype::Reciprocating => context
                .opponent_last_move
                .or_else(|| context.history.last_move_of(context.opponent))
                .unwrap_or(Decision::Cooperate),
            Archetype::Cautious => {
                if context.opponent_reputation > context.cautious_threshold {
                    Decision::Cooperate
                } else {
                    Decision::Defect
                }
            }
            Archetype::Adaptive => {
                match (
                    context.history.mean_net(Decision::Cooperate),
                    context.history.mean_net(Decision::Defect),
                ) {
                    (None, _) => Decision::Cooperate,
                    (Some(_), None) => Decision::Defect,
                    (Some(cooperate), Some(defect)) => {
                        if defect > cooperate {
                            Decision::Defect
                        } else {
                            Decision::Cooperate
                        }
                    }
                }
            }
        }
    }
}
