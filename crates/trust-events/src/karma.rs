//! Karma Types
//!
//! Classification of a life at its end and the conditions it hands to the next one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-way classification of an agent's effective trust at death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KarmaTier {
    Honored,
    Neutral,
    Constrained,
}

impl KarmaTier {
    /// Honored and neutral lives are offered another one.
    pub fn offers_rebirth(&self) -> bool {
        matches!(self, KarmaTier::Honored | KarmaTier::Neutral)
    }
}

impl fmt::Display for KarmaTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KarmaTier::Honored => write!(f, "honored"),
            KarmaTier::Neutral => write!(f, "neutral"),
            KarmaTier::Constrained => write!(f, "constrained"),
        }
    }
}

/// Why a life ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Resource balance reached zero
    Exhaustion,
    /// Effective trust fell below the hard floor
    TrustCollapse,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeathCause::Exhaustion => write!(f, "exhaustion"),
            DeathCause::TrustCollapse => write!(f, "trust_collapse"),
        }
    }
}

/// Stats a new life starts with.
///
/// `trust` is applied uniformly to talent, training and temperament.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartingConditions {
    pub trust: f64,
    pub atp: f64,
    pub ci: f64,
}
