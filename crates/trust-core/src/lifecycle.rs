//! Life-Cycle Manager
//!
//! Death detection, karma on death, and whether a lineage comes back.
//!
//! States: alive, dead, then either reborn (alive again, generation + 1) or
//! permanently dead. Only honored and neutral lives are offered rebirth.

use trust_events::{DeathCause, KarmaTier, StartingConditions};

use crate::trust::{karma_tier, starting_conditions};

/// Life-cycle failures. Fatal to the affected lineage only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("agent {agent_id} is already dead (generation {generation})")]
    AlreadyDead { agent_id: String, generation: u32 },

    #[error("agent {agent_id} is still alive")]
    StillAlive { agent_id: String },

    #[error("lineage {agent_id} was not offered rebirth (karma {karma})")]
    RebirthNotOffered { agent_id: String, karma: KarmaTier },
}

/// Which death condition, if any, holds. Exhaustion is checked first.
pub fn check_death(balance: f64, effective_trust: f64, trust_floor: f64) -> Option<DeathCause> {
    if balance.is_nan() || balance <= 0.0 {
        Some(DeathCause::Exhaustion)
    } else if effective_trust < trust_floor {
        Some(DeathCause::TrustCollapse)
    } else {
        None
    }
}

/// Outcome of processing one death
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathRecord {
    pub cause: DeathCause,
    pub karma: KarmaTier,
    pub effective_score: f64,
    /// Conditions of the next life when rebirth is offered
    pub rebirth: Option<StartingConditions>,
}

/// Life status an agent carries through the life-cycle.
pub trait Mortal {
    fn agent_id(&self) -> &str;
    fn generation(&self) -> u32;
    fn is_alive(&self) -> bool;
}

/// Computes karma for an agent at the moment of death.
///
/// Karma is only defined for a living agent; asking again after death is an
/// error.
pub fn process_death<M: Mortal + ?Sized>(
    agent: &M,
    cause: DeathCause,
    effective_score: f64,
) -> Result<DeathRecord, LifecycleError> {
    if !agent.is_alive() {
        return Err(LifecycleError::AlreadyDead {
            agent_id: agent.agent_id().to_string(),
            generation: agent.generation(),
        });
    }
    let karma = karma_tier(effective_score);
    let rebirth = karma
        .offers_rebirth()
        .then(|| starting_conditions(karma, effective_score));
    Ok(DeathRecord {
        cause,
        karma,
        effective_score,
        rebirth,
    })
}

/// Conditions for an explicit rebirth request on a dead agent.
pub fn rebirth_conditions<M: Mortal + ?Sized>(
    agent: &M,
    death: &DeathRecord,
) -> Result<StartingConditions, LifecycleError> {
    if agent.is_alive() {
        return Err(LifecycleError::StillAlive {
            agent_id: agent.agent_id().to_string(),
        });
    }
    death.rebirth.ok_or_else(|| LifecycleError::RebirthNotOffered {
        agent_id: agent.agent_id().to_string(),
        karma: death.karma,
    })
}

/// Conditions for restarting a lineage regardless of karma.
pub fn restart_conditions<M: Mortal + ?Sized>(
    agent: &M,
    death: &DeathRecord,
) -> Result<StartingConditions, LifecycleError> {
    if agent.is_alive() {
        return Err(LifecycleError::StillAlive {
            agent_id: agent.agent_id().to_string(),
        });
    }
    Ok(starting_conditions(death.karma, death.effective_score))
}
