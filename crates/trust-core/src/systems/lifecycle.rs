//! Life-Cycle Systems
//!
//! Death checks at the close of each epoch, and rebirth of lineages that
//! died in an earlier epoch and were offered another life.

use bevy_ecs::prelude::*;
use trust_events::{DeathCause, EventDetails};

use crate::components::agent::{AgentId, Behavior, Death, LifeState, Lineage, Membership, OfferHistory, Wallet};
use crate::events::EventLog;
use crate::lifecycle::{check_death, process_death};
use crate::trust::TrustProfile;

use super::interaction::{EpochClock, RunConfig};

/// System: kill agents that ran out of resources or whose trust collapsed
pub fn check_deaths(
    config: Res<RunConfig>,
    clock: Res<EpochClock>,
    mut events: ResMut<EventLog>,
    mut query: Query<(&AgentId, &TrustProfile, &Wallet, &mut LifeState)>,
) {
    let floor = config.0.thresholds.trust_collapse_floor;
    let mut agents: Vec<_> = query.iter_mut().filter(|(_, _, _, life)| life.alive).collect();
    agents.sort_by(|a, b| a.0.cmp(b.0));

    for (id, profile, wallet, mut life) in agents {
        let effective = profile.effective();
        let Some(cause) = check_death(wallet.balance, effective, floor) else {
            continue;
        };

        if cause == DeathCause::TrustCollapse {
            events.record(
                clock.timestamp(),
                vec![id.0.clone()],
                EventDetails::TrustCollapse {
                    effective_score: effective,
                    consistency: profile.consistency,
                },
            );
        }

        settle_death(
            &mut events,
            &clock,
            config.0.allow_rebirth,
            id,
            &mut life,
            Demise {
                cause,
                effective,
                final_balance: wallet.balance,
            },
        );
    }
}

/// How a life ended
#[derive(Debug, Clone, Copy)]
struct Demise {
    cause: DeathCause,
    effective: f64,
    final_balance: f64,
}

/// Records a death, or closes the lineage when it cannot be processed.
fn settle_death(
    events: &mut EventLog,
    clock: &EpochClock,
    allow_rebirth: bool,
    id: &AgentId,
    life: &mut LifeState,
    demise: Demise,
) {
    match process_death(&Lineage { id, life: &*life }, demise.cause, demise.effective) {
        Ok(mut record) => {
            if !allow_rebirth {
                record.rebirth = None;
            }
            events.record(
                clock.timestamp(),
                vec![id.0.clone()],
                EventDetails::Death {
                    cause: demise.cause,
                    karma: record.karma,
                    effective_score: demise.effective,
                    generation: life.generation,
                    final_balance: demise.final_balance,
                },
            );
            tracing::debug!(
                agent = %id.0,
                cause = %demise.cause,
                karma = %record.karma,
                generation = life.generation,
                "agent died"
            );
            life.alive = false;
            life.death = Some(Death {
                epoch: clock.epoch,
                record,
            });
        }
        Err(e) => {
            tracing::warn!(agent = %id.0, error = %e, "closing lineage after failed death processing");
            events.record(
                clock.timestamp(),
                vec![id.0.clone()],
                EventDetails::Anomaly {
                    subject: "lifecycle".to_string(),
                    message: e.to_string(),
                    clamped_to: None,
                },
            );
            life.alive = false;
            life.lineage_closed = true;
        }
    }
}

/// System: bring back lineages that are due another life
pub fn process_rebirths(
    clock: Res<EpochClock>,
    mut events: ResMut<EventLog>,
    mut query: Query<(
        &AgentId,
        &mut Behavior,
        &mut TrustProfile,
        &mut Wallet,
        &mut LifeState,
        &mut Membership,
        &mut OfferHistory,
    )>,
) {
    let mut agents: Vec<_> = query.iter_mut().collect();
    agents.sort_by(|a, b| a.0.cmp(b.0));

    for (id, mut behavior, mut profile, mut wallet, mut life, mut membership, mut offers) in agents {
        let (Some(death), Some(conditions)) = (life.death, life.due_rebirth(clock.epoch)) else {
            continue;
        };
        let karma = death.record.karma;

        life.generation += 1;
        life.alive = true;
        life.born_at = clock.epoch;
        life.death = None;
        *profile = TrustProfile::from_conditions(&conditions);
        wallet.balance = conditions.atp;
        behavior.reset();
        offers.reset();
        membership.coalition = None;

        events.record(
            clock.timestamp(),
            vec![id.0.clone()],
            EventDetails::Rebirth {
                generation: life.generation,
                karma,
                conditions,
                restarted: false,
            },
        );
        tracing::debug!(agent = %id.0, generation = life.generation, %karma, "agent reborn");
    }
}
