//! Epoch Settlement
//!
//! Applies the pending ledger as one atomic update per agent. Every cost,
//! reward and trust delta is computed from the state the epoch started with,
//! then written back together.
//!
//! Per interaction each side pays the interaction cost scaled by its
//! consistency multiplier. A cooperating side hands its stake to the partner
//! through the burn fee; mutual cooperation also mints a quality-weighted
//! reward for both. Every alive agent pays upkeep. Stakes an agent cannot
//! fund after costs and upkeep are scaled down pro rata.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use trust_events::{EventDetails, PopulationConfig};

use crate::components::agent::{AgentId, Behavior, LifeState, Wallet};
use crate::components::social::RelationshipGraph;
use crate::economy::{atp_multiplier, quality_fraction, Transfer};
use crate::events::EventLog;
use crate::strategy::{Decision, Outcome};
use crate::trust::{clamp_unit, TrustProfile};

use super::interaction::{EpochClock, EpochLedger, InteractionRecord, RunConfig};

/// Resource: totals of the last settled epoch
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochTally {
    pub interactions: usize,
    pub mutual: usize,
    pub fees_burned: f64,
}

impl EpochTally {
    /// Share of interactions that were mutual cooperation; 0 with no interactions.
    pub fn cooperation_rate(&self) -> f64 {
        if self.interactions == 0 {
            0.0
        } else {
            self.mutual as f64 / self.interactions as f64
        }
    }
}

/// State an agent entered the epoch with
#[derive(Debug, Clone, Copy)]
struct PreEpoch {
    balance: f64,
    multiplier: f64,
    composite: f64,
}

/// Everything that happens to one agent this epoch
#[derive(Debug, Default)]
struct Settlement {
    costs: f64,
    upkeep: f64,
    stakes_out: f64,
    /// Fraction of promised stakes the agent can actually fund
    funding: f64,
    sent: f64,
    received: f64,
    minted: f64,
    talent: f64,
    training: f64,
    temperament: f64,
    moves: Vec<Decision>,
    outcomes: Vec<Outcome>,
}

/// Number of cooperate/defect switches in a move sequence.
pub fn count_switches(previous: Option<Decision>, moves: &[Decision]) -> usize {
    previous
        .into_iter()
        .chain(moves.iter().copied())
        .collect::<Vec<_>>()
        .windows(2)
        .filter(|w| w[0] != w[1])
        .count()
}

/// Consistency change for one epoch of moves; none when the agent did not play.
pub fn consistency_delta(config: &PopulationConfig, previous: Option<Decision>, moves: &[Decision]) -> f64 {
    if moves.is_empty() {
        return 0.0;
    }
    match count_switches(previous, moves) {
        0 => config.trust.steady_recovery,
        switches => -(switches as f64) * config.trust.erratic_penalty,
    }
}

fn settle_records(
    config: &PopulationConfig,
    epoch: u64,
    records: &[InteractionRecord],
    pre: &BTreeMap<String, PreEpoch>,
) -> (BTreeMap<String, Settlement>, EpochTally) {
    let economy = &config.economy;
    let tuning = &config.trust;
    let mut settlements: BTreeMap<String, Settlement> = pre
        .iter()
        .map(|(id, state)| {
            let settlement = Settlement {
                upkeep: economy.epoch_upkeep * state.multiplier,
                ..Settlement::default()
            };
            (id.clone(), settlement)
        })
        .collect();

    // First pass: costs, promised stakes, minting, trust deltas
    for record in records {
        let (Some(a), Some(b)) = (pre.get(&record.initiator), pre.get(&record.responder)) else {
            continue;
        };
        let mint = if record.is_mutual() {
            economy.mutual_reward * quality_fraction(&economy.quality_ramp, (a.composite + b.composite) / 2.0)
        } else {
            0.0
        };
        for (me, state, own) in [
            (&record.initiator, a, record.initiator_move),
            (&record.responder, b, record.responder_move),
        ] {
            let Some(s) = settlements.get_mut(me) else {
                continue;
            };
            s.costs += economy.interaction_cost * state.multiplier;
            s.minted += mint;
            s.training += tuning.interaction_training;
            if own.is_cooperate() {
                s.stakes_out += economy.stake;
                s.temperament += tuning.cooperate_temperament;
            } else {
                s.temperament -= tuning.defect_temperament;
            }
            if record.is_mutual() {
                s.talent += tuning.mutual_talent;
            }
            s.moves.push(own);
        }
    }

    for (id, s) in settlements.iter_mut() {
        let balance = pre.get(id).map(|p| p.balance).unwrap_or(0.0);
        let available = (balance - s.costs - s.upkeep).max(0.0);
        s.funding = if s.stakes_out > 0.0 {
            (available / s.stakes_out).min(1.0)
        } else {
            1.0
        };
    }

    // Second pass: funded transfers through the fee, and per-interaction nets
    let mut tally = EpochTally::default();
    for record in records {
        let (Some(a), Some(b)) = (pre.get(&record.initiator), pre.get(&record.responder)) else {
            continue;
        };
        let funding_of = |id: &str| settlements.get(id).map(|s| s.funding).unwrap_or(0.0);
        let give = |own: Decision, funding: f64| {
            if own.is_cooperate() {
                Transfer::with_fee(economy.stake * funding, config.fee_rate)
            } else {
                Transfer::default()
            }
        };
        let from_initiator = give(record.initiator_move, funding_of(&record.initiator));
        let from_responder = give(record.responder_move, funding_of(&record.responder));
        let mint = if record.is_mutual() {
            economy.mutual_reward * quality_fraction(&economy.quality_ramp, (a.composite + b.composite) / 2.0)
        } else {
            0.0
        };

        tally.interactions += 1;
        if record.is_mutual() {
            tally.mutual += 1;
        }
        tally.fees_burned += from_initiator.burned + from_responder.burned;

        for (me, partner, state, own, theirs, given, taken) in [
            (
                &record.initiator,
                &record.responder,
                a,
                record.initiator_move,
                record.responder_move,
                from_initiator,
                from_responder,
            ),
            (
                &record.responder,
                &record.initiator,
                b,
                record.responder_move,
                record.initiator_move,
                from_responder,
                from_initiator,
            ),
        ] {
            let Some(s) = settlements.get_mut(me) else {
                continue;
            };
            s.sent += given.sent;
            s.received += taken.received;
            s.outcomes.push(Outcome {
                partner: partner.clone(),
                own_move: own,
                partner_move: theirs,
                net: mint + taken.received - given.sent - economy.interaction_cost * state.multiplier,
                epoch,
            });
        }
    }

    (settlements, tally)
}

/// System: apply the ledger to balances, trust and relationships
pub fn apply_settlement(
    config: Res<RunConfig>,
    clock: Res<EpochClock>,
    mut ledger: ResMut<EpochLedger>,
    mut graph: ResMut<RelationshipGraph>,
    mut tally: ResMut<EpochTally>,
    mut events: ResMut<EventLog>,
    mut query: Query<(&AgentId, &mut Behavior, &mut TrustProfile, &mut Wallet, &LifeState)>,
) {
    let config = &config.0;
    let epoch = clock.epoch;
    let records = ledger.drain();

    let pre: BTreeMap<String, PreEpoch> = query
        .iter()
        .filter(|(_, _, _, _, life)| life.alive)
        .map(|(id, _, profile, wallet, _)| {
            (
                id.0.clone(),
                PreEpoch {
                    balance: wallet.balance,
                    multiplier: atp_multiplier(profile.consistency),
                    composite: profile.composite(),
                },
            )
        })
        .collect();

    let (mut settlements, epoch_tally) = settle_records(config, epoch, &records, &pre);
    let mut anomalies: Vec<(String, EventDetails)> = Vec::new();

    for (id, mut behavior, mut profile, mut wallet, life) in query.iter_mut() {
        if !life.alive {
            continue;
        }
        // Values carried into the epoch out of range are clamped before any delta lands
        for correction in profile.sanitize() {
            tracing::warn!(agent = %id.0, field = correction.field, value = correction.observed, "trust out of range");
            anomalies.push((
                id.0.clone(),
                EventDetails::Anomaly {
                    subject: correction.field.to_string(),
                    message: format!("{} was {}", correction.field, correction.observed),
                    clamped_to: Some(correction.clamped_to),
                },
            ));
        }

        let Some(s) = settlements.remove(&id.0) else {
            continue;
        };

        let balance = wallet.balance - s.costs - s.upkeep - s.sent + s.received + s.minted;
        wallet.balance = if !balance.is_finite() {
            tracing::warn!(agent = %id.0, epoch, "non-finite balance after settlement");
            anomalies.push((
                id.0.clone(),
                EventDetails::Anomaly {
                    subject: "balance".to_string(),
                    message: format!("settled balance was {}", balance),
                    clamped_to: Some(0.0),
                },
            ));
            0.0
        } else {
            balance.max(0.0)
        };

        profile.adjust(s.talent, s.training, s.temperament);
        profile.adjust_consistency(consistency_delta(config, behavior.last_move, &s.moves));

        if let Some(last) = s.moves.last() {
            behavior.last_move = Some(*last);
        }
        for outcome in s.outcomes {
            behavior.history.push(outcome);
        }
    }

    for (from, to, observed) in graph.sanitize() {
        tracing::warn!(from = %from, to = %to, value = observed, "pairwise trust out of range");
        anomalies.push((
            from.clone(),
            EventDetails::Anomaly {
                subject: format!("trust {} -> {}", from, to),
                message: format!("pairwise trust was {}", observed),
                clamped_to: Some(clamp_unit(observed)),
            },
        ));
    }

    let smoothing = config.trust.pairwise_smoothing;
    for record in &records {
        graph.observe(&record.initiator, &record.responder, record.responder_move, epoch, smoothing);
        graph.observe(&record.responder, &record.initiator, record.initiator_move, epoch, smoothing);
    }

    anomalies.sort_by(|a, b| a.0.cmp(&b.0));
    for (agent, details) in anomalies {
        events.record(clock.timestamp(), vec![agent], details);
    }
    *tally = epoch_tally;
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_events::Archetype;

    use crate::components::agent::AgentBundle;

    fn record(a: &str, b: &str, ma: Decision, mb: Decision) -> InteractionRecord {
        InteractionRecord {
            initiator: a.to_string(),
            responder: b.to_string(),
            initiator_move: ma,
            responder_move: mb,
        }
    }

    fn pre(balance: f64) -> PreEpoch {
        PreEpoch {
            balance,
            multiplier: 1.0,
            composite: 0.5,
        }
    }

    fn pair(balance_a: f64, balance_b: f64) -> BTreeMap<String, PreEpoch> {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), pre(balance_a));
        map.insert("b".to_string(), pre(balance_b));
        map
    }

    fn net(s: &Settlement) -> f64 {
        s.received + s.minted - s.costs - s.upkeep - s.sent
    }

    #[test]
    fn test_switch_counting() {
        use Decision::*;
        assert_eq!(count_switches(None, &[]), 0);
        assert_eq!(count_switches(Some(Cooperate), &[Cooperate, Cooperate]), 0);
        assert_eq!(count_switches(Some(Defect), &[Cooperate, Defect]), 2);
        assert_eq!(count_switches(None, &[Defect, Cooperate]), 1);
    }

    #[test]
    fn test_consistency_recovers_when_steady() {
        let config = PopulationConfig::default();
        assert_eq!(consistency_delta(&config, None, &[]), 0.0);
        assert!((consistency_delta(&config, Some(Decision::Cooperate), &[Decision::Cooperate]) - 0.02).abs() < 1e-12);
        assert!(
            (consistency_delta(&config, Some(Decision::Cooperate), &[Decision::Defect, Decision::Cooperate]) + 0.16)
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn test_mutual_cooperation_payoff() {
        let config = PopulationConfig::default();
        let records = [record("a", "b", Decision::Cooperate, Decision::Cooperate)];
        let (settlements, tally) = settle_records(&config, 0, &records, &pair(100.0, 100.0));
        let a = &settlements["a"];
        // ramp(0.5) = 0.3 of the mutual reward
        assert!((a.minted - 1.5).abs() < 1e-9);
        assert!((a.sent - 4.0).abs() < 1e-9);
        assert!((a.received - 3.8).abs() < 1e-9);
        assert!((net(a) - (3.8 + 1.5 - 0.5 - 1.0 - 4.0)).abs() < 1e-9);
        assert_eq!(tally.interactions, 1);
        assert_eq!(tally.mutual, 1);
        assert!((tally.fees_burned - 0.4).abs() < 1e-9);
        assert!((a.outcomes[0].net - (1.5 + 3.8 - 4.0 - 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_defector_exploits_cooperator() {
        let config = PopulationConfig::default();
        let records = [record("a", "b", Decision::Cooperate, Decision::Defect)];
        let (settlements, tally) = settle_records(&config, 0, &records, &pair(100.0, 100.0));
        assert!(net(&settlements["b"]) > net(&settlements["a"]));
        assert_eq!(settlements["a"].minted, 0.0);
        assert!((settlements["b"].received - 3.8).abs() < 1e-9);
        assert!(settlements["a"].temperament > 0.0);
        assert!(settlements["b"].temperament < 0.0);
        assert_eq!(tally.mutual, 0);
    }

    #[test]
    fn test_stakes_limited_by_funds() {
        let config = PopulationConfig::default();
        // a can only fund half a stake after cost 0.5 and upkeep 1.0
        let records = [record("a", "b", Decision::Cooperate, Decision::Defect)];
        let (settlements, _) = settle_records(&config, 0, &records, &pair(3.5, 100.0));
        let a = &settlements["a"];
        assert!((a.funding - 0.5).abs() < 1e-9);
        assert!((a.sent - 2.0).abs() < 1e-9);
        assert!((3.5 + net(a)).abs() < 1e-9);
    }

    #[test]
    fn test_settlement_system_updates_world() {
        let config = PopulationConfig::default();
        let mut world = World::new();
        world.spawn(AgentBundle::new(0, Archetype::Cooperative, &config));
        world.spawn(AgentBundle::new(1, Archetype::Defecting, &config));
        world.insert_resource(RunConfig(config));
        world.insert_resource(EpochClock { epoch: 3 });
        world.insert_resource(RelationshipGraph::new());
        world.insert_resource(EpochTally::default());
        world.insert_resource(EventLog::new());
        let mut ledger = EpochLedger::new();
        ledger.push(record("agent_000", "agent_001", Decision::Cooperate, Decision::Defect));
        world.insert_resource(ledger);

        let mut schedule = Schedule::default();
        schedule.add_systems(apply_settlement);
        schedule.run(&mut world);

        assert!(world.resource::<EpochLedger>().is_empty());
        assert_eq!(world.resource::<EpochTally>().interactions, 1);
        let graph = world.resource::<RelationshipGraph>();
        assert!((graph.trust("agent_000", "agent_001") - 0.35).abs() < 1e-9);
        assert!((graph.trust("agent_001", "agent_000") - 0.65).abs() < 1e-9);
        assert_eq!(
            graph.get("agent_000", "agent_001").and_then(|r| r.last_interaction),
            Some(3)
        );

        let mut query = world.query::<(&AgentId, &Wallet, &Behavior)>();
        for (id, wallet, behavior) in query.iter(&world) {
            assert!(wallet.balance >= 0.0);
            assert_eq!(behavior.history.len(), 1);
            if id.0 == "agent_000" {
                // cost 0.78 and upkeep 1.5625 at consistency 0.8, plus the lost stake
                assert!((wallet.balance - (100.0 - 0.78125 - 1.5625 - 4.0)).abs() < 1e-9);
            } else {
                assert!((wallet.balance - (100.0 - 0.78125 - 1.5625 + 3.8)).abs() < 1e-9);
            }
        }
        assert!(world.resource::<EventLog>().events().is_empty());
    }

    #[test]
    fn test_out_of_range_state_clamped_with_anomalies() {
        let config = PopulationConfig::default();
        let mut world = World::new();
        world.spawn(AgentBundle::new(0, Archetype::Cooperative, &config));
        world.spawn(AgentBundle::new(1, Archetype::Defecting, &config));
        world.insert_resource(RunConfig(config));
        world.insert_resource(EpochClock { epoch: 1 });
        world.insert_resource(EpochTally::default());
        world.insert_resource(EventLog::new());
        let mut graph = RelationshipGraph::new();
        graph.ensure_relationship("agent_001", "agent_000").trust = 1.4;
        world.insert_resource(graph);
        let mut ledger = EpochLedger::new();
        ledger.push(record("agent_000", "agent_001", Decision::Cooperate, Decision::Defect));
        world.insert_resource(ledger);

        let mut query = world.query::<(&AgentId, &mut TrustProfile, &mut Wallet)>();
        for (id, mut profile, mut wallet) in query.iter_mut(&mut world) {
            if id.0 == "agent_000" {
                profile.temperament = 1.7;
            } else {
                wallet.balance = f64::NAN;
            }
        }

        let mut schedule = Schedule::default();
        schedule.add_systems(apply_settlement);
        schedule.run(&mut world);

        let mut query = world.query::<(&AgentId, &TrustProfile, &Wallet)>();
        for (id, profile, wallet) in query.iter(&world) {
            assert!((0.0..=1.0).contains(&profile.temperament));
            if id.0 == "agent_001" {
                assert_eq!(wallet.balance, 0.0);
            }
        }
        assert_eq!(world.resource::<RelationshipGraph>().trust("agent_001", "agent_000"), 1.0);

        let anomalies: Vec<(Vec<String>, EventDetails)> = world
            .resource::<EventLog>()
            .events()
            .iter()
            .map(|e| (e.agents.clone(), e.details.clone()))
            .collect();
        assert_eq!(anomalies.len(), 3);
        assert_eq!(anomalies[0].0, vec!["agent_000".to_string()]);
        assert!(matches!(
            &anomalies[0].1,
            EventDetails::Anomaly { subject, clamped_to: Some(c), .. } if subject == "temperament" && *c == 1.0
        ));
        assert!(matches!(
            &anomalies[1].1,
            EventDetails::Anomaly { subject, clamped_to: Some(c), .. } if subject == "balance" && *c == 0.0
        ));
        assert!(matches!(
            &anomalies[2].1,
            EventDetails::Anomaly { clamped_to: Some(c), .. } if *c == 1.0
        ));
    }
}
