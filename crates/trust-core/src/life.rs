//! Individual Layer
//!
//! One agent living through repeated lives, one chosen action per tick.
//! The lineage is append-only: every life ever lived stays in it and the
//! current life is always the last record.
//!
//! # Example
//!
//! ```
//! use trust_core::life::LifeSession;
//! use trust_events::LifeConfig;
//!
//! let mut session = LifeSession::new(LifeConfig::default()).unwrap();
//! let outcome = session.act("contribute_quality").unwrap();
//! assert!(outcome.snapshot.alive);
//! assert_eq!(session.generation(), 1);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trust_events::{
    ConfigError, DeathCause, EventDetails, KarmaTier, LifeConfig, LifeEnding, LifeRecord,
    LifeResult, SimTimestamp, StartingConditions, TickSnapshot,
};

use crate::economy::{atp_multiplier, settle_action, AccountState};
use crate::events::EventLog;
use crate::lifecycle::{
    check_death, process_death, rebirth_conditions, restart_conditions, DeathRecord,
    LifecycleError, Mortal,
};
use crate::trust::{karma_tier, starting_conditions, TrustProfile};

/// Default id the session's agent appears under in events
pub const DEFAULT_AGENT_ID: &str = "agent_000";

/// Errors from driving a life session.
#[derive(Debug, thiserror::Error)]
pub enum LifeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown action: '{0}'")]
    UnknownAction(String),

    #[error("generation {generation} has ended; rebirth or restart first")]
    Dead { generation: u32 },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// What one tick produced
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub snapshot: TickSnapshot,
    /// Set when this tick ended the life
    pub ending: Option<LifeEnding>,
}

impl TickOutcome {
    pub fn died(&self) -> bool {
        self.ending.is_some()
    }
}

/// A single agent's multi-life session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeSession {
    agent_id: String,
    config: LifeConfig,
    lineage: Vec<LifeRecord>,
    ticks: Vec<TickSnapshot>,
    events: EventLog,
    clock: SimTimestamp,
    total_burned: f64,
}

impl Mortal for LifeSession {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn generation(&self) -> u32 {
        self.current().generation
    }

    fn is_alive(&self) -> bool {
        self.current().is_alive()
    }
}

impl LifeSession {
    /// Starts generation 1 with the configured initial conditions.
    pub fn new(config: LifeConfig) -> Result<Self, LifeError> {
        config.validate()?;
        let clock = SimTimestamp::start();
        let first = LifeRecord::begin(clock.generation, clock.step, config.initial);
        Ok(Self {
            agent_id: DEFAULT_AGENT_ID.to_string(),
            config,
            lineage: vec![first],
            ticks: Vec::new(),
            events: EventLog::new(),
            clock,
            total_burned: 0.0,
        })
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    /// The life being lived now (or the one that just ended).
    pub fn current(&self) -> &LifeRecord {
        let last = self.lineage.len() - 1;
        &self.lineage[last]
    }

    fn current_mut(&mut self) -> &mut LifeRecord {
        let last = self.lineage.len() - 1;
        &mut self.lineage[last]
    }

    pub fn generation(&self) -> u32 {
        self.current().generation
    }

    pub fn is_alive(&self) -> bool {
        self.current().is_alive()
    }

    pub fn lineage(&self) -> &[LifeRecord] {
        &self.lineage
    }

    pub fn ticks(&self) -> &[TickSnapshot] {
        &self.ticks
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn now(&self) -> SimTimestamp {
        self.clock
    }

    pub fn total_burned(&self) -> f64 {
        self.total_burned
    }

    pub fn profile(&self) -> TrustProfile {
        let life = self.current();
        TrustProfile {
            talent: life.talent,
            training: life.training,
            temperament: life.temperament,
            consistency: life.consistency,
        }
    }

    /// Cost multiplier the next action pays.
    pub fn multiplier(&self) -> f64 {
        atp_multiplier(self.current().consistency)
    }

    /// Karma the current life would receive if it ended now.
    pub fn karma_preview(&self) -> KarmaTier {
        karma_tier(self.profile().effective())
    }

    /// Whether the ended current life was offered another one.
    pub fn rebirth_offered(&self) -> bool {
        self.current()
            .ending
            .map(|e| e.karma.offers_rebirth())
            .unwrap_or(false)
    }

    /// Settles one action and checks for death.
    pub fn act(&mut self, action_id: &str) -> Result<TickOutcome, LifeError> {
        if !self.is_alive() {
            return Err(LifeError::Dead {
                generation: self.generation(),
            });
        }
        let action = self
            .config
            .action(action_id)
            .cloned()
            .ok_or_else(|| LifeError::UnknownAction(action_id.to_string()))?;

        self.clock.advance_step();
        let timestamp = self.clock;

        let mut profile = self.profile();
        for correction in profile.sanitize() {
            warn!(field = correction.field, observed = correction.observed, "trust value out of range");
            self.anomaly(
                timestamp,
                correction.field,
                format!("{} was {}", correction.field, correction.observed),
                Some(correction.clamped_to),
            );
        }
        let balance = self.current().atp;
        if !balance.is_finite() || balance < 0.0 {
            warn!(balance, "balance out of range");
            self.anomaly(timestamp, "atp", format!("atp was {}", balance), Some(0.0));
        }

        let settlement = settle_action(
            AccountState {
                balance,
                consistency: profile.consistency,
            },
            &action,
            &self.config.quality_ramp,
            self.config.fee_rate,
        );
        profile.adjust(action.talent_delta, action.training_delta, action.temperament_delta);
        profile.adjust_consistency(action.consistency_delta);
        self.total_burned += settlement.transfer.burned;

        {
            let life = self.current_mut();
            life.atp = settlement.balance_after;
            life.talent = profile.talent;
            life.training = profile.training;
            life.temperament = profile.temperament;
            life.consistency = profile.consistency;
            life.ticks += 1;
        }

        let effective = profile.effective();
        let ending = match check_death(settlement.balance_after, effective, self.config.trust_collapse_floor) {
            Some(cause) => Some(self.die(cause, effective, &profile, timestamp)?),
            None => None,
        };

        let snapshot = TickSnapshot {
            timestamp,
            action_id: action.id.clone(),
            atp: settlement.balance_after,
            composite_trust: profile.composite(),
            effective_trust: effective,
            consistency: profile.consistency,
            cost_paid: settlement.cost,
            reward_earned: settlement.reward,
            fee_burned: settlement.transfer.burned,
            alive: ending.is_none(),
        };
        debug!(
            step = timestamp.step,
            action = %action.id,
            atp = snapshot.atp,
            effective = snapshot.effective_trust,
            "tick settled"
        );
        self.ticks.push(snapshot.clone());
        Ok(TickOutcome { snapshot, ending })
    }

    fn die(
        &mut self,
        cause: DeathCause,
        effective: f64,
        profile: &TrustProfile,
        timestamp: SimTimestamp,
    ) -> Result<LifeEnding, LifeError> {
        let record = process_death(&*self, cause, effective)?;
        let generation = self.generation();
        let agents = vec![self.agent_id.clone()];

        if cause == DeathCause::TrustCollapse {
            self.events.record(
                timestamp,
                agents.clone(),
                EventDetails::TrustCollapse {
                    effective_score: effective,
                    consistency: profile.consistency,
                },
            );
        }
        let final_balance = self.current().atp;
        self.events.record(
            timestamp,
            agents,
            EventDetails::Death {
                cause,
                karma: record.karma,
                effective_score: effective,
                generation,
                final_balance,
            },
        );

        let ending = LifeEnding {
            cause,
            karma: record.karma,
            effective_score: effective,
            ended_at: timestamp.step,
        };
        self.current_mut().ending = Some(ending);
        info!(generation, cause = %cause, karma = %record.karma, effective, "life ended");
        Ok(ending)
    }

    fn death_record(&self) -> Result<DeathRecord, LifeError> {
        let ending = self.current().ending.ok_or_else(|| LifecycleError::StillAlive {
            agent_id: self.agent_id.clone(),
        })?;
        Ok(DeathRecord {
            cause: ending.cause,
            karma: ending.karma,
            effective_score: ending.effective_score,
            rebirth: ending
                .karma
                .offers_rebirth()
                .then(|| starting_conditions(ending.karma, ending.effective_score)),
        })
    }

    /// Begins the next life if the last one earned a rebirth.
    pub fn rebirth(&mut self) -> Result<&LifeRecord, LifeError> {
        let death = self.death_record()?;
        let conditions = rebirth_conditions(&*self, &death)?;
        Ok(self.begin_next(death.karma, conditions, false))
    }

    /// Begins the next life regardless of karma.
    pub fn restart(&mut self) -> Result<&LifeRecord, LifeError> {
        let death = self.death_record()?;
        let conditions = restart_conditions(&*self, &death)?;
        Ok(self.begin_next(death.karma, conditions, !death.karma.offers_rebirth()))
    }

    fn begin_next(
        &mut self,
        karma: KarmaTier,
        conditions: StartingConditions,
        restarted: bool,
    ) -> &LifeRecord {
        self.clock.next_generation();
        let generation = self.clock.generation;
        self.events.record(
            self.clock,
            vec![self.agent_id.clone()],
            EventDetails::Rebirth {
                generation,
                karma,
                conditions,
                restarted,
            },
        );
        info!(generation, karma = %karma, atp = conditions.atp, restarted, "new life");
        self.lineage
            .push(LifeRecord::begin(generation, self.clock.step, conditions));
        self.current()
    }

    fn anomaly(
        &mut self,
        timestamp: SimTimestamp,
        subject: &str,
        message: String,
        clamped_to: Option<f64>,
    ) {
        self.events.record(
            timestamp,
            vec![self.agent_id.clone()],
            EventDetails::Anomaly {
                subject: subject.to_string(),
                message,
                clamped_to,
            },
        );
    }

    pub fn into_result(self) -> LifeResult {
        LifeResult {
            config: self.config,
            lineage: self.lineage,
            ticks: self.ticks,
            events: self.events.into_events(),
            total_burned: self.total_burned,
        }
    }

    /// Serializes the session for external storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restores a stored session.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let session: Self = serde_json::from_str(json)?;
        if session.lineage.is_empty() {
            return Err(serde::de::Error::custom("session lineage is empty"));
        }
        Ok(session)
    }
}

/// Plays a scripted sequence of actions through a fresh session.
///
/// When a life ends, the next one starts automatically if the config allows
/// it, karma offers it, and the generation limit has not been reached;
/// otherwise the run stops and the remaining actions are ignored.
pub fn run_life<I, S>(config: LifeConfig, plan: I) -> Result<LifeResult, LifeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut session = LifeSession::new(config)?;
    for action in plan {
        if !session.is_alive() {
            let config = session.config();
            let continue_lineage = config.auto_rebirth
                && session.rebirth_offered()
                && session.generation() < config.max_generations;
            if !continue_lineage {
                break;
            }
            session.rebirth()?;
        }
        session.act(action.as_ref())?;
    }
    Ok(session.into_result())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_events::{EventType, LifeAction};

    fn config_with(actions: Vec<LifeAction>) -> LifeConfig {
        LifeConfig {
            actions,
            ..LifeConfig::default()
        }
    }

    #[test]
    fn test_new_session_starts_generation_one() {
        let session = LifeSession::new(LifeConfig::default()).unwrap();
        assert_eq!(session.generation(), 1);
        assert!(session.is_alive());
        assert_eq!(session.current().atp, 100.0);
        assert_eq!(session.current().consistency, 0.8);
        assert_eq!(session.lineage().len(), 1);
    }

    #[test]
    fn test_act_applies_cost_and_reward() {
        let mut session = LifeSession::new(LifeConfig::default()).unwrap();
        let outcome = session.act("contribute_quality").unwrap();
        // cost 5 at consistency 0.8 -> 5 / 0.64; reward 12 at quality 0.9
        assert!((outcome.snapshot.cost_paid - 7.8125).abs() < 1e-9);
        assert!(outcome.snapshot.reward_earned > 10.0);
        assert!(!outcome.died());
        assert_eq!(session.current().ticks, 1);
        assert_eq!(session.now().step, 1);
    }

    #[test]
    fn test_unknown_action() {
        let mut session = LifeSession::new(LifeConfig::default()).unwrap();
        assert!(matches!(session.act("fly"), Err(LifeError::UnknownAction(_))));
    }

    #[test]
    fn test_transfer_burns_fee() {
        let mut session = LifeSession::new(LifeConfig::default()).unwrap();
        let outcome = session.act("help_peer").unwrap();
        assert!((outcome.snapshot.fee_burned - 0.25).abs() < 1e-9);
        assert!((session.total_burned() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_exhaustion_death_and_rebirth() {
        let drain = LifeAction::new("drain", "Drain", 60.0).with_trust(0.1, 0.1, 0.1);
        let mut session = LifeSession::new(config_with(vec![drain])).unwrap();
        session.act("drain").unwrap();
        let outcome = session.act("drain").unwrap();
        let ending = outcome.ending.unwrap();
        assert_eq!(ending.cause, DeathCause::Exhaustion);
        assert!(!session.is_alive());
        assert!(matches!(session.act("drain"), Err(LifeError::Dead { generation: 1 })));

        assert!(session.rebirth_offered());
        let next = session.rebirth().unwrap().clone();
        assert_eq!(next.generation, 2);
        assert!(next.is_alive());
        assert_eq!(session.lineage().len(), 2);
        assert!(session.lineage()[0].ending.is_some());
        assert_eq!(session.events().of_type(EventType::Rebirth).count(), 1);
    }

    #[test]
    fn test_trust_collapse_is_distinguished() {
        let betray = LifeAction::new("betray", "Betray", 0.0)
            .with_trust(-0.5, -0.5, -0.5)
            .with_consistency(-0.5);
        let mut session = LifeSession::new(config_with(vec![betray])).unwrap();
        let outcome = session.act("betray").unwrap();
        let ending = outcome.ending.unwrap();
        assert_eq!(ending.cause, DeathCause::TrustCollapse);
        assert_eq!(ending.karma, KarmaTier::Constrained);

        let types: Vec<_> = session.events().events().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::TrustCollapse, EventType::Death]);

        assert!(!session.rebirth_offered());
        assert!(matches!(
            session.rebirth(),
            Err(LifeError::Lifecycle(LifecycleError::RebirthNotOffered { .. }))
        ));
        let restarted = session.restart().unwrap().clone();
        assert_eq!(restarted.conditions.atp, 80.0);
        assert_eq!(restarted.talent, 0.4);
    }

    #[test]
    fn test_rebirth_while_alive_fails() {
        let mut session = LifeSession::new(LifeConfig::default()).unwrap();
        assert!(matches!(
            session.rebirth(),
            Err(LifeError::Lifecycle(LifecycleError::StillAlive { .. }))
        ));
    }

    #[test]
    fn test_session_json_round_trip() {
        let mut session = LifeSession::new(LifeConfig::default()).unwrap();
        session.act("rest").unwrap();
        session.act("contribute_mediocre").unwrap();
        let json = session.to_json().unwrap();
        let mut restored = LifeSession::from_json(&json).unwrap();
        assert_eq!(restored, session);
        restored.act("rest").unwrap();
        assert_eq!(restored.now().step, 3);
    }

    #[test]
    fn test_run_life_stops_on_constrained_death() {
        let betray = LifeAction::new("betray", "Betray", 0.0).with_consistency(-0.9);
        let result = run_life(config_with(vec![betray]), ["betray", "betray", "betray"]).unwrap();
        assert_eq!(result.lineage.len(), 1);
        assert_eq!(result.ticks.len(), 1);
    }

    #[test]
    fn test_run_life_respects_generation_limit() {
        let drain = LifeAction::new("drain", "Drain", 200.0);
        let config = LifeConfig {
            max_generations: 2,
            initial: StartingConditions {
                trust: 0.9,
                atp: 100.0,
                ci: 1.0,
            },
            ..config_with(vec![drain])
        };
        let result = run_life(config, vec!["drain"; 5]).unwrap();
        assert_eq!(result.generations(), 2);
        assert_eq!(result.ticks.len(), 2);
    }

    #[test]
    fn test_restored_out_of_range_trust_is_clamped() {
        let session = LifeSession::new(LifeConfig::default()).unwrap();
        let mut stored: serde_json::Value = serde_json::from_str(&session.to_json().unwrap()).unwrap();
        stored["lineage"][0]["temperament"] = serde_json::json!(1.7);
        let mut restored = LifeSession::from_json(&stored.to_string()).unwrap();

        let outcome = restored.act("rest").unwrap();
        assert!(!outcome.died());
        assert_eq!(restored.current().temperament, 1.0);

        let anomalies: Vec<_> = restored.events().of_type(EventType::Anomaly).collect();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(
            anomalies[0].details,
            EventDetails::Anomaly {
                subject: "temperament".to_string(),
                message: "temperament was 1.7".to_string(),
                clamped_to: Some(1.0),
            }
        );
    }
}
