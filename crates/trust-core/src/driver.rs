//! Simulation Driver
//!
//! Builds the ECS world for a population run and advances it one epoch at a
//! time. Each epoch runs an interaction phase that only fills the pending
//! ledger, then a settlement phase that applies it. Cancellation is checked
//! between the phases, so an aborted epoch never leaves partial deltas
//! behind.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trust_events::{
    Archetype, ConfigError, EpochSnapshot, EventType, FinalMetrics, PopulationConfig, RunStatus,
    SimulationResult,
};

use crate::components::agent::{AgentBundle, AgentId, Behavior, LifeState, Wallet};
use crate::components::social::RelationshipGraph;
use crate::events::EventLog;
use crate::output::{capture_snapshot, SnapshotRecorder, StatsCollector};
use crate::systems::{
    aggregate_metrics, apply_settlement, check_deaths, detect_isolation, detect_society_shifts,
    process_rebirths, resolve_interactions, schedule_pairings, update_coalitions, CoalitionRegistry,
    CurrentMetrics, EpochClock, EpochLedger, EpochTally, Pairings, RunConfig, SocietyTracker,
};
use crate::SimRng;

/// Shared flag that cancels a run at the next phase boundary
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one call to [`Simulation::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The epoch settled and was snapshotted
    Settled { epoch: u64 },
    /// Every configured epoch has settled
    Finished,
    /// The run was cancelled; `at_epoch` never settled
    Aborted { at_epoch: u64 },
}

/// A population run in progress
pub struct Simulation {
    world: World,
    interaction: Schedule,
    settlement: Schedule,
    config: PopulationConfig,
    next_epoch: u64,
    abort: AbortHandle,
    status: Option<RunStatus>,
}

impl Simulation {
    /// Validates the config and spawns the initial population.
    pub fn new(config: PopulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut world = World::new();
        for (index, archetype) in config.archetypes.expand().into_iter().enumerate() {
            world.spawn(AgentBundle::new(index, archetype, &config));
        }

        world.insert_resource(RunConfig(config.clone()));
        world.insert_resource(EpochClock::default());
        world.insert_resource(SimRng(SmallRng::seed_from_u64(config.seed)));
        world.insert_resource(RelationshipGraph::new());
        world.insert_resource(Pairings::new());
        world.insert_resource(EpochLedger::new());
        world.insert_resource(EpochTally::default());
        world.insert_resource(EventLog::new());
        world.insert_resource(CoalitionRegistry::new());
        world.insert_resource(SocietyTracker::new());
        world.insert_resource(CurrentMetrics::default());
        world.insert_resource(StatsCollector::new());
        world.insert_resource(SnapshotRecorder::new());

        let mut interaction = Schedule::default();
        interaction.set_executor_kind(ExecutorKind::SingleThreaded);
        interaction.add_systems((schedule_pairings, resolve_interactions).chain());

        let mut settlement = Schedule::default();
        settlement.set_executor_kind(ExecutorKind::SingleThreaded);
        settlement.add_systems(
            (
                apply_settlement,
                process_rebirths,
                check_deaths,
                update_coalitions,
                detect_isolation,
                aggregate_metrics,
                detect_society_shifts,
                capture_snapshot,
            )
                .chain(),
        );

        tracing::info!(
            seed = config.seed,
            population = config.population_size,
            epochs = config.epochs,
            fee_rate = config.fee_rate,
            "starting population run"
        );

        Ok(Self {
            world,
            interaction,
            settlement,
            config,
            next_epoch: 0,
            abort: AbortHandle::new(),
            status: None,
        })
    }

    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Handle that cancels this run from elsewhere
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Epochs settled so far
    pub fn epochs_completed(&self) -> u64 {
        self.next_epoch
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }

    pub fn latest_snapshot(&self) -> Option<&EpochSnapshot> {
        self.world.resource::<SnapshotRecorder>().latest()
    }

    pub fn events(&self) -> &EventLog {
        self.world.resource::<EventLog>()
    }

    /// Runs one full epoch.
    pub fn step(&mut self) -> StepOutcome {
        if let Some(outcome) = self.interact() {
            return outcome;
        }
        self.settle()
    }

    /// Interaction phase. Returns early when there is nothing left to run.
    fn interact(&mut self) -> Option<StepOutcome> {
        match self.status {
            Some(RunStatus::Completed) => return Some(StepOutcome::Finished),
            Some(RunStatus::Aborted { at_epoch }) => return Some(StepOutcome::Aborted { at_epoch }),
            None => {}
        }
        if self.next_epoch >= self.config.epochs {
            self.status = Some(RunStatus::Completed);
            return Some(StepOutcome::Finished);
        }
        if self.abort.is_aborted() {
            return Some(self.discard());
        }
        self.world.resource_mut::<EpochClock>().epoch = self.next_epoch;
        self.interaction.run(&mut self.world);
        None
    }

    /// Settlement phase, unless the run was cancelled mid-epoch.
    fn settle(&mut self) -> StepOutcome {
        if self.abort.is_aborted() {
            return self.discard();
        }
        let epoch = self.next_epoch;
        self.settlement.run(&mut self.world);
        self.next_epoch += 1;
        StepOutcome::Settled { epoch }
    }

    /// Drops the in-flight epoch and marks the run aborted.
    fn discard(&mut self) -> StepOutcome {
        let at_epoch = self.next_epoch;
        let pending = self.world.resource::<EpochLedger>().len();
        self.world.resource_mut::<EpochLedger>().clear();
        self.world.resource_mut::<Pairings>().clear();
        self.status = Some(RunStatus::Aborted { at_epoch });
        tracing::info!(at_epoch, discarded = pending, "run aborted");
        StepOutcome::Aborted { at_epoch }
    }

    /// Steps until the run finishes or is aborted.
    pub fn run_to_end(mut self) -> SimulationResult {
        while let StepOutcome::Settled { .. } = self.step() {}
        self.finish()
    }

    /// Assembles the result. A run finished early without an abort is
    /// reported as aborted at the next unsettled epoch.
    pub fn finish(mut self) -> SimulationResult {
        let status = match self.status {
            Some(status) => status,
            None if self.next_epoch >= self.config.epochs => RunStatus::Completed,
            None => RunStatus::Aborted {
                at_epoch: self.next_epoch,
            },
        };

        let mut agents: Vec<(String, Archetype, f64)> = {
            let mut query = self.world.query::<(&AgentId, &Behavior, &Wallet, &LifeState)>();
            query
                .iter(&self.world)
                .map(|(id, behavior, wallet, life)| {
                    let balance = if life.alive { wallet.balance } else { 0.0 };
                    (id.0.clone(), behavior.archetype, balance)
                })
                .collect()
        };
        agents.sort_by(|a, b| a.0.cmp(&b.0));

        let mut totals: BTreeMap<Archetype, (f64, usize)> = BTreeMap::new();
        for (_, archetype, balance) in &agents {
            let entry = totals.entry(*archetype).or_insert((0.0, 0));
            entry.0 += balance;
            entry.1 += 1;
        }
        let mean_final_balance = totals
            .into_iter()
            .map(|(archetype, (sum, count))| (archetype, sum / count as f64))
            .collect();

        let snapshots = self.world.resource_mut::<SnapshotRecorder>().take();
        let events = self
            .world
            .remove_resource::<EventLog>()
            .map(EventLog::into_events)
            .unwrap_or_default();
        let stats = self.world.resource::<StatsCollector>();
        let registry = self.world.resource::<CoalitionRegistry>();

        let count = |event_type: EventType| events.iter().filter(|e| e.event_type == event_type).count();
        let isolated_agents: Vec<String> = events
            .iter()
            .filter(|e| e.event_type == EventType::DefectorIsolated)
            .flat_map(|e| e.agents.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let final_metrics = FinalMetrics {
            epochs_completed: snapshots.len() as u64,
            final_metrics: stats.latest().cloned().unwrap_or_default(),
            mean_final_balance,
            total_deaths: count(EventType::Death),
            total_rebirths: count(EventType::Rebirth),
            coalitions_formed: registry.formed_total(),
            isolated_agents,
            total_burned: stats.total_burned,
        };

        tracing::info!(
            status = ?status,
            epochs = final_metrics.epochs_completed,
            events = events.len(),
            deaths = final_metrics.total_deaths,
            "population run finished"
        );

        SimulationResult {
            config: self.config,
            snapshots,
            events,
            final_metrics,
            status,
        }
    }
}

/// Runs a population simulation to completion.
pub fn run(config: PopulationConfig) -> Result<SimulationResult, ConfigError> {
    Ok(Simulation::new(config)?.run_to_end())
}

/// Runs until `stop` returns true for a settled epoch's snapshot, then
/// aborts before the next epoch starts.
pub fn run_until<F>(config: PopulationConfig, mut stop: F) -> Result<SimulationResult, ConfigError>
where
    F: FnMut(&EpochSnapshot) -> bool,
{
    let mut sim = Simulation::new(config)?;
    let handle = sim.abort_handle();
    while let StepOutcome::Settled { .. } = sim.step() {
        if sim.latest_snapshot().map_or(false, &mut stop) {
            handle.abort();
        }
    }
    Ok(sim.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_events::ArchetypeDistribution;

    fn small_config(epochs: u64) -> PopulationConfig {
        PopulationConfig {
            population_size: 4,
            epochs,
            archetypes: ArchetypeDistribution::empty()
                .with(Archetype::Cooperative, 2)
                .with(Archetype::Defecting, 2),
            ..PopulationConfig::default()
        }
    }

    fn balances(sim: &mut Simulation) -> Vec<f64> {
        let mut query = sim.world.query::<(&AgentId, &Wallet)>();
        let mut all: Vec<_> = query.iter(&sim.world).map(|(id, w)| (id.0.clone(), w.balance)).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all.into_iter().map(|(_, b)| b).collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PopulationConfig {
            population_size: 0,
            archetypes: ArchetypeDistribution::empty(),
            ..PopulationConfig::default()
        };
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn test_step_until_finished() {
        let mut sim = Simulation::new(small_config(3)).unwrap();
        assert_eq!(sim.step(), StepOutcome::Settled { epoch: 0 });
        assert_eq!(sim.step(), StepOutcome::Settled { epoch: 1 });
        assert_eq!(sim.step(), StepOutcome::Settled { epoch: 2 });
        assert_eq!(sim.step(), StepOutcome::Finished);
        assert_eq!(sim.step(), StepOutcome::Finished);
        let result = sim.finish();
        assert!(result.is_complete());
        assert_eq!(result.snapshots.len(), 3);
        assert_eq!(result.final_metrics.epochs_completed, 3);
    }

    #[test]
    fn test_abort_between_phases_discards_epoch() {
        let mut sim = Simulation::new(small_config(5)).unwrap();
        sim.step();
        let settled = balances(&mut sim);

        assert!(sim.interact().is_none());
        assert!(!sim.world.resource::<EpochLedger>().is_empty());
        sim.abort_handle().abort();
        assert_eq!(sim.settle(), StepOutcome::Aborted { at_epoch: 1 });

        assert!(sim.world.resource::<EpochLedger>().is_empty());
        assert_eq!(balances(&mut sim), settled);
        assert_eq!(sim.step(), StepOutcome::Aborted { at_epoch: 1 });

        let result = sim.finish();
        assert_eq!(result.status, RunStatus::Aborted { at_epoch: 1 });
        assert_eq!(result.snapshots.len(), 1);
    }

    #[test]
    fn test_zero_epochs_completes_empty() {
        let result = run(small_config(0)).unwrap();
        assert!(result.is_complete());
        assert!(result.snapshots.is_empty());
        assert_eq!(result.final_metrics.mean_final_balance[&Archetype::Cooperative], 100.0);
    }

    #[test]
    fn test_run_until_stops_after_predicate() {
        let result = run_until(small_config(10), |snapshot| snapshot.epoch == 2).unwrap();
        assert_eq!(result.status, RunStatus::Aborted { at_epoch: 3 });
        assert_eq!(result.snapshots.len(), 3);
        assert_eq!(result.snapshots.last().map(|s| s.epoch), Some(2));
    }
}
