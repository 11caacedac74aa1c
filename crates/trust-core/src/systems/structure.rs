//! Structural Analyzer
//!
//! Coalition tracking, defector isolation and society-level shifts
//! (cooperation surges and stability).

use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, VecDeque};
use trust_events::{CoalitionSnapshot, EventDetails};

use crate::coalition::detect_clusters;
use crate::components::agent::{AgentId, Behavior, LifeState, Membership, OfferHistory};
use crate::components::social::RelationshipGraph;
use crate::events::EventLog;

use super::interaction::{EpochClock, RunConfig};
use super::metrics::CurrentMetrics;
use super::scheduler::Pairings;

/// A coalition that currently exists
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCoalition {
    pub coalition_id: String,
    pub formed_at: u64,
    pub mean_trust: f64,
}

/// Resource: live coalitions keyed by their exact membership
#[derive(Resource, Debug, Default)]
pub struct CoalitionRegistry {
    active: BTreeMap<Vec<String>, ActiveCoalition>,
    next_id: u64,
    formed_total: usize,
}

impl CoalitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&mut self) -> String {
        self.next_id += 1;
        format!("coalition_{:04}", self.next_id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Coalitions formed over the whole run
    pub fn formed_total(&self) -> usize {
        self.formed_total
    }

    pub fn largest(&self) -> usize {
        self.active.keys().map(Vec::len).max().unwrap_or(0)
    }

    /// Live coalitions, ordered by membership.
    pub fn snapshots(&self) -> Vec<CoalitionSnapshot> {
        self.active
            .iter()
            .map(|(members, c)| CoalitionSnapshot {
                coalition_id: c.coalition_id.clone(),
                members: members.clone(),
                formed_at: c.formed_at,
                mean_trust: c.mean_trust,
            })
            .collect()
    }

    /// Coalition id of every member.
    pub fn assignments(&self) -> BTreeMap<String, String> {
        self.active
            .iter()
            .flat_map(|(members, c)| members.iter().map(move |m| (m.clone(), c.coalition_id.clone())))
            .collect()
    }
}

/// System: re-detect coalitions and record formations and dissolutions
pub fn update_coalitions(
    config: Res<RunConfig>,
    clock: Res<EpochClock>,
    graph: Res<RelationshipGraph>,
    mut registry: ResMut<CoalitionRegistry>,
    mut events: ResMut<EventLog>,
    mut query: Query<(&AgentId, &LifeState, &mut Membership)>,
) {
    let thresholds = &config.0.thresholds;
    let epoch = clock.epoch;

    let mut alive: Vec<String> = query
        .iter()
        .filter(|(_, life, _)| life.alive)
        .map(|(id, _, _)| id.0.clone())
        .collect();
    alive.sort();

    let clusters = detect_clusters(
        &alive,
        |a, b| {
            graph
                .interacted_recently(a, b, epoch, thresholds.coalition_recency_epochs)
                .then(|| graph.mutual_trust(a, b))
        },
        thresholds.coalition_trust,
        thresholds.min_coalition_size,
    );
    let current: BTreeMap<Vec<String>, f64> = clusters.into_iter().map(|c| (c.members, c.mean_trust)).collect();

    let dissolved: Vec<Vec<String>> = registry
        .active
        .keys()
        .filter(|members| !current.contains_key(*members))
        .cloned()
        .collect();
    for members in dissolved {
        if let Some(coalition) = registry.active.remove(&members) {
            events.record(
                clock.timestamp(),
                members.clone(),
                EventDetails::CoalitionDissolved {
                    coalition_id: coalition.coalition_id,
                    members,
                    lifetime_epochs: epoch.saturating_sub(coalition.formed_at),
                },
            );
        }
    }

    for (members, mean_trust) in current {
        if let Some(existing) = registry.active.get_mut(&members) {
            existing.mean_trust = mean_trust;
            continue;
        }
        let coalition_id = registry.generate_id();
        registry.formed_total += 1;
        tracing::debug!(coalition = %coalition_id, size = members.len(), epoch, "coalition formed");
        events.record(
            clock.timestamp(),
            members.clone(),
            EventDetails::CoalitionFormed {
                coalition_id: coalition_id.clone(),
                members: members.clone(),
                mean_trust,
            },
        );
        registry.active.insert(
            members,
            ActiveCoalition {
                coalition_id,
                formed_at: epoch,
                mean_trust,
            },
        );
    }

    let assignments = registry.assignments();
    for (id, _, mut membership) in query.iter_mut() {
        let coalition = assignments.get(&id.0).cloned();
        if membership.coalition != coalition {
            membership.coalition = coalition;
        }
    }
}

/// System: flag defection-leaning agents nobody wants to interact with
pub fn detect_isolation(
    config: Res<RunConfig>,
    clock: Res<EpochClock>,
    pairings: Res<Pairings>,
    mut events: ResMut<EventLog>,
    mut query: Query<(&AgentId, &Behavior, &LifeState, &mut OfferHistory)>,
) {
    let thresholds = &config.0.thresholds;
    let slots = config.0.interactions_per_agent;

    let mut agents: Vec<_> = query.iter_mut().filter(|(_, _, life, _)| life.alive).collect();
    agents.sort_by(|a, b| a.0.cmp(b.0));

    for (id, behavior, _, mut offers) in agents {
        offers.record(pairings.offers_to(&id.0));
        if !offers.is_full() {
            continue;
        }
        let rate = offers.rate(slots);
        if rate >= thresholds.isolation_rate {
            offers.isolated = false;
            continue;
        }
        let defection_rate = behavior.history.defection_rate();
        let leaning = behavior.archetype.is_defection_leaning()
            || (!behavior.history.is_empty() && defection_rate >= thresholds.isolation_defection_rate);
        if leaning && !offers.isolated {
            offers.isolated = true;
            tracing::debug!(agent = %id.0, rate, epoch = clock.epoch, "defector isolated");
            events.record(
                clock.timestamp(),
                vec![id.0.clone()],
                EventDetails::DefectorIsolated {
                    archetype: behavior.archetype,
                    incoming_rate: rate,
                    defection_rate,
                },
            );
        }
    }
}

/// Resource: recent society-level aggregates
#[derive(Resource, Debug, Default)]
pub struct SocietyTracker {
    /// (mean trust, cooperation rate) of the most recent epochs
    window: VecDeque<(f64, f64)>,
    previous_rate: Option<f64>,
    stable: bool,
}

impl SocietyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    fn spread(&self, pick: impl Fn(&(f64, f64)) -> f64) -> f64 {
        let values = self.window.iter().map(pick);
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        max - min
    }
}

/// System: detect cooperation surges and a society settling into stability
pub fn detect_society_shifts(
    config: Res<RunConfig>,
    clock: Res<EpochClock>,
    metrics: Res<CurrentMetrics>,
    mut tracker: ResMut<SocietyTracker>,
    mut events: ResMut<EventLog>,
) {
    let thresholds = &config.0.thresholds;
    let current = &metrics.0;

    if let Some(previous) = tracker.previous_rate {
        if current.cooperation_rate - previous >= thresholds.surge_delta {
            events.record(
                clock.timestamp(),
                Vec::new(),
                EventDetails::CooperationSurge {
                    previous_rate: previous,
                    current_rate: current.cooperation_rate,
                },
            );
        }
    }
    tracker.previous_rate = Some(current.cooperation_rate);

    let window = thresholds.stability_epochs.max(1);
    if tracker.window.len() == window {
        tracker.window.pop_front();
    }
    tracker.window.push_back((current.mean_trust, current.cooperation_rate));
    if tracker.window.len() < window {
        return;
    }

    let in_band = tracker.spread(|w| w.0) <= thresholds.stability_band
        && tracker.spread(|w| w.1) <= thresholds.stability_band;
    if in_band && !tracker.stable {
        tracker.stable = true;
        tracing::debug!(epoch = clock.epoch, mean_trust = current.mean_trust, "society stable");
        events.record(
            clock.timestamp(),
            Vec::new(),
            EventDetails::SocietyStable {
                mean_trust: current.mean_trust,
                cooperation_rate: current.cooperation_rate,
                epochs_in_band: window,
            },
        );
    } else if !in_band {
        tracker.stable = false;
    }
}
