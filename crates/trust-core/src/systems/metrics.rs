//! Metrics Aggregator
//!
//! Population statistics for the epoch that just settled. Descriptive only:
//! nothing here feeds back into the rules.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use trust_events::PopulationMetrics;

use crate::components::agent::{AgentId, Behavior, LifeState, Wallet};
use crate::output::stats::{gini, StatsCollector};
use crate::trust::TrustProfile;

use super::interaction::EpochClock;
use super::settlement::EpochTally;
use super::structure::CoalitionRegistry;

/// Resource: metrics of the most recently settled epoch
#[derive(Resource, Debug, Clone, Default)]
pub struct CurrentMetrics(pub PopulationMetrics);

/// System: aggregate this epoch's population metrics
pub fn aggregate_metrics(
    clock: Res<EpochClock>,
    tally: Res<EpochTally>,
    registry: Res<CoalitionRegistry>,
    mut current: ResMut<CurrentMetrics>,
    mut stats: ResMut<StatsCollector>,
    query: Query<(&AgentId, &Behavior, &TrustProfile, &Wallet, &LifeState)>,
) {
    let mut archetype_counts = BTreeMap::new();
    let mut balances = Vec::new();
    let mut trust_sum = 0.0;

    for (_, behavior, profile, wallet, life) in query.iter() {
        let count = archetype_counts.entry(behavior.archetype).or_insert(0);
        if life.alive {
            *count += 1;
            balances.push(wallet.balance);
            trust_sum += profile.effective();
        }
    }
    let alive_count = balances.len();

    let metrics = PopulationMetrics {
        epoch: clock.epoch,
        alive_count,
        mean_trust: if alive_count == 0 { 0.0 } else { trust_sum / alive_count as f64 },
        cooperation_rate: tally.cooperation_rate(),
        gini: gini(&balances),
        coalition_count: registry.len(),
        largest_coalition: registry.largest(),
        archetype_counts,
        total_balance: balances.iter().sum(),
        interactions: tally.interactions,
        fees_burned: tally.fees_burned,
    };

    tracing::debug!(
        epoch = metrics.epoch,
        alive = metrics.alive_count,
        mean_trust = metrics.mean_trust,
        cooperation_rate = metrics.cooperation_rate,
        gini = metrics.gini,
        coalitions = metrics.coalition_count,
        "epoch settled"
    );
    stats.record(&metrics);
    current.0 = metrics;
}
