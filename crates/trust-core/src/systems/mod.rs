//! ECS Systems
//!
//! An epoch runs in two phases. The interaction phase schedules pairs and
//! decides moves into a pending ledger; the settlement phase applies the
//! ledger, then runs life-cycle, structure, metrics and snapshot systems.

pub mod interaction;
pub mod lifecycle;
pub mod metrics;
pub mod scheduler;
pub mod settlement;
pub mod structure;

pub use interaction::{resolve_interactions, EpochClock, EpochLedger, InteractionRecord, RunConfig};
pub use lifecycle::{check_deaths, process_rebirths};
pub use metrics::{aggregate_metrics, CurrentMetrics};
pub use scheduler::{sample_partners, schedule_pairings, Pairings};
pub use settlement::{apply_settlement, consistency_delta, count_switches, EpochTally};
pub use structure::{
    detect_isolation, detect_society_shifts, update_coalitions, ActiveCoalition, CoalitionRegistry,
    SocietyTracker,
};
