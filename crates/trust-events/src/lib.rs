//! Shared data types and serialization for the trust-economy simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for the engine crate and for anything that consumes
//! a run's output.

pub mod archetype;
pub mod config;
pub mod event;
pub mod karma;
pub mod life;
pub mod result;
pub mod snapshot;
pub mod timestamp;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

pub use archetype::{Archetype, UnknownArchetype};
pub use karma::{DeathCause, KarmaTier, StartingConditions};
pub use timestamp::{ParseTimestampError, SimTimestamp};

// Re-export configuration types
pub use config::{
    ArchetypeDistribution, ConfigError, EconomyTuning, LifeConfig, PopulationConfig, QualityRamp,
    RampPoint, Thresholds, TrustTuning,
};

// Re-export event types
pub use event::*;

pub use life::{LifeAction, LifeEnding, LifeRecord, LifeResult, TickSnapshot};
pub use result::{FinalMetrics, RunStatus, SimulationResult};

// Re-export snapshot types
pub use snapshot::{
    generate_snapshot_id, AgentSnapshot, CoalitionSnapshot, EpochSnapshot, PopulationMetrics,
};
