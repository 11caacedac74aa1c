//! Trust-Economy Simulation Engine
//!
//! Scores trust, settles resources, decides moves and manages life cycles
//! for two layers of the same model: a single agent acting tick by tick
//! ([`LifeSession`]) and a population interacting epoch by epoch
//! ([`Simulation`], built on `bevy_ecs`).

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod coalition;
pub mod components;
pub mod config;
pub mod driver;
pub mod economy;
pub mod error;
pub mod events;
pub mod life;
pub mod lifecycle;
pub mod output;
pub mod strategy;
pub mod systems;
pub mod trust;

pub use components::*;
pub use driver::{run, run_until, AbortHandle, Simulation, StepOutcome};
pub use error::SimError;
pub use life::{run_life, LifeError, LifeSession};
pub use lifecycle::LifecycleError;
pub use strategy::{Decision, Strategy};
pub use trust::{composite_score, effective_score, karma_tier, starting_conditions, TrustProfile};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
