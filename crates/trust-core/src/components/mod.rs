//! ECS Components
//!
//! Entity components for agents and the shared relationship graph.

pub mod agent;
pub mod social;

pub use agent::*;
pub use social::*;
