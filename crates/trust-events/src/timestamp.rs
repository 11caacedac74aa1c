//! Simulation Timestamp Types
//!
//! A point in simulation time: which generation (life) and which step
//! (tick for the individual layer, epoch for the population layer).
//!
//! # Example
//!
//! ```
//! use trust_events::SimTimestamp;
//!
//! let ts = SimTimestamp::new(2, 15);
//! assert_eq!(ts.step, 15);
//! assert_eq!(ts.to_string(), "gen_2.step_15");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Point in simulation time.
///
/// Serializes to strings like "gen_1.step_42".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTimestamp {
    /// Life generation; population runs use 0.
    pub generation: u32,
    /// Tick or epoch index.
    pub step: u64,
}

impl SimTimestamp {
    /// Creates a new SimTimestamp.
    pub fn new(generation: u32, step: u64) -> Self {
        Self { generation, step }
    }

    /// Timestamp for a population epoch.
    pub fn epoch(epoch: u64) -> Self {
        Self {
            generation: 0,
            step: epoch,
        }
    }

    /// Creates a timestamp for the start of the simulation.
    pub fn start() -> Self {
        Self {
            generation: 1,
            step: 0,
        }
    }

    /// Increments the step counter by one.
    pub fn advance_step(&mut self) {
        self.step += 1;
    }

    /// Moves to the next generation. Steps keep counting across lives.
    pub fn next_generation(&mut self) {
        self.generation += 1;
    }
}

impl fmt::Display for SimTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen_{}.step_{}", self.generation, self.step)
    }
}

/// Error type for parsing SimTimestamp from strings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseTimestampError {
    #[error("invalid timestamp format: '{0}', expected 'gen_N.step_M'")]
    InvalidFormat(String),
    #[error("invalid generation: '{0}'")]
    InvalidGeneration(String),
    #[error("invalid step: '{0}'")]
    InvalidStep(String),
}

impl FromStr for SimTimestamp {
    type Err = ParseTimestampError;

    /// Parses a SimTimestamp from a string like "gen_3.step_12".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (gen_part, step_part) = s
            .split_once('.')
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?;

        let generation = gen_part
            .strip_prefix("gen_")
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?
            .parse::<u32>()
            .map_err(|_| ParseTimestampError::InvalidGeneration(gen_part.to_string()))?;

        let step = step_part
            .strip_prefix("step_")
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?
            .parse::<u64>()
            .map_err(|_| ParseTimestampError::InvalidStep(step_part.to_string()))?;

        Ok(SimTimestamp { generation, step })
    }
}

impl Serialize for SimTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_display() {
        assert_eq!(SimTimestamp::new(3, 12).to_string(), "gen_3.step_12");
        assert_eq!(SimTimestamp::epoch(7).to_string(), "gen_0.step_7");
    }

    #[test]
    fn test_timestamp_parse() {
        let ts: SimTimestamp = "gen_3.step_12".parse().unwrap();
        assert_eq!(ts.generation, 3);
        assert_eq!(ts.step, 12);
    }

    #[test]
    fn test_parse_timestamp_error() {
        assert!("invalid".parse::<SimTimestamp>().is_err());
        assert!("gen_one.step_1".parse::<SimTimestamp>().is_err());
        assert!("gen_1.tick_1".parse::<SimTimestamp>().is_err());
        assert!("gen_1.step_x".parse::<SimTimestamp>().is_err());
    }

    #[test]
    fn test_timestamp_serializes_as_string() {
        let ts = SimTimestamp::new(1, 42);
        assert_eq!(serde_json::to_string(&ts).unwrap(), r#""gen_1.step_42""#);
        let parsed: SimTimestamp = serde_json::from_str(r#""gen_1.step_42""#).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_advance_and_next_generation() {
        let mut ts = SimTimestamp::start();
        ts.advance_step();
        ts.advance_step();
        ts.next_generation();
        assert_eq!(ts, SimTimestamp::new(2, 2));
    }

    #[test]
    fn test_ordering_is_generation_then_step() {
        assert!(SimTimestamp::new(1, 99) < SimTimestamp::new(2, 0));
        assert!(SimTimestamp::new(2, 1) < SimTimestamp::new(2, 5));
    }
}
