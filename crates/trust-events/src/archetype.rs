//! Behavioral Archetypes
//!
//! The closed set of behaviors an agent can be born with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Behavioral archetype of a population agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Always cooperates.
    Cooperative,
    /// Always defects.
    Defecting,
    /// Mirrors the opponent's last move toward it.
    Reciprocating,
    /// Defects until the opponent's reputation clears a threshold.
    Cautious,
    /// Plays whichever move has paid better recently.
    Adaptive,
}

impl Archetype {
    /// Returns all archetype variants in canonical order.
    pub fn all() -> &'static [Archetype] {
        &[
            Archetype::Cooperative,
            Archetype::Defecting,
            Archetype::Reciprocating,
            Archetype::Cautious,
            Archetype::Adaptive,
        ]
    }

    /// Whether the archetype leans toward defection by construction.
    pub fn is_defection_leaning(&self) -> bool {
        matches!(self, Archetype::Defecting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Cooperative => "cooperative",
            Archetype::Defecting => "defecting",
            Archetype::Reciprocating => "reciprocating",
            Archetype::Cautious => "cautious",
            Archetype::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an archetype name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown archetype: '{0}'")]
pub struct UnknownArchetype(pub String);

impl FromStr for Archetype {
    type Err = UnknownArchetype;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cooperative" => Ok(Archetype::Cooperative),
            "defecting" => Ok(Archetype::Defecting),
            "reciprocating" => Ok(Archetype::Reciprocating),
            "cautious" => Ok(Archetype::Cautious),
            "adaptive" => Ok(Archetype::Adaptive),
            _ => Err(UnknownArchetype(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archetype_serialization() {
        assert_eq!(serde_json::to_string(&Archetype::Cooperative).unwrap(), r#""cooperative""#);
        assert_eq!(serde_json::to_string(&Archetype::Reciprocating).unwrap(), r#""reciprocating""#);
        assert_eq!(
            serde_json::from_str::<Archetype>(r#""adaptive""#).unwrap(),
            Archetype::Adaptive
        );
    }

    #[test]
    fn test_archetype_parse() {
        assert_eq!("Cautious".parse::<Archetype>().unwrap(), Archetype::Cautious);
        assert_eq!("DEFECTING".parse::<Archetype>().unwrap(), Archetype::Defecting);
        assert!("saboteur".parse::<Archetype>().is_err());
    }

    #[test]
    fn test_only_defecting_leans_toward_defection() {
        let leaning: Vec<_> = Archetype::all()
            .iter()
            .filter(|a| a.is_defection_leaning())
            .collect();
        assert_eq!(leaning, vec![&Archetype::Defecting]);
    }
}
