//! Sample data fixtures for testing.
//!
//! Ready-made test data for other crates. Enable the `test-fixtures`
//! feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // trust-events = { path = "../trust-events", features = ["test-fixtures"] }
//!
//! use trust_events::fixtures;
//!
//! let events = fixtures::sample_events();
//! let config = fixtures::six_four_config();
//! ```

use crate::{Archetype, ArchetypeDistribution, Event, EventType, PopulationConfig};

/// Returns sample events from the fixtures file.
///
/// Contains 8 events covering one coalition, a cooperation surge, an
/// isolated defector, a trust collapse with its death, an exhaustion death
/// followed by rebirth, and a stable society.
pub fn sample_events() -> Vec<Event> {
    let jsonl = include_str!("../tests/fixtures/sample_events.jsonl");
    jsonl
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            Event::from_jsonl(l)
                .unwrap_or_else(|e| panic!("Failed to parse event line: {}\nError: {}", l, e))
        })
        .collect()
}

/// Returns the sample population config (6 cooperative, 4 defecting, seed 7).
pub fn sample_config() -> PopulationConfig {
    let json = include_str!("../tests/fixtures/sample_config.json");
    serde_json::from_str(json).expect("Failed to parse sample_config.json")
}

/// Returns a specific event by ID from the sample events.
pub fn get_event(event_id: &str) -> Option<Event> {
    sample_events().into_iter().find(|e| e.event_id == event_id)
}

/// The 10-agent, 6 cooperative / 4 defecting, 50-epoch scenario with default seed.
pub fn six_four_config() -> PopulationConfig {
    PopulationConfig::with_archetypes(
        ArchetypeDistribution::empty()
            .with(Archetype::Cooperative, 6)
            .with(Archetype::Defecting, 4),
    )
}

/// A population with every archetype represented.
pub fn mixed_config(seed: u64, epochs: u64) -> PopulationConfig {
    PopulationConfig {
        seed,
        epochs,
        ..PopulationConfig::default()
    }
}

/// Sample events of one type.
pub fn events_of_type(event_type: EventType) -> Vec<Event> {
    sample_events()
        .into_iter()
        .filter(|e| e.event_type == event_type)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeathCause, EventDetails, KarmaTier};

    #[test]
    fn test_sample_events_load() {
        let events = sample_events();
        assert_eq!(events.len(), 8);
        for event in &events {
            assert_eq!(event.event_type, event.details.event_type());
            assert_eq!(event.significance, event.details.significance());
        }
    }

    #[test]
    fn test_sample_config_load() {
        let config = sample_config();
        assert_eq!(config.seed, 7);
        assert_eq!(config.archetypes.cooperative, 6);
        assert_eq!(config.thresholds.min_coalition_size, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_death_fixtures_distinguish_causes() {
        let deaths = events_of_type(EventType::Death);
        let causes: Vec<_> = deaths
            .iter()
            .filter_map(|e| match &e.details {
                EventDetails::Death { cause, karma, .. } => Some((*cause, *karma)),
                _ => None,
            })
            .collect();
        assert_eq!(
            causes,
            vec![
                (DeathCause::TrustCollapse, KarmaTier::Constrained),
                (DeathCause::Exhaustion, KarmaTier::Honored)
            ]
        );
    }

    #[test]
    fn test_get_specific_event() {
        let event = get_event("evt_00000007").unwrap();
        assert_eq!(event.event_type, EventType::Rebirth);
        assert!(event.involves("agent_002"));
        assert!(get_event("evt_99999999").is_none());
    }

    #[test]
    fn test_scenario_configs_are_valid() {
        assert!(six_four_config().validate().is_ok());
        assert!(mixed_config(3, 20).validate().is_ok());
    }
}
