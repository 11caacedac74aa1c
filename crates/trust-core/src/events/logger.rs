//! Event Logger
//!
//! Append-only, in-memory event log with sequential event ids.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use trust_events::{generate_event_id, Event, EventDetails, EventType, SimTimestamp};

/// Resource holding every event recorded during a run
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
    next_event_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_event_id: 1,
        }
    }

    /// Generate the next event ID
    pub fn next_id(&mut self) -> String {
        // A deserialized or defaulted log starts counting at 1 as well
        let sequence = self.next_event_id.max(1);
        self.next_event_id = sequence + 1;
        generate_event_id(sequence)
    }

    /// Get the current event count
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Builds an event with the next id and appends it.
    pub fn record(
        &mut self,
        timestamp: SimTimestamp,
        agents: Vec<String>,
        details: EventDetails,
    ) -> &Event {
        let event = Event::new(self.next_id(), timestamp, agents, details);
        self.log(event)
    }

    /// Appends an already built event.
    pub fn log(&mut self, event: Event) -> &Event {
        self.events.push(event);
        let last = self.events.len() - 1;
        &self.events[last]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn of_type(&self, event_type: EventType) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}
