//! Event recording

pub mod logger;

pub use logger::EventLog;
