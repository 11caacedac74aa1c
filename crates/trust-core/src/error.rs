//! Error Types
//!
//! Errors surfaced by the engine crate. Configuration problems come from
//! `trust_events::ConfigError`; everything here wraps or adds to it.

use std::path::PathBuf;

use trust_events::ConfigError;

/// Errors from loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
