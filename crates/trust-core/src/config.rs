//! Configuration Loading
//!
//! Loads run configuration from TOML so tuning can change without
//! recompiling. Every section is optional; missing values take their
//! documented defaults. Loaded configs are validated before they are
//! returned.
//!
//! ```toml
//! seed = 7
//! epochs = 80
//!
//! [archetypes]
//! cooperative = 6
//! defecting = 4
//! reciprocating = 0
//! cautious = 0
//! adaptive = 0
//!
//! [thresholds]
//! coalition_trust = 0.7
//! ```

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use trust_events::{LifeConfig, PopulationConfig};

use crate::error::SimError;

fn read(path: &Path) -> Result<String, SimError> {
    fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: DeserializeOwned>(content: &str) -> Result<T, SimError> {
    Ok(toml::from_str(content)?)
}

/// Parses and validates a population config from a TOML string.
pub fn from_toml_str(content: &str) -> Result<PopulationConfig, SimError> {
    let config: PopulationConfig = parse(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates a population config from a TOML file.
pub fn load(path: impl AsRef<Path>) -> Result<PopulationConfig, SimError> {
    from_toml_str(&read(path.as_ref())?)
}

/// Parses and validates an individual-layer config from a TOML string.
pub fn life_from_toml_str(content: &str) -> Result<LifeConfig, SimError> {
    let config: LifeConfig = parse(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates an individual-layer config from a TOML file.
pub fn load_life(path: impl AsRef<Path>) -> Result<LifeConfig, SimError> {
    life_from_toml_str(&read(path.as_ref())?)
}
