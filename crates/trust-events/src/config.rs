//! Run Configuration
//!
//! Configuration records for population runs and single-life sessions.
//! These are part of the result contract: every `SimulationResult` carries the
//! exact configuration that produced it.
//!
//! All sections default sensibly so a partial TOML or JSON document is enough
//! to describe a run. Call `validate()` before using a configuration; the
//! engine refuses to start an epoch with an invalid one.

use serde::{Deserialize, Serialize};

use crate::archetype::Archetype;
use crate::karma::StartingConditions;
use crate::life::LifeAction;

/// Reasons a configuration is rejected before any step runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("archetype counts sum to {actual}, expected population size {expected}")]
    ArchetypeMismatch { expected: usize, actual: usize },

    #[error("population must contain at least one agent")]
    EmptyPopulation,

    #[error("initial balance must be non-negative, got {0}")]
    NegativeBalance(f64),

    #[error("fee rate must be in [0, 1), got {0}")]
    FeeOutOfRange(f64),

    #[error("{field} must be in [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("{field} must be a finite, non-negative number, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("{field} must be at least 1")]
    ZeroWindow { field: &'static str },

    #[error("invalid quality ramp: {0}")]
    InvalidRamp(String),

    #[error("life configuration defines no actions")]
    NoActions,

    #[error("duplicate action id: '{0}'")]
    DuplicateAction(String),
}

/// Number of agents of each archetype at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeDistribution {
    pub cooperative: usize,
    pub defecting: usize,
    pub reciprocating: usize,
    pub cautious: usize,
    pub adaptive: usize,
}

impl Default for ArchetypeDistribution {
    fn default() -> Self {
        Self {
            cooperative: 2,
            defecting: 2,
            reciprocating: 2,
            cautious: 2,
            adaptive: 2,
        }
    }
}

impl ArchetypeDistribution {
    /// Distribution with no agents at all.
    pub fn empty() -> Self {
        Self {
            cooperative: 0,
            defecting: 0,
            reciprocating: 0,
            cautious: 0,
            adaptive: 0,
        }
    }

    pub fn with(mut self, archetype: Archetype, count: usize) -> Self {
        match archetype {
            Archetype::Cooperative => self.cooperative = count,
            Archetype::Defecting => self.defecting = count,
            Archetype::Reciprocating => self.reciprocating = count,
            Archetype::Cautious => self.cautious = count,
            Archetype::Adaptive => self.adaptive = count,
        }
        self
    }

    pub fn count(&self, archetype: Archetype) -> usize {
        match archetype {
            Archetype::Cooperative => self.cooperative,
            Archetype::Defecting => self.defecting,
            Archetype::Reciprocating => self.reciprocating,
            Archetype::Cautious => self.cautious,
            Archetype::Adaptive => self.adaptive,
        }
    }

    pub fn total(&self) -> usize {
        Archetype::all().iter().map(|a| self.count(*a)).sum()
    }

    /// Expands the distribution into one archetype per agent, in canonical order.
    pub fn expand(&self) -> Vec<Archetype> {
        Archetype::all()
            .iter()
            .flat_map(|a| std::iter::repeat(*a).take(self.count(*a)))
            .collect()
    }
}

/// Coalition, isolation and stability thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Mutual pairwise trust an edge needs to hold a coalition together
    pub coalition_trust: f64,
    /// Smallest cluster reported as a coalition
    pub min_coalition_size: usize,
    /// Epochs since last interaction for an edge to still count
    pub coalition_recency_epochs: u64,
    /// Pairwise trust below which an agent refuses to interact
    pub shun_threshold: f64,
    /// Incoming-interaction rate below which an agent is isolated
    pub isolation_rate: f64,
    /// Epochs of offer history the isolation rate is measured over
    pub isolation_window: usize,
    /// Recent defection rate that marks a non-defecting archetype as defection-leaning
    pub isolation_defection_rate: f64,
    /// Reputation a cautious agent needs to see before cooperating
    pub cautious_reputation: f64,
    /// Effective trust below which an agent dies of trust collapse
    pub trust_collapse_floor: f64,
    /// Width of the band mean trust and cooperation must stay within
    pub stability_band: f64,
    /// Consecutive epochs inside the band before the society is stable
    pub stability_epochs: usize,
    /// Epoch-over-epoch rise in cooperation rate that counts as a surge
    pub surge_delta: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            coalition_trust: 0.65,
            min_coalition_size: 3,
            coalition_recency_epochs: 5,
            shun_threshold: 0.3,
            isolation_rate: 0.25,
            isolation_window: 5,
            isolation_defection_rate: 0.5,
            cautious_reputation: 0.4,
            trust_collapse_floor: 0.1,
            stability_band: 0.02,
            stability_epochs: 5,
            surge_delta: 0.2,
        }
    }
}

/// One calibration point of the quality ramp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampPoint {
    /// Contribution quality in [0, 1]
    pub quality: f64,
    /// Fraction of the full reward paid at that quality
    pub fraction: f64,
}

impl RampPoint {
    pub const fn new(quality: f64, fraction: f64) -> Self {
        Self { quality, fraction }
    }
}

/// Piecewise-linear reward ramp over contribution quality.
///
/// Quality below the first point pays nothing; above the last point pays the
/// last point's fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRamp {
    pub points: Vec<RampPoint>,
}

impl Default for QualityRamp {
    fn default() -> Self {
        Self {
            points: vec![
                RampPoint::new(0.3, 0.0),
                RampPoint::new(0.7, 0.6),
                RampPoint::new(0.85, 0.84),
                RampPoint::new(1.0, 1.0),
            ],
        }
    }
}

impl QualityRamp {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.points.is_empty() {
            return Err(ConfigError::InvalidRamp("no calibration points".to_string()));
        }
        for point in &self.points {
            if !(0.0..=1.0).contains(&point.quality) || !(0.0..=1.0).contains(&point.fraction) {
                return Err(ConfigError::InvalidRamp(format!(
                    "point ({}, {}) outside the unit square",
                    point.quality, point.fraction
                )));
            }
        }
        for pair in self.points.windows(2) {
            if pair[1].quality <= pair[0].quality {
                return Err(ConfigError::InvalidRamp(
                    "quality values must be strictly increasing".to_string(),
                ));
            }
            if pair[1].fraction < pair[0].fraction {
                return Err(ConfigError::InvalidRamp(
                    "reward fractions must not decrease".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Resource costs and rewards of the population interaction game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyTuning {
    /// Base cost each side pays per interaction (scaled by the consistency multiplier)
    pub interaction_cost: f64,
    /// Amount a cooperating agent transfers to its partner
    pub stake: f64,
    /// Full reward minted to each side on mutual cooperation
    pub mutual_reward: f64,
    /// Base cost every living agent pays per epoch
    pub epoch_upkeep: f64,
    pub quality_ramp: QualityRamp,
}

impl Default for EconomyTuning {
    fn default() -> Self {
        Self {
            interaction_cost: 0.5,
            stake: 4.0,
            mutual_reward: 5.0,
            epoch_upkeep: 1.0,
            quality_ramp: QualityRamp::default(),
        }
    }
}

/// How interaction outcomes move trust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustTuning {
    /// Temperament gained per cooperative move
    pub cooperate_temperament: f64,
    /// Temperament lost per defection
    pub defect_temperament: f64,
    /// Talent gained per mutual cooperation
    pub mutual_talent: f64,
    /// Training gained per interaction of any kind
    pub interaction_training: f64,
    /// Consistency lost per switch between cooperating and defecting
    pub erratic_penalty: f64,
    /// Consistency regained in an epoch without switches
    pub steady_recovery: f64,
    /// Weight of the newest outcome in pairwise trust smoothing
    pub pairwise_smoothing: f64,
}

impl Default for TrustTuning {
    fn default() -> Self {
        Self {
            cooperate_temperament: 0.02,
            defect_temperament: 0.05,
            mutual_talent: 0.01,
            interaction_training: 0.005,
            erratic_penalty: 0.08,
            steady_recovery: 0.02,
            pairwise_smoothing: 0.3,
        }
    }
}

/// Configuration of one population run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Seed for pairing and sampling
    pub seed: u64,
    pub population_size: usize,
    pub archetypes: ArchetypeDistribution,
    pub initial_balance: f64,
    /// Starting value of every trust sub-dimension
    pub initial_trust: f64,
    pub initial_consistency: f64,
    /// Burn fee on value transfers
    pub fee_rate: f64,
    pub epochs: u64,
    /// Partners each agent proposes to per epoch
    pub interactions_per_agent: usize,
    /// Length of each agent's recent-outcome window
    pub outcome_window: usize,
    /// Whether honored/neutral agents are reborn after dying
    pub allow_rebirth: bool,
    pub thresholds: Thresholds,
    pub economy: EconomyTuning,
    pub trust: TrustTuning,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population_size: 10,
            archetypes: ArchetypeDistribution::default(),
            initial_balance: 100.0,
            initial_trust: 0.5,
            initial_consistency: 0.8,
            fee_rate: 0.05,
            epochs: 50,
            interactions_per_agent: 2,
            outcome_window: 8,
            allow_rebirth: true,
            thresholds: Thresholds::default(),
            economy: EconomyTuning::default(),
            trust: TrustTuning::default(),
        }
    }
}

fn unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { field, value })
    }
}

fn amount(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidAmount { field, value })
    }
}

fn fee(value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::FeeOutOfRange(value))
    }
}

impl PopulationConfig {
    /// Builds a config for the given archetype distribution, sizing the
    /// population to match.
    pub fn with_archetypes(archetypes: ArchetypeDistribution) -> Self {
        Self {
            population_size: archetypes.total(),
            archetypes,
            ..Self::default()
        }
    }

    /// Checks every constraint a run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        let actual = self.archetypes.total();
        if actual != self.population_size {
            return Err(ConfigError::ArchetypeMismatch {
                expected: self.population_size,
                actual,
            });
        }
        if self.initial_balance.is_nan() || self.initial_balance < 0.0 {
            return Err(ConfigError::NegativeBalance(self.initial_balance));
        }
        amount("initial_balance", self.initial_balance)?;
        fee(self.fee_rate)?;
        unit("initial_trust", self.initial_trust)?;
        unit("initial_consistency", self.initial_consistency)?;
        if self.outcome_window == 0 {
            return Err(ConfigError::ZeroWindow { field: "outcome_window" });
        }

        let t = &self.thresholds;
        unit("thresholds.coalition_trust", t.coalition_trust)?;
        unit("thresholds.shun_threshold", t.shun_threshold)?;
        unit("thresholds.isolation_rate", t.isolation_rate)?;
        unit("thresholds.isolation_defection_rate", t.isolation_defection_rate)?;
        unit("thresholds.cautious_reputation", t.cautious_reputation)?;
        unit("thresholds.trust_collapse_floor", t.trust_collapse_floor)?;
        unit("thresholds.stability_band", t.stability_band)?;
        unit("thresholds.surge_delta", t.surge_delta)?;
        if t.min_coalition_size < 2 {
            return Err(ConfigError::ZeroWindow { field: "thresholds.min_coalition_size" });
        }
        if t.isolation_window == 0 {
            return Err(ConfigError::ZeroWindow { field: "thresholds.isolation_window" });
        }
        if t.stability_epochs == 0 {
            return Err(ConfigError::ZeroWindow { field: "thresholds.stability_epochs" });
        }
        if t.coalition_recency_epochs == 0 {
            return Err(ConfigError::ZeroWindow { field: "thresholds.coalition_recency_epochs" });
        }

        let e = &self.economy;
        amount("economy.interaction_cost", e.interaction_cost)?;
        amount("economy.stake", e.stake)?;
        amount("economy.mutual_reward", e.mutual_reward)?;
        amount("economy.epoch_upkeep", e.epoch_upkeep)?;
        e.quality_ramp.validate()?;

        let tr = &self.trust;
        unit("trust.cooperate_temperament", tr.cooperate_temperament)?;
        unit("trust.defect_temperament", tr.defect_temperament)?;
        unit("trust.mutual_talent", tr.mutual_talent)?;
        unit("trust.interaction_training", tr.interaction_training)?;
        unit("trust.erratic_penalty", tr.erratic_penalty)?;
        unit("trust.steady_recovery", tr.steady_recovery)?;
        unit("trust.pairwise_smoothing", tr.pairwise_smoothing)?;
        Ok(())
    }
}

/// Configuration of a single-agent, multi-life session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    /// Conditions of the very first life
    pub initial: StartingConditions,
    pub fee_rate: f64,
    pub trust_collapse_floor: f64,
    pub quality_ramp: QualityRamp,
    /// Scripted runs accept rebirth offers automatically
    pub auto_rebirth: bool,
    /// Scripted runs stop after this many lives
    pub max_generations: u32,
    pub actions: Vec<LifeAction>,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            initial: StartingConditions {
                trust: 0.5,
                atp: 100.0,
                ci: 0.8,
            },
            fee_rate: 0.05,
            trust_collapse_floor: 0.1,
            quality_ramp: QualityRamp::default(),
            auto_rebirth: true,
            max_generations: 10,
            actions: LifeAction::catalogue(),
        }
    }
}

impl LifeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit("initial.trust", self.initial.trust)?;
        unit("initial.ci", self.initial.ci)?;
        if self.initial.atp.is_nan() || self.initial.atp < 0.0 {
            return Err(ConfigError::NegativeBalance(self.initial.atp));
        }
        amount("initial.atp", self.initial.atp)?;
        fee(self.fee_rate)?;
        unit("trust_collapse_floor", self.trust_collapse_floor)?;
        self.quality_ramp.validate()?;
        if self.max_generations == 0 {
            return Err(ConfigError::ZeroWindow { field: "max_generations" });
        }
        if self.actions.is_empty() {
            return Err(ConfigError::NoActions);
        }
        let mut seen = std::collections::BTreeSet::new();
        for action in &self.actions {
            if !seen.insert(action.id.as_str()) {
                return Err(ConfigError::DuplicateAction(action.id.clone()));
            }
            action.validate()?;
        }
        Ok(())
    }

    pub fn action(&self, id: &str) -> Option<&LifeAction> {
        self.actions.iter().find(|a| a.id == id)
    }
}
