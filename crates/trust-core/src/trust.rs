//! Trust and Karma Scoring
//!
//! Composite trust from three sub-dimensions, the consistency-scaled
//! effective score, the karma tier assigned at death, and the starting
//! conditions a tier hands to the next life.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use trust_events::{KarmaTier, StartingConditions};

pub const TALENT_WEIGHT: f64 = 0.3;
pub const TRAINING_WEIGHT: f64 = 0.3;
pub const TEMPERAMENT_WEIGHT: f64 = 0.4;

/// Effective score strictly above this is honored
pub const HONORED_ABOVE: f64 = 0.7;
/// Effective score strictly below this is constrained
pub const CONSTRAINED_BELOW: f64 = 0.3;

/// Clamps to [0, 1]; NaN becomes 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Weighted mean of the three sub-dimensions, each clamped to [0, 1].
pub fn composite_score(talent: f64, training: f64, temperament: f64) -> f64 {
    let score = TALENT_WEIGHT * clamp_unit(talent)
        + TRAINING_WEIGHT * clamp_unit(training)
        + TEMPERAMENT_WEIGHT * clamp_unit(temperament);
    clamp_unit(score)
}

/// Composite score after scaling every sub-dimension by consistency squared.
pub fn effective_score(talent: f64, training: f64, temperament: f64, consistency: f64) -> f64 {
    let c2 = clamp_unit(consistency).powi(2);
    composite_score(
        clamp_unit(talent) * c2,
        clamp_unit(training) * c2,
        clamp_unit(temperament) * c2,
    )
}

/// Karma tier for an effective score. No hysteresis.
pub fn karma_tier(score: f64) -> KarmaTier {
    if score > HONORED_ABOVE {
        KarmaTier::Honored
    } else if score < CONSTRAINED_BELOW {
        KarmaTier::Constrained
    } else {
        KarmaTier::Neutral
    }
}

/// Conditions of the next life for a tier and the effective score at death.
pub fn starting_conditions(tier: KarmaTier, effective_at_death: f64) -> StartingConditions {
    match tier {
        KarmaTier::Honored => StartingConditions {
            trust: 0.6,
            atp: 100.0 + ((clamp_unit(effective_at_death) - 0.5) * 80.0).round(),
            ci: 0.85,
        },
        KarmaTier::Neutral => StartingConditions {
            trust: 0.5,
            atp: 100.0,
            ci: 0.8,
        },
        KarmaTier::Constrained => StartingConditions {
            trust: 0.4,
            atp: 80.0,
            ci: 0.7,
        },
    }
}

/// A value that had to be forced back into range.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub field: &'static str,
    pub observed: f64,
    pub clamped_to: f64,
}

/// Trust sub-dimensions and consistency of one agent
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustProfile {
    pub talent: f64,
    pub training: f64,
    pub temperament: f64,
    pub consistency: f64,
}

impl TrustProfile {
    pub fn new(talent: f64, training: f64, temperament: f64, consistency: f64) -> Self {
        Self {
            talent: clamp_unit(talent),
            training: clamp_unit(training),
            temperament: clamp_unit(temperament),
            consistency: clamp_unit(consistency),
        }
    }

    /// All three sub-dimensions set to the same value.
    pub fn uniform(trust: f64, consistency: f64) -> Self {
        Self::new(trust, trust, trust, consistency)
    }

    pub fn from_conditions(conditions: &StartingConditions) -> Self {
        Self::uniform(conditions.trust, conditions.ci)
    }

    pub fn composite(&self) -> f64 {
        composite_score(self.talent, self.training, self.temperament)
    }

    pub fn effective(&self) -> f64 {
        effective_score(self.talent, self.training, self.temperament, self.consistency)
    }

    /// Applies sub-dimension deltas, saturating at the bounds.
    pub fn adjust(&mut self, talent: f64, training: f64, temperament: f64) {
        self.talent = clamp_unit(self.talent + talent);
        self.training = clamp_unit(self.training + training);
        self.temperament = clamp_unit(self.temperament + temperament);
    }

    pub fn adjust_consistency(&mut self, delta: f64) {
        self.consistency = clamp_unit(self.consistency + delta);
    }

    /// Forces non-finite or out-of-range fields back into [0, 1] and reports
    /// each one that needed it.
    pub fn sanitize(&mut self) -> Vec<Correction> {
        let mut corrections = Vec::new();
        for (field, value) in [
            ("talent", &mut self.talent),
            ("training", &mut self.training),
            ("temperament", &mut self.temperament),
            ("consistency", &mut self.consistency),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&*value) {
                let clamped = clamp_unit(*value);
                corrections.push(Correction {
                    field,
                    observed: *value,
                    clamped_to: clamped,
                });
                *value = clamped;
            }
        }
        corrections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_composite_weights() {
        assert!((composite_score(1.0, 1.0, 1.0) - 1.0).abs() < EPS);
        assert!((composite_score(1.0, 0.0, 0.0) - 0.3).abs() < EPS);
        assert!((composite_score(0.0, 0.0, 1.0) - 0.4).abs() < EPS);
        assert!((composite_score(0.5, 0.5, 0.5) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_composite_clamps_inputs() {
        assert!((composite_score(2.0, -1.0, 1.0) - 0.7).abs() < EPS);
        assert_eq!(composite_score(f64::NAN, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_effective_scales_by_consistency_squared() {
        let composite = composite_score(0.8, 0.6, 0.9);
        let effective = effective_score(0.8, 0.6, 0.9, 0.5);
        assert!((effective - composite * 0.25).abs() < EPS);
        assert!((effective_score(0.8, 0.6, 0.9, 1.0) - composite).abs() < EPS);
        assert_eq!(effective_score(0.8, 0.6, 0.9, 0.0), 0.0);
    }

    #[test]
    fn test_karma_boundaries() {
        assert_eq!(karma_tier(0.75), KarmaTier::Honored);
        assert_eq!(karma_tier(0.71), KarmaTier::Honored);
        assert_eq!(karma_tier(0.70), KarmaTier::Neutral);
        assert_eq!(karma_tier(0.30), KarmaTier::Neutral);
        assert_eq!(karma_tier(0.29), KarmaTier::Constrained);
    }

    #[test]
    fn test_starting_conditions_per_tier() {
        let honored = starting_conditions(KarmaTier::Honored, 0.75);
        assert_eq!(honored.trust, 0.6);
        assert_eq!(honored.atp, 120.0);
        assert_eq!(honored.ci, 0.85);

        let neutral = starting_conditions(KarmaTier::Neutral, 0.5);
        assert_eq!((neutral.trust, neutral.atp, neutral.ci), (0.5, 100.0, 0.8));

        let constrained = starting_conditions(KarmaTier::Constrained, 0.1);
        assert_eq!((constrained.trust, constrained.atp, constrained.ci), (0.4, 80.0, 0.7));
    }

    #[test]
    fn test_honored_bonus_rounds() {
        // (0.93 - 0.5) * 80 = 34.4
        assert_eq!(starting_conditions(KarmaTier::Honored, 0.93).atp, 134.0);
    }

    #[test]
    fn test_profile_adjust_saturates() {
        let mut profile = TrustProfile::uniform(0.95, 0.8);
        profile.adjust(0.1, -1.5, 0.0);
        assert_eq!(profile.talent, 1.0);
        assert_eq!(profile.training, 0.0);
        assert_eq!(profile.temperament, 0.95);
        profile.adjust_consistency(0.5);
        assert_eq!(profile.consistency, 1.0);
    }

    #[test]
    fn test_sanitize_reports_corrections() {
        let mut profile = TrustProfile::uniform(0.5, 0.8);
        profile.talent = f64::NAN;
        profile.temperament = 1.4;
        let corrections = profile.sanitize();
        assert_eq!(corrections.len(), 2);
        assert_eq!(corrections[0].field, "talent");
        assert_eq!(corrections[0].clamped_to, 0.0);
        assert_eq!(corrections[1].field, "temperament");
        assert_eq!(profile.temperament, 1.0);
        assert!(profile.sanitize().is_empty());
    }
}
