//! Economic Settlement
//!
//! Resource costs and rewards: the consistency cost multiplier, fee-bearing
//! value transfers, the quality ramp, and atomic settlement of a single
//! individual-layer action.

use trust_events::{LifeAction, QualityRamp};

use crate::trust::clamp_unit;

/// Consistency at or above which actions cost their base price
pub const FULL_PRICE_CONSISTENCY: f64 = 0.9;
/// Cap on the cost multiplier
pub const MAX_MULTIPLIER: f64 = 10.0;

/// Cost multiplier for a consistency value.
///
/// 1.0 at consistency 0.9 and above, otherwise `1 / c²` capped at 10.
pub fn atp_multiplier(consistency: f64) -> f64 {
    let c = clamp_unit(consistency);
    if c >= FULL_PRICE_CONSISTENCY {
        1.0
    } else if c <= 0.0 {
        MAX_MULTIPLIER
    } else {
        (1.0 / (c * c)).min(MAX_MULTIPLIER)
    }
}

/// Result of moving value between two parties through the burn fee.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transfer {
    /// Debited from the sender
    pub sent: f64,
    /// Credited to the receiver
    pub received: f64,
    /// Destroyed by the fee
    pub burned: f64,
}

impl Transfer {
    /// Splits `amount` into what arrives and what the fee burns.
    pub fn with_fee(amount: f64, fee_rate: f64) -> Self {
        let sent = amount.max(0.0);
        let burned = sent * fee_rate;
        Self {
            sent,
            received: sent - burned,
            burned,
        }
    }
}

/// Fraction of the full reward paid at a contribution quality.
///
/// Zero below the first calibration point, the last point's fraction above
/// the last one, linear in between.
pub fn quality_fraction(ramp: &QualityRamp, quality: f64) -> f64 {
    let q = clamp_unit(quality);
    let (first, last) = match (ramp.points.first(), ramp.points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0.0,
    };
    if q < first.quality {
        return 0.0;
    }
    if q >= last.quality {
        return last.fraction;
    }
    for pair in ramp.points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if q <= b.quality {
            if q == b.quality {
                return b.fraction;
            }
            let t = (q - a.quality) / (b.quality - a.quality);
            return a.fraction + t * (b.fraction - a.fraction);
        }
    }
    last.fraction
}

/// State an action is settled against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub balance: f64,
    pub consistency: f64,
}

/// All deltas of one action, computed from a single pre-action state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionSettlement {
    pub cost: f64,
    pub reward: f64,
    pub transfer: Transfer,
    /// Balance after applying every delta, floored at zero
    pub balance_after: f64,
    /// Whether the balance had to be floored
    pub exhausted: bool,
}

/// Settles one action: cost scaled by the multiplier, reward scaled by the
/// quality ramp, and an optional transfer through the fee. The transfer is
/// limited to what is left after paying the cost.
pub fn settle_action(
    state: AccountState,
    action: &LifeAction,
    ramp: &QualityRamp,
    fee_rate: f64,
) -> ActionSettlement {
    let balance = if state.balance.is_finite() { state.balance.max(0.0) } else { 0.0 };
    let cost = action.cost * atp_multiplier(state.consistency);
    let reward = action.reward * quality_fraction(ramp, action.quality);
    let affordable = (balance - cost).max(0.0);
    let transfer = Transfer::with_fee(action.transfer.min(affordable), fee_rate);

    let raw = balance - cost - transfer.sent + reward;
    ActionSettlement {
        cost,
        reward,
        transfer,
        balance_after: raw.max(0.0),
        exhausted: raw <= 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_events::RampPoint;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_multiplier_fixtures() {
        assert_eq!(atp_multiplier(0.9), 1.0);
        assert_eq!(atp_multiplier(1.0), 1.0);
        assert!((atp_multiplier(0.5) - 4.0).abs() < EPS);
        assert_eq!(atp_multiplier(0.1), 10.0);
        assert_eq!(atp_multiplier(0.0), 10.0);
    }

    #[test]
    fn test_multiplier_monotone() {
        let mut previous = atp_multiplier(0.0);
        for i in 1..=100 {
            let m = atp_multiplier(i as f64 / 100.0);
            assert!(m <= previous + EPS);
            previous = m;
        }
    }

    #[test]
    fn test_transfer_fee_conservation() {
        let transfer = Transfer::with_fee(100.0, 0.05);
        assert_eq!(transfer.sent, 100.0);
        assert!((transfer.received - 95.0).abs() < EPS);
        assert!((transfer.burned - 5.0).abs() < EPS);
        assert!((transfer.received + transfer.burned - transfer.sent).abs() < EPS);
    }

    #[test]
    fn test_zero_fee_transfer() {
        let transfer = Transfer::with_fee(40.0, 0.0);
        assert_eq!(transfer.received, 40.0);
        assert_eq!(transfer.burned, 0.0);
    }

    #[test]
    fn test_quality_ramp_calibration() {
        let ramp = QualityRamp::default();
        assert_eq!(quality_fraction(&ramp, 0.0), 0.0);
        assert_eq!(quality_fraction(&ramp, 0.29), 0.0);
        assert!((quality_fraction(&ramp, 0.3) - 0.0).abs() < EPS);
        assert!((quality_fraction(&ramp, 0.7) - 0.6).abs() < EPS);
        assert!((quality_fraction(&ramp, 0.85) - 0.84).abs() < EPS);
        assert!((quality_fraction(&ramp, 1.0) - 1.0).abs() < EPS);
        assert!((quality_fraction(&ramp, 0.5) - 0.3).abs() < EPS);
    }

    #[test]
    fn test_custom_ramp_holds_last_fraction() {
        let ramp = QualityRamp {
            points: vec![RampPoint::new(0.5, 0.0), RampPoint::new(0.8, 0.9)],
        };
        assert_eq!(quality_fraction(&ramp, 0.95), 0.9);
        assert!((quality_fraction(&ramp, 0.65) - 0.45).abs() < EPS);
    }

    #[test]
    fn test_settle_action_scales_cost_and_reward() {
        let action = LifeAction::new("work", "Work", 5.0).with_reward(10.0, 0.7);
        let settlement = settle_action(
            AccountState { balance: 50.0, consistency: 0.5 },
            &action,
            &QualityRamp::default(),
            0.05,
        );
        assert!((settlement.cost - 20.0).abs() < EPS);
        assert!((settlement.reward - 6.0).abs() < EPS);
        assert!((settlement.balance_after - 36.0).abs() < EPS);
        assert!(!settlement.exhausted);
    }

    #[test]
    fn test_settle_action_floors_balance() {
        let action = LifeAction::new("burn", "Burn", 30.0);
        let settlement = settle_action(
            AccountState { balance: 10.0, consistency: 1.0 },
            &action,
            &QualityRamp::default(),
            0.05,
        );
        assert_eq!(settlement.balance_after, 0.0);
        assert!(settlement.exhausted);
    }

    #[test]
    fn test_settle_action_limits_transfer_to_funds() {
        let action = LifeAction::new("give", "Give", 2.0).with_transfer(50.0);
        let settlement = settle_action(
            AccountState { balance: 12.0, consistency: 1.0 },
            &action,
            &QualityRamp::default(),
            0.05,
        );
        assert!((settlement.transfer.sent - 10.0).abs() < EPS);
        assert!((settlement.transfer.burned - 0.5).abs() < EPS);
        assert_eq!(settlement.balance_after, 0.0);
        assert!(settlement.exhausted);
    }
}
