//! Soft consistency checks against round targets.
//!
//! Warnings never block on their own; callers decide whether to accept the
//! overage.

use crate::model::round::{Round, RoundId, RoundTerms};
use std::fmt::{Display, Formatter};

/// Overage that needs explicit user acceptance.
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityWarning {
    /// Priced round allocates more shares than `money_raised / price`.
    PricedOverTarget {
        round_id: RoundId,
        round_name: String,
        allocated_shares: u64,
        target_shares: u64,
    },
    /// SAFE round collects more than its target investment.
    SafeOverTarget {
        round_id: RoundId,
        round_name: String,
        invested: f64,
        target: f64,
    },
}

impl Display for CapacityWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PricedOverTarget {
                round_name,
                allocated_shares,
                target_shares,
                ..
            } => write!(
                f,
                "round `{round_name}` allocates {allocated_shares} shares, above the {target_shares} implied by money raised"
            ),
            Self::SafeOverTarget {
                round_name,
                invested,
                target,
                ..
            } => write!(
                f,
                "SAFE `{round_name}` collects {invested:.2}, above its {target:.2} target"
            ),
        }
    }
}

/// Returns every soft overage of `round`.
pub fn check_round_capacity(round: &Round) -> Vec<CapacityWarning> {
    let mut warnings = Vec::new();
    match &round.terms {
        RoundTerms::Priced {
            price_per_share,
            money_raised: Some(money_raised),
        } if *price_per_share > 0.0 => {
            let target_shares = (money_raised / price_per_share).round() as u64;
            let allocated_shares = round.allocated_shares();
            if allocated_shares > target_shares {
                warnings.push(CapacityWarning::PricedOverTarget {
                    round_id: round.id,
                    round_name: round.name.clone(),
                    allocated_shares,
                    target_shares,
                });
            }
        }
        RoundTerms::Safe {
            target_investment: Some(target),
            ..
        } => {
            let invested = round.invested_total();
            if invested > *target {
                warnings.push(CapacityWarning::SafeOverTarget {
                    round_id: round.id,
                    round_name: round.name.clone(),
                    invested,
                    target: *target,
                });
            }
        }
        _ => {}
    }
    warnings
}
