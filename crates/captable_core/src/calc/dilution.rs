//! Dilution projector for a hypothetical priced round.
//!
//! # Invariants
//! - Never mutates the cap table.
//! - `post_money_valuation == pre_money_valuation + money_raised`.
//! - New shares are a continuous projection and are not rounded.

use crate::calc::ownership::{holder_shares, total_issued_shares};
use crate::model::cap_table::CapTable;
use crate::model::holder::HolderId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Input rejected before projecting.
#[derive(Debug, Clone, PartialEq)]
pub enum DilutionError {
    NonPositivePrice(f64),
    InvalidMoneyRaised(f64),
}

impl Display for DilutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositivePrice(value) => {
                write!(f, "projected price per share must be > 0, got {value}")
            }
            Self::InvalidMoneyRaised(value) => {
                write!(f, "projected money raised must be >= 0, got {value}")
            }
        }
    }
}

impl Error for DilutionError {}

/// Terms of the hypothetical round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DilutionInput {
    pub price_per_share: f64,
    pub money_raised: f64,
}

/// Effect of the hypothetical round on one holder.
#[derive(Debug, Clone, PartialEq)]
pub struct HolderDilution {
    pub holder_id: HolderId,
    pub holder_name: String,
    pub shares: u64,
    pub current_ownership: f64,
    pub post_money_ownership: f64,
    /// Ownership lost, in percentage points.
    pub dilution: f64,
    /// Dilution relative to the current stake; `None` for a zero stake.
    pub dilution_percent_of_stake: Option<f64>,
}

/// Company-level projection plus per-holder effects.
#[derive(Debug, Clone, PartialEq)]
pub struct DilutionProjection {
    pub current_total_shares: u64,
    pub pre_money_valuation: f64,
    pub new_shares: f64,
    pub post_money_valuation: f64,
    pub post_money_total_shares: f64,
    pub holders: Vec<HolderDilution>,
}

/// Projects a new priced round against current issued shares.
///
/// # Errors
/// - `NonPositivePrice` when the price is zero, negative or not finite.
/// - `InvalidMoneyRaised` when the amount is negative or not finite.
pub fn project_dilution(
    cap_table: &CapTable,
    input: &DilutionInput,
) -> Result<DilutionProjection, DilutionError> {
    let price = input.price_per_share;
    let money = input.money_raised;
    if !price.is_finite() || price <= 0.0 {
        return Err(DilutionError::NonPositivePrice(price));
    }
    if !money.is_finite() || money < 0.0 {
        return Err(DilutionError::InvalidMoneyRaised(money));
    }

    let current_total_shares = total_issued_shares(cap_table);
    let current_total = current_total_shares as f64;
    let pre_money_valuation = price * current_total;
    let new_shares = money / price;
    let post_money_total_shares = current_total + new_shares;

    let mut holders = holder_shares(cap_table)
        .into_iter()
        .map(|(holder_id, shares)| {
            let held = shares as f64;
            let current_ownership = ratio_percent(held, current_total);
            let post_money_ownership = ratio_percent(held, post_money_total_shares);
            let dilution = current_ownership - post_money_ownership;
            let dilution_percent_of_stake = if current_ownership > 0.0 {
                Some(dilution / current_ownership * 100.0)
            } else {
                None
            };
            HolderDilution {
                holder_id,
                holder_name: cap_table.holder_name(holder_id).to_string(),
                shares,
                current_ownership,
                post_money_ownership,
                dilution,
                dilution_percent_of_stake,
            }
        })
        .collect::<Vec<_>>();
    holders.sort_by(|left, right| {
        right
            .shares
            .cmp(&left.shares)
            .then_with(|| left.holder_name.cmp(&right.holder_name))
    });

    Ok(DilutionProjection {
        current_total_shares,
        pre_money_valuation,
        new_shares,
        post_money_valuation: pre_money_valuation + money,
        post_money_total_shares,
        holders,
    })
}

fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}
