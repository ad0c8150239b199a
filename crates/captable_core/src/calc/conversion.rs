//! SAFE conversion engine.
//!
//! # Responsibility
//! - Price unconverted SAFE rounds against a new priced round.
//! - Produce a reviewable preview, then apply it on explicit request.
//!
//! # Invariants
//! - `conversion_price <= new_round_price` for every converted round.
//! - Already converted rounds are skipped, so conversion is idempotent.
//! - Converted share counts are rounded to the nearest whole share.
//!
//! # Known approximation
//! The capitalization base counts only already-resolved shares (non-SAFE,
//! non-pool issued shares plus pool authorizations). When several SAFEs
//! convert in the same transaction they do not see each other's new shares,
//! so the result differs slightly from solving the simultaneous equations.

use crate::model::allocation::{Allocation, AllocationId};
use crate::model::cap_table::CapTable;
use crate::model::holder::HolderId;
use crate::model::round::{Round, RoundId, RoundTerms, SafeConversion};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised before any conversion work starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// New round price is missing, zero, negative or not finite.
    InvalidNewRoundPrice(f64),
    /// A SAFE round carries a cap that cannot price shares.
    InvalidValuationCap { round_id: RoundId, cap: f64 },
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNewRoundPrice(price) => {
                write!(f, "new round price per share must be > 0, got {price}")
            }
            Self::InvalidValuationCap { round_id, cap } => {
                write!(f, "SAFE round {round_id} has invalid valuation cap {cap}")
            }
        }
    }
}

impl Error for ConversionError {}

/// Pricing applied to one SAFE round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundConversionTerms {
    pub round_id: RoundId,
    pub round_name: String,
    pub valuation_cap: f64,
    pub cap_price: f64,
    pub conversion_price: f64,
    pub discount_percent: f64,
}

/// Conversion outcome for one allocation, shown for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRecord {
    pub round_id: RoundId,
    pub round_name: String,
    pub allocation_id: AllocationId,
    pub holder_id: HolderId,
    pub holder_name: String,
    pub original_shares: u64,
    pub converted_shares: u64,
    /// Recorded investment, or the implied one for legacy share-only data.
    pub investment: f64,
    pub investment_implied: bool,
    pub conversion_price: f64,
    pub discount_percent: f64,
}

/// Full conversion plan for a new priced round.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPreview {
    pub new_round_price: f64,
    pub capitalization_base: u64,
    pub rounds: Vec<RoundConversionTerms>,
    pub records: Vec<ConversionRecord>,
}

impl ConversionPreview {
    /// Returns whether no SAFE round would convert.
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn total_converted_shares(&self) -> u64 {
        self.records
            .iter()
            .map(|record| record.converted_shares)
            .sum()
    }
}

/// Share count the SAFE valuation cap prices against, floored at 1.
///
/// Issued shares of every non-SAFE, non-pool round plus the authorized size
/// of every equity pool.
pub fn capitalization_base(cap_table: &CapTable) -> u64 {
    let base: u64 = cap_table
        .rounds
        .iter()
        .map(|round| match &round.terms {
            RoundTerms::Safe { .. } => 0,
            RoundTerms::EquityPool { authorized_size } => *authorized_size,
            _ => round.allocated_shares(),
        })
        .sum();
    base.max(1)
}

/// Price per share implied by a valuation cap over `base` shares.
pub fn cap_price(valuation_cap: f64, base: u64) -> f64 {
    valuation_cap / base.max(1) as f64
}

/// As-converted share estimate of one unconverted SAFE allocation.
///
/// Allocations without a recorded investment keep their stored shares.
pub fn safe_allocation_estimate(allocation: &Allocation, cap_price: f64) -> u64 {
    match allocation.investment {
        Some(amount) => whole_shares(amount / cap_price),
        None => allocation.shares,
    }
}

/// Current as-converted share estimate of a SAFE round at its cap price.
///
/// Converted rounds and non-SAFE rounds return their allocated shares.
pub fn safe_share_estimate(round: &Round, base: u64) -> u64 {
    match &round.terms {
        RoundTerms::Safe {
            valuation_cap,
            conversion: None,
            ..
        } if *valuation_cap > 0.0 => {
            let price = cap_price(*valuation_cap, base);
            round
                .allocations
                .iter()
                .map(|allocation| safe_allocation_estimate(allocation, price))
                .sum()
        }
        _ => round.allocated_shares(),
    }
}

/// Computes the conversion of every unconverted SAFE round without mutating.
///
/// # Errors
/// - `InvalidNewRoundPrice` for a non-positive or non-finite price.
/// - `InvalidValuationCap` when a pending SAFE cannot be priced.
pub fn preview_conversion(
    cap_table: &CapTable,
    new_round_price: f64,
) -> Result<ConversionPreview, ConversionError> {
    if !new_round_price.is_finite() || new_round_price <= 0.0 {
        return Err(ConversionError::InvalidNewRoundPrice(new_round_price));
    }

    let base = capitalization_base(cap_table);
    let mut rounds = Vec::new();
    let mut records = Vec::new();

    for round in cap_table
        .rounds
        .iter()
        .filter(|round| round.is_unconverted_safe())
    {
        let valuation_cap = round.terms.valuation_cap().unwrap_or(0.0);
        if !valuation_cap.is_finite() || valuation_cap <= 0.0 {
            return Err(ConversionError::InvalidValuationCap {
                round_id: round.id,
                cap: valuation_cap,
            });
        }

        let cap_price = cap_price(valuation_cap, base);
        let conversion_price = new_round_price.min(cap_price);
        let discount_percent = (1.0 - conversion_price / new_round_price).max(0.0) * 100.0;

        for allocation in &round.allocations {
            let (investment, investment_implied) = match allocation.investment {
                Some(amount) => (amount, false),
                None => (allocation.shares as f64 * cap_price, true),
            };
            records.push(ConversionRecord {
                round_id: round.id,
                round_name: round.name.clone(),
                allocation_id: allocation.id,
                holder_id: allocation.holder_id,
                holder_name: cap_table.holder_name(allocation.holder_id).to_string(),
                original_shares: allocation.shares,
                converted_shares: whole_shares(investment / conversion_price),
                investment,
                investment_implied,
                conversion_price,
                discount_percent,
            });
        }

        rounds.push(RoundConversionTerms {
            round_id: round.id,
            round_name: round.name.clone(),
            valuation_cap,
            cap_price,
            conversion_price,
            discount_percent,
        });
    }

    Ok(ConversionPreview {
        new_round_price,
        capitalization_base: base,
        rounds,
        records,
    })
}

/// Converts every unconverted SAFE round in place and returns what changed.
///
/// # Errors
/// Same as `preview_conversion`; the table is untouched on error.
pub fn convert_safes(
    cap_table: &mut CapTable,
    new_round_price: f64,
) -> Result<ConversionPreview, ConversionError> {
    let preview = preview_conversion(cap_table, new_round_price)?;
    apply_preview(cap_table, &preview);
    debug!(
        "event=safe_convert module=calc status=ok rounds={} allocations={} base={}",
        preview.rounds.len(),
        preview.records.len(),
        preview.capitalization_base
    );
    Ok(preview)
}

fn apply_preview(cap_table: &mut CapTable, preview: &ConversionPreview) {
    for terms in &preview.rounds {
        let Some(round) = cap_table.round_mut(terms.round_id) else {
            continue;
        };
        if let RoundTerms::Safe { conversion, .. } = &mut round.terms {
            *conversion = Some(SafeConversion {
                conversion_price: terms.conversion_price,
                new_round_price: preview.new_round_price,
                discount_percent: terms.discount_percent,
            });
        }
        for record in preview
            .records
            .iter()
            .filter(|record| record.round_id == terms.round_id)
        {
            if let Some(allocation) = round.allocation_mut(record.allocation_id) {
                allocation.shares_before_conversion = Some(record.original_shares);
                allocation.shares = record.converted_shares;
                allocation.investment = Some(record.investment);
            }
        }
    }
}

fn whole_shares(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{capitalization_base, whole_shares};
    use crate::model::allocation::{Allocation, AllocationType};
    use crate::model::cap_table::CapTable;
    use crate::model::round::{Round, RoundTerms};
    use uuid::Uuid;

    #[test]
    fn base_is_floored_at_one_for_empty_table() {
        assert_eq!(capitalization_base(&CapTable::new("Empty")), 1);
    }

    #[test]
    fn base_counts_pool_authorization_not_pool_grants() {
        let mut table = CapTable::new("Acme");
        let mut pool = Round::new(
            "Pool",
            RoundTerms::EquityPool {
                authorized_size: 1_000,
            },
        );
        pool.allocations
            .push(Allocation::new(Uuid::new_v4(), 10, AllocationType::Option));
        table.rounds.push(pool);

        assert_eq!(capitalization_base(&table), 1_000);
    }

    #[test]
    fn whole_shares_rounds_to_nearest() {
        assert_eq!(whole_shares(2.4), 2);
        assert_eq!(whole_shares(2.5), 3);
        assert_eq!(whole_shares(f64::NAN), 0);
    }
}
