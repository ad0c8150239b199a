//! Ownership and valuation calculator.
//!
//! # Responsibility
//! - Derive issued and fully-diluted share counts.
//! - Derive per-holder ownership and the effective price per share.
//!
//! # Invariants
//! - `fully_diluted_shares(ct) >= total_issued_shares(ct)` for every table.
//! - Holders are merged by `HolderId`, never by display name.
//! - Unconverted SAFE allocations are excluded from issued shares.

use crate::calc::conversion::{capitalization_base, safe_share_estimate};
use crate::calc::percent::Percent;
use crate::model::cap_table::CapTable;
use crate::model::holder::HolderId;
use crate::model::round::{Round, RoundTerms};
use std::collections::BTreeMap;

/// One holder's merged stake across all rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct HolderOwnership {
    pub holder_id: HolderId,
    pub holder_name: String,
    pub shares: u64,
    /// Share of `total_issued_shares`.
    pub percent: Percent,
}

/// Sum of allocation shares across all rounds except unconverted SAFEs.
pub fn total_issued_shares(cap_table: &CapTable) -> u64 {
    cap_table
        .rounds
        .iter()
        .filter(|round| !round.is_unconverted_safe())
        .map(Round::allocated_shares)
        .sum()
}

/// Share count including pool headroom and as-converted SAFE estimates.
///
/// Pools contribute their authorized size, or their allocated shares when a
/// malformed pool allocates beyond it.
pub fn fully_diluted_shares(cap_table: &CapTable) -> u64 {
    let base = capitalization_base(cap_table);
    cap_table
        .rounds
        .iter()
        .map(|round| match &round.terms {
            RoundTerms::EquityPool { authorized_size } => {
                (*authorized_size).max(round.allocated_shares())
            }
            RoundTerms::Safe {
                conversion: None, ..
            } => safe_share_estimate(round, base),
            _ => round.allocated_shares(),
        })
        .sum()
}

/// Issued shares held per holder id.
pub fn holder_shares(cap_table: &CapTable) -> BTreeMap<HolderId, u64> {
    let mut shares = BTreeMap::new();
    for round in cap_table
        .rounds
        .iter()
        .filter(|round| !round.is_unconverted_safe())
    {
        for allocation in &round.allocations {
            *shares.entry(allocation.holder_id).or_insert(0) += allocation.shares;
        }
    }
    shares
}

/// Per-holder ownership of issued shares, largest stake first.
pub fn ownership_by_holder(cap_table: &CapTable) -> Vec<HolderOwnership> {
    let total = total_issued_shares(cap_table) as f64;
    let mut rows = holder_shares(cap_table)
        .into_iter()
        .map(|(holder_id, shares)| HolderOwnership {
            holder_id,
            holder_name: cap_table.holder_name(holder_id).to_string(),
            shares,
            percent: Percent::of(shares as f64, total),
        })
        .collect::<Vec<_>>();

    rows.sort_by(|left, right| {
        right
            .shares
            .cmp(&left.shares)
            .then_with(|| left.holder_name.cmp(&right.holder_name))
    });
    rows
}

/// Ownership percent of one holder, `NotAvailable` when nothing is issued.
pub fn holder_ownership(cap_table: &CapTable, holder_id: HolderId) -> Percent {
    let held = holder_shares(cap_table)
        .get(&holder_id)
        .copied()
        .unwrap_or(0);
    Percent::of(held as f64, total_issued_shares(cap_table) as f64)
}

/// Best available price per share.
///
/// Resolution order:
/// 1. the most recently dated priced round (undated rounds sort first; ties
///    go to the later round in table order);
/// 2. the highest SAFE valuation cap divided by issued shares;
/// 3. `None` when neither is determinable.
pub fn effective_price_per_share(cap_table: &CapTable) -> Option<f64> {
    let latest_priced = cap_table
        .rounds
        .iter()
        .enumerate()
        .filter_map(|(index, round)| {
            round
                .terms
                .price_per_share()
                .map(|price| (round.date, index, price))
        })
        .max_by_key(|(date, index, _)| (*date, *index));
    if let Some((_, _, price)) = latest_priced {
        return Some(price);
    }

    let highest_cap = cap_table
        .rounds
        .iter()
        .filter_map(|round| round.terms.valuation_cap())
        .fold(None, |best: Option<f64>, cap| match best {
            Some(current) if current >= cap => Some(current),
            _ => Some(cap),
        })?;
    let issued = total_issued_shares(cap_table);
    if issued == 0 {
        return None;
    }
    Some(highest_cap / issued as f64)
}

/// Effective price times fully-diluted shares.
pub fn post_money_valuation(cap_table: &CapTable) -> Option<f64> {
    effective_price_per_share(cap_table)
        .map(|price| price * fully_diluted_shares(cap_table) as f64)
}
