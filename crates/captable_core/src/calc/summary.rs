//! Company-level statistics shown alongside the ownership view.

use crate::calc::ownership::{
    effective_price_per_share, fully_diluted_shares, holder_shares, total_issued_shares,
};
use crate::calc::percent::Percent;
use crate::model::cap_table::CapTable;
use crate::model::round::{Round, RoundId, RoundTerms};

/// Allocation status of one equity pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolUsage {
    pub round_id: RoundId,
    pub round_name: String,
    pub authorized: u64,
    pub allocated: u64,
    pub unallocated: u64,
    pub utilization: Percent,
}

/// Snapshot of headline cap-table figures.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanySummary {
    pub issued_shares: u64,
    pub fully_diluted_shares: u64,
    pub authorized_shares: u64,
    /// Authorized shares not yet spoken for on a fully-diluted basis.
    pub unallocated_shares: u64,
    pub over_allocated: bool,
    pub suggested_authorized_shares: u64,
    pub effective_price_per_share: Option<f64>,
    pub post_money_valuation: Option<f64>,
    pub holder_count: usize,
    pub pools: Vec<PoolUsage>,
}

/// Usage of an equity pool round; `None` for other kinds.
pub fn pool_usage(round: &Round) -> Option<PoolUsage> {
    let RoundTerms::EquityPool { authorized_size } = round.terms else {
        return None;
    };
    let allocated = round.allocated_shares();
    Some(PoolUsage {
        round_id: round.id,
        round_name: round.name.clone(),
        authorized: authorized_size,
        allocated,
        unallocated: authorized_size.saturating_sub(allocated),
        utilization: Percent::of(allocated as f64, authorized_size as f64),
    })
}

/// Authorized share count giving `headroom` over the fully-diluted count.
pub fn suggested_authorized_shares(fully_diluted: u64, headroom: f64) -> u64 {
    let factor = if headroom.is_finite() && headroom >= 1.0 {
        headroom
    } else {
        1.0
    };
    (fully_diluted as f64 * factor).ceil() as u64
}

/// Computes the company summary using `headroom` for the suggestion.
pub fn company_summary(cap_table: &CapTable, headroom: f64) -> CompanySummary {
    let issued_shares = total_issued_shares(cap_table);
    let fully_diluted = fully_diluted_shares(cap_table);
    let effective_price = effective_price_per_share(cap_table);

    CompanySummary {
        issued_shares,
        fully_diluted_shares: fully_diluted,
        authorized_shares: cap_table.authorized_shares,
        unallocated_shares: cap_table.authorized_shares.saturating_sub(fully_diluted),
        over_allocated: cap_table.authorized_shares < fully_diluted,
        suggested_authorized_shares: suggested_authorized_shares(fully_diluted, headroom),
        effective_price_per_share: effective_price,
        post_money_valuation: effective_price.map(|price| price * fully_diluted as f64),
        holder_count: holder_shares(cap_table)
            .values()
            .filter(|shares| **shares > 0)
            .count(),
        pools: cap_table.rounds.iter().filter_map(pool_usage).collect(),
    }
}
