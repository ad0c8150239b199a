//! Financing and equity rounds.
//!
//! # Responsibility
//! - Model kind-specific round terms as one tagged union.
//! - Own the ordered allocations of a round.
//!
//! # Invariants
//! - A SAFE round is converted iff `conversion` is present; once converted its
//!   allocation share counts are fixed.
//! - An equity pool's `authorized_size` is never below its allocated shares.

use crate::model::allocation::{Allocation, AllocationId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a round.
pub type RoundId = Uuid;

/// Display palette assigned to rounds created without an explicit color.
pub const DEFAULT_ROUND_COLORS: &[&str] = &[
    "#4E79A7", "#F28E2B", "#E15759", "#76B7B2", "#59A14F", "#EDC948", "#B07AA1", "#FF9DA7",
];

/// Returns the palette color for the round at `index`.
pub fn default_round_color(index: usize) -> &'static str {
    DEFAULT_ROUND_COLORS[index % DEFAULT_ROUND_COLORS.len()]
}

/// Kind tag without payload, used for filtering and tabular wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundKind {
    Common,
    Priced,
    Safe,
    EquityPool,
}

impl RoundKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Priced => "priced",
            Self::Safe => "safe",
            Self::EquityPool => "equity-pool",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "common" => Some(Self::Common),
            "priced" => Some(Self::Priced),
            "safe" => Some(Self::Safe),
            "equity-pool" | "equity_pool" | "pool" => Some(Self::EquityPool),
            _ => None,
        }
    }
}

/// Frozen outcome of a SAFE conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeConversion {
    /// Price per share actually applied to SAFE investments.
    pub conversion_price: f64,
    /// Price per share of the priced round that triggered conversion.
    pub new_round_price: f64,
    /// Effective discount versus the new round price, in percent.
    pub discount_percent: f64,
}

/// Kind-specific round terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RoundTerms {
    /// Founder or common issuance without a price.
    Common,
    Priced {
        price_per_share: f64,
        /// Raise target used to validate allocated shares.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        money_raised: Option<f64>,
    },
    Safe {
        valuation_cap: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_investment: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversion: Option<SafeConversion>,
    },
    EquityPool {
        authorized_size: u64,
    },
}

impl RoundTerms {
    pub fn kind(&self) -> RoundKind {
        match self {
            Self::Common => RoundKind::Common,
            Self::Priced { .. } => RoundKind::Priced,
            Self::Safe { .. } => RoundKind::Safe,
            Self::EquityPool { .. } => RoundKind::EquityPool,
        }
    }

    /// Price-per-share of a priced round.
    pub fn price_per_share(&self) -> Option<f64> {
        match self {
            Self::Priced {
                price_per_share, ..
            } => Some(*price_per_share),
            _ => None,
        }
    }

    /// Valuation cap of a SAFE round.
    pub fn valuation_cap(&self) -> Option<f64> {
        match self {
            Self::Safe { valuation_cap, .. } => Some(*valuation_cap),
            _ => None,
        }
    }
}

/// A financing or equity event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub color: String,
    pub terms: RoundTerms,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

impl Round {
    /// Creates an empty round with a generated stable ID.
    pub fn new(name: impl Into<String>, terms: RoundTerms) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            date: None,
            color: default_round_color(0).to_string(),
            terms,
            allocations: Vec::new(),
        }
    }

    pub fn kind(&self) -> RoundKind {
        self.terms.kind()
    }

    /// Returns whether this is a SAFE round still awaiting conversion.
    pub fn is_unconverted_safe(&self) -> bool {
        matches!(
            self.terms,
            RoundTerms::Safe {
                conversion: None,
                ..
            }
        )
    }

    /// Sum of recorded allocation share counts.
    pub fn allocated_shares(&self) -> u64 {
        self.allocations.iter().map(|allocation| allocation.shares).sum()
    }

    /// Sum of recorded investment amounts.
    pub fn invested_total(&self) -> f64 {
        self.allocations
            .iter()
            .filter_map(|allocation| allocation.investment)
            .sum()
    }

    pub fn allocation(&self, id: AllocationId) -> Option<&Allocation> {
        self.allocations.iter().find(|allocation| allocation.id == id)
    }

    pub fn allocation_mut(&mut self, id: AllocationId) -> Option<&mut Allocation> {
        self.allocations
            .iter_mut()
            .find(|allocation| allocation.id == id)
    }

    /// Removes one allocation, returning it when it existed.
    pub fn remove_allocation(&mut self, id: AllocationId) -> Option<Allocation> {
        let index = self
            .allocations
            .iter()
            .position(|allocation| allocation.id == id)?;
        Some(self.allocations.remove(index))
    }
}
