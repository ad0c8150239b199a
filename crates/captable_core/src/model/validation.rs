//! Hard input validation for the cap-table model.
//!
//! # Responsibility
//! - Reject malformed rounds, allocations and documents before they are
//!   committed to the in-memory table or to storage.
//!
//! # Invariants
//! - Validation is side-effect free; a failing check never mutates state.
//! - Soft overage checks live in `calc::capacity`, not here.

use crate::model::allocation::{Allocation, AllocationId};
use crate::model::cap_table::CapTable;
use crate::model::holder::HolderId;
use crate::model::round::{Round, RoundId, RoundTerms};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").expect("valid color regex"));

/// Blocking input error; the offending mutation must not be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyCompanyName,
    EmptyRoundName,
    EmptyHolderName,
    DuplicateHolderName(String),
    UnknownHolder(HolderId),
    InvalidColor(String),
    NonPositivePrice(f64),
    NonPositiveValuationCap(f64),
    InvalidMoneyRaised(f64),
    InvalidTargetInvestment(f64),
    InvalidInvestment {
        allocation_id: AllocationId,
        amount: f64,
    },
    NonPositiveShares(AllocationId),
    /// Unconverted SAFE allocation with neither investment nor shares.
    MissingSafeInvestment(AllocationId),
    PoolOverAuthorized {
        round_id: RoundId,
        authorized: u64,
        allocated: u64,
    },
    DuplicateRoundId(RoundId),
    DuplicateAllocationId(AllocationId),
    InvalidConversionRecord(RoundId),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCompanyName => write!(f, "company name cannot be empty"),
            Self::EmptyRoundName => write!(f, "round name cannot be empty"),
            Self::EmptyHolderName => write!(f, "holder name cannot be empty"),
            Self::DuplicateHolderName(name) => write!(f, "holder name already in use: `{name}`"),
            Self::UnknownHolder(id) => write!(f, "holder not registered: {id}"),
            Self::InvalidColor(value) => write!(f, "invalid round color `{value}`"),
            Self::NonPositivePrice(value) => {
                write!(f, "price per share must be > 0, got {value}")
            }
            Self::NonPositiveValuationCap(value) => {
                write!(f, "valuation cap must be > 0, got {value}")
            }
            Self::InvalidMoneyRaised(value) => {
                write!(f, "money raised must be a finite amount >= 0, got {value}")
            }
            Self::InvalidTargetInvestment(value) => {
                write!(f, "target investment must be a finite amount >= 0, got {value}")
            }
            Self::InvalidInvestment {
                allocation_id,
                amount,
            } => write!(
                f,
                "allocation {allocation_id} investment must be a finite amount >= 0, got {amount}"
            ),
            Self::NonPositiveShares(id) => write!(f, "allocation {id} must hold > 0 shares"),
            Self::MissingSafeInvestment(id) => write!(
                f,
                "SAFE allocation {id} needs an investment amount or a share count"
            ),
            Self::PoolOverAuthorized {
                round_id,
                authorized,
                allocated,
            } => write!(
                f,
                "equity pool {round_id} allocates {allocated} shares but authorizes only {authorized}"
            ),
            Self::DuplicateRoundId(id) => write!(f, "duplicate round id: {id}"),
            Self::DuplicateAllocationId(id) => write!(f, "duplicate allocation id: {id}"),
            Self::InvalidConversionRecord(id) => {
                write!(f, "round {id} carries an invalid conversion record")
            }
        }
    }
}

impl Error for ValidationError {}

fn is_valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn is_positive_price(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Returns whether `value` is a `#RGB` or `#RRGGBB` color.
pub fn is_valid_color(value: &str) -> bool {
    HEX_COLOR_RE.is_match(value)
}

impl RoundTerms {
    /// Validates kind-specific numeric terms.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Common | Self::EquityPool { .. } => Ok(()),
            Self::Priced {
                price_per_share,
                money_raised,
            } => {
                if !is_positive_price(*price_per_share) {
                    return Err(ValidationError::NonPositivePrice(*price_per_share));
                }
                match money_raised {
                    Some(amount) if !is_valid_amount(*amount) => {
                        Err(ValidationError::InvalidMoneyRaised(*amount))
                    }
                    _ => Ok(()),
                }
            }
            Self::Safe {
                valuation_cap,
                target_investment,
                ..
            } => {
                if !is_positive_price(*valuation_cap) {
                    return Err(ValidationError::NonPositiveValuationCap(*valuation_cap));
                }
                match target_investment {
                    Some(amount) if !is_valid_amount(*amount) => {
                        Err(ValidationError::InvalidTargetInvestment(*amount))
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

impl Allocation {
    /// Validates this allocation against the terms of its owning round.
    pub fn validate_for(&self, terms: &RoundTerms) -> Result<(), ValidationError> {
        if let Some(amount) = self.investment {
            if !is_valid_amount(amount) {
                return Err(ValidationError::InvalidInvestment {
                    allocation_id: self.id,
                    amount,
                });
            }
        }

        match terms {
            RoundTerms::Safe {
                conversion: None, ..
            } => {
                let has_investment = self.investment.is_some_and(|amount| amount > 0.0);
                if !has_investment && self.shares == 0 {
                    return Err(ValidationError::MissingSafeInvestment(self.id));
                }
                Ok(())
            }
            // Tiny investments may legitimately round to zero shares.
            RoundTerms::Safe {
                conversion: Some(_),
                ..
            } => Ok(()),
            _ => {
                if self.shares == 0 {
                    return Err(ValidationError::NonPositiveShares(self.id));
                }
                Ok(())
            }
        }
    }
}

impl Round {
    /// Validates round metadata, terms and every owned allocation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyRoundName);
        }
        if !is_valid_color(&self.color) {
            return Err(ValidationError::InvalidColor(self.color.clone()));
        }
        self.terms.validate()?;

        if let RoundTerms::Safe {
            conversion: Some(conversion),
            ..
        } = &self.terms
        {
            if !is_positive_price(conversion.conversion_price)
                || conversion.conversion_price > conversion.new_round_price
            {
                return Err(ValidationError::InvalidConversionRecord(self.id));
            }
        }

        let mut seen = HashSet::new();
        for allocation in &self.allocations {
            if !seen.insert(allocation.id) {
                return Err(ValidationError::DuplicateAllocationId(allocation.id));
            }
            allocation.validate_for(&self.terms)?;
        }

        if let RoundTerms::EquityPool { authorized_size } = self.terms {
            let allocated = self.allocated_shares();
            if allocated > authorized_size {
                return Err(ValidationError::PoolOverAuthorized {
                    round_id: self.id,
                    authorized: authorized_size,
                    allocated,
                });
            }
        }

        Ok(())
    }
}

impl CapTable {
    /// Validates the full document, including referential invariants.
    ///
    /// Used on load and import, where no earlier check has run.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.company_name.trim().is_empty() {
            return Err(ValidationError::EmptyCompanyName);
        }

        let mut holder_names = HashSet::new();
        for holder in &self.holders {
            if holder.name.trim().is_empty() {
                return Err(ValidationError::EmptyHolderName);
            }
            if !holder_names.insert(holder.name.as_str()) {
                return Err(ValidationError::DuplicateHolderName(holder.name.clone()));
            }
        }

        let mut round_ids = HashSet::new();
        let mut allocation_ids = HashSet::new();
        for round in &self.rounds {
            if !round_ids.insert(round.id) {
                return Err(ValidationError::DuplicateRoundId(round.id));
            }
            round.validate()?;
            for allocation in &round.allocations {
                if !allocation_ids.insert(allocation.id) {
                    return Err(ValidationError::DuplicateAllocationId(allocation.id));
                }
                if self.holder(allocation.holder_id).is_none() {
                    return Err(ValidationError::UnknownHolder(allocation.holder_id));
                }
            }
        }

        Ok(())
    }
}
