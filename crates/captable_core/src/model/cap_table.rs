//! Root aggregate of the cap-table document.
//!
//! # Invariants
//! - Every allocation belongs to exactly one round of this table.
//! - Every allocation references a holder registered in `holders`.
//! - `authorized_shares` is informational; exceeding it is surfaced as
//!   over-allocation, never rejected.
//! - `revision` only grows; of two persisted copies the higher one is newer.

use crate::model::allocation::{Allocation, AllocationId};
use crate::model::holder::{Holder, HolderId};
use crate::model::round::{Round, RoundId};
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};

/// Ownership document for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapTable {
    pub company_name: String,
    #[serde(default)]
    pub authorized_shares: u64,
    #[serde(default)]
    pub holders: Vec<Holder>,
    #[serde(default)]
    pub rounds: Vec<Round>,
    /// Count of committed changes.
    #[serde(default)]
    pub revision: u64,
}

impl CapTable {
    /// Creates an empty cap table.
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            authorized_shares: 0,
            holders: Vec::new(),
            rounds: Vec::new(),
            revision: 0,
        }
    }

    pub fn holder(&self, id: HolderId) -> Option<&Holder> {
        self.holders.iter().find(|holder| holder.id == id)
    }

    /// Finds a holder by exact, case-sensitive display name.
    pub fn holder_by_name(&self, name: &str) -> Option<&Holder> {
        self.holders.iter().find(|holder| holder.name == name)
    }

    /// Returns the display name for `id`, or a placeholder for dangling ids.
    pub fn holder_name(&self, id: HolderId) -> &str {
        self.holder(id)
            .map(|holder| holder.name.as_str())
            .unwrap_or("(unknown holder)")
    }

    /// Returns the holder registered under `name`, registering it if absent.
    ///
    /// # Errors
    /// - Returns `ValidationError::EmptyHolderName` for blank names.
    pub fn ensure_holder(&mut self, name: &str) -> Result<HolderId, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyHolderName);
        }
        if let Some(existing) = self.holder_by_name(trimmed) {
            return Ok(existing.id);
        }
        let holder = Holder::new(trimmed);
        let id = holder.id;
        self.holders.push(holder);
        Ok(id)
    }

    /// Changes a holder's display name without touching its stake.
    ///
    /// # Errors
    /// - `EmptyHolderName` for blank names.
    /// - `DuplicateHolderName` when another holder already uses the name.
    /// - `UnknownHolder` when `id` is not registered.
    pub fn rename_holder(&mut self, id: HolderId, name: &str) -> Result<(), ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyHolderName);
        }
        if self
            .holders
            .iter()
            .any(|holder| holder.id != id && holder.name == trimmed)
        {
            return Err(ValidationError::DuplicateHolderName(trimmed.to_string()));
        }
        let holder = self
            .holders
            .iter_mut()
            .find(|holder| holder.id == id)
            .ok_or(ValidationError::UnknownHolder(id))?;
        holder.name = trimmed.to_string();
        Ok(())
    }

    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.iter().find(|round| round.id == id)
    }

    pub fn round_mut(&mut self, id: RoundId) -> Option<&mut Round> {
        self.rounds.iter_mut().find(|round| round.id == id)
    }

    /// Removes a round together with all of its allocations.
    pub fn remove_round(&mut self, id: RoundId) -> Option<Round> {
        let index = self.rounds.iter().position(|round| round.id == id)?;
        Some(self.rounds.remove(index))
    }

    /// Locates an allocation and its owning round.
    pub fn find_allocation(&self, id: AllocationId) -> Option<(&Round, &Allocation)> {
        self.rounds.iter().find_map(|round| {
            round
                .allocation(id)
                .map(|allocation| (round, allocation))
        })
    }

    /// Returns whether any SAFE round still awaits conversion.
    pub fn has_unconverted_safes(&self) -> bool {
        self.rounds.iter().any(Round::is_unconverted_safe)
    }

    /// Returns whether a priced round already exists.
    pub fn has_priced_round(&self) -> bool {
        self.rounds
            .iter()
            .any(|round| round.terms.price_per_share().is_some())
    }
}
