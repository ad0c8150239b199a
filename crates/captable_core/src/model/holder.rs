//! Equity holder identity.
//!
//! # Invariants
//! - `id` is stable for the holder lifetime and survives renames.
//! - `name` is display-only; lookups by name are exact and case-sensitive.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an equity holder.
pub type HolderId = Uuid;

/// A person or entity that can hold allocations across rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub id: HolderId,
    /// Mutable display name.
    pub name: String,
}

impl Holder {
    /// Creates a holder with a generated stable ID.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}
