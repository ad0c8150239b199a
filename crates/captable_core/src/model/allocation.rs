//! Allocation: one holder's stake within a round.
//!
//! # Invariants
//! - `shares` is a whole share count; fractional shares never appear.
//! - In an unconverted SAFE round `investment` is authoritative and `shares`
//!   is only a legacy fallback.
//! - `shares_before_conversion` is written once, by SAFE conversion.

use crate::model::holder::HolderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an allocation.
pub type AllocationId = Uuid;

/// Security type of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationType {
    Common,
    Preferred,
    Option,
    Rsu,
}

impl AllocationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Preferred => "preferred",
            Self::Option => "option",
            Self::Rsu => "rsu",
        }
    }

    /// Parses the wire name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "common" => Some(Self::Common),
            "preferred" => Some(Self::Preferred),
            "option" | "options" => Some(Self::Option),
            "rsu" => Some(Self::Rsu),
            _ => None,
        }
    }
}

/// One holder's stake in a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub holder_id: HolderId,
    #[serde(default)]
    pub shares: u64,
    /// Invested amount. Drives the share count of unconverted SAFE rounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment: Option<f64>,
    /// Share count recorded before SAFE conversion replaced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_before_conversion: Option<u64>,
    #[serde(rename = "type")]
    pub kind: AllocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vesting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Allocation {
    /// Creates a share-carrying allocation.
    pub fn new(holder_id: HolderId, shares: u64, kind: AllocationType) -> Self {
        Self {
            id: Uuid::new_v4(),
            holder_id,
            shares,
            investment: None,
            shares_before_conversion: None,
            kind,
            vesting: None,
            notes: None,
        }
    }

    /// Creates a SAFE-style allocation whose shares derive from `amount`.
    pub fn investing(holder_id: HolderId, amount: f64, kind: AllocationType) -> Self {
        Self {
            investment: Some(amount),
            ..Self::new(holder_id, 0, kind)
        }
    }

    /// Returns whether SAFE conversion has rewritten this allocation.
    pub fn is_converted(&self) -> bool {
        self.shares_before_conversion.is_some()
    }
}
