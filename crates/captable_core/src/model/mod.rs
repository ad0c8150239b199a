//! Cap-table domain model.
//!
//! # Responsibility
//! - Define the persisted document shape: company, holders, rounds and
//!   allocations.
//! - Enforce structural invariants before any derived view is computed.
//!
//! # Invariants
//! - A `CapTable` exclusively owns its rounds; a round exclusively owns its
//!   allocations. Deleting a round drops its allocations with it.
//! - Holders are identified by a stable `HolderId`; display names are
//!   mutable attributes and never used as keys.
//! - "Unallocated" entries are derived views and never persisted.

pub mod allocation;
pub mod cap_table;
pub mod holder;
pub mod round;
pub mod validation;
