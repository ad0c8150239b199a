//! Derived hierarchy consumed by visualizations.
//!
//! # Responsibility
//! - Build the company → round → allocation tree with share-count values.
//! - Carry view state (zoom path, selected scenario) as an explicit value.
//!
//! # Invariants
//! - A parent's `shares` equals the sum of its children's `shares`.
//! - Tree construction never mutates the cap table.

pub mod state;
pub mod tree;
