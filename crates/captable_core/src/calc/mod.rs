//! Derived cap-table views.
//!
//! # Responsibility
//! - Compute ownership, valuation, SAFE conversion and dilution views from a
//!   `CapTable` document.
//!
//! # Invariants
//! - Every function here is synchronous and side-effect free, except
//!   `conversion::convert_safes`, which mutates only the table it is given.
//! - Division by zero never panics or errors; it yields `Percent::NotAvailable`
//!   or `None`.

pub mod capacity;
pub mod conversion;
pub mod dilution;
pub mod ownership;
pub mod percent;
pub mod summary;
