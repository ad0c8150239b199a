//! Tabular import/export of cap tables.
//!
//! # Responsibility
//! - Serialize rounds and allocations to one row-oriented CSV table.
//! - Rebuild a validated `CapTable` from such a table.
//! - Bundle several named tables into one multi-scenario document.
//!
//! # Invariants
//! - Import is all-or-nothing: a malformed row aborts with its line number.
//! - Rounds are grouped by name; ids are regenerated on import.

pub mod csv_table;
pub mod scenario;

pub use csv_table::{export_table, import_table, ExchangeError, TABLE_COLUMNS};
pub use scenario::{export_scenarios, import_scenarios, Scenario};
