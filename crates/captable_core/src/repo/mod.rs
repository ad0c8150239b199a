//! Persistence collaborators for the cap-table document.
//!
//! # Responsibility
//! - Define the whole-document `load`/`save` contract.
//! - Provide the SQLite primary store, the JSON file cache and the fallback
//!   composition of both.
//!
//! # Invariants
//! - `save` replaces the entire stored document; nothing is merged.
//! - Read paths reject documents that fail `CapTable::validate()`.

pub mod fallback;
pub mod file_cache;
pub mod sqlite_store;
pub mod store;
