//! Core domain logic for the cap-table engine.
//! This crate is the single source of truth for ownership invariants.

pub mod calc;
pub mod db;
pub mod exchange;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod settings;
pub mod view;

pub use calc::capacity::{check_round_capacity, CapacityWarning};
pub use calc::conversion::{
    capitalization_base, convert_safes, preview_conversion, ConversionError, ConversionPreview,
    ConversionRecord,
};
pub use calc::dilution::{project_dilution, DilutionError, DilutionInput, DilutionProjection};
pub use calc::ownership::{
    effective_price_per_share, fully_diluted_shares, holder_ownership, ownership_by_holder,
    post_money_valuation, total_issued_shares, HolderOwnership,
};
pub use calc::percent::{percentage, Percent};
pub use calc::summary::{company_summary, CompanySummary};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::allocation::{Allocation, AllocationId, AllocationType};
pub use model::cap_table::CapTable;
pub use model::holder::{Holder, HolderId};
pub use model::round::{Round, RoundId, RoundKind, RoundTerms, SafeConversion};
pub use model::validation::ValidationError;
pub use repo::fallback::FallbackStore;
pub use repo::file_cache::JsonFileCache;
pub use repo::sqlite_store::SqliteCapTableStore;
pub use repo::store::{CapTableStore, StoreError, StoreResult};
pub use service::{CapTableService, ServiceError};
pub use settings::{Settings, SettingsError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
