//! Document store contract and shared error type.

use crate::db::DbError;
use crate::model::cap_table::CapTable;
use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage key of the single implicit "current company" document.
pub const DEFAULT_DOCUMENT_KEY: &str = "current_company";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from loading or saving the cap-table document.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    /// Persisted document decodes but violates model invariants.
    InvalidDocument(ValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "cache io failed: {err}"),
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
            Self::InvalidDocument(err) => write!(f, "invalid persisted cap table: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "document store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidDocument(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidDocument(value)
    }
}

/// Whole-document persistence for one company.
pub trait CapTableStore {
    /// Returns the stored document, or `None` when nothing was saved yet.
    fn load(&self) -> StoreResult<Option<CapTable>>;
    /// Atomically replaces the stored document.
    fn save(&self, cap_table: &CapTable) -> StoreResult<()>;
}

/// Decodes and validates a JSON document body.
pub(crate) fn decode_document(body: &str) -> StoreResult<CapTable> {
    let cap_table: CapTable = serde_json::from_str(body)?;
    cap_table.validate()?;
    Ok(cap_table)
}
