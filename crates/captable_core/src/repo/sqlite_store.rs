//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist the current cap table as one JSON row keyed by company key.
//! - Persist named what-if scenarios next to it.
//!
//! # Invariants
//! - Saves run inside a transaction and replace the row wholesale.
//! - The connection must be migrated to the latest schema version.

use crate::db::migrations::{current_user_version, latest_version};
use crate::model::cap_table::CapTable;
use crate::repo::store::{
    decode_document, CapTableStore, StoreError, StoreResult, DEFAULT_DOCUMENT_KEY,
};
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension};

const DOCUMENT_FORMAT_VERSION: i64 = 1;

/// Document store over a migrated SQLite connection.
pub struct SqliteCapTableStore<'conn> {
    conn: &'conn Connection,
    key: String,
}

impl<'conn> SqliteCapTableStore<'conn> {
    /// Creates a store for the default company key.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        Self::try_with_key(conn, DEFAULT_DOCUMENT_KEY)
    }

    /// Creates a store for an explicit document key.
    pub fn try_with_key(conn: &'conn Connection, key: impl Into<String>) -> StoreResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self {
            conn,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Saves or replaces a named scenario.
    pub fn save_scenario(&self, name: &str, cap_table: &CapTable) -> StoreResult<()> {
        let body = serde_json::to_string(cap_table)?;
        self.conn.execute(
            "INSERT INTO scenarios (doc_key, name, body)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (doc_key, name) DO UPDATE SET
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![self.key, name, body],
        )?;
        Ok(())
    }

    /// Loads a named scenario.
    pub fn load_scenario(&self, name: &str) -> StoreResult<Option<CapTable>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM scenarios WHERE doc_key = ?1 AND name = ?2;",
                params![self.key, name],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|body| decode_document(&body)).transpose()
    }

    /// Lists scenario names in ascending order.
    pub fn list_scenarios(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM scenarios WHERE doc_key = ?1 ORDER BY name ASC;")?;
        let mut rows = stmt.query([self.key.as_str()])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }

    /// Deletes a named scenario; returns whether it existed.
    pub fn delete_scenario(&self, name: &str) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM scenarios WHERE doc_key = ?1 AND name = ?2;",
            params![self.key, name],
        )?;
        Ok(changed > 0)
    }
}

impl CapTableStore for SqliteCapTableStore<'_> {
    fn load(&self) -> StoreResult<Option<CapTable>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE doc_key = ?1;",
                [self.key.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => {
                let cap_table = decode_document(&body).map_err(|err| {
                    error!(
                        "event=doc_load module=repo status=error store=sqlite error_code=invalid_document error={}",
                        err
                    );
                    err
                })?;
                debug!(
                    "event=doc_load module=repo status=ok store=sqlite rounds={}",
                    cap_table.rounds.len()
                );
                Ok(Some(cap_table))
            }
            None => {
                debug!("event=doc_load module=repo status=empty store=sqlite");
                Ok(None)
            }
        }
    }

    fn save(&self, cap_table: &CapTable) -> StoreResult<()> {
        let body = serde_json::to_string(cap_table)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO documents (doc_key, body, format_version)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (doc_key) DO UPDATE SET
                body = excluded.body,
                format_version = excluded.format_version,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![self.key, body, DOCUMENT_FORMAT_VERSION],
        )?;
        tx.commit()?;
        debug!(
            "event=doc_save module=repo status=ok store=sqlite rounds={} bytes={}",
            cap_table.rounds.len(),
            body.len()
        );
        Ok(())
    }
}
