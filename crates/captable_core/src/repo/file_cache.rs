//! Local JSON file cache used when the primary store is unavailable.
//!
//! # Invariants
//! - Writes go to a sibling temp file first and are renamed into place, so a
//!   crash never leaves a half-written cache.

use crate::model::cap_table::CapTable;
use crate::repo::store::{decode_document, CapTableStore, StoreResult};
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Cap-table document cached as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CapTableStore for JsonFileCache {
    fn load(&self) -> StoreResult<Option<CapTable>> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("event=doc_load module=repo status=empty store=file_cache");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let cap_table = decode_document(&body)?;
        debug!(
            "event=doc_load module=repo status=ok store=file_cache rounds={}",
            cap_table.rounds.len()
        );
        Ok(Some(cap_table))
    }

    fn save(&self, cap_table: &CapTable) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(cap_table)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, body)?;
        fs::rename(&temp_path, &self.path)?;
        debug!("event=doc_save module=repo status=ok store=file_cache");
        Ok(())
    }
}
