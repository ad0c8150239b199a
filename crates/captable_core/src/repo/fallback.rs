//! Primary store with a local cache fallback.
//!
//! # Invariants
//! - A save succeeds when at least one backend accepted the document.
//! - After a save only the cache accepted, the primary is stale: loads serve
//!   the cache copy and write it back to the primary until a primary save
//!   succeeds again.
//! - Otherwise a load prefers the primary, unless the cache holds a higher
//!   `revision` (a degraded save from an earlier session), and falls back to
//!   the cache when the primary fails or holds nothing.

use crate::model::cap_table::CapTable;
use crate::repo::store::{CapTableStore, StoreResult};
use log::{info, warn};
use std::cell::Cell;

/// Composition of a primary store and a secondary cache.
pub struct FallbackStore<P, C> {
    primary: P,
    cache: C,
    primary_stale: Cell<bool>,
}

impl<P: CapTableStore, C: CapTableStore> FallbackStore<P, C> {
    pub fn new(primary: P, cache: C) -> Self {
        Self {
            primary,
            cache,
            primary_stale: Cell::new(false),
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns whether the cache holds a change the primary has not seen.
    pub fn is_primary_stale(&self) -> bool {
        self.primary_stale.get()
    }

    fn resync_primary(&self, cap_table: &CapTable) {
        match self.primary.save(cap_table) {
            Ok(()) => {
                self.primary_stale.set(false);
                info!(
                    "event=doc_resync module=repo status=ok store=primary revision={}",
                    cap_table.revision
                );
            }
            Err(err) => {
                self.primary_stale.set(true);
                warn!(
                    "event=doc_resync module=repo status=error store=primary error={}",
                    err
                );
            }
        }
    }
}

impl<P: CapTableStore, C: CapTableStore> CapTableStore for FallbackStore<P, C> {
    fn load(&self) -> StoreResult<Option<CapTable>> {
        if self.primary_stale.get() {
            match self.cache.load() {
                Ok(Some(cap_table)) => {
                    self.resync_primary(&cap_table);
                    return Ok(Some(cap_table));
                }
                Ok(None) => {}
                Err(err) => warn!(
                    "event=doc_load module=repo status=degraded store=file_cache error={}",
                    err
                ),
            }
        }

        let primary = match self.primary.load() {
            Ok(primary) => primary,
            Err(err) => {
                warn!(
                    "event=doc_load module=repo status=fallback store=primary error={}",
                    err
                );
                return self.cache.load();
            }
        };
        let cached = match self.cache.load() {
            Ok(cached) => cached,
            Err(err) => {
                warn!(
                    "event=doc_load module=repo status=degraded store=file_cache error={}",
                    err
                );
                None
            }
        };

        match (primary, cached) {
            (Some(primary), Some(cached)) if cached.revision > primary.revision => {
                warn!(
                    "event=doc_load module=repo status=stale store=primary revision={} cached_revision={}",
                    primary.revision, cached.revision
                );
                self.resync_primary(&cached);
                Ok(Some(cached))
            }
            (Some(primary), _) => Ok(Some(primary)),
            (None, cached) => Ok(cached),
        }
    }

    fn save(&self, cap_table: &CapTable) -> StoreResult<()> {
        let primary = self.primary.save(cap_table);
        let cache = self.cache.save(cap_table);

        match (primary, cache) {
            (Ok(()), Ok(())) => {
                self.primary_stale.set(false);
                Ok(())
            }
            (Ok(()), Err(err)) => {
                self.primary_stale.set(false);
                warn!(
                    "event=doc_save module=repo status=degraded store=file_cache error={}",
                    err
                );
                Ok(())
            }
            (Err(err), Ok(())) => {
                self.primary_stale.set(true);
                warn!(
                    "event=doc_save module=repo status=fallback store=primary error={}",
                    err
                );
                Ok(())
            }
            (Err(primary_err), Err(cache_err)) => {
                warn!(
                    "event=doc_save module=repo status=error store=file_cache error={}",
                    cache_err
                );
                Err(primary_err)
            }
        }
    }
}
