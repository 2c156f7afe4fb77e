//! Compiled-script cache
//!
//! Keyed by exact script text. Binding is deterministic for a given
//! catalog, so a hit is the same script a fresh compile would produce.
//! Clear the cache when the catalog changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::binder::{BoundScript, Catalog};
use crate::error::WeaveResult;

pub struct ScriptCache {
    entries: DashMap<String, Arc<BoundScript>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ScriptCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_entries.min(1024)),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, text: &str) -> Option<Arc<BoundScript>> {
        match self.entries.get(text) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cached script for `text`, compiling and storing it on a miss.
    /// Errors are not cached.
    pub fn get_or_compile(&self, text: &str, catalog: &dyn Catalog) -> WeaveResult<Arc<BoundScript>> {
        if let Some(hit) = self.get(text) {
            return Ok(hit);
        }
        let bound = Arc::new(crate::compile(text, catalog)?);
        if self.entries.len() < self.max_entries {
            self.entries.insert(text.to_string(), Arc::clone(&bound));
        } else {
            tracing::debug!(max = self.max_entries, "script cache full, not storing");
        }
        Ok(bound)
    }

    pub fn clear(&self) {
        let count = self.entries.len();
        self.entries.clear();
        tracing::debug!("Cleared {} cached scripts", count);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
