//! Per-wrapper vtable cache
//!
//! Design: interface descriptor → `TableInfo`, insert-once per key.
//! - Hits never call into the foreign object
//! - Misses query once; a racing loser releases its fresh reference
//! - Every stored entry owns exactly one foreign reference until `clear`

use crate::abi::{ForeignPtr, VTable};
use crate::config::CacheConfig;
use crate::error::{InteropError, Result};
use crate::identity::{InterfaceIdentity, TypeKey};
use crate::logging::{log_cache_hit, log_cache_miss, log_race_lost};
use crate::strategy::UnknownStrategy;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One resolved interface on a foreign object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInfo {
    /// Interface pointer, already reference-counted
    pub instance: ForeignPtr,
    pub vtable: VTable,
    pub implementation: TypeKey,
}

/// Counters reported by caches that keep them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub races_lost: u64,
}

/// Pluggable cache behind a `ComObject`
pub trait CacheStrategy: Send + Sync {
    /// Build the entry for a freshly queried interface pointer
    ///
    /// # Safety
    /// `instance` must be live and its vtable at least
    /// `identity.vtable_len()` slots long.
    unsafe fn construct_table_info(
        &self,
        _interface: TypeKey,
        identity: &InterfaceIdentity,
        instance: ForeignPtr,
    ) -> Result<TableInfo> {
        Ok(TableInfo {
            instance,
            vtable: VTable::of_instance(instance, identity.vtable_len())?,
            implementation: identity.implementation(),
        })
    }

    fn try_get_table_info(&self, interface: TypeKey) -> Option<TableInfo>;

    /// Like `try_get_table_info`, but never counted in [`CacheStats`]
    fn peek_table_info(&self, interface: TypeKey) -> Option<TableInfo> {
        self.try_get_table_info(interface)
    }

    /// Store `info` unless the key is taken; `false` means another caller won
    fn try_set_table_info(&self, interface: TypeKey, info: TableInfo) -> bool;

    /// Release every entry through `unknown` and empty the cache
    fn clear(&self, unknown: &dyn UnknownStrategy);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached interface descriptors, in no particular order
    fn keys(&self) -> Vec<TypeKey>;

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    /// Hook for caches that count race losses
    fn record_race_lost(&self) {}
}

impl dyn CacheStrategy {
    /// Return the entry for `interface`, computing it on a miss
    ///
    /// `compute` runs outside any cache lock and may run on several threads
    /// at once for the same key; exactly one result is kept.
    pub fn get_or_insert(
        &self,
        interface: TypeKey,
        unknown: &dyn UnknownStrategy,
        compute: impl FnOnce() -> Result<TableInfo>,
    ) -> Result<TableInfo> {
        if let Some(info) = self.try_get_table_info(interface) {
            log_cache_hit(interface.name());
            return Ok(info);
        }

        log_cache_miss(interface.name());
        let fresh = compute()?;
        if self.try_set_table_info(interface, fresh) {
            return Ok(fresh);
        }

        // Lost the race: hand the extra reference back, use the winner
        self.record_race_lost();
        unsafe {
            unknown.release(fresh.instance);
        }
        log_race_lost(interface.name(), fresh.instance.as_raw());
        self.peek_table_info(interface).ok_or(InteropError::Released)
    }
}

/// `DashMap`-backed cache with hit/miss counters
#[derive(Debug)]
pub struct DefaultCaching {
    entries: DashMap<TypeKey, TableInfo>,
    hits: AtomicU64,
    misses: AtomicU64,
    races_lost: AtomicU64,
}

impl DefaultCaching {
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    pub fn with_config(config: &CacheConfig) -> Self {
        // DashMap needs a power-of-two shard count above one
        let shards = config.shard_amount.next_power_of_two().max(2);
        Self {
            entries: DashMap::with_capacity_and_shard_amount(config.initial_capacity, shards),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            races_lost: AtomicU64::new(0),
        }
    }
}

impl Default for DefaultCaching {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStrategy for DefaultCaching {
    fn try_get_table_info(&self, interface: TypeKey) -> Option<TableInfo> {
        let found = self.entries.get(&interface).map(|entry| *entry.value());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn peek_table_info(&self, interface: TypeKey) -> Option<TableInfo> {
        self.entries.get(&interface).map(|entry| *entry.value())
    }

    fn try_set_table_info(&self, interface: TypeKey, info: TableInfo) -> bool {
        match self.entries.entry(interface) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    fn clear(&self, unknown: &dyn UnknownStrategy) {
        // Collect first so no shard lock is held across a foreign call
        let keys: Vec<TypeKey> = self.entries.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, info)) = self.entries.remove(&key) {
                unsafe {
                    unknown.release(info.instance);
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn keys(&self) -> Vec<TypeKey> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            races_lost: self.races_lost.load(Ordering::Relaxed),
        }
    }

    fn record_race_lost(&self) {
        self.races_lost.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests;
