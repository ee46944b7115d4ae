//! Reference-counted handle strategy and the per-wrapper strategy set
//!
//! Design: the wrapper never touches the foreign triplet directly; every
//! QueryInterface and Release goes through an `UnknownStrategy` so tests and
//! apartment-aware hosts can interpose.

use crate::abi::{ForeignPtr, Guid, HResult};
use crate::cache::{CacheStrategy, DefaultCaching};
use crate::config::{BridgeConfig, CacheConfig, LookupKind};
use crate::logging::{log_query_interface, log_release};
use crate::registry::{
    default_registry, DefaultInterfaceDetails, InterfaceDetailsLookup, SortedIdTable,
};
use core::ffi::c_void;
use std::fmt;
use std::sync::Arc;

/// Query and release against an opaque foreign pointer
///
/// A successful query hands back a pointer that already carries one
/// reference; the caller owns the matching `release`.
pub trait UnknownStrategy: Send + Sync {
    /// Map a raw pointer to the instance pointer the wrapper will hold
    ///
    /// # Safety
    /// `raw` must be a live foreign object.
    unsafe fn create_instance_pointer(&self, raw: ForeignPtr) -> ForeignPtr {
        raw
    }

    /// Ask `instance` for `iid`; failure statuses are returned verbatim
    ///
    /// # Safety
    /// `instance` must be a live foreign object.
    unsafe fn query_interface(&self, instance: ForeignPtr, iid: &Guid) -> Result<ForeignPtr, HResult>;

    /// Drop one reference; the returned count is informational only
    ///
    /// # Safety
    /// The caller must own the reference being released.
    unsafe fn release(&self, instance: ForeignPtr) -> u32;
}

/// Calls the object's own triplet from whatever thread asks
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeThreaded;

impl UnknownStrategy for FreeThreaded {
    unsafe fn query_interface(&self, instance: ForeignPtr, iid: &Guid) -> Result<ForeignPtr, HResult> {
        let vtbl = instance.unknown_vtbl();
        let mut out: *mut c_void = core::ptr::null_mut();
        let status = (vtbl.query_interface)(instance.as_raw(), iid, &mut out);
        log_query_interface(instance.as_raw(), iid, status);

        if status.is_err() {
            return Err(status);
        }
        ForeignPtr::new(out).ok_or(HResult::E_POINTER)
    }

    unsafe fn release(&self, instance: ForeignPtr) -> u32 {
        let vtbl = instance.unknown_vtbl();
        let remaining = (vtbl.release)(instance.as_raw());
        log_release(instance.as_raw(), remaining);
        remaining
    }
}

pub type CacheFactory = dyn Fn() -> Box<dyn CacheStrategy> + Send + Sync;

/// Bundle of strategies handed to each new wrapper
#[derive(Clone)]
pub struct StrategySet {
    details: Arc<dyn InterfaceDetailsLookup>,
    unknown: Arc<dyn UnknownStrategy>,
    cache_factory: Arc<CacheFactory>,
}

impl StrategySet {
    /// Default caching with the given lookup and handle strategies
    pub fn new(details: Arc<dyn InterfaceDetailsLookup>, unknown: Arc<dyn UnknownStrategy>) -> Self {
        Self {
            details,
            unknown,
            cache_factory: Arc::new(|| Box::new(DefaultCaching::new()) as Box<dyn CacheStrategy>),
        }
    }

    pub fn with_cache_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn CacheStrategy> + Send + Sync + 'static,
    {
        self.cache_factory = Arc::new(factory);
        self
    }

    pub fn with_cache_config(self, config: CacheConfig) -> Self {
        self.with_cache_factory(move || Box::new(DefaultCaching::with_config(&config)) as Box<dyn CacheStrategy>)
    }

    /// Process-wide registry, free-threaded handles, default caching
    pub fn default_strategies() -> Self {
        Self::new(Arc::new(DefaultInterfaceDetails), Arc::new(FreeThreaded))
    }

    /// Strategies described by a loaded configuration
    ///
    /// `LookupKind::Sorted` snapshots the process-wide registry as it stands
    /// now; interfaces registered later are not seen.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let details: Arc<dyn InterfaceDetailsLookup> = match config.lookup {
            LookupKind::Registry => Arc::new(DefaultInterfaceDetails),
            LookupKind::Sorted => Arc::new(SortedIdTable::from_registry(&default_registry())),
        };
        Self::new(details, Arc::new(FreeThreaded)).with_cache_config(config.cache.clone())
    }

    pub fn details(&self) -> &Arc<dyn InterfaceDetailsLookup> {
        &self.details
    }

    pub fn unknown(&self) -> &Arc<dyn UnknownStrategy> {
        &self.unknown
    }

    pub fn create_cache(&self) -> Box<dyn CacheStrategy> {
        (self.cache_factory)()
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::default_strategies()
    }
}

impl fmt::Debug for StrategySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySet").finish_non_exhaustive()
    }
}
