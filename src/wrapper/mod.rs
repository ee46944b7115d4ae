//! Foreign object wrapper - local proxy for one foreign instance
//!
//! Design: the wrapper owns one reference to the identity pointer plus one
//! per cached interface. Lookups go through the cache under a shared guard
//! on the released flag; destruction takes the guard exclusively, so it
//! waits for in-flight lookups and releases every reference exactly once.
//!
//! - `ComObject` - the proxy
//! - `VirtualMethodTableInfo` - {this, vtable} pair handed to call-through code
//! - `factory` - flag-driven creation from raw pointers

mod factory;

pub use factory::{CreateObjectFlags, DefaultWrappers, StrategyBasedWrappers};

use crate::abi::{ForeignPtr, VTable};
use crate::cache::{CacheStats, CacheStrategy, TableInfo};
use crate::error::{InteropError, Result};
use crate::identity::{ComInterface, TypeKey};
use crate::logging::log_final_release;
use crate::registry::InterfaceDetailsLookup;
use crate::strategy::{StrategySet, UnknownStrategy};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Interface pointer and its vtable, ready for a call-through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualMethodTableInfo {
    this: ForeignPtr,
    vtable: VTable,
}

impl VirtualMethodTableInfo {
    #[inline]
    pub fn new(this: ForeignPtr, vtable: VTable) -> Self {
        Self { this, vtable }
    }

    /// Instance pointer to pass as the first argument
    #[inline]
    pub fn this(&self) -> ForeignPtr {
        self.this
    }

    #[inline]
    pub fn vtable(&self) -> VTable {
        self.vtable
    }

    #[inline]
    pub fn slot(&self, index: usize) -> Result<*const core::ffi::c_void> {
        self.vtable.slot(index)
    }

    /// Typed function pointer at `index`
    ///
    /// # Safety
    /// See [`VTable::method`].
    #[inline]
    pub unsafe fn method<F: Copy>(&self, index: usize) -> Result<F> {
        self.vtable.method(index)
    }
}

impl From<TableInfo> for VirtualMethodTableInfo {
    fn from(info: TableInfo) -> Self {
        Self::new(info.instance, info.vtable)
    }
}

/// Proxy for one foreign object
pub struct ComObject {
    identity: ForeignPtr,
    details: Arc<dyn InterfaceDetailsLookup>,
    unknown: Arc<dyn UnknownStrategy>,
    cache: Box<dyn CacheStrategy>,
    /// Shared by lookups, exclusive while releasing
    released: RwLock<bool>,
    unique_instance: bool,
}

impl ComObject {
    /// Wrap `raw` as a unique instance
    ///
    /// Takes over the caller's reference to `raw`. No queries are issued.
    ///
    /// # Safety
    /// `raw` must be a live foreign object whose first word is a vtable
    /// starting with the query/retain/release triplet, and the caller must
    /// own one reference to it.
    pub unsafe fn new(strategies: &StrategySet, raw: ForeignPtr) -> Self {
        Self::from_parts(strategies, raw, true)
    }

    /// # Safety
    /// Same as [`ComObject::new`].
    pub(crate) unsafe fn from_parts(strategies: &StrategySet, raw: ForeignPtr, unique_instance: bool) -> Self {
        let unknown = Arc::clone(strategies.unknown());
        let identity = unknown.create_instance_pointer(raw);
        Self {
            identity,
            details: Arc::clone(strategies.details()),
            unknown,
            cache: strategies.create_cache(),
            released: RwLock::new(false),
            unique_instance,
        }
    }

    /// Identity pointer held by this wrapper
    #[inline]
    pub fn identity(&self) -> ForeignPtr {
        self.identity
    }

    #[inline]
    pub fn is_unique_instance(&self) -> bool {
        self.unique_instance
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        *self.released.read_recursive()
    }

    /// Whether the object implements `interface`; failures read as `false`
    pub fn supports(&self, interface: TypeKey) -> bool {
        self.look_up(interface).is_ok()
    }

    /// Like [`ComObject::supports`], but can surface the failure instead
    pub fn is_interface_implemented(&self, interface: TypeKey, throw_if_not_implemented: bool) -> Result<bool> {
        match self.look_up(interface) {
            Ok(_) => Ok(true),
            Err(err) if throw_if_not_implemented => Err(err),
            Err(_) => Ok(false),
        }
    }

    /// Type that implements `interface` on behalf of this object
    pub fn resolve_implementation(&self, interface: TypeKey) -> Result<TypeKey> {
        self.look_up(interface).map(|info| info.implementation)
    }

    pub fn get_vtable_for(&self, interface: TypeKey) -> Result<VirtualMethodTableInfo> {
        self.look_up(interface).map(VirtualMethodTableInfo::from)
    }

    pub fn supports_interface<I: ComInterface + ?Sized>(&self) -> bool {
        self.supports(I::key())
    }

    pub fn vtable<I: ComInterface + ?Sized>(&self) -> Result<VirtualMethodTableInfo> {
        self.get_vtable_for(I::key())
    }

    /// View this object through interface `I`
    pub fn cast<I: ComInterface + ?Sized>(&self) -> Result<&I> {
        let implementation = self.resolve_implementation(I::key())?;
        if implementation != I::identity().implementation() {
            return Err(InteropError::NoInterface { interface: I::NAME });
        }
        Ok(I::project(self))
    }

    /// Descriptors currently cached
    pub fn cached_interfaces(&self) -> Vec<TypeKey> {
        self.cache.keys()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Release every reference now instead of at drop
    ///
    /// Only unique instances may be released early. Blocks until lookups
    /// already running on other threads have finished; lookups that start
    /// afterwards fail with [`InteropError::Released`]. Calling this from
    /// inside a lookup on the same wrapper deadlocks.
    pub fn final_release(&self) -> Result<()> {
        if !self.unique_instance {
            return Err(InteropError::NotSupported("final release of a shared wrapper"));
        }
        if self.release_all() {
            Ok(())
        } else {
            Err(InteropError::Released)
        }
    }

    /// Returns `false` if an earlier call already released
    fn release_all(&self) -> bool {
        let mut released = self.released.write();
        if *released {
            return false;
        }
        *released = true;

        let cached = self.cache.len();
        self.cache.clear(self.unknown.as_ref());
        unsafe {
            self.unknown.release(self.identity);
        }
        log_final_release(self.identity.as_raw(), cached);
        true
    }

    fn look_up(&self, interface: TypeKey) -> Result<TableInfo> {
        // Held across the query and the insert so release cannot interleave
        let released = self.released.read_recursive();
        if *released {
            return Err(InteropError::Released);
        }

        self.cache.get_or_insert(interface, self.unknown.as_ref(), || {
            let identity = self.details.resolve(interface).ok_or(InteropError::NoInterface {
                interface: interface.name(),
            })?;

            let instance = unsafe { self.unknown.query_interface(self.identity, &identity.iid()) }
                .map_err(|status| InteropError::Foreign { status })?;

            match unsafe { self.cache.construct_table_info(interface, &identity, instance) } {
                Ok(info) => Ok(info),
                Err(err) => {
                    unsafe {
                        self.unknown.release(instance);
                    }
                    Err(err)
                }
            }
        })
    }
}

impl Drop for ComObject {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for ComObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComObject")
            .field("identity", &self.identity)
            .field("cached", &self.cache.len())
            .field("released", &self.is_released())
            .field("unique_instance", &self.unique_instance)
            .finish()
    }
}
