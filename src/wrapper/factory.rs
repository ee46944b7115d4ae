//! Strategy-based wrapper factory

use super::ComObject;
use crate::abi::ForeignPtr;
use crate::error::{InteropError, Result};
use crate::exposer::ExposedObjectBuilder;
use crate::registry::{DefaultInterfaceDetails, InterfaceDetailsLookup};
use crate::strategy::{FreeThreaded, StrategySet, UnknownStrategy};
use bitflags::bitflags;
use core::ffi::c_void;
use std::sync::Arc;

bitflags! {
    /// Options for [`StrategyBasedWrappers::create_object`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreateObjectFlags: u32 {
        /// Reference-tracker protocol (not supported)
        const TRACKER_OBJECT = 1 << 0;
        /// Wrapper may be released early with `final_release`
        const UNIQUE_INSTANCE = 1 << 1;
        /// Outer-object aggregation (not supported)
        const AGGREGATION = 1 << 2;
    }
}

/// Creates wrappers from raw pointers using a fixed set of strategies
///
/// Override the `*_strategy` methods to customize; the defaults are the
/// process-wide registry and free-threaded handles.
pub trait StrategyBasedWrappers: Send + Sync {
    fn interface_details_strategy(&self) -> Arc<dyn InterfaceDetailsLookup> {
        Arc::new(DefaultInterfaceDetails)
    }

    fn unknown_strategy(&self) -> Arc<dyn UnknownStrategy> {
        Arc::new(FreeThreaded)
    }

    /// Strategy set every new wrapper receives
    ///
    /// Override to change the cache; the default builds `DefaultCaching`.
    fn strategies(&self) -> StrategySet {
        StrategySet::new(self.interface_details_strategy(), self.unknown_strategy())
    }

    /// Wrap `raw`, taking over one reference to it
    ///
    /// # Safety
    /// `raw` must be null or a live foreign object the caller owns one
    /// reference to.
    unsafe fn create_object(&self, raw: *mut c_void, flags: CreateObjectFlags) -> Result<ComObject> {
        if flags.contains(CreateObjectFlags::TRACKER_OBJECT) {
            return Err(InteropError::NotSupported("reference tracker objects"));
        }
        if flags.contains(CreateObjectFlags::AGGREGATION) {
            return Err(InteropError::NotSupported("aggregation"));
        }
        let raw = ForeignPtr::new(raw).ok_or(InteropError::NullPointer)?;
        Ok(ComObject::from_parts(
            &self.strategies(),
            raw,
            flags.contains(CreateObjectFlags::UNIQUE_INSTANCE),
        ))
    }

    /// Publish a local object, returning its identity pointer
    ///
    /// The caller owns the single reference on the returned pointer.
    fn create_foreign_pointer(&self, builder: ExposedObjectBuilder) -> ForeignPtr {
        builder.expose().into_foreign()
    }
}

/// Factory over a prepared `StrategySet`
#[derive(Debug, Clone, Default)]
pub struct DefaultWrappers {
    strategies: StrategySet,
}

impl DefaultWrappers {
    pub fn new(strategies: StrategySet) -> Self {
        Self { strategies }
    }
}

impl StrategyBasedWrappers for DefaultWrappers {
    fn interface_details_strategy(&self) -> Arc<dyn InterfaceDetailsLookup> {
        Arc::clone(self.strategies.details())
    }

    fn unknown_strategy(&self) -> Arc<dyn UnknownStrategy> {
        Arc::clone(self.strategies.unknown())
    }

    fn strategies(&self) -> StrategySet {
        self.strategies.clone()
    }
}
