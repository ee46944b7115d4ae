//! vtbridge - COM-style vtable interop
//!
//! Two directions over one binary convention (objects whose first word
//! points at a table of `extern "system"` function pointers, slots 0..3
//! being query/retain/release):
//! - foreign → local: `ComObject` wraps a foreign pointer, resolves and
//!   caches interface vtables on demand, releases everything exactly once
//! - local → foreign: `ExposedObject` publishes local trait objects behind
//!   lazily built static vtables whose trampolines turn errors into status
//!   codes
//!
//! Interfaces are declared once with [`com_interface!`].

pub mod abi;
pub mod cache;
pub mod config;
pub mod error;
pub mod exposer;
pub mod identity;
pub mod logging;
pub mod registry;
pub mod strategy;
pub mod wrapper;

mod macros;

#[cfg(test)]
mod test_support;

// Re-export core types
pub use abi::{check, ForeignPtr, Guid, HResult, VTable, IID_IUNKNOWN};
pub use cache::{CacheStats, CacheStrategy, DefaultCaching, TableInfo};
pub use config::{BridgeConfig, CacheConfig, LookupKind};
pub use error::{InteropError, Result};
pub use exposer::{
    exposed_count, with_target, with_target_status, DispatchUnwrapper, ExposedObject, ExposedObjectBuilder,
    ObjectUnwrapper, UnwrappedObject,
};
pub use identity::{ComInterface, InterfaceIdentity, Projection, TypeKey};
pub use registry::{
    register_default, DefaultInterfaceDetails, InterfaceDetailsLookup, InterfaceRegistry,
    RegistrationError, SortedIdTable,
};
pub use strategy::{FreeThreaded, StrategySet, UnknownStrategy};
pub use wrapper::{ComObject, CreateObjectFlags, DefaultWrappers, StrategyBasedWrappers, VirtualMethodTableInfo};

#[doc(hidden)]
pub mod __private {
    pub use crate::macros::vtable_len;
}

/// Install logging from `VTBRIDGE_LOG_*`
pub fn init() {
    logging::init();
}

/// Install logging described by `config`
pub fn init_with_config(config: &BridgeConfig) {
    logging::init_with_config(config.to_log_config());
}

/// Bridge initialization for hosts that link the static library
#[no_mangle]
pub extern "C" fn vtbridge_init() {
    init_with_config(&BridgeConfig::discover().with_env_overrides());
}
