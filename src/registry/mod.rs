//! Interface details lookup - descriptor → identity
//!
//! Design: registration happens up front (static metadata, code-generated
//! impls of `ComInterface`); after that the tables are only read, so lookups
//! need no coordination beyond a shared read lock on the process default.
//!
//! - `InterfaceRegistry` - hash-map registry, the canonical strategy
//! - `SortedIdTable` - binary search over sorted ids, same contract
//! - `DefaultInterfaceDetails` - reads the process-wide registry

mod sorted;

pub use sorted::SortedIdTable;

use crate::abi::{Guid, BASE_SLOT_COUNT};
use crate::identity::{ComInterface, InterfaceIdentity, TypeKey};
use crate::logging::{debug, trace};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Resolve the identity of a managed interface descriptor
///
/// `None` means "not foreign-projectable"; it is not an error.
pub trait InterfaceDetailsLookup: Send + Sync {
    fn resolve(&self, interface: TypeKey) -> Option<InterfaceIdentity>;

    /// Reverse lookup by interface id
    fn resolve_iid(&self, _iid: &Guid) -> Option<(TypeKey, InterfaceIdentity)> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("interface `{interface}` declares {len} vtable slots, at least {BASE_SLOT_COUNT} are required")]
    InvalidVTableLength { interface: &'static str, len: usize },

    #[error("interface id {iid} is already registered for `{existing}`")]
    DuplicateInterfaceId { iid: Guid, existing: &'static str },

    #[error("interface `{interface}` is already registered with a different identity")]
    DuplicateInterface { interface: &'static str },
}

/// Map-backed interface registry
#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    by_key: HashMap<TypeKey, InterfaceIdentity>,
    by_iid: HashMap<Guid, TypeKey>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the metadata of `I`
    pub fn register<I: ComInterface + ?Sized>(&mut self) -> Result<&mut Self, RegistrationError> {
        self.register_identity(I::key(), I::identity())
    }

    /// Builder form of [`InterfaceRegistry::register`]
    pub fn with<I: ComInterface + ?Sized>(mut self) -> Result<Self, RegistrationError> {
        self.register::<I>()?;
        Ok(self)
    }

    /// Register an explicit descriptor/identity pair
    ///
    /// Registering the same pair twice is a no-op.
    pub fn register_identity(
        &mut self,
        interface: TypeKey,
        identity: InterfaceIdentity,
    ) -> Result<&mut Self, RegistrationError> {
        if identity.vtable_len() < BASE_SLOT_COUNT {
            return Err(RegistrationError::InvalidVTableLength {
                interface: interface.name(),
                len: identity.vtable_len(),
            });
        }

        if let Some(existing) = self.by_key.get(&interface) {
            if *existing == identity {
                return Ok(self);
            }
            return Err(RegistrationError::DuplicateInterface {
                interface: interface.name(),
            });
        }

        if let Some(existing) = self.by_iid.get(&identity.iid()) {
            return Err(RegistrationError::DuplicateInterfaceId {
                iid: identity.iid(),
                existing: existing.name(),
            });
        }

        debug!(
            interface = interface.name(),
            iid = %identity.iid(),
            slots = identity.vtable_len(),
            "interface registered"
        );
        self.by_iid.insert(identity.iid(), interface);
        self.by_key.insert(interface, identity);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn contains(&self, interface: TypeKey) -> bool {
        self.by_key.contains_key(&interface)
    }

    pub fn by_iid(&self, iid: &Guid) -> Option<(TypeKey, InterfaceIdentity)> {
        let key = *self.by_iid.get(iid)?;
        self.by_key.get(&key).map(|identity| (key, *identity))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeKey, InterfaceIdentity)> + '_ {
        self.by_key.iter().map(|(key, identity)| (*key, *identity))
    }
}

impl InterfaceDetailsLookup for InterfaceRegistry {
    #[inline]
    fn resolve(&self, interface: TypeKey) -> Option<InterfaceIdentity> {
        self.by_key.get(&interface).copied()
    }

    fn resolve_iid(&self, iid: &Guid) -> Option<(TypeKey, InterfaceIdentity)> {
        self.by_iid(iid)
    }
}

/// Process-wide registry behind `DefaultInterfaceDetails`
static DEFAULT_REGISTRY: Lazy<RwLock<InterfaceRegistry>> =
    Lazy::new(|| RwLock::new(InterfaceRegistry::new()));

/// Register `I` in the process-wide registry
pub fn register_default<I: ComInterface + ?Sized>() -> Result<(), RegistrationError> {
    DEFAULT_REGISTRY.write().register::<I>().map(|_| ())
}

/// Copy of the process-wide registry
pub fn default_registry() -> InterfaceRegistry {
    DEFAULT_REGISTRY.read().clone()
}

/// Lookup strategy reading the process-wide registry
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInterfaceDetails;

impl InterfaceDetailsLookup for DefaultInterfaceDetails {
    fn resolve(&self, interface: TypeKey) -> Option<InterfaceIdentity> {
        let found = DEFAULT_REGISTRY.read().resolve(interface);
        if found.is_none() {
            trace!(interface = interface.name(), "interface not registered");
        }
        found
    }

    fn resolve_iid(&self, iid: &Guid) -> Option<(TypeKey, InterfaceIdentity)> {
        DEFAULT_REGISTRY.read().by_iid(iid)
    }
}

#[cfg(test)]
mod tests;
