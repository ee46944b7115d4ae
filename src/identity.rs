//! Interface identity - what the registry knows about one interface
//!
//! A `TypeKey` stands in for a type descriptor: interfaces are keyed by
//! `TypeKey::of::<dyn Trait>()`, their implementations by
//! `TypeKey::of::<Projection<dyn Trait>>()`.

use crate::abi::{Guid, BASE_SLOT_COUNT};
use crate::wrapper::ComObject;
use core::any::TypeId;
use core::ffi::c_void;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ptr::NonNull;

/// Runtime type descriptor
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

/// Tag type naming the call-through implementation of interface `I`
pub struct Projection<I: ?Sized>(PhantomData<fn() -> *const I>);

/// Immutable {iid, implementation, vtable length} record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceIdentity {
    iid: Guid,
    implementation: TypeKey,
    vtable_len: usize,
}

impl InterfaceIdentity {
    #[inline]
    pub fn new(iid: Guid, implementation: TypeKey, vtable_len: usize) -> Self {
        Self {
            iid,
            implementation,
            vtable_len,
        }
    }

    #[inline]
    pub fn iid(&self) -> Guid {
        self.iid
    }

    #[inline]
    pub fn implementation(&self) -> TypeKey {
        self.implementation
    }

    #[inline]
    pub fn vtable_len(&self) -> usize {
        self.vtable_len
    }

    /// Slots beyond the base triplet
    #[inline]
    pub fn method_count(&self) -> usize {
        self.vtable_len.saturating_sub(BASE_SLOT_COUNT)
    }
}

/// Static metadata of one foreign-facing interface
///
/// Implemented for `dyn Trait` by [`com_interface!`](crate::com_interface).
pub trait ComInterface: 'static {
    const IID: Guid;
    const NAME: &'static str;
    /// Base triplet plus one slot per method
    const VTABLE_LEN: usize;

    #[inline]
    fn key() -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn identity() -> InterfaceIdentity {
        InterfaceIdentity::new(Self::IID, TypeKey::of::<Projection<Self>>(), Self::VTABLE_LEN)
    }

    /// Shared vtable for local implementations, `None` if the interface
    /// cannot be exposed to foreign callers
    fn managed_vtable() -> Option<NonNull<*const c_void>> {
        None
    }

    /// View a foreign wrapper through this interface
    fn project(object: &ComObject) -> &Self;
}
