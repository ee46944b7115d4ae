//! Vtable layout and raw-slot access
//!
//! Every foreign object starts with one machine word: a pointer to an array
//! of function pointers. Slots 0..3 are the universal triplet, the rest are
//! interface methods. Raw reads are confined to `ForeignPtr::vtable_ptr` and
//! `VTable::slot`; everything else passes opaque handles around.

use super::{Guid, HResult};
use crate::error::{InteropError, Result};
use core::ffi::c_void;
use core::fmt;
use core::ptr::NonNull;

/// Number of slots taken by query/retain/release
pub const BASE_SLOT_COUNT: usize = 3;

pub type QueryInterfaceFn =
    unsafe extern "system" fn(this: *mut c_void, iid: *const Guid, out: *mut *mut c_void) -> HResult;
pub type AddRefFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;

/// The three slots every foreign vtable begins with
#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface: QueryInterfaceFn,
    pub add_ref: AddRefFn,
    pub release: ReleaseFn,
}

/// Opaque, non-null pointer to a foreign instance
///
/// Carries no ownership by itself; whoever stores one is responsible for the
/// matching `release`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ForeignPtr(NonNull<c_void>);

// Foreign pointers are plain addresses; thread affinity is the strategy's concern
unsafe impl Send for ForeignPtr {}
unsafe impl Sync for ForeignPtr {}

impl ForeignPtr {
    #[inline]
    pub fn new(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    /// # Safety
    /// `raw` must be non-null
    #[inline]
    pub const unsafe fn new_unchecked(raw: *mut c_void) -> Self {
        Self(NonNull::new_unchecked(raw))
    }

    #[inline]
    pub const fn as_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Read the vtable pointer stored in the first word of the instance
    ///
    /// # Safety
    /// The pointer must reference a live object with the foreign layout.
    #[inline]
    pub unsafe fn vtable_ptr(self) -> *const *const c_void {
        *(self.0.as_ptr() as *const *const *const c_void)
    }

    /// View the base triplet of the instance's vtable
    ///
    /// # Safety
    /// Same as [`ForeignPtr::vtable_ptr`]; the table must hold at least the
    /// three base slots.
    #[inline]
    pub unsafe fn unknown_vtbl<'a>(self) -> &'a IUnknownVtbl {
        &*(self.vtable_ptr() as *const IUnknownVtbl)
    }
}

impl fmt::Debug for ForeignPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignPtr({:p})", self.0.as_ptr())
    }
}

/// Bounds-checked view over a raw vtable
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VTable {
    base: NonNull<*const c_void>,
    len: usize,
}

unsafe impl Send for VTable {}
unsafe impl Sync for VTable {}

impl VTable {
    /// # Safety
    /// `base` must point to at least `len` readable slots that outlive every
    /// copy of the returned view.
    pub unsafe fn from_raw(base: *const *const c_void, len: usize) -> Result<Self> {
        let base = NonNull::new(base as *mut *const c_void).ok_or(InteropError::NullPointer)?;
        Ok(Self { base, len })
    }

    /// Read the vtable of `instance`, declaring it `len` slots long
    ///
    /// # Safety
    /// `instance` must be live and its vtable must have at least `len` slots.
    pub unsafe fn of_instance(instance: ForeignPtr, len: usize) -> Result<Self> {
        Self::from_raw(instance.vtable_ptr(), len)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const *const c_void {
        self.base.as_ptr()
    }

    /// Read the word at `index`
    pub fn slot(&self, index: usize) -> Result<*const c_void> {
        if index >= self.len {
            return Err(InteropError::SlotOutOfRange {
                slot: index,
                len: self.len,
            });
        }
        // In bounds per the construction contract
        Ok(unsafe { *self.base.as_ptr().add(index) })
    }

    /// Reinterpret slot `index` as a function pointer of type `F`
    ///
    /// # Safety
    /// `F` must be a function pointer type matching the slot's real signature
    /// and calling convention.
    pub unsafe fn method<F: Copy>(&self, index: usize) -> Result<F> {
        debug_assert_eq!(
            core::mem::size_of::<F>(),
            core::mem::size_of::<*const c_void>(),
            "slot type must be pointer-sized"
        );
        let raw = self.slot(index)?;
        if raw.is_null() {
            return Err(InteropError::NullPointer);
        }
        Ok(core::mem::transmute_copy::<*const c_void, F>(&raw))
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VTable")
            .field("base", &self.base.as_ptr())
            .field("len", &self.len)
            .finish()
    }
}
