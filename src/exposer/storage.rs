//! Static per-interface vtable storage
//!
//! One `VTableStorage<N>` per interface per process. It is populated once on
//! first use (base triplet first, then the interface slots) and shared by
//! every exposed object.

use super::unknown_impl;
use crate::abi::BASE_SLOT_COUNT;
use crate::logging::log_vtable_populated;
use core::ffi::c_void;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, Ordering};
use once_cell::sync::OnceCell;

pub struct VTableStorage<const N: usize> {
    slots: [AtomicPtr<c_void>; N],
    populated: OnceCell<()>,
}

impl<const N: usize> VTableStorage<N> {
    #[allow(clippy::declare_interior_mutable_const)]
    const NULL_SLOT: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

    pub const fn new() -> Self {
        assert!(N >= BASE_SLOT_COUNT, "a vtable needs at least the three base slots");
        Self {
            slots: [Self::NULL_SLOT; N],
            populated: OnceCell::new(),
        }
    }

    /// Shared table pointer, populating it on the first call
    ///
    /// Concurrent first calls run `populate` once; the others wait for it.
    pub fn get_or_populate(
        &self,
        interface: &'static str,
        populate: impl FnOnce(&mut VTableWriter<'_, N>),
    ) -> NonNull<*const c_void> {
        self.populated.get_or_init(|| {
            let mut writer = VTableWriter { slots: &self.slots };
            writer.store(0, unknown_impl::query_interface as *const ());
            writer.store(1, unknown_impl::add_ref as *const ());
            writer.store(2, unknown_impl::release as *const ());
            populate(&mut writer);
            log_vtable_populated(interface, N);
        });
        // AtomicPtr<T> has the same layout as *mut T
        NonNull::from(&self.slots).cast()
    }

    pub fn is_populated(&self) -> bool {
        self.populated.get().is_some()
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for VTableStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write access to the interface slots during population
pub struct VTableWriter<'a, const N: usize> {
    slots: &'a [AtomicPtr<c_void>; N],
}

impl<const N: usize> VTableWriter<'_, N> {
    /// Install `function` at `slot`
    ///
    /// # Panics
    /// If `slot` is one of the base slots or past the end of the table.
    pub fn set(&mut self, slot: usize, function: *const ()) {
        assert!(
            (BASE_SLOT_COUNT..N).contains(&slot),
            "slot {slot} is outside the method range {BASE_SLOT_COUNT}..{N}"
        );
        self.store(slot, function);
    }

    fn store(&mut self, slot: usize, function: *const ()) {
        self.slots[slot].store(function as *mut c_void, Ordering::Release);
    }
}
