//! Local object exposer - foreign-callable views of local objects
//!
//! Design: an exposed object is one reference-counted record holding the
//! local object, one entry per interface and one `#[repr(C)]` dispatch
//! record per entry. Each dispatch record's first word is the interface's
//! shared static vtable, so its address is a valid foreign pointer.
//!
//! Trampolines never reinterpret the incoming pointer as a Rust type. They
//! recover the object through the dispatch registry, keyed by address.
//!
//! - `storage.rs` - lazily populated static vtables
//! - `unknown_impl` - query/retain/release shared by every table

mod storage;

pub use storage::{VTableStorage, VTableWriter};

use crate::abi::{ForeignPtr, Guid, HResult};
use crate::error::{InteropError, Result};
use crate::identity::{ComInterface, TypeKey};
use crate::logging::{log_object_destroyed, log_object_exposed, log_trampoline_failure};
use crate::registry::RegistrationError;
use core::ffi::c_void;
use core::ptr::NonNull;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// The foreign-visible part of an exposed interface
#[repr(C)]
struct Dispatch {
    vtable: *const *const c_void,
}

// Points at a process-lifetime static table
unsafe impl Send for Dispatch {}
unsafe impl Sync for Dispatch {}

impl Dispatch {
    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    fn as_foreign(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }
}

struct InterfaceEntry {
    iid: Guid,
    interface: TypeKey,
    /// `Arc<I>` for the entry's interface `I`
    target: Box<dyn Any + Send + Sync>,
}

struct ExposedInner {
    ref_count: AtomicU32,
    local: Box<dyn Any + Send + Sync>,
    entries: Vec<InterfaceEntry>,
    /// `[0]` is the identity, `[i + 1]` belongs to `entries[i]`
    dispatches: Vec<Box<Dispatch>>,
}

impl ExposedInner {
    fn identity(&self) -> *mut c_void {
        self.dispatches[0].as_foreign()
    }

    fn dispatch_for(&self, iid: &Guid) -> Option<*mut c_void> {
        if *iid == crate::abi::IID_IUNKNOWN {
            return Some(self.identity());
        }
        let index = self.entries.iter().position(|entry| entry.iid == *iid)?;
        Some(self.dispatches[index + 1].as_foreign())
    }
}

#[derive(Clone)]
struct DispatchTarget {
    inner: Arc<ExposedInner>,
    /// `None` for the identity record
    entry: Option<usize>,
}

/// Dispatch record address → owning object
static DISPATCH_REGISTRY: Lazy<DashMap<usize, DispatchTarget>> = Lazy::new(DashMap::new);

static EXPOSED_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Identity table: the base triplet only
static IDENTITY_VTABLE: VTableStorage<{ crate::abi::BASE_SLOT_COUNT }> = VTableStorage::new();

fn lookup(this: *mut c_void) -> Option<DispatchTarget> {
    // Clone out so no shard lock outlives this call
    DISPATCH_REGISTRY.get(&(this as usize)).map(|target| target.clone())
}

/// Live exposed objects in this process
pub fn exposed_count() -> usize {
    EXPOSED_COUNT.load(Ordering::Acquire)
}

/// Query/retain/release shared by every exposed vtable
pub(crate) mod unknown_impl {
    use super::lookup;
    use crate::abi::{Guid, HResult};
    use core::ffi::c_void;
    use std::sync::atomic::Ordering;

    pub(crate) unsafe extern "system" fn query_interface(
        this: *mut c_void,
        iid: *const Guid,
        out: *mut *mut c_void,
    ) -> HResult {
        if out.is_null() {
            return HResult::E_POINTER;
        }
        *out = core::ptr::null_mut();
        if iid.is_null() {
            return HResult::E_POINTER;
        }
        let Some(target) = lookup(this) else {
            return HResult::E_POINTER;
        };

        match target.inner.dispatch_for(&*iid) {
            Some(found) => {
                target.inner.ref_count.fetch_add(1, Ordering::Relaxed);
                *out = found;
                HResult::S_OK
            }
            None => HResult::E_NOINTERFACE,
        }
    }

    pub(crate) unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
        match lookup(this) {
            Some(target) => target.inner.ref_count.fetch_add(1, Ordering::Relaxed) + 1,
            None => 0,
        }
    }

    pub(crate) unsafe extern "system" fn release(this: *mut c_void) -> u32 {
        let Some(target) = lookup(this) else {
            return 0;
        };
        let remaining = target.inner.ref_count.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        if remaining == 0 {
            super::destroy(&target.inner);
        }
        remaining
    }
}

/// Unregister every dispatch record; the record itself goes with the last `Arc`
fn destroy(inner: &ExposedInner) {
    for dispatch in &inner.dispatches {
        DISPATCH_REGISTRY.remove(&dispatch.addr());
    }
    EXPOSED_COUNT.fetch_sub(1, Ordering::AcqRel);
    log_object_destroyed(inner.identity());
}

/// Recover the local object behind a foreign pointer
pub trait ObjectUnwrapper: Send + Sync {
    fn unwrap_object(&self, this: *mut c_void) -> Option<UnwrappedObject>;
}

/// Resolves pointers through the process-wide dispatch registry
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchUnwrapper;

impl ObjectUnwrapper for DispatchUnwrapper {
    fn unwrap_object(&self, this: *mut c_void) -> Option<UnwrappedObject> {
        lookup(this).map(|target| UnwrappedObject { target })
    }
}

/// Local object found behind a foreign pointer
pub struct UnwrappedObject {
    target: DispatchTarget,
}

impl UnwrappedObject {
    /// Implementation of `I` registered for this object
    pub fn target<I: ComInterface + ?Sized>(&self) -> Option<Arc<I>> {
        let entries = &self.target.inner.entries;
        let entry = match self.target.entry {
            Some(index) if entries[index].interface == I::key() => &entries[index],
            _ => entries.iter().find(|entry| entry.interface == I::key())?,
        };
        entry.target.downcast_ref::<Arc<I>>().cloned()
    }

    /// The local object the interfaces were exposed for
    pub fn local<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.target.inner.local.downcast_ref::<Arc<T>>().cloned()
    }

    /// Interface of the dispatch record the pointer addressed, if any
    pub fn interface(&self) -> Option<TypeKey> {
        self.target.entry.map(|index| self.target.inner.entries[index].interface)
    }

    pub fn identity(&self) -> *mut c_void {
        self.target.inner.identity()
    }

    pub fn ref_count(&self) -> u32 {
        self.target.inner.ref_count.load(Ordering::Acquire)
    }
}

/// Run `f` against the `I` implementation behind `this`
///
/// Used by generated trampolines. Errors become their status code, a panic
/// becomes `E_UNEXPECTED`, and an unknown pointer `E_POINTER`.
pub fn with_target<I, F>(this: *mut c_void, f: F) -> HResult
where
    I: ComInterface + ?Sized,
    F: FnOnce(&I) -> Result<()>,
{
    with_target_status::<I, _>(this, |target| match f(target) {
        Ok(()) => HResult::S_OK,
        Err(err) => {
            let status = err.status();
            log_trampoline_failure(I::NAME, status, &err);
            status
        }
    })
}

/// Like [`with_target`] for methods that return their own status
///
/// The status from `f` is passed through untouched.
pub fn with_target_status<I, F>(this: *mut c_void, f: F) -> HResult
where
    I: ComInterface + ?Sized,
    F: FnOnce(&I) -> HResult,
{
    let Some(target) = DispatchUnwrapper.unwrap_object(this).and_then(|object| object.target::<I>()) else {
        log_trampoline_failure(I::NAME, HResult::E_POINTER, &"pointer is not an exposed object");
        return HResult::E_POINTER;
    };

    match panic::catch_unwind(AssertUnwindSafe(|| f(&*target))) {
        Ok(status) => status,
        Err(_) => {
            log_trampoline_failure(I::NAME, HResult::E_UNEXPECTED, &"local method panicked");
            HResult::E_UNEXPECTED
        }
    }
}

/// Collects the interfaces to expose for one local object
pub struct ExposedObjectBuilder {
    local: Box<dyn Any + Send + Sync>,
    entries: Vec<InterfaceEntry>,
    vtables: Vec<NonNull<*const c_void>>,
}

impl ExposedObjectBuilder {
    /// Expose `target` as interface `I`
    pub fn with_interface<I>(mut self, target: Arc<I>) -> Result<Self>
    where
        I: ComInterface + Send + Sync + ?Sized,
    {
        let vtable = I::managed_vtable().ok_or(InteropError::NotSupported(
            "interface has no vtable for local implementations",
        ))?;

        if let Some(existing) = self.entries.iter().find(|entry| entry.iid == I::IID) {
            return Err(RegistrationError::DuplicateInterfaceId {
                iid: I::IID,
                existing: existing.interface.name(),
            }
            .into());
        }

        self.entries.push(InterfaceEntry {
            iid: I::IID,
            interface: I::key(),
            target: Box::new(target),
        });
        self.vtables.push(vtable);
        Ok(self)
    }

    /// Publish the object; the result owns the first reference
    pub fn expose(self) -> ExposedObject {
        let identity_vtable = IDENTITY_VTABLE.get_or_populate("IUnknown", |_| {});

        let dispatches: Vec<Box<Dispatch>> = core::iter::once(identity_vtable)
            .chain(self.vtables)
            .map(|vtable| Box::new(Dispatch { vtable: vtable.as_ptr() }))
            .collect();

        let inner = Arc::new(ExposedInner {
            ref_count: AtomicU32::new(1),
            local: self.local,
            entries: self.entries,
            dispatches,
        });

        for (index, dispatch) in inner.dispatches.iter().enumerate() {
            DISPATCH_REGISTRY.insert(
                dispatch.addr(),
                DispatchTarget {
                    inner: Arc::clone(&inner),
                    entry: index.checked_sub(1),
                },
            );
        }
        EXPOSED_COUNT.fetch_add(1, Ordering::AcqRel);

        let identity = inner.identity();
        log_object_exposed(identity, inner.entries.len());

        // Dispatch records are boxed, never null
        ExposedObject {
            identity: unsafe { ForeignPtr::new_unchecked(identity) },
        }
    }
}

/// Owned reference to an exposed object's identity pointer
pub struct ExposedObject {
    identity: ForeignPtr,
}

impl ExposedObject {
    pub fn builder<T: Any + Send + Sync>(local: Arc<T>) -> ExposedObjectBuilder {
        ExposedObjectBuilder {
            local: Box::new(local),
            entries: Vec::new(),
            vtables: Vec::new(),
        }
    }

    /// Identity pointer; the reference stays with `self`
    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.identity.as_raw()
    }

    /// Give up ownership of the reference
    pub fn into_raw(self) -> *mut c_void {
        let raw = self.as_ptr();
        core::mem::forget(self);
        raw
    }

    /// Like [`ExposedObject::into_raw`], keeping the non-null guarantee
    pub fn into_foreign(self) -> ForeignPtr {
        let identity = self.identity;
        core::mem::forget(self);
        identity
    }

    /// Take back a reference produced by [`ExposedObject::into_raw`] or a
    /// successful query
    ///
    /// # Safety
    /// `raw` must be an exposed object pointer carrying a reference the
    /// caller owns.
    pub unsafe fn from_raw(raw: *mut c_void) -> Result<Self> {
        let identity = ForeignPtr::new(raw).ok_or(InteropError::NullPointer)?;
        Ok(Self { identity })
    }

    /// Interface pointer for `iid`, carrying a new reference
    pub fn query(&self, iid: &Guid) -> Result<ForeignPtr> {
        let mut out = core::ptr::null_mut();
        let status = unsafe { unknown_impl::query_interface(self.as_ptr(), iid, &mut out) };
        status.ok()?;
        ForeignPtr::new(out).ok_or(InteropError::NullPointer)
    }

    pub fn query_interface<I: ComInterface + ?Sized>(&self) -> Result<ForeignPtr> {
        self.query(&I::IID).map_err(|err| match err {
            InteropError::Foreign { status } if status == HResult::E_NOINTERFACE => {
                InteropError::NoInterface { interface: I::NAME }
            }
            other => other,
        })
    }

    pub fn ref_count(&self) -> u32 {
        lookup(self.as_ptr())
            .map(|target| target.inner.ref_count.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

impl Clone for ExposedObject {
    fn clone(&self) -> Self {
        unsafe {
            unknown_impl::add_ref(self.as_ptr());
        }
        Self { identity: self.identity }
    }
}

impl Drop for ExposedObject {
    fn drop(&mut self) {
        unsafe {
            unknown_impl::release(self.as_ptr());
        }
    }
}

impl fmt::Debug for ExposedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposedObject")
            .field("identity", &self.identity)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
