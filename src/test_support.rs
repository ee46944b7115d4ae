//! Counting fake foreign object for unit tests

use crate::abi::{ForeignPtr, Guid, HResult, IUnknownVtbl, IID_IUNKNOWN};
use crate::identity::{InterfaceIdentity, TypeKey};
use core::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Slots in the fake's table; method slots past the triplet are null
pub const FAKE_SLOTS: usize = 8;

#[repr(C)]
struct FakeVtbl {
    base: IUnknownVtbl,
    methods: [usize; FAKE_SLOTS - 3],
}

static FAKE_VTBL: FakeVtbl = FakeVtbl {
    base: IUnknownVtbl {
        query_interface: fake_query_interface,
        add_ref: fake_add_ref,
        release: fake_release,
    },
    methods: [0; FAKE_SLOTS - 3],
};

#[derive(Debug, Default)]
pub struct Counters {
    pub refs: AtomicU32,
    pub queries: AtomicU32,
    pub releases: AtomicU32,
    pub freed: AtomicU32,
}

impl Counters {
    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> bool {
        self.freed.load(Ordering::SeqCst) > 0
    }
}

#[repr(C)]
pub struct FakeObject {
    vtbl: *const FakeVtbl,
    supported: Vec<Guid>,
    failures: Vec<(Guid, HResult)>,
    counters: Arc<Counters>,
}

impl FakeObject {
    /// Leaked object with one reference, freed when the count reaches zero
    pub fn create(supported: &[Guid]) -> (ForeignPtr, Arc<Counters>) {
        Self::create_with_failures(supported, &[])
    }

    pub fn create_with_failures(supported: &[Guid], failures: &[(Guid, HResult)]) -> (ForeignPtr, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        counters.refs.store(1, Ordering::SeqCst);
        let object = Box::new(FakeObject {
            vtbl: &FAKE_VTBL,
            supported: supported.to_vec(),
            failures: failures.to_vec(),
            counters: Arc::clone(&counters),
        });
        let raw = Box::into_raw(object) as *mut c_void;
        (ForeignPtr::new(raw).unwrap(), counters)
    }
}

unsafe extern "system" fn fake_query_interface(
    this: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    let object = &*(this as *const FakeObject);
    object.counters.queries.fetch_add(1, Ordering::SeqCst);
    *out = core::ptr::null_mut();

    let iid = *iid;
    if let Some((_, status)) = object.failures.iter().find(|(failing, _)| *failing == iid) {
        return *status;
    }
    if iid == IID_IUNKNOWN || object.supported.contains(&iid) {
        object.counters.refs.fetch_add(1, Ordering::SeqCst);
        *out = this;
        return HResult::S_OK;
    }
    HResult::E_NOINTERFACE
}

unsafe extern "system" fn fake_add_ref(this: *mut c_void) -> u32 {
    let object = &*(this as *const FakeObject);
    object.counters.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn fake_release(this: *mut c_void) -> u32 {
    let counters = Arc::clone(&(*(this as *const FakeObject)).counters);
    counters.releases.fetch_add(1, Ordering::SeqCst);
    let remaining = counters.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        drop(Box::from_raw(this as *mut FakeObject));
        counters.freed.fetch_add(1, Ordering::SeqCst);
    }
    remaining
}

pub const IID_ONE: Guid = Guid::parse_const("2c3f9903-b586-46b1-881b-adfce9af47b1");
pub const IID_TWO: Guid = Guid::parse_const("2c3f9903-b586-46b1-881b-adfce9af47b2");
pub const IID_THREE: Guid = Guid::parse_const("2c3f9903-b586-46b1-881b-adfce9af47b3");

pub struct One;
pub struct Two;
pub struct Three;
pub struct OneImpl;
pub struct TwoImpl;
pub struct ThreeImpl;

/// Registry knowing `One` (4 slots), `Two` (5 slots) and `Three` (4 slots)
pub fn registry() -> crate::registry::InterfaceRegistry {
    let mut registry = crate::registry::InterfaceRegistry::new();
    registry
        .register_identity(TypeKey::of::<One>(), InterfaceIdentity::new(IID_ONE, TypeKey::of::<OneImpl>(), 4))
        .unwrap()
        .register_identity(TypeKey::of::<Two>(), InterfaceIdentity::new(IID_TWO, TypeKey::of::<TwoImpl>(), 5))
        .unwrap()
        .register_identity(TypeKey::of::<Three>(), InterfaceIdentity::new(IID_THREE, TypeKey::of::<ThreeImpl>(), 4))
        .unwrap();
    registry
}

/// Strategy set over [`registry`] with free-threaded handles
pub fn strategies() -> crate::strategy::StrategySet {
    crate::strategy::StrategySet::new(Arc::new(registry()), Arc::new(crate::strategy::FreeThreaded))
}
