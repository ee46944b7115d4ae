//! Shared interfaces, local classes and a counting strategy

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vtbridge::{
    com_interface, ExposedObject, ForeignPtr, FreeThreaded, Guid, HResult, InterfaceRegistry, Result,
    StrategySet, UnknownStrategy,
};

com_interface! {
    pub interface IComInterface1("2c3f9903-b586-46b1-881b-adfce9af47b1") {
        [3] fn method(&self);
    }
}

com_interface! {
    pub interface IComInterface2("2c3f9903-b586-46b1-881b-adfce9af47b2") {
        [3] fn method1(&self);
        [4] fn method2(&self);
    }
}

com_interface! {
    pub interface IComInterface3("2c3f9903-b586-46b1-881b-adfce9af47b3") {
        [3] fn method(&self);
    }
}

com_interface! {
    /// Declared but never registered
    pub interface INotRegistered("7d1e2a6c-0f4b-4c7a-9d3e-5b6a7c8d9e0f") {
        [3] fn method(&self);
    }
}

/// Records which local methods ran, in order
#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<&'static str>>,
}

impl CallLog {
    pub fn record(&self, marker: &'static str) {
        self.calls.lock().push(marker);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

#[derive(Default)]
pub struct A {
    pub log: CallLog,
}

impl IComInterface1 for A {
    fn method(&self) -> Result<()> {
        self.log.record("A.IComInterface1.Method");
        Ok(())
    }
}

#[derive(Default)]
pub struct B {
    pub log: CallLog,
}

impl IComInterface1 for B {
    fn method(&self) -> Result<()> {
        self.log.record("B.IComInterface1.Method");
        Ok(())
    }
}

impl IComInterface3 for B {
    fn method(&self) -> Result<()> {
        self.log.record("B.IComInterface3.Method");
        Ok(())
    }
}

#[derive(Default)]
pub struct C {
    pub log: CallLog,
}

impl IComInterface2 for C {
    fn method1(&self) -> Result<()> {
        self.log.record("C.IComInterface2.Method1");
        Ok(())
    }

    fn method2(&self) -> Result<()> {
        self.log.record("C.IComInterface2.Method2");
        Ok(())
    }
}

/// Fails every call with the configured status
pub struct Failing {
    pub status: HResult,
}

impl IComInterface1 for Failing {
    fn method(&self) -> Result<()> {
        Err(vtbridge::InteropError::failed(self.status, "failing on purpose"))
    }
}

pub fn registry() -> InterfaceRegistry {
    InterfaceRegistry::new()
        .with::<dyn IComInterface1>()
        .unwrap()
        .with::<dyn IComInterface2>()
        .unwrap()
        .with::<dyn IComInterface3>()
        .unwrap()
}

pub fn strategies() -> StrategySet {
    StrategySet::new(Arc::new(registry()), Arc::new(FreeThreaded))
}

/// Free-threaded strategy counting every foreign call it makes
#[derive(Default)]
pub struct CountingStrategy {
    queries: AtomicU32,
    releases: AtomicU32,
}

impl CountingStrategy {
    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

impl UnknownStrategy for CountingStrategy {
    unsafe fn query_interface(&self, instance: ForeignPtr, iid: &Guid) -> std::result::Result<ForeignPtr, HResult> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        FreeThreaded.query_interface(instance, iid)
    }

    unsafe fn release(&self, instance: ForeignPtr) -> u32 {
        self.releases.fetch_add(1, Ordering::SeqCst);
        FreeThreaded.release(instance)
    }
}

pub fn counting_strategies() -> (StrategySet, Arc<CountingStrategy>) {
    let counting = Arc::new(CountingStrategy::default());
    let set = StrategySet::new(Arc::new(registry()), counting.clone());
    (set, counting)
}

/// Expose `b` as both of its interfaces
pub fn expose_b(b: &Arc<B>) -> ExposedObject {
    ExposedObject::builder(Arc::clone(b))
        .with_interface::<dyn IComInterface1>(b.clone())
        .unwrap()
        .with_interface::<dyn IComInterface3>(b.clone())
        .unwrap()
        .expose()
}

/// Foreign pointer carrying a fresh reference to `exposed`
pub fn foreign_ref(exposed: &ExposedObject) -> ForeignPtr {
    ForeignPtr::new(exposed.clone().into_raw()).unwrap()
}
