//! Tests for the vtable cache

use super::*;
use crate::abi::{HResult, IID_IUNKNOWN};
use crate::strategy::FreeThreaded;
use crate::test_support::{FakeObject, One, OneImpl, Two, IID_ONE, IID_TWO};
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Barrier};
use std::thread;

fn one_identity() -> InterfaceIdentity {
    InterfaceIdentity::new(IID_ONE, TypeKey::of::<OneImpl>(), 4)
}

/// Query `object` for `iid` and build the entry the way a wrapper would
fn compute(cache: &dyn CacheStrategy, object: ForeignPtr, identity: &InterfaceIdentity) -> Result<TableInfo> {
    let instance = unsafe { FreeThreaded.query_interface(object, &identity.iid()) }
        .map_err(|status| InteropError::Foreign { status })?;
    unsafe { cache.construct_table_info(TypeKey::of::<One>(), identity, instance) }
}

#[test]
fn test_construct_reads_vtable_from_instance() {
    let (object, counters) = FakeObject::create(&[IID_ONE]);
    let cache = DefaultCaching::new();
    let info = compute(&cache, object, &one_identity()).unwrap();

    assert_eq!(info.instance, object);
    assert_eq!(info.vtable.len(), 4);
    assert_eq!(info.vtable.as_ptr(), unsafe { object.vtable_ptr() });
    assert_eq!(info.implementation, TypeKey::of::<OneImpl>());

    unsafe {
        FreeThreaded.release(info.instance);
        FreeThreaded.release(object);
    }
    assert!(counters.freed());
}

#[test]
fn test_get_or_insert_queries_once() {
    let (object, counters) = FakeObject::create(&[IID_ONE]);
    let cache: Box<dyn CacheStrategy> = Box::new(DefaultCaching::new());
    let identity = one_identity();

    let first = cache
        .get_or_insert(TypeKey::of::<One>(), &FreeThreaded, || compute(cache.as_ref(), object, &identity))
        .unwrap();
    let second = cache
        .get_or_insert(TypeKey::of::<One>(), &FreeThreaded, || panic!("hit must not recompute"))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(counters.queries(), 1);
    assert_eq!(cache.len(), 1);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.races_lost, 0);

    cache.clear(&FreeThreaded);
    unsafe {
        FreeThreaded.release(object);
    }
    assert!(counters.freed());
}

#[test]
fn test_failed_compute_caches_nothing() {
    let (object, counters) = FakeObject::create(&[]);
    let cache: Box<dyn CacheStrategy> = Box::new(DefaultCaching::new());
    let identity = InterfaceIdentity::new(IID_TWO, TypeKey::of::<OneImpl>(), 5);

    let err = cache
        .get_or_insert(TypeKey::of::<Two>(), &FreeThreaded, || compute(cache.as_ref(), object, &identity))
        .unwrap_err();

    assert_eq!(err.status(), HResult::E_NOINTERFACE);
    assert!(cache.is_empty());
    assert_eq!(counters.refs(), 1);

    unsafe {
        FreeThreaded.release(object);
    }
}

#[test]
fn test_try_set_is_insert_once() {
    let (object, counters) = FakeObject::create(&[]);
    let cache = DefaultCaching::new();
    let info = TableInfo {
        instance: object,
        vtable: unsafe { VTable::of_instance(object, 3) }.unwrap(),
        implementation: TypeKey::of::<OneImpl>(),
    };

    assert!(cache.try_set_table_info(TypeKey::of::<One>(), info));
    assert!(!cache.try_set_table_info(TypeKey::of::<One>(), info));
    assert_eq!(cache.keys(), vec![TypeKey::of::<One>()]);

    // The stored entry carries the only reference
    cache.clear(&FreeThreaded);
    assert!(cache.is_empty());
    assert!(counters.freed());
}

#[test]
fn test_clear_releases_each_entry_once() {
    let (object, counters) = FakeObject::create(&[IID_ONE, IID_TWO]);
    let cache: Box<dyn CacheStrategy> = Box::new(DefaultCaching::new());

    for (key, identity) in [
        (TypeKey::of::<One>(), one_identity()),
        (TypeKey::of::<Two>(), InterfaceIdentity::new(IID_TWO, TypeKey::of::<OneImpl>(), 5)),
    ] {
        cache
            .get_or_insert(key, &FreeThreaded, || {
                let instance = unsafe { FreeThreaded.query_interface(object, &identity.iid()) }
                    .map_err(|status| InteropError::Foreign { status })?;
                unsafe { cache.construct_table_info(key, &identity, instance) }
            })
            .unwrap();
    }
    assert_eq!(counters.refs(), 3);

    cache.clear(&FreeThreaded);
    assert_eq!(counters.refs(), 1);
    assert_eq!(counters.releases(), 2);

    cache.clear(&FreeThreaded);
    assert_eq!(counters.releases(), 2);

    unsafe {
        FreeThreaded.release(object);
    }
    assert!(counters.freed());
}

#[test]
fn test_racing_inserts_keep_one_entry() {
    const THREADS: usize = 8;

    let (object, counters) = FakeObject::create(&[IID_ONE]);
    let cache: Arc<Box<dyn CacheStrategy>> = Arc::new(Box::new(DefaultCaching::new()));
    let barrier = Arc::new(Barrier::new(THREADS));
    let computed = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let computed = Arc::clone(&computed);
            thread::spawn(move || {
                cache
                    .get_or_insert(TypeKey::of::<One>(), &FreeThreaded, || {
                        // Every thread misses before any inserts
                        barrier.wait();
                        computed.fetch_add(1, Ordering::SeqCst);
                        compute(&**cache, object, &one_identity())
                    })
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<TableInfo> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(computed.load(Ordering::SeqCst), THREADS as u32);
    assert_eq!(cache.len(), 1);
    let stats = cache.stats();
    assert_eq!(stats.races_lost, THREADS as u64 - 1);
    // Losers read the winner without counting a hit
    assert_eq!(stats.misses, THREADS as u64);
    assert_eq!(stats.hits, 0);

    // Losers released their references: identity + one cached entry remain
    assert_eq!(counters.refs(), 2);

    cache.clear(&FreeThreaded);
    unsafe {
        FreeThreaded.release(object);
    }
    assert!(counters.freed());
}

#[test]
fn test_shard_amount_is_normalized() {
    for shards in [0, 1, 3, 4, 5] {
        let cache = DefaultCaching::with_config(&CacheConfig {
            initial_capacity: 0,
            shard_amount: shards,
        });
        assert!(cache.is_empty());
    }
}

#[test]
fn test_iunknown_query_on_fake() {
    let (object, counters) = FakeObject::create(&[]);
    let identity = unsafe { FreeThreaded.query_interface(object, &IID_IUNKNOWN) }.unwrap();
    assert_eq!(identity, object);
    assert_eq!(counters.refs(), 2);
    unsafe {
        FreeThreaded.release(identity);
        FreeThreaded.release(object);
    }
    assert!(counters.freed());
}
