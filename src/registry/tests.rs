//! Tests for interface registration and lookup

use super::*;
use crate::test_support::{registry, One, OneImpl, Three, Two, IID_ONE, IID_THREE, IID_TWO};

struct Unregistered;

#[test]
fn test_resolve_registered() {
    let registry = registry();
    let identity = registry.resolve(TypeKey::of::<One>()).unwrap();

    assert_eq!(identity.iid(), IID_ONE);
    assert_eq!(identity.implementation(), TypeKey::of::<OneImpl>());
    assert_eq!(identity.vtable_len(), 4);
    assert_eq!(identity.method_count(), 1);
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_resolve_unregistered_is_none() {
    assert!(registry().resolve(TypeKey::of::<Unregistered>()).is_none());
}

#[test]
fn test_reverse_lookup() {
    let registry = registry();
    let (key, identity) = registry.by_iid(&IID_TWO).unwrap();
    assert_eq!(key, TypeKey::of::<Two>());
    assert_eq!(identity.vtable_len(), 5);
    assert!(registry.by_iid(&Guid::ZERO).is_none());
}

#[test]
fn test_vtable_too_short_rejected() {
    let mut registry = InterfaceRegistry::new();
    let err = registry
        .register_identity(
            TypeKey::of::<One>(),
            InterfaceIdentity::new(IID_ONE, TypeKey::of::<OneImpl>(), 2),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidVTableLength { len: 2, .. }));
    assert!(registry.is_empty());
}

#[test]
fn test_duplicate_iid_rejected() {
    let mut registry = registry();
    let err = registry
        .register_identity(
            TypeKey::of::<Unregistered>(),
            InterfaceIdentity::new(IID_THREE, TypeKey::of::<OneImpl>(), 3),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateInterfaceId { iid, .. } if iid == IID_THREE));
}

#[test]
fn test_duplicate_interface_rejected() {
    let mut registry = registry();
    let err = registry
        .register_identity(
            TypeKey::of::<Three>(),
            InterfaceIdentity::new(Guid::from_u128(7), TypeKey::of::<OneImpl>(), 3),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateInterface { .. }));
}

#[test]
fn test_identical_registration_is_noop() {
    let mut registry = registry();
    let identity = registry.resolve(TypeKey::of::<One>()).unwrap();
    registry.register_identity(TypeKey::of::<One>(), identity).unwrap();
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_sorted_table_matches_registry() {
    let registry = registry();
    let sorted = SortedIdTable::from_registry(&registry);

    assert_eq!(sorted.len(), registry.len());
    for (key, identity) in registry.iter() {
        assert_eq!(sorted.resolve(key), Some(identity));
        assert_eq!(sorted.resolve_iid(&identity.iid()), Some((key, identity)));
    }
    assert!(sorted.resolve(TypeKey::of::<Unregistered>()).is_none());
    assert!(sorted.resolve_iid(&Guid::ZERO).is_none());

    let ids: Vec<Guid> = sorted.ids().collect();
    assert_eq!(ids, vec![IID_ONE, IID_TWO, IID_THREE]);
}

#[test]
fn test_concurrent_resolve() {
    let registry = std::sync::Arc::new(registry());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = std::sync::Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    assert!(registry.resolve(TypeKey::of::<Two>()).is_some());
                    assert!(registry.resolve(TypeKey::of::<Unregistered>()).is_none());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
