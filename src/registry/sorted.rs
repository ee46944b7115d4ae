//! Sorted-id lookup table
//!
//! Same answers as `InterfaceRegistry`, stored as two sorted arrays so both
//! directions are a binary search with no hashing.

use super::{InterfaceDetailsLookup, InterfaceRegistry};
use crate::abi::Guid;
use crate::identity::{InterfaceIdentity, TypeKey};
use core::any::TypeId;

#[derive(Debug, Clone, Default)]
pub struct SortedIdTable {
    /// Sorted by iid
    entries: Vec<(Guid, TypeKey, InterfaceIdentity)>,
    /// (type id, index into `entries`), sorted by type id
    keys: Vec<(TypeId, usize)>,
}

impl SortedIdTable {
    pub fn from_registry(registry: &InterfaceRegistry) -> Self {
        let mut entries: Vec<_> = registry
            .iter()
            .map(|(key, identity)| (identity.iid(), key, identity))
            .collect();
        entries.sort_unstable_by_key(|(iid, _, _)| *iid);

        let mut keys: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(index, (_, key, _))| (key.type_id(), index))
            .collect();
        keys.sort_unstable_by_key(|(id, _)| *id);

        Self { entries, keys }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Interface ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = Guid> + '_ {
        self.entries.iter().map(|(iid, _, _)| *iid)
    }
}

impl InterfaceDetailsLookup for SortedIdTable {
    fn resolve(&self, interface: TypeKey) -> Option<InterfaceIdentity> {
        let pos = self
            .keys
            .binary_search_by_key(&interface.type_id(), |(id, _)| *id)
            .ok()?;
        let (_, index) = self.keys[pos];
        Some(self.entries[index].2)
    }

    fn resolve_iid(&self, iid: &Guid) -> Option<(TypeKey, InterfaceIdentity)> {
        let index = self
            .entries
            .binary_search_by_key(iid, |(id, _, _)| *id)
            .ok()?;
        let (_, key, identity) = self.entries[index];
        Some((key, identity))
    }
}
