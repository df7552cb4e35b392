//! The local record store: an ordered map over 160-bit identifiers with circular range
//! scans, grounded on the source's `DStore` (`dstore.go`) but generalized from a bare
//! `map[id]*[]byte` into an identifier-ordered structure so range scans don't need a full
//! linear pass.

use crate::identifier::Identifier;
use crate::timestamp::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable record keyed by its own identifier. Re-`put`ting the same identifier
/// overwrites in place (idempotent re-acceptance of a duplicate).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    pub identifier: Identifier,
    pub created_at: Timestamp,
    pub content: Vec<u8>,
}

impl Record {
    /// Build a record whose identifier is the SHA-1 of its content, per the data model.
    pub fn new(content: Vec<u8>) -> Self {
        let identifier = Identifier::of_bytes(&content);
        Record { identifier, created_at: Timestamp::now(), content }
    }

    pub fn with_identifier(identifier: Identifier, created_at: Timestamp, content: Vec<u8>) -> Self {
        Record { identifier, created_at, content }
    }
}

/// Folds identifiers left-to-right in ascending byte order into a single root hash, the
/// fingerprint the spec calls "a stable fold of identifiers in a range". Two peers that
/// hold the same set of identifiers, in any internal order, compute the same root hash.
pub fn fold_root_hash<'a>(ids: impl Iterator<Item = &'a Identifier>) -> Identifier {
    let mut sorted: Vec<&Identifier> = ids.collect();
    sorted.sort();
    let mut acc = Identifier::ZERO;
    for id in sorted {
        let mut buf = Vec::with_capacity(crate::identifier::SIZE * 2);
        buf.extend_from_slice(acc.as_bytes());
        buf.extend_from_slice(id.as_bytes());
        acc = Identifier::of_bytes(&buf);
    }
    acc
}

#[derive(Default)]
pub struct Store {
    records: RwLock<BTreeMap<Identifier, Record>>,
}

impl Store {
    pub fn new() -> Self {
        Store { records: RwLock::new(BTreeMap::new()) }
    }

    /// Insert or overwrite. Returns `true` always (the store never rejects at this layer —
    /// ownership rejection happens one layer up, at the ring).
    pub fn put(&self, record: Record) -> bool {
        self.records.write().insert(record.identifier, record);
        true
    }

    pub fn get(&self, id: Identifier) -> Option<Record> {
        self.records.read().get(&id).cloned()
    }

    /// Circular range scan over `(from, to]`, ascending by identifier, wrapping across zero
    /// if `from > to`. Takes an internal snapshot so later mutation doesn't affect a scan
    /// in progress.
    pub fn range(&self, from: Identifier, to: Identifier) -> BTreeMap<Identifier, Record> {
        let guard = self.records.read();
        if from == to {
            // Collapsed interval: (a,a] falls through to the whole ring, same as the other
            // three interval predicates.
            return guard.clone();
        }
        if from < to {
            guard
                .range((std::ops::Bound::Excluded(from), std::ops::Bound::Included(to)))
                .map(|(k, v)| (*k, v.clone()))
                .collect()
        } else {
            let mut out: BTreeMap<Identifier, Record> = guard
                .range((std::ops::Bound::Excluded(from), std::ops::Bound::Unbounded))
                .map(|(k, v)| (*k, v.clone()))
                .collect();
            out.extend(
                guard
                    .range((std::ops::Bound::Unbounded, std::ops::Bound::Included(to)))
                    .map(|(k, v)| (*k, v.clone())),
            );
            out
        }
    }

    pub fn all(&self) -> BTreeMap<Identifier, Record> {
        self.records.read().clone()
    }

    /// Convenience combining [`Store::range`] with [`fold_root_hash`] over the identifiers
    /// of the returned set.
    pub fn range_with_root_hash(&self, from: Identifier, to: Identifier) -> (BTreeMap<Identifier, Record>, Identifier) {
        let set = self.range(from, to);
        let hash = fold_root_hash(set.keys());
        (set, hash)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> Identifier {
        let mut b = [0u8; crate::identifier::SIZE];
        b[crate::identifier::SIZE - 1] = byte;
        Identifier::from_bytes(b)
    }

    #[test]
    fn put_get_roundtrip() {
        let store = Store::new();
        let r = Record::with_identifier(id(5), Timestamp::now(), b"hello".to_vec());
        store.put(r.clone());
        let got = store.get(id(5)).unwrap();
        assert_eq!(got.content, b"hello");
    }

    #[test]
    fn range_non_wrapping_is_left_open_right_closed() {
        let store = Store::new();
        for b in [1u8, 5, 10, 15, 20] {
            store.put(Record::with_identifier(id(b), Timestamp::now(), vec![b]));
        }
        let got = store.range(id(5), id(15));
        let keys: Vec<u8> = got.keys().map(|k| k.as_bytes()[crate::identifier::SIZE - 1]).collect();
        assert_eq!(keys, vec![10, 15]);
    }

    #[test]
    fn range_wraps_across_zero() {
        let store = Store::new();
        for b in [1u8, 5, 250, 255] {
            store.put(Record::with_identifier(id(b), Timestamp::now(), vec![b]));
        }
        let got = store.range(id(250), id(5));
        let keys: Vec<u8> = got.keys().map(|k| k.as_bytes()[crate::identifier::SIZE - 1]).collect();
        assert_eq!(keys, vec![1, 5, 255]);
    }

    #[test]
    fn collapsed_range_returns_the_whole_ring() {
        let store = Store::new();
        for b in [1u8, 5, 250, 255] {
            store.put(Record::with_identifier(id(b), Timestamp::now(), vec![b]));
        }
        let got = store.range(id(5), id(5));
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn root_hash_is_order_independent() {
        let a = vec![id(1), id(2), id(3)];
        let b = vec![id(3), id(1), id(2)];
        assert_eq!(fold_root_hash(a.iter()), fold_root_hash(b.iter()));
    }
}
