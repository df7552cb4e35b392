//! Canonical wire encoding for anti-entropy envelopes (§6): sorted map keys, fixed-width
//! fields, no trailing whitespace, so two peers folding the same records produce identical
//! bytes. `BTreeMap` gives sorted-key serialization for free with `serde_json`; record map
//! keys are base64 of the 20-byte identifier, per the external-interfaces wire format.

use super::merkle::MerkleNode;
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::store::Record;
use crate::timestamp::Timestamp;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The basic root-hash anti-entropy envelope (§4.5 `SyncData`/`GlobalMaintenance`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub source_time: Timestamp,
    /// Key 0 is the owner identifier; keys 1..REPLICAS-1 are predecessor identifiers in
    /// order of proximity.
    pub ranges: BTreeMap<u8, Identifier>,
    pub root_hash: Identifier,
    /// Empty on the "already synced" reply.
    #[serde(default)]
    pub records: BTreeMap<String, Record>,
}

impl Envelope {
    pub fn empty(source_time: Timestamp, ranges: BTreeMap<u8, Identifier>, root_hash: Identifier) -> Self {
        Envelope { source_time, ranges, root_hash, records: BTreeMap::new() }
    }

    pub fn with_records(source_time: Timestamp, ranges: BTreeMap<u8, Identifier>, root_hash: Identifier, records: &BTreeMap<Identifier, Record>) -> Self {
        let records = records.values().map(|r| (BASE64.encode(r.identifier.as_bytes()), r.clone())).collect();
        Envelope { source_time, ranges, root_hash, records }
    }

    pub fn owner(&self) -> Option<Identifier> {
        self.ranges.get(&0).copied()
    }

    /// The furthest predecessor boundary present, i.e. `ranges[replicas-1]`.
    pub fn outer_bound(&self, replicas: usize) -> Option<Identifier> {
        self.ranges.get(&((replicas.saturating_sub(1)) as u8)).copied()
    }

    pub fn decoded_records(&self) -> Result<BTreeMap<Identifier, Record>> {
        self.records
            .iter()
            .map(|(k, v)| {
                let bytes = BASE64.decode(k).map_err(|e| Error::Serialization(serde_json::Error::io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))))?;
                if bytes.len() != crate::identifier::SIZE {
                    return Err(Error::Serialization(serde_json::Error::io(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad identifier length"))));
                }
                let mut arr = [0u8; crate::identifier::SIZE];
                arr.copy_from_slice(&bytes);
                Ok((Identifier::from_bytes(arr), v.clone()))
            })
            .collect()
    }

    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A `ForwardSync` request carrying the caller's predecessor-list fingerprint, the rows it
/// wants to reconcile, and its local block-level Merkle tree (flattened node list).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwardSyncRequest {
    pub predecessor_list_hash: Identifier,
    pub source_time: Timestamp,
    pub tree_nodes: Vec<MerkleNode>,
}

/// The responder's view of the diff: leaf hashes it found missing on its own side (it wants
/// the records behind them) are implicit in `diff_nodes`; the caller resolves which rows
/// those leaves cover locally before reshipping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwardSyncResponse {
    pub diff_nodes: Vec<MerkleNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_encoding_round_trips() {
        let mut ranges = BTreeMap::new();
        ranges.insert(0u8, Identifier::ZERO);
        let env = Envelope::empty(Timestamp::now(), ranges, Identifier::ZERO);
        let bytes = env.to_canonical_bytes().unwrap();
        let back = Envelope::from_canonical_bytes(&bytes).unwrap();
        assert_eq!(back.root_hash, env.root_hash);
    }

    #[test]
    fn record_keys_are_base64_of_identifier() {
        let rec = Record::new(b"hello".to_vec());
        let mut records = BTreeMap::new();
        records.insert(rec.identifier, rec.clone());
        let mut ranges = BTreeMap::new();
        ranges.insert(0u8, Identifier::ZERO);
        let env = Envelope::with_records(Timestamp::now(), ranges, Identifier::ZERO, &records);
        let decoded = env.decoded_records().unwrap();
        assert_eq!(decoded.get(&rec.identifier).unwrap().content, b"hello");
    }
}
