//! Data replication and Merkle anti-entropy: the subsystem the original source spends most
//! of its weight on, grounded on `replication.go` and the `tree/` package.

pub mod envelope;
pub mod merkle;
pub mod sync;

use crate::identifier::Identifier;
use crate::store::Record;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// A record reduced to the fields the Merkle machinery cares about: its identifier (doubling
/// as its content hash, since `identifier = SHA-1(content)`) and when it was created.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Row {
    pub identifier: Identifier,
    pub created_at: Timestamp,
}

impl From<&Record> for Row {
    fn from(r: &Record) -> Self {
        Row { identifier: r.identifier, created_at: r.created_at }
    }
}

/// All rows whose identifier falls in one predecessor-delimited sub-range, one top-level
/// Merkle partition. Grounded on `replication.go`'s `MasterBlock`.
#[derive(Clone, Debug)]
pub struct MasterBlock {
    pub min: Identifier,
    pub max: Identifier,
    pub rows: Vec<Row>,
}

/// Partition `rows` into `replicas - 1` master blocks delimited by consecutive entries of
/// `predecessor_list` (plus the local identifier as the innermost boundary), mirroring
/// `Replication.findMasterBlockNumber`. Returns `None` if there aren't enough predecessor
/// entries to form the partition yet (same precondition as anti-entropy needing
/// `predecessor_list[replicas-2]`).
pub fn partition_master_blocks(rows: &[Row], predecessors: &[Identifier], local: Identifier, replicas: usize) -> Option<Vec<MasterBlock>> {
    let needed = replicas.saturating_sub(1);
    if predecessors.len() < needed {
        return None;
    }
    // Sub-range i (0-indexed, i = replicas-2 down to 0) is (predecessors[i], bound_above_i]
    // where bound_above_i is predecessors[i-1], or `local` for i == 0.
    let mut blocks: Vec<MasterBlock> = (0..needed)
        .map(|i| {
            let min = predecessors[i];
            let max = if i == 0 { local } else { predecessors[i - 1] };
            MasterBlock { min, max, rows: Vec::new() }
        })
        .collect();

    for row in rows {
        for block in blocks.iter_mut() {
            if row.identifier.between_r(block.min, block.max) {
                block.rows.push(*row);
                break;
            }
        }
    }
    Some(blocks)
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
    fn partitions_rows_by_predecessor_subrange() {
        let local = id(100);
        let predecessors = vec![id(50)]; // replicas = 2 -> one master block (50, 100]
        let rows = vec![
            Row { identifier: id(60), created_at: Timestamp::now() },
            Row { identifier: id(10), created_at: Timestamp::now() }, // outside (50,100]
        ];
        let blocks = partition_master_blocks(&rows, &predecessors, local, 2).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].rows.len(), 1);
        assert_eq!(blocks[0].rows[0].identifier, id(60));
    }

    #[test]
    fn insufficient_predecessors_returns_none() {
        let local = id(100);
        let predecessors: Vec<Identifier> = vec![];
        assert!(partition_master_blocks(&[], &predecessors, local, 2).is_none());
    }
}
