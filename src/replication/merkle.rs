//! Time-bucketed Merkle trees over a master block's rows, and the leaf-level diffing used
//! by the optional `ForwardSync` refinement. Grounded on `tree/block.go`, `tree/merkle.go`,
//! `tree/helpers.go` and `tree/transmision.go`.

use super::Row;
use crate::identifier::Identifier;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node in the flattened, construction-ordered representation of a Merkle tree: leaves
/// (`level == 0`) first in ascending block-index order, then each successive level's
/// branches, with the root as the final entry. This mirrors the source's flat `[]MerkleNode`
/// rather than a boxed tree, because the diffing algorithm below walks it positionally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleNode {
    pub level: u32,
    pub hash: Identifier,
}

/// A built Merkle tree plus the leaf hashes before odd-level duplication padding, used for
/// direct leaf-set comparisons when two trees don't share a shape.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    pub nodes: Vec<MerkleNode>,
    pub leaf_hashes: Vec<Identifier>,
}

impl MerkleTree {
    pub fn root(&self) -> Identifier {
        self.nodes.last().map(|n| n.hash).unwrap_or(Identifier::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_hashes.is_empty()
    }
}

/// `⌊log2(elapsed_secs)⌋`, clamped to `>= 0`. Recent writes land in small buckets; writes
/// more than an hour old start coalescing into the same bucket as their neighbors.
fn block_index(elapsed_secs: f64) -> u32 {
    if elapsed_secs < 1.0 {
        return 0;
    }
    elapsed_secs.log2().floor().max(0.0) as u32
}

fn fold(acc: Option<Identifier>, next: Identifier) -> Identifier {
    match acc {
        None => Identifier::of_bytes(next.as_bytes()),
        Some(prev) => {
            let mut buf = Vec::with_capacity(crate::identifier::SIZE * 2);
            buf.extend_from_slice(prev.as_bytes());
            buf.extend_from_slice(next.as_bytes());
            Identifier::of_bytes(&buf)
        }
    }
}

/// Build a Merkle tree over `rows`, bucketing by time relative to `source_time` (the
/// anti-entropy round's initiator clock, never the receiver's — see the open question on
/// clock skew).
pub fn build(rows: &[Row], source_time: Timestamp) -> MerkleTree {
    if rows.is_empty() {
        return MerkleTree { nodes: vec![MerkleNode { level: 0, hash: Identifier::ZERO }], leaf_hashes: vec![] };
    }

    let mut grouped: BTreeMap<u32, Vec<&Row>> = BTreeMap::new();
    for row in rows {
        let elapsed = row.created_at.elapsed_seconds_until(source_time);
        grouped.entry(block_index(elapsed)).or_default().push(row);
    }

    let mut nodes = Vec::new();
    let mut leaf_hashes = Vec::new();
    let mut level0 = Vec::new();
    for group in grouped.values() {
        // Sort within a block for a deterministic rolling-hash fold order across peers.
        let mut sorted: Vec<&&Row> = group.iter().collect();
        sorted.sort_by_key(|r| r.identifier);
        let mut acc = None;
        for row in sorted {
            acc = Some(fold(acc, row.identifier));
        }
        let block_hash = acc.unwrap();
        nodes.push(MerkleNode { level: 0, hash: block_hash });
        leaf_hashes.push(block_hash);
        level0.push(block_hash);
    }

    if level0.len() % 2 == 1 {
        let dup = *level0.last().unwrap();
        nodes.push(MerkleNode { level: 0, hash: dup });
        level0.push(dup);
    }

    make_branches(&mut nodes, level0, 1);
    MerkleTree { nodes, leaf_hashes }
}

fn make_branches(nodes: &mut Vec<MerkleNode>, level_hashes: Vec<Identifier>, level: u32) {
    let mut next = Vec::with_capacity(level_hashes.len().div_ceil(2));
    let mut i = 0;
    while i < level_hashes.len() {
        let left = level_hashes[i];
        let right = if i + 1 < level_hashes.len() { level_hashes[i + 1] } else { left };
        let mut buf = Vec::with_capacity(crate::identifier::SIZE * 2);
        buf.extend_from_slice(left.as_bytes());
        buf.extend_from_slice(right.as_bytes());
        let hash = Identifier::of_bytes(&buf);
        nodes.push(MerkleNode { level, hash });
        next.push(hash);
        i += 2;
    }
    if next.len() > 1 {
        make_branches(nodes, next, level + 1);
    }
}

/// Leaf hashes `remote` has that `local` is missing. When the two trees have the same node
/// count, this prunes whole identical subtrees by comparing level boundaries outside-in
/// before falling back to a per-leaf compare; otherwise it's a direct leaf-set difference.
pub fn missing_from_remote(local: &MerkleTree, remote: &[MerkleNode]) -> Vec<Identifier> {
    if remote.is_empty() {
        return vec![];
    }
    if remote.len() == local.nodes.len() {
        diff_missing_pruned(remote, local)
    } else {
        leaf_set_difference(remote, &local.leaf_hashes)
    }
}

/// Leaf hashes `local` has that `remote` is missing (the symmetric direction, always a
/// direct leaf-set comparison — the source has no pruned fast path for this direction).
pub fn extra_vs_remote(local: &MerkleTree, remote: &[MerkleNode]) -> Vec<Identifier> {
    if local.leaf_hashes.is_empty() {
        return vec![];
    }
    local.leaf_hashes.iter().copied().filter(|h| !remote.iter().any(|n| n.hash == *h)).collect()
}

fn diff_missing_pruned(remote: &[MerkleNode], local: &MerkleTree) -> Vec<Identifier> {
    let mut diffs: Vec<Identifier> = Vec::new();
    let mut last_level = remote[remote.len() - 1].level;
    let mut has_diff = false;
    for i in (0..remote.len()).rev() {
        if last_level != remote[i].level && !has_diff {
            // Ancestor hashes matched all the way down: identical subtree, nothing to report.
            return vec![];
        }
        last_level = remote[i].level;
        if local.nodes[i].hash != remote[i].hash || local.nodes[i].level != remote[i].level {
            has_diff = true;
            if remote[i].level == 0 {
                diffs.push(remote[i].hash);
            }
        }
        if let Some(pos) = diffs.iter().position(|h| *h == local.nodes[i].hash) {
            diffs.remove(pos);
        }
    }
    diffs
}

fn leaf_set_difference(remote: &[MerkleNode], local_leaves: &[Identifier]) -> Vec<Identifier> {
    remote
        .iter()
        .take_while(|n| n.level == 0)
        .filter(|n| !local_leaves.contains(&n.hash))
        .map(|n| n.hash)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(byte: u8, age_secs: u64) -> Row {
        let mut b = [0u8; crate::identifier::SIZE];
        b[crate::identifier::SIZE - 1] = byte;
        Row {
            identifier: Identifier::from_bytes(b),
            created_at: Timestamp::from_system_time(std::time::SystemTime::now() - std::time::Duration::from_secs(age_secs)),
        }
    }

    #[test]
    fn two_rows_same_bucket_make_one_leaf_plus_root() {
        let now = Timestamp::now();
        let rows = vec![row(1, 1), row(2, 1)];
        let tree = build(&rows, now);
        // Same age => same block => 1 leaf, padded to 2 (duplicate) => 1 branch (root) => 3 nodes total.
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.leaf_hashes.len(), 1);
    }

    #[test]
    fn distinct_buckets_make_two_leaves_plus_root() {
        let now = Timestamp::now();
        let rows = vec![row(1, 1), row(2, 10_000)];
        let tree = build(&rows, now);
        assert_eq!(tree.leaf_hashes.len(), 2);
        assert_eq!(tree.nodes.len(), 3); // 2 leaves + 1 root
    }

    #[test]
    fn identical_trees_have_no_diff() {
        let now = Timestamp::now();
        let rows = vec![row(1, 1), row(2, 10_000)];
        let a = build(&rows, now);
        let b = build(&rows, now);
        assert!(missing_from_remote(&a, &b.nodes).is_empty());
        assert!(extra_vs_remote(&a, &b.nodes).is_empty());
    }

    #[test]
    fn extra_row_shows_up_as_extra_not_missing() {
        let now = Timestamp::now();
        let a = build(&[row(1, 1), row(2, 10_000)], now);
        let b = build(&[row(1, 1)], now);
        assert!(!extra_vs_remote(&a, &b.nodes).is_empty());
        assert!(missing_from_remote(&a, &b.nodes).is_empty());
    }
}
