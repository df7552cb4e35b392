//! The finger table: `{1..m}` routing cache, entry 1 mirrors the successor. Grounded on
//! `finger_table.go`, generalized from a bare `map[int]*RemoteNode` protected ad hoc to a
//! fixed-size array behind the ring's single lock (§5 folds this into the ring's RwLock
//! rather than giving the table its own mutex, since every mutation already happens from
//! within a ring write-lock section).

use crate::capability::RemoteHandle;
use crate::identifier::{Identifier, BITS};
use crate::node::NodeInfo;

/// `finger[k]` for `k` in `1..=160`; index 0 is unused so `k` indexes directly.
pub struct FingerTable {
    entries: Vec<Option<RemoteHandle>>,
    cursor: usize,
}

impl FingerTable {
    pub fn new() -> Self {
        FingerTable { entries: (0..=BITS).map(|_| None).collect(), cursor: 0 }
    }

    pub fn get(&self, k: usize) -> Option<&RemoteHandle> {
        self.entries.get(k).and_then(|e| e.as_ref())
    }

    pub fn set(&mut self, k: usize, handle: RemoteHandle) {
        self.entries[k] = Some(handle);
    }

    /// Advance the cursor (wrapping `1..=m`) and return `(index, target_identifier)` for the
    /// next finger to refresh, per `FingerTable.CalculateIdentifier`.
    pub fn advance_cursor(&mut self, local: Identifier) -> (usize, Identifier) {
        self.cursor += 1;
        if self.cursor > BITS {
            self.cursor = 1;
        }
        (self.cursor, local.finger_target(self.cursor))
    }

    /// Scan from index `m` down to `1`; return the first entry whose identifier lies
    /// strictly in `(local, target)`.
    pub fn closest_preceding_node(&self, local: Identifier, target: Identifier) -> Option<&RemoteHandle> {
        for k in (1..=BITS).rev() {
            if let Some(handle) = self.get(k) {
                if handle.identifier().between(local, target) {
                    return Some(handle);
                }
            }
        }
        None
    }

    /// Distinct remote identifiers currently installed (used by the finger-refresh testable
    /// property, which only cares about the count of distinct entries).
    pub fn distinct_node_count(&self) -> usize {
        let mut ids: Vec<Identifier> = self.entries.iter().flatten().map(|h| h.identifier()).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }

    pub fn snapshot(&self) -> Vec<(usize, NodeInfo)> {
        self.entries.iter().enumerate().filter_map(|(k, e)| e.as_ref().map(|h| (k, h.node_info()))).collect()
    }
}

impl Default for FingerTable {
    fn default() -> Self {
        Self::new()
    }
}
