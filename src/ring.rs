//! The ring: local identity plus the four pieces of routing state (successor, predecessor,
//! successor list, finger table) and the local store, all behind one lock per §5's
//! discipline. Grounded on `ring.go`/`ring_interface.go` for the state shape and on
//! `stabilizer.go` for the maintenance operations, generalized from a bundle of loosely
//! related exported methods on a God object into a single `Ring` whose public surface is
//! exactly the router plus the maintenance operations plus the inbound halves of the
//! capability set (§4.6).

use crate::capability::{PeerConnector, RemoteHandle, RemotePeer, StabilizerData};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::finger_table::FingerTable;
use crate::identifier::Identifier;
use crate::node::NodeInfo;
use crate::predecessor_list::PredecessorList;
use crate::replication::envelope::{Envelope, ForwardSyncRequest, ForwardSyncResponse};
use crate::replication::merkle;
use crate::replication::{partition_master_blocks, Row};
use crate::store::{Record, Store};
use crate::successor_list::SuccessorList;
use crate::timestamp::Timestamp;
use crate::util::gate::AtomicIntervalGate;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Once a successor candidate has logged as unreachable, don't repeat the warning for this
/// long — a node that's been down for minutes shouldn't produce a warn! on every ~1s tick.
const UNREACHABLE_WARN_INTERVAL_MS: i64 = 10_000;

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Everything §5 puts behind the ring's single read/write lock.
struct RingState {
    predecessor: Option<RemoteHandle>,
    successor: RemoteHandle,
    successor_list: SuccessorList,
    predecessor_list: PredecessorList,
    finger_table: FingerTable,
}

pub struct Ring {
    pub local: NodeInfo,
    state: parking_lot::RwLock<RingState>,
    store: Store,
    settings: Settings,
    connector: Arc<dyn PeerConnector>,
    self_handle: RemoteHandle,
    /// Rate-limits the "successor candidate unreachable" warning (§10.1's "bound how often
    /// it logs"), independent of the ~1s stabilize cadence that would otherwise repeat it.
    unreachable_warn_gate: AtomicIntervalGate<UNREACHABLE_WARN_INTERVAL_MS>,
}

impl Ring {
    /// A fresh single-node ring: `successor == local`, `predecessor == None`, exactly the
    /// bootstrap state scenario 1 of the testable-properties section describes.
    pub fn new(local: NodeInfo, connector: Arc<dyn PeerConnector>, settings: Settings) -> Arc<Ring> {
        Arc::new_cyclic(|weak: &Weak<Ring>| {
            let self_handle = RemoteHandle::new(Arc::new(LocalLoopback { local, ring: weak.clone() }));
            let mut successor_list = SuccessorList::new(settings.successor_list_len);
            successor_list.reset_to_self(self_handle.clone());
            Ring {
                local,
                state: parking_lot::RwLock::new(RingState {
                    predecessor: None,
                    successor: self_handle.clone(),
                    successor_list,
                    predecessor_list: PredecessorList::new(settings.successor_list_len),
                    finger_table: FingerTable::new(),
                }),
                store: Store::new(),
                settings,
                connector,
                self_handle,
                unreachable_warn_gate: AtomicIntervalGate::new(0),
            }
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn to_handle(&self, info: NodeInfo) -> RemoteHandle {
        if info.identifier == self.local.identifier {
            self.self_handle.clone()
        } else {
            self.connector.connect(info)
        }
    }

    pub fn successor_info(&self) -> NodeInfo {
        self.state.read().successor.node_info()
    }

    pub fn predecessor_info(&self) -> Option<NodeInfo> {
        self.state.read().predecessor.as_ref().map(|h| h.node_info())
    }

    pub fn successor_list_snapshot(&self) -> Vec<NodeInfo> {
        self.state.read().successor_list.snapshot()
    }

    pub fn predecessor_list_snapshot(&self) -> Vec<NodeInfo> {
        self.state.read().predecessor_list.snapshot()
    }

    pub fn predecessor_list_identifiers(&self) -> Vec<Identifier> {
        self.state.read().predecessor_list.identifiers()
    }

    pub fn finger_table_snapshot(&self) -> Vec<(usize, NodeInfo)> {
        self.state.read().finger_table.snapshot()
    }

    // ---- §4.3 router -----------------------------------------------------

    /// `find_successor(id)`, per §4.3. Recursion crosses process boundaries through
    /// [`RemotePeer::find_successor`]; the lock is never held across that call.
    pub async fn find_successor(&self, id: Identifier) -> Result<NodeInfo> {
        let (successor, is_self_successor) = {
            let state = self.state.read();
            (state.successor.clone(), state.successor.identifier() == self.local.identifier)
        };
        if is_self_successor {
            return Ok(self.local);
        }
        if id.between_r(self.local.identifier, successor.identifier()) {
            return Ok(successor.node_info());
        }
        let candidate = {
            let state = self.state.read();
            self.closest_preceding_node_locked(&state, id)
        };
        match candidate {
            None => Ok(self.local),
            Some(c) if c.identifier() == self.local.identifier => Ok(self.local),
            Some(c) => c.find_successor(id).await,
        }
    }

    fn closest_preceding_node_locked(&self, state: &RingState, target: Identifier) -> Option<RemoteHandle> {
        let finger_closest = state.finger_table.closest_preceding_node(self.local.identifier, target);
        if let Some(h) = state.successor_list.closest_preceding_node(self.local.identifier, target, finger_closest) {
            return Some(h.clone());
        }
        finger_closest.cloned()
    }

    // ---- join --------------------------------------------------------------

    /// Bootstrap into an existing ring through `bootstrap`. Not named in §4.6's inbound
    /// capability table — it only ever drives a single outbound `find_successor` call, then
    /// lets Stabilize converge the rest, matching the source's `RingInterface.Join` reduced
    /// to the modern `find_successor`-based join algorithm rather than its older
    /// predecessor-probing variant.
    pub async fn join(&self, bootstrap: RemoteHandle) -> Result<()> {
        let successor_info = bootstrap.find_successor(self.local.identifier).await?;
        let successor = self.to_handle(successor_info);
        let mut state = self.state.write();
        state.finger_table.set(1, successor.clone());
        state.successor_list.reset_to_self(successor.clone());
        state.successor = successor;
        Ok(())
    }

    // ---- §4.4 maintenance loops --------------------------------------------

    /// Stabilize, per §4.4 steps 1-5.
    pub async fn stabilize(&self) {
        let successor_candidates = {
            let state = self.state.read();
            let mut v = vec![state.successor.clone()];
            v.extend(state.successor_list.failover_candidates().iter().cloned());
            v
        };

        let mut chosen = None;
        let mut stabilizer_data = None;
        for (i, candidate) in successor_candidates.iter().enumerate() {
            if candidate.identifier() == self.local.identifier {
                break;
            }
            match candidate.get_stabilizer_data(self.local).await {
                Ok(data) => {
                    chosen = Some(candidate.clone());
                    stabilizer_data = Some(data);
                    break;
                }
                Err(e) => {
                    if self.unreachable_warn_gate.gate(now_millis()) {
                        warn!(remote = %candidate.node_info(), error = %e, "stabilize: successor candidate {i} unreachable");
                    } else {
                        debug!(remote = %candidate.node_info(), error = %e, "stabilize: successor candidate {i} unreachable (suppressed)");
                    }
                }
            }
        }

        let (mut successor, data) = match (chosen, stabilizer_data) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                // Every candidate failed (or the ring is a single node): fall back to self.
                let mut state = self.state.write();
                state.successor = self.self_handle.clone();
                state.successor_list.reset_to_self(self.self_handle.clone());
                return;
            }
        };

        if let Some(p) = data.predecessor {
            if p.identifier != self.local.identifier && p.identifier.between(self.local.identifier, successor.identifier()) {
                successor = self.to_handle(p);
            }
        }

        let predecessor_id = self.state.read().predecessor.as_ref().map(|h| h.identifier());
        {
            let mut state = self.state.write();
            state.successor_list.rebuild(successor.clone(), &data.successor_list, self.local.identifier, predecessor_id, |info| self.to_handle(info));
            state.successor = successor.clone();
            state.finger_table.set(1, successor.clone());
        }

        if let Err(e) = successor.notify(self.local).await {
            warn!(remote = %successor.node_info(), error = %e, "stabilize: notify failed");
        }

        let predecessor = self.state.read().predecessor.clone();
        if let Some(predecessor) = predecessor {
            match predecessor.get_predecessor_list(self.local).await {
                Ok(remote_list) => {
                    let successor_id = self.state.read().successor.identifier();
                    let mut state = self.state.write();
                    state.predecessor_list.rebuild(predecessor.clone(), &remote_list, self.local.identifier, Some(successor_id), |info| self.to_handle(info));
                }
                Err(e) => {
                    warn!(remote = %predecessor.node_info(), error = %e, "stabilize: predecessor list refresh failed");
                }
            }
        }
    }

    /// `Notify(caller)`, per §4.4 — the inbound half.
    pub fn notify(&self, caller: NodeInfo) -> bool {
        if caller.identifier == self.local.identifier {
            return false;
        }
        let mut state = self.state.write();
        // Snapshot the current predecessor's identifier (a `Copy` value) before deciding,
        // so the match below never holds a borrow into `state` across the mutation.
        let current_predecessor = state.predecessor.as_ref().map(|h| h.identifier());
        match current_predecessor {
            None => {
                state.predecessor = Some(self.to_handle(caller));
                let bootstrap = state.successor.identifier() == self.local.identifier;
                if bootstrap {
                    let caller_handle = self.to_handle(caller);
                    state.successor = caller_handle.clone();
                    state.successor_list.reset_to_self(caller_handle.clone());
                    state.finger_table.set(1, caller_handle.clone());
                    drop(state);
                    let ring_caller = caller_handle;
                    tokio::spawn(async move {
                        let _ = ring_caller.notify(ring_caller.node_info()).await;
                    });
                }
                true
            }
            Some(pred_id) if caller.identifier.between(pred_id, self.local.identifier) => {
                state.predecessor = Some(self.to_handle(caller));
                true
            }
            _ => false,
        }
    }

    /// FixFingers, per §4.4: advance the cursor, refresh one entry, and — only at index 1 —
    /// reconcile it with `successor` the way the source's `FixFingers` special-cases the
    /// first slot.
    pub async fn fix_fingers(&self) {
        let (index, target) = {
            let mut state = self.state.write();
            state.finger_table.advance_cursor(self.local.identifier)
        };
        match self.find_successor(target).await {
            Ok(found) => {
                let handle = self.to_handle(found);
                let mut state = self.state.write();
                state.finger_table.set(index, handle.clone());
                if index == 1 && handle.identifier() != state.successor.identifier() {
                    state.successor = handle;
                }
            }
            Err(e) => {
                debug!(error = %e, index, "fix_fingers: find_successor failed");
            }
        }
    }

    /// CheckPredecessor, per §4.4 — deliberately does not touch `predecessor_list` (§9's
    /// pinned open question).
    pub async fn check_predecessor(&self) {
        let predecessor = self.state.read().predecessor.clone();
        if let Some(p) = predecessor {
            if !p.ping().await {
                self.state.write().predecessor = None;
            }
        }
    }

    /// The fourth maintenance timer named in §5: a periodic diagnostic dump, grounded on
    /// `ring_interface.go`'s `Verbose()`.
    pub fn log_state(&self) {
        let state = self.state.read();
        info!(
            local = %self.local,
            successor = %state.successor.node_info(),
            predecessor = ?state.predecessor.as_ref().map(|h| h.node_info()),
            successor_list_len = state.successor_list.len(),
            predecessor_list_len = state.predecessor_list.len(),
            distinct_fingers = state.finger_table.distinct_node_count(),
            records = self.store.len(),
            "ring state"
        );
    }

    // ---- inbound capability handlers ---------------------------------------

    pub fn get_stabilizer_data(&self) -> StabilizerData {
        let state = self.state.read();
        StabilizerData {
            predecessor: state.predecessor.as_ref().map(|h| h.node_info()),
            successor_list: state.successor_list.snapshot(),
        }
    }

    pub fn get_predecessor_list(&self) -> Vec<NodeInfo> {
        self.state.read().predecessor_list.snapshot()
    }

    /// `store`, with the ownership check of §4.5's last paragraph.
    pub fn handle_store(&self, record: Record) -> bool {
        let predecessor = self.state.read().predecessor.as_ref().map(|h| h.identifier());
        let owned = match predecessor {
            Some(pred) => record.identifier.between_r(pred, self.local.identifier),
            // No predecessor yet: this node owns the whole ring (bootstrap state).
            None => true,
        };
        if !owned {
            warn!(id = %record.identifier, "rejected store outside owned range");
            return false;
        }
        self.store.put(record)
    }

    // ---- §4.5 replication / anti-entropy -----------------------------------

    /// `SyncData`, the outbound side of the mandatory basic strategy.
    pub async fn sync_data(&self) {
        let successor = self.state.read().successor.clone();
        if successor.identifier() == self.local.identifier {
            return;
        }

        let replicas = self.settings.replicas;
        let boundary_index = replicas.saturating_sub(2);
        let predecessor_handles = self.state.read().predecessor_list.handles();
        let Some(boundary) = predecessor_handles.get(boundary_index) else {
            debug!("sync_data: not enough predecessors known yet, skipping round");
            return;
        };
        if !boundary.ping().await {
            debug!(remote = %boundary.node_info(), "sync_data: predecessor_list[{boundary_index}] unreachable, skipping round");
            return;
        }

        // Walk predecessors in order, pinging each; a dead entry is skipped and the walk
        // extends one further position, until REPLICAS-1 live predecessors are collected.
        let needed = replicas.saturating_sub(1);
        let mut ranges: BTreeMap<u8, Identifier> = BTreeMap::new();
        ranges.insert(0, self.local.identifier);
        let mut collected: u8 = 0;
        for candidate in &predecessor_handles {
            if collected as usize >= needed {
                break;
            }
            if candidate.ping().await {
                collected += 1;
                ranges.insert(collected, candidate.identifier());
            }
        }
        if (collected as usize) < needed {
            debug!("sync_data: not enough live predecessors to complete the replica walk, skipping round");
            return;
        }
        let outer_bound = *ranges.values().last().unwrap();

        let source_time = Timestamp::now();
        let (local_set, local_root) = self.store.range_with_root_hash(outer_bound, self.local.identifier);
        let envelope = Envelope::empty(source_time, ranges, local_root);

        let reply = match successor.global_maintenance(envelope).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(remote = %successor.node_info(), error = %e, "sync_data: global_maintenance failed");
                return;
            }
        };
        let Some(reply) = reply else {
            return; // already synced
        };
        let remote_records = match reply.decoded_records() {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "sync_data: malformed reply envelope");
                return;
            }
        };

        for (id, record) in &local_set {
            if !remote_records.contains_key(id) {
                let _ = successor.store(record.clone()).await;
            }
        }
        for (id, record) in &remote_records {
            if !local_set.contains_key(id) {
                self.store.put(record.clone());
            }
        }
    }

    /// `GlobalMaintenance(env)`, the inbound side.
    pub fn handle_global_maintenance(&self, env: Envelope) -> Result<Option<Envelope>> {
        let replicas = self.settings.replicas;
        let owner = env.owner().ok_or(Error::Rejected("envelope missing owner range"))?;
        let outer = env.outer_bound(replicas).unwrap_or(owner);

        let (local_set, local_root) = self.store.range_with_root_hash(outer, owner);
        if local_root == env.root_hash {
            return Ok(None);
        }
        Ok(Some(Envelope::with_records(env.source_time, env.ranges.clone(), local_root, &local_set)))
    }

    /// `ForwardSync`, the optional Merkle-refinement strategy (§4.5, not wired to a timer).
    pub async fn forward_sync(&self) -> Result<()> {
        let successor = self.state.read().successor.clone();
        if successor.identifier() == self.local.identifier {
            return Ok(());
        }
        let replicas = self.settings.replicas;
        let predecessors = self.state.read().predecessor_list.identifiers();
        let all_rows: Vec<Row> = self.store.all().values().map(Row::from).collect();
        let Some(blocks) = partition_master_blocks(&all_rows, &predecessors, self.local.identifier, replicas) else {
            return Ok(());
        };

        let source_time = Timestamp::now();
        for block in blocks {
            let tree = merkle::build(&block.rows, source_time);
            let predecessor_list_hash = crate::store::fold_root_hash(predecessors.iter());
            let request = ForwardSyncRequest { predecessor_list_hash, source_time, tree_nodes: tree.nodes.clone() };
            let Some(response) = successor.forward_sync(request).await? else {
                continue;
            };
            let missing = merkle::missing_from_remote(&tree, &response.diff_nodes);
            for leaf_hash in missing {
                if let Some(row) = block.rows.iter().find(|r| r.identifier == leaf_hash) {
                    if let Some(record) = self.store.get(row.identifier) {
                        let _ = successor.store(record).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// The receiving half of `ForwardSync`: diff the caller's tree against the matching
    /// local master block and report back which leaves differ.
    pub fn handle_forward_sync(&self, request: ForwardSyncRequest) -> Option<ForwardSyncResponse> {
        let replicas = self.settings.replicas;
        let predecessors = self.state.read().predecessor_list.identifiers();
        let all_rows: Vec<Row> = self.store.all().values().map(Row::from).collect();
        let blocks = partition_master_blocks(&all_rows, &predecessors, self.local.identifier, replicas)?;

        // Match the caller's block to ours by the narrowest range — the caller is expected
        // to be our predecessor sending one master block's tree at a time.
        let block = blocks.into_iter().next()?;
        let local_tree = merkle::build(&block.rows, request.source_time);
        let extra = merkle::extra_vs_remote(&local_tree, &request.tree_nodes);
        let diff_nodes = local_tree
            .nodes
            .iter()
            .filter(|n| n.level == 0 && extra.contains(&n.hash))
            .cloned()
            .collect();
        Some(ForwardSyncResponse { diff_nodes })
    }
}

/// Wraps the local `Ring` so it can be stored anywhere a [`RemoteHandle`] is expected —
/// e.g. as `successor` on a freshly bootstrapped single-node ring. Calls resolve entirely
/// in-process; no loopback socket is involved, a deliberate simplification over the
/// source's approach of wrapping the local node with the same sender used for real peers.
struct LocalLoopback {
    local: NodeInfo,
    ring: Weak<Ring>,
}

impl LocalLoopback {
    fn ring(&self) -> Result<Arc<Ring>> {
        self.ring.upgrade().ok_or(Error::Rejected("local ring dropped"))
    }
}

#[async_trait]
impl RemotePeer for LocalLoopback {
    fn node_info(&self) -> NodeInfo {
        self.local
    }

    async fn find_successor(&self, identifier: Identifier) -> Result<NodeInfo> {
        self.ring()?.find_successor(identifier).await
    }

    async fn get_stabilizer_data(&self, _caller: NodeInfo) -> Result<StabilizerData> {
        Ok(self.ring()?.get_stabilizer_data())
    }

    async fn get_predecessor_list(&self, _caller: NodeInfo) -> Result<Vec<NodeInfo>> {
        Ok(self.ring()?.get_predecessor_list())
    }

    async fn notify(&self, caller: NodeInfo) -> Result<bool> {
        Ok(self.ring()?.notify(caller))
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn store(&self, record: Record) -> bool {
        match self.ring() {
            Ok(ring) => ring.handle_store(record),
            Err(_) => false,
        }
    }

    async fn fetch(&self, identifier: Identifier) -> Option<Record> {
        self.ring().ok()?.store.get(identifier)
    }

    async fn global_maintenance(&self, envelope: Envelope) -> Result<Option<Envelope>> {
        self.ring()?.handle_global_maintenance(envelope)
    }

    async fn forward_sync(&self, request: ForwardSyncRequest) -> Result<Option<ForwardSyncResponse>> {
        Ok(self.ring()?.handle_forward_sync(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PeerConnector;

    struct NullConnector;
    impl PeerConnector for NullConnector {
        fn connect(&self, _info: NodeInfo) -> RemoteHandle {
            unreachable!("single-node tests never dial out")
        }
    }

    fn local_node() -> NodeInfo {
        NodeInfo::new("127.0.0.1".parse().unwrap(), 10001)
    }

    #[tokio::test]
    async fn bootstrap_single_node_is_its_own_successor() {
        let ring = Ring::new(local_node(), Arc::new(NullConnector), Settings::default());
        assert_eq!(ring.successor_info(), ring.local);
        assert!(ring.predecessor_info().is_none());
        let found = ring.find_successor(Identifier::of_address("anything", 1)).await.unwrap();
        assert_eq!(found, ring.local);
    }

    #[test]
    fn notify_on_bootstrap_adopts_caller_as_predecessor_and_successor() {
        let ring = Ring::new(local_node(), Arc::new(NullConnector), Settings::default());
        let caller = NodeInfo::new("127.0.0.1".parse().unwrap(), 10002);
        assert!(ring.notify(caller));
        assert_eq!(ring.predecessor_info(), Some(caller));
    }

    #[test]
    fn notify_rejects_caller_outside_predecessor_gap() {
        let ring = Ring::new(local_node(), Arc::new(NullConnector), Settings::default());
        let first = NodeInfo::new("127.0.0.1".parse().unwrap(), 10002);
        assert!(ring.notify(first));
        // A second caller whose id does not fall strictly between the current predecessor
        // and local is rejected; using the same address again can't regress the slot.
        assert!(!ring.notify(local_node()));
    }

    #[test]
    fn store_outside_owned_range_is_rejected_once_predecessor_is_set() {
        let ring = Ring::new(local_node(), Arc::new(NullConnector), Settings::default());
        let predecessor = NodeInfo::new("127.0.0.1".parse().unwrap(), 10002);
        ring.notify(predecessor);
        // A record identifier equal to the predecessor's own id is squarely outside
        // (predecessor, local] — right endpoint excluded.
        let record = Record::with_identifier(predecessor.identifier, Timestamp::now(), vec![]);
        assert!(!ring.handle_store(record));
    }
}
