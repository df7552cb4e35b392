//! Symmetric predecessor-side failover list, used to find the `REPLICAS-1` predecessor
//! boundary anti-entropy partitions on. Grounded on `predecessor_list.go`.

use crate::capability::RemoteHandle;
use crate::identifier::Identifier;
use crate::node::NodeInfo;

pub struct PredecessorList {
    nodes: Vec<RemoteHandle>,
    capacity: usize,
}

impl PredecessorList {
    pub fn new(capacity: usize) -> Self {
        PredecessorList { nodes: Vec::new(), capacity }
    }

    pub fn get(&self, index: usize) -> Option<&RemoteHandle> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn identifiers(&self) -> Vec<Identifier> {
        self.nodes.iter().map(|h| h.identifier()).collect()
    }

    /// Handles in failover order, for callers that need to probe liveness rather than just
    /// read identifiers (anti-entropy's walk-and-extend-past-dead-entries logic).
    pub fn handles(&self) -> Vec<RemoteHandle> {
        self.nodes.clone()
    }

    pub fn snapshot(&self) -> Vec<NodeInfo> {
        self.nodes.iter().map(|h| h.node_info()).collect()
    }

    /// Rebuild from a live predecessor's reported list, symmetric to
    /// `SuccessorList::rebuild`. Grounded on `PredecessorList.UpdatePredecessorList`.
    pub fn rebuild(&mut self, new_predecessor: RemoteHandle, remote_list: &[NodeInfo], local: Identifier, successor: Option<Identifier>, to_handle: impl Fn(NodeInfo) -> RemoteHandle) {
        let mut rebuilt = Vec::with_capacity(self.capacity);
        rebuilt.push(new_predecessor);
        for info in remote_list {
            if rebuilt.len() >= self.capacity {
                break;
            }
            if info.identifier == local {
                continue;
            }
            if let Some(succ_id) = successor {
                if info.identifier == succ_id {
                    break;
                }
            }
            rebuilt.push(to_handle(*info));
        }
        self.nodes = rebuilt;
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
