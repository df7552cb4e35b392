//! Ordered failover list of nearby successors, length `R`. Grounded on `successor_list.go`.

use crate::capability::RemoteHandle;
use crate::identifier::Identifier;
use crate::node::NodeInfo;

pub struct SuccessorList {
    nodes: Vec<RemoteHandle>,
    capacity: usize,
}

impl SuccessorList {
    pub fn new(capacity: usize) -> Self {
        SuccessorList { nodes: Vec::new(), capacity }
    }

    pub fn first(&self) -> Option<&RemoteHandle> {
        self.nodes.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteHandle> {
        self.nodes.iter()
    }

    /// All entries after position 0 — the failover candidates.
    pub fn failover_candidates(&self) -> &[RemoteHandle] {
        if self.nodes.is_empty() {
            &[]
        } else {
            &self.nodes[1..]
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn snapshot(&self) -> Vec<NodeInfo> {
        self.nodes.iter().map(|h| h.node_info()).collect()
    }

    /// `successor_list[i]` strictly closer to `target` than `finger_closest` (or than
    /// `local` if no finger candidate was found), scanning in list order. Grounded on
    /// `SuccessorList.ClosestPrecedingNode`.
    pub fn closest_preceding_node(&self, local: Identifier, target: Identifier, finger_closest: Option<&RemoteHandle>) -> Option<&RemoteHandle> {
        let lower_bound = finger_closest.map(|h| h.identifier()).unwrap_or(local);
        self.nodes.iter().find(|h| h.identifier().between_r(lower_bound, target))
    }

    /// Rebuild from a remote's reported successor list: position 0 is `new_successor`, then
    /// up to `capacity - 1` entries from `remote_list`, skipping `local` and stopping at the
    /// first entry equal to `predecessor` (loop prevention on small rings). Grounded on
    /// `SuccessorList.UpdateSuccessorList`.
    pub fn rebuild(&mut self, new_successor: RemoteHandle, remote_list: &[NodeInfo], local: Identifier, predecessor: Option<Identifier>, to_handle: impl Fn(NodeInfo) -> RemoteHandle) {
        let mut rebuilt = Vec::with_capacity(self.capacity);
        rebuilt.push(new_successor);
        for info in remote_list {
            if rebuilt.len() >= self.capacity {
                break;
            }
            if info.identifier == local {
                continue;
            }
            if let Some(pred_id) = predecessor {
                if info.identifier == pred_id {
                    break;
                }
            }
            rebuilt.push(to_handle(*info));
        }
        self.nodes = rebuilt;
    }

    pub fn reset_to_self(&mut self, local_as_remote: RemoteHandle) {
        self.nodes = vec![local_as_remote];
    }
}
