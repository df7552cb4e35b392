//! In-memory [`RemotePeer`]/[`PeerConnector`] used by integration tests (§10.6): calls
//! resolve by directly invoking the target [`Ring`]'s methods in-process, no socket
//! involved, so tests can run under `tokio::time::pause()`/`advance()` without real network
//! latency.

use crate::capability::{PeerConnector, RemoteHandle, RemotePeer, StabilizerData};
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::node::NodeInfo;
use crate::replication::envelope::{Envelope, ForwardSyncRequest, ForwardSyncResponse};
use crate::ring::Ring;
use crate::store::Record;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};

/// A shared directory mapping identifiers to live rings, standing in for DNS/address
/// resolution in tests. Every [`Ring`] built for a test registers itself here; `connect`
/// looks the target up by the identifier carried in its [`NodeInfo`].
#[derive(Default)]
pub struct MockNetwork {
    rings: DashMap<Identifier, Weak<Ring>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(MockNetwork::default())
    }

    pub fn register(&self, ring: &Arc<Ring>) {
        self.rings.insert(ring.local.identifier, Arc::downgrade(ring));
    }

    /// Simulate a node departing the network without a clean shutdown: further calls to it
    /// fail as if the socket were unreachable.
    pub fn unregister(&self, identifier: Identifier) {
        self.rings.remove(&identifier);
    }
}

impl PeerConnector for MockNetwork {
    fn connect(&self, info: NodeInfo) -> RemoteHandle {
        RemoteHandle::new(Arc::new(MockPeer { info, ring: self.rings.get(&info.identifier).map(|r| r.clone()) }))
    }
}

struct MockPeer {
    info: NodeInfo,
    ring: Option<Weak<Ring>>,
}

impl MockPeer {
    fn ring(&self) -> Result<Arc<Ring>> {
        self.ring
            .as_ref()
            .and_then(|w| w.upgrade())
            .ok_or(Error::Transport { remote: self.info.socket_addr(), source: std::io::Error::new(std::io::ErrorKind::NotFound, "peer not registered") })
    }
}

#[async_trait]
impl RemotePeer for MockPeer {
    fn node_info(&self) -> NodeInfo {
        self.info
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
        self.ring().is_ok()
    }

    async fn store(&self, record: Record) -> bool {
        match self.ring() {
            Ok(ring) => ring.handle_store(record),
            Err(_) => false,
        }
    }

    async fn fetch(&self, identifier: Identifier) -> Option<Record> {
        self.ring().ok()?.store().get(identifier)
    }

    async fn global_maintenance(&self, envelope: Envelope) -> Result<Option<Envelope>> {
        self.ring()?.handle_global_maintenance(envelope)
    }

    async fn forward_sync(&self, request: ForwardSyncRequest) -> Result<Option<ForwardSyncResponse>> {
        Ok(self.ring()?.handle_forward_sync(request))
    }
}
