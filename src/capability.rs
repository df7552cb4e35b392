//! The remote-peer capability set (§4.6): the small, pure operation surface the ring talks
//! to peers through. This is the "polymorphism via capability sets" abstraction the design
//! notes call for — a trait object stands in for the network in tests, transport binding,
//! or any future protocol.
//!
//! Grounded on the source's `RemoteNodeSenderInterface` (`remote_node_sender_interface.go`)
//! and, structurally, on ZeroTier's `SystemInterface`/`InnerProtocolInterface` split: a small
//! trait of pure async operations the core never constructs an implementation of itself.

use crate::error::Result;
use crate::node::NodeInfo;
use crate::replication::envelope::{Envelope, ForwardSyncRequest, ForwardSyncResponse};
use crate::replication::Row;
use crate::store::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stabilizer data returned by `get_stabilizer_data`: the remote's view of its own
/// predecessor plus its successor list, fetched together to avoid a second round-trip.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StabilizerData {
    pub predecessor: Option<NodeInfo>,
    pub successor_list: Vec<NodeInfo>,
}

/// Everything the ring needs to do to a peer it does not own. A `RemoteHandle` is a value
/// type carrying a shared (never owning) reference to whatever makes the call happen —
/// an open connection, a connection-pool lookup key, or an in-memory test double.
#[async_trait]
pub trait RemotePeer: Send + Sync {
    fn node_info(&self) -> NodeInfo;

    /// Network failure propagates.
    async fn find_successor(&self, identifier: crate::identifier::Identifier) -> Result<NodeInfo>;

    /// Network failure propagates.
    async fn get_stabilizer_data(&self, caller: NodeInfo) -> Result<StabilizerData>;

    /// Network failure propagates.
    async fn get_predecessor_list(&self, caller: NodeInfo) -> Result<Vec<NodeInfo>>;

    /// Network failure propagates.
    async fn notify(&self, caller: NodeInfo) -> Result<bool>;

    /// Never errors; `false` on timeout.
    async fn ping(&self) -> bool;

    /// Best effort; no error.
    async fn store(&self, record: Record) -> bool;

    /// Never errors; absent as `None`.
    async fn fetch(&self, identifier: crate::identifier::Identifier) -> Option<Record>;

    /// Network failure propagates.
    async fn global_maintenance(&self, envelope: Envelope) -> Result<Option<Envelope>>;

    /// Optional refinement. Network failure propagates when attempted.
    async fn forward_sync(&self, request: ForwardSyncRequest) -> Result<Option<ForwardSyncResponse>>;
}

/// A reference-counted, equality-by-identifier remote handle — what the ring actually
/// stores in its successor/predecessor slots, lists, and finger table.
#[derive(Clone)]
pub struct RemoteHandle(pub Arc<dyn RemotePeer>);

impl RemoteHandle {
    pub fn new(peer: Arc<dyn RemotePeer>) -> Self {
        RemoteHandle(peer)
    }

    pub fn node_info(&self) -> NodeInfo {
        self.0.node_info()
    }

    pub fn identifier(&self) -> crate::identifier::Identifier {
        self.0.node_info().identifier
    }
}

impl PartialEq for RemoteHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identifier() == other.identifier()
    }
}
impl Eq for RemoteHandle {}

impl std::fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RemoteHandle({:?})", self.node_info())
    }
}

impl std::ops::Deref for RemoteHandle {
    type Target = dyn RemotePeer;
    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

/// Rows carried in a `store`-style bulk transfer are just records; kept here for the few
/// call sites that need to adapt between the two without importing `crate::store` directly.
pub fn row_of(record: &Record) -> Row {
    Row::from(record)
}

/// Turns a `NodeInfo` learned over the wire (a remote's reported predecessor, successor
/// list entry, etc.) into a callable [`RemoteHandle`]. The ring never dials connections
/// itself — it asks its connector to, the same separation ZeroTier draws between `Node`
/// and the `SystemInterface` callbacks that actually touch sockets.
pub trait PeerConnector: Send + Sync {
    fn connect(&self, info: NodeInfo) -> RemoteHandle;
}
