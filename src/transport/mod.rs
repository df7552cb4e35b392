//! The TCP RPC binding (§10.4): the "trivial to implement" transport the protocol core
//! intentionally leaves out. `Ring` never names this module — it only ever holds a
//! [`crate::capability::RemoteHandle`], of which [`tcp::TcpPeer`] is one implementation
//! and [`mock::MockPeer`] (used by tests) is another.

pub mod mock;
pub mod tcp;

use crate::capability::StabilizerData;
use crate::identifier::Identifier;
use crate::node::NodeInfo;
use crate::replication::envelope::{Envelope, ForwardSyncRequest, ForwardSyncResponse};
use crate::store::Record;
use serde::{Deserialize, Serialize};

/// A tagged request: `capability` names which capability-set operation to invoke, `body`
/// carries its argument pre-serialized to JSON so the framing layer stays generic over the
/// nine different argument/return shapes in §4.6.
#[derive(Serialize, Deserialize)]
pub struct Request {
    pub capability: String,
    pub body: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub body: serde_json::Value,
}

impl Request {
    pub fn new(capability: &str, body: impl Serialize) -> serde_json::Result<Self> {
        Ok(Request { capability: capability.to_string(), body: serde_json::to_value(body)? })
    }
}

impl Response {
    pub fn ok(body: impl Serialize) -> serde_json::Result<Self> {
        Ok(Response { ok: true, body: serde_json::to_value(body)? })
    }

    pub fn err() -> Self {
        Response { ok: false, body: serde_json::Value::Null }
    }
}

/// Arguments to `find_successor` over the wire.
#[derive(Serialize, Deserialize)]
pub struct FindSuccessorArgs {
    pub identifier: Identifier,
}

/// Arguments shared by every capability that just takes the caller's node info.
#[derive(Serialize, Deserialize)]
pub struct CallerArgs {
    pub caller: NodeInfo,
}

#[derive(Serialize, Deserialize)]
pub struct StoreArgs {
    pub record: Record,
}

#[derive(Serialize, Deserialize)]
pub struct FetchArgs {
    pub identifier: Identifier,
}

#[derive(Serialize, Deserialize)]
pub struct GlobalMaintenanceArgs {
    pub envelope: Envelope,
}

#[derive(Serialize, Deserialize)]
pub struct ForwardSyncArgs {
    pub request: ForwardSyncRequest,
}

pub type StabilizerDataReply = StabilizerData;
pub type ForwardSyncReply = Option<ForwardSyncResponse>;
