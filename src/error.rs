//! Typed error surface for the ring protocol.
//!
//! Maintenance loops only ever match on this enum to decide whether to log-and-continue
//! (transport/rejection) or to actually fail a caller-visible operation (serialization,
//! out-of-range, no reachable candidate). See the error handling design for the policy.

use crate::identifier::Identifier;
use std::net::SocketAddr;

/// Errors that can surface from ring operations and remote-peer capability calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An outbound capability call to `remote` failed at the transport layer.
    #[error("transport failure talking to {remote}: {source}")]
    Transport {
        remote: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An outbound capability call to `remote` exceeded its deadline.
    #[error("timed out talking to {remote}")]
    Timeout { remote: SocketAddr },

    /// A protocol-level rejection (e.g. `store` outside the owned range, `notify` rejected).
    /// Not a failure of the transport; callers decide whether to retry or re-route.
    #[error("rejected: {0}")]
    Rejected(&'static str),

    /// A record arrived at `store` whose identifier does not fall in `(predecessor, local]`.
    #[error("identifier {id} is outside the owned range ({predecessor}, {local}]")]
    OutOfRange {
        id: Identifier,
        predecessor: Identifier,
        local: Identifier,
    },

    /// The router exhausted every finger-table and successor-list candidate without finding
    /// a reachable node closer to the target.
    #[error("no reachable candidate found while routing")]
    NoReachableCandidate,

    /// The ring has no live successor and no live predecessor list entry to replicate against.
    #[error("replication precondition not met: {0}")]
    ReplicationUnavailable(&'static str),

    /// Canonical wire (de)serialization failed; this indicates a malformed peer or a bug.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
