//! The node identity value type: `(ip, port, identifier)`, shared by local and remote peers.

use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// A peer's address and ring identifier. Equality and ordering are by `identifier` only,
/// matching the spec's "remote handle equality is by identifier" rule — two `NodeInfo`
/// values naming the same peer at the same address are interchangeable for ring purposes.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct NodeInfo {
    pub ip: std::net::IpAddr,
    pub port: u16,
    pub identifier: Identifier,
}

impl NodeInfo {
    pub fn new(ip: std::net::IpAddr, port: u16) -> Self {
        let identifier = Identifier::of_address(&ip.to_string(), port);
        NodeInfo { ip, port, identifier }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl PartialEq for NodeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}
impl Eq for NodeInfo {}

impl fmt::Debug for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeInfo({}:{}, {})", self.ip, self.port, self.identifier)
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_derived_from_address() {
        let n = NodeInfo::new("127.0.0.1".parse().unwrap(), 10001);
        assert_eq!(n.identifier, Identifier::of_address("127.0.0.1", 10001));
    }

    #[test]
    fn equality_ignores_incidental_fields() {
        let a = NodeInfo::new("127.0.0.1".parse().unwrap(), 10001);
        let b = a;
        assert_eq!(a, b);
    }
}
