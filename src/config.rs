//! Tunables the spec leaves as "≈" values, collected so a CLI or test harness can override
//! them without threading individual `Duration`s through every constructor.

use std::net::SocketAddr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Settings {
    pub stabilize_interval: Duration,
    pub fix_fingers_interval: Duration,
    pub check_predecessor_interval: Duration,
    pub anti_entropy_interval: Duration,
    pub rpc_timeout: Duration,
    pub ping_timeout: Duration,
    /// `REPLICAS` in the source; must be `>= 2`.
    pub replicas: usize,
    /// `R`: length of the successor and predecessor lists.
    pub successor_list_len: usize,
    pub idle_connection_expiry: Duration,
    /// An existing ring member to join through, if any. `None` starts a new single-node
    /// ring; the CLI's `--join` flag sets this before `Ring::new` runs.
    pub bootstrap_addr: Option<SocketAddr>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            stabilize_interval: Duration::from_secs(1),
            fix_fingers_interval: Duration::from_secs(1),
            check_predecessor_interval: Duration::from_secs(1),
            anti_entropy_interval: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(3),
            ping_timeout: Duration::from_secs(1),
            replicas: 2,
            successor_list_len: crate::identifier::SIZE, // R = HashSize, per successor_list.go
            idle_connection_expiry: Duration::from_secs(10),
            bootstrap_addr: None,
        }
    }
}

impl Settings {
    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas.max(2);
        self
    }
}
