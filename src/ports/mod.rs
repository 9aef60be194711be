//! Port scheme for a managed server node.
//!
//! Every node owns four related ports derived from its main port, plus
//! an independently assigned console port on server 3.x. Allocation
//! treats the derived set as atomic: either all four are free or the
//! candidate main port is rejected.

pub mod allocator;
pub mod probe;

pub use allocator::{PortAllocator, ProcessReclaimer};
pub use probe::{PortProbe, SystemPortProbe};

use serde::Serialize;

/// Offset from the main port to the client gRPC port.
pub const GRPC_CLIENT_OFFSET: u16 = 1000;
/// Offset from the main port to the server-to-server gRPC port.
pub const GRPC_SERVER_OFFSET: u16 = 1001;
/// Offset subtracted from the main port for the Raft peer port.
pub const RAFT_OFFSET: u16 = 1000;
/// Default main port of the managed server.
pub const DEFAULT_MAIN_PORT: u16 = 8848;
/// Base of the console port space on server 3.x.
pub const CONSOLE_PORT_BASE: u16 = 8080;
/// Main ports at or above this value overflow the derived set.
pub const PORT_SET_CEILING: u16 = u16::MAX - GRPC_SERVER_OFFSET + 1;
/// Gap between consecutive cluster nodes' target main ports.
pub const NODE_PORT_STRIDE: u16 = 10;

/// The ports one node listens on.
///
/// `console` stays `None` on server majors below 3, which serve the
/// console through the main port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortSet {
    pub main: u16,
    pub grpc_client: u16,
    pub grpc_server: u16,
    pub raft: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<u16>,
}

impl PortSet {
    /// Derives the four-port set for `main`, or `None` when any derived
    /// port would leave the valid range.
    pub fn derive(main: u16) -> Option<Self> {
        if main <= RAFT_OFFSET || main >= PORT_SET_CEILING {
            return None;
        }
        Some(Self {
            main,
            grpc_client: main + GRPC_CLIENT_OFFSET,
            grpc_server: main + GRPC_SERVER_OFFSET,
            raft: main - RAFT_OFFSET,
            console: None,
        })
    }

    pub fn with_console(mut self, console: u16) -> Self {
        self.console = Some(console);
        self
    }

    /// The four derived ports, console excluded.
    pub fn derived(&self) -> [u16; 4] {
        [self.main, self.grpc_client, self.grpc_server, self.raft]
    }

    /// Every port of the node, console included when present.
    pub fn all(&self) -> Vec<u16> {
        let mut ports = self.derived().to_vec();
        if let Some(console) = self.console {
            ports.push(console);
        }
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_the_documented_offsets() {
        let set = PortSet::derive(8848).unwrap();
        assert_eq!(set.main, 8848);
        assert_eq!(set.grpc_client, 9848);
        assert_eq!(set.grpc_server, 9849);
        assert_eq!(set.raft, 7848);
        assert_eq!(set.console, None);
    }

    #[test]
    fn rejects_mains_without_a_positive_raft_port() {
        assert!(PortSet::derive(1000).is_none());
        assert!(PortSet::derive(500).is_none());
        let lowest = PortSet::derive(1001).unwrap();
        assert_eq!(lowest.raft, 1);
    }

    #[test]
    fn rejects_mains_overflowing_the_grpc_ports() {
        assert_eq!(PORT_SET_CEILING, 64535);
        assert!(PortSet::derive(64535).is_none());
        let highest = PortSet::derive(64534).unwrap();
        assert_eq!(highest.grpc_server, 65535);
    }

    #[test]
    fn all_includes_the_console_when_assigned() {
        let set = PortSet::derive(8848).unwrap().with_console(8080);
        assert_eq!(set.all(), vec![8848, 9848, 9849, 7848, 8080]);
        assert_eq!(set.derived().len(), 4);
    }
}
