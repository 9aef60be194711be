//! Cluster orchestration: topology files, shared security material,
//! and the operation driver.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Orchestrator                    │
//! │   create / join / leave / standalone / clean │
//! └──────────────────────────────────────────────┘
//!        │                │               │
//!        ▼                ▼               ▼
//! ┌─────────────┐  ┌──────────────┐  ┌───────────────┐
//! │PortAllocator│  │TopologyStore │  │ NodeLifecycle │
//! │ (ports::*)  │  │ (membership, │  │ (start, wait, │
//! │             │  │  secrets)    │  │  stop)        │
//! └─────────────┘  └──────────────┘  └───────────────┘
//! ```
//!
//! Every node of a cluster shares one token secret, one server
//! identity pair, and one admin password, generated at create time and
//! persisted next to the node directories so later joins reuse them.

pub mod orchestrator;
pub mod topology;

pub use orchestrator::{
    ClusterSummary, CreateOptions, JoinOptions, LeaveOptions, Orchestrator, StandaloneOptions,
    TeardownGuard,
};
pub use topology::TopologyStore;

use crate::node::{NodeDescriptor, ServerVersion};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

/// Characters in the generated token secret. 48 base64 characters
/// decode to 36 bytes, above the server's 32-byte key minimum.
const TOKEN_SECRET_LEN: usize = 48;
const IDENTITY_KEY_LEN: usize = 12;
const IDENTITY_VALUE_LEN: usize = 24;
const ADMIN_PASSWORD_LEN: usize = 16;

/// Security material shared by every node of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedSecrets {
    pub token_secret: String,
    pub identity_key: String,
    pub identity_value: String,
    pub admin_password: String,
}

impl SharedSecrets {
    /// Generates a fresh set of secrets for a new cluster or
    /// standalone instance.
    pub fn generate() -> Self {
        Self {
            token_secret: random_alphanumeric(TOKEN_SECRET_LEN),
            identity_key: random_alphanumeric(IDENTITY_KEY_LEN),
            identity_value: random_alphanumeric(IDENTITY_VALUE_LEN),
            admin_password: random_alphanumeric(ADMIN_PASSWORD_LEN),
        }
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Where the server keeps its configuration and naming data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceMode {
    /// The server's embedded storage; clusters pass `-p embedded` at
    /// launch.
    Embedded,
    /// An external MySQL database shared by all nodes.
    External(ExternalDatabase),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDatabase {
    pub url: String,
    pub user: String,
    pub password: String,
}

impl DatasourceMode {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded)
    }
}

/// Everything known about one cluster.
#[derive(Debug, Clone)]
pub struct ClusterState {
    pub cluster_id: String,
    pub version: ServerVersion,
    pub nodes: Vec<NodeDescriptor>,
    pub secrets: SharedSecrets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_have_the_documented_shapes() {
        let secrets = SharedSecrets::generate();
        assert_eq!(secrets.token_secret.len(), 48);
        assert_eq!(secrets.identity_key.len(), 12);
        assert_eq!(secrets.identity_value.len(), 24);
        assert_eq!(secrets.admin_password.len(), 16);
        assert!(secrets
            .token_secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_secrets_are_unique_per_call() {
        assert_ne!(SharedSecrets::generate(), SharedSecrets::generate());
    }
}
