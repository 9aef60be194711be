use thiserror::Error;

/// Errors produced by the orchestration core.
///
/// Fatal variants carry a remediation hint in their message where one
/// exists, so the binary can print them as-is.
#[derive(Error, Debug)]
pub enum NacosctlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no free {role} port found (searched {start} through {end})")]
    AllocationExhausted {
        role: &'static str,
        start: u16,
        end: u16,
    },

    #[error("port {port} is already in use by {owner} ({hint})")]
    PortConflict {
        port: u16,
        owner: String,
        hint: String,
    },

    #[error("node {name} did not become ready within {timeout_secs}s")]
    StartupTimeout { name: String, timeout_secs: u64 },

    #[error("cluster state missing: {0}")]
    MissingClusterState(String),

    #[error("cluster '{0}' already exists (use --clean to recreate it)")]
    ClusterExists(String),

    #[error("package error: {0}")]
    Package(String),

    #[error("Java runtime error: {0}")]
    Java(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NacosctlError>;
