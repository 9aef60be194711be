//! Node identity: versions, directory naming, and runtime handles.

pub mod lifecycle;
pub mod provision;

pub use lifecycle::{NodeLifecycle, ServerLifecycle};

use crate::error::{NacosctlError, Result};
use crate::ports::PortSet;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A server version string with its parsed major.
///
/// The major decides the port scheme (console split), the config keys,
/// and the required Java floor, so it is parsed once up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServerVersion {
    raw: String,
    #[serde(skip)]
    major: u32,
}

impl ServerVersion {
    pub fn parse(raw: &str) -> Result<Self> {
        let first = raw.split('.').next().unwrap_or_default();
        let major: u32 = first.parse().map_err(|_| {
            NacosctlError::InvalidArgument(format!(
                "'{raw}' is not a server version; expected something like 3.0.2"
            ))
        })?;
        Ok(Self {
            raw: raw.to_string(),
            major,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    /// True for majors that serve the console on its own port.
    pub fn has_split_console(&self) -> bool {
        self.major >= 3
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// How the launch script is told to run the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Standalone,
    Cluster,
}

impl StartMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Cluster => "cluster",
        }
    }
}

/// Handle to a started server process.
///
/// The server forks away from its launch script, so this wraps the
/// discovered PID rather than a child handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessHandle {
    pub pid: u32,
}

/// One provisioned cluster member.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDescriptor {
    pub index: u32,
    pub name: String,
    pub directory: PathBuf,
    pub ports: PortSet,
    pub process: Option<ProcessHandle>,
}

impl NodeDescriptor {
    pub fn new(index: u32, version: &ServerVersion, cluster_dir: &Path, ports: PortSet) -> Self {
        let name = node_dir_name(index, version.as_str());
        let directory = cluster_dir.join(&name);
        Self {
            index,
            name,
            directory,
            ports,
            process: None,
        }
    }

    /// The `ip:mainPort` membership address of this node.
    pub fn address(&self, ip: &str) -> String {
        format!("{ip}:{}", self.ports.main)
    }
}

/// Directory name of node `index` running server `version`.
pub fn node_dir_name(index: u32, version: &str) -> String {
    format!("{index}-v{version}")
}

/// Parses a `{index}-v{version}` directory name back into its parts.
///
/// Anything else living in a cluster directory (logs, shared files)
/// returns `None`.
pub fn parse_node_dir_name(name: &str) -> Option<(u32, String)> {
    let (index, version) = name.split_once("-v")?;
    if version.is_empty() {
        return None;
    }
    let index: u32 = index.parse().ok()?;
    Some((index, version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_parse_their_major() {
        let v = ServerVersion::parse("3.0.2").unwrap();
        assert_eq!(v.as_str(), "3.0.2");
        assert_eq!(v.major(), 3);
        assert!(v.has_split_console());

        let legacy = ServerVersion::parse("2.4.3").unwrap();
        assert_eq!(legacy.major(), 2);
        assert!(!legacy.has_split_console());
    }

    #[test]
    fn malformed_versions_are_rejected() {
        assert!(ServerVersion::parse("latest").is_err());
        assert!(ServerVersion::parse("").is_err());
        assert!(ServerVersion::parse("v3.0.2").is_err());
    }

    #[test]
    fn node_dir_names_round_trip() {
        let name = node_dir_name(2, "3.0.2");
        assert_eq!(name, "2-v3.0.2");
        assert_eq!(parse_node_dir_name(&name), Some((2, "3.0.2".to_string())));
    }

    #[test]
    fn foreign_directory_names_do_not_parse() {
        assert_eq!(parse_node_dir_name("logs"), None);
        assert_eq!(parse_node_dir_name("share.properties"), None);
        assert_eq!(parse_node_dir_name("x-v1"), None);
        assert_eq!(parse_node_dir_name("3-v"), None);
        assert_eq!(parse_node_dir_name("-v3.0.2"), None);
    }

    #[test]
    fn descriptors_derive_name_and_address() {
        let version = ServerVersion::parse("3.0.2").unwrap();
        let ports = crate::ports::PortSet::derive(8848).unwrap();
        let node = NodeDescriptor::new(0, &version, Path::new("/tmp/demo"), ports);
        assert_eq!(node.name, "0-v3.0.2");
        assert_eq!(node.directory, Path::new("/tmp/demo/0-v3.0.2"));
        assert_eq!(node.address("127.0.0.1"), "127.0.0.1:8848");
        assert!(node.process.is_none());
    }
}
