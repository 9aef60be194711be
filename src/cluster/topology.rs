//! On-disk cluster topology.
//!
//! A cluster directory holds one subdirectory per node plus two shared
//! files: `cluster.conf`, an informational master copy of the member
//! list, and `share.properties`, the security material every node and
//! every later `join` reuses. Each node additionally carries its own
//! `conf/cluster.conf`, which is what the server actually reads.

use super::SharedSecrets;
use crate::error::{NacosctlError, Result};
use crate::node;
use crate::properties;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Member list file name, at the cluster root and under each node's
/// `conf/`.
pub const MEMBERSHIP_FILE: &str = "cluster.conf";
/// Shared security material at the cluster root.
pub const SHARE_PROPERTIES_FILE: &str = "share.properties";

const KEY_TOKEN_SECRET: &str = "nacos.core.auth.plugin.nacos.token.secret.key";
const KEY_IDENTITY_KEY: &str = "nacos.core.auth.server.identity.key";
const KEY_IDENTITY_VALUE: &str = "nacos.core.auth.server.identity.value";
const KEY_ADMIN_PASSWORD: &str = "nacos.admin.password";

/// A node directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub index: u32,
    pub version: String,
    pub directory: PathBuf,
}

/// Reads and writes the persisted form of one cluster.
pub struct TopologyStore {
    cluster_dir: PathBuf,
}

impl TopologyStore {
    pub fn new(cluster_dir: impl Into<PathBuf>) -> Self {
        Self {
            cluster_dir: cluster_dir.into(),
        }
    }

    pub fn cluster_dir(&self) -> &Path {
        &self.cluster_dir
    }

    /// Path of a node's own membership file.
    pub fn node_membership_path(node_dir: &Path) -> PathBuf {
        node_dir.join("conf").join(MEMBERSHIP_FILE)
    }

    /// Writes a node's full member list, one `ip:port` per line.
    pub fn write_node_membership(node_dir: &Path, members: &[String]) -> Result<()> {
        let path = Self::node_membership_path(node_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, member_lines(members))?;
        Ok(())
    }

    pub fn read_node_membership(node_dir: &Path) -> Result<Vec<String>> {
        let path = Self::node_membership_path(node_dir);
        read_members(&path)
    }

    /// Appends `member` to each listed node's membership file.
    ///
    /// Missing files are created; a node provisioned moments ago
    /// always has one, but nothing is gained by failing here.
    pub fn append_member(node_dirs: &[PathBuf], member: &str) -> Result<()> {
        for dir in node_dirs {
            let path = Self::node_membership_path(dir);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{member}")?;
            debug!(node = %dir.display(), member, "membership extended");
        }
        Ok(())
    }

    /// Drops every member whose address ends in `:{port}` from each
    /// listed node's membership file. Nodes without a membership file
    /// are skipped.
    pub fn remove_member(node_dirs: &[PathBuf], port: u16) -> Result<()> {
        for dir in node_dirs {
            let path = Self::node_membership_path(dir);
            match remove_member_lines(&path, port) {
                Ok(()) => {}
                Err(NacosctlError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(node = %dir.display(), "no membership file to contract");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Writes the informational master member list at the cluster
    /// root.
    pub fn write_master_membership(&self, members: &[String]) -> Result<()> {
        fs::create_dir_all(&self.cluster_dir)?;
        fs::write(
            self.cluster_dir.join(MEMBERSHIP_FILE),
            member_lines(members),
        )?;
        Ok(())
    }

    pub fn read_master_membership(&self) -> Result<Vec<String>> {
        read_members(&self.cluster_dir.join(MEMBERSHIP_FILE))
    }

    /// Drops `:{port}` members from the master list, when it exists.
    pub fn remove_master_member(&self, port: u16) -> Result<()> {
        match remove_member_lines(&self.cluster_dir.join(MEMBERSHIP_FILE), port) {
            Ok(()) => Ok(()),
            Err(NacosctlError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Persists the cluster's shared security material.
    pub fn persist_shared_secrets(&self, secrets: &SharedSecrets) -> Result<()> {
        fs::create_dir_all(&self.cluster_dir)?;
        let path = self.cluster_dir.join(SHARE_PROPERTIES_FILE);
        properties::set_property(&path, KEY_TOKEN_SECRET, &secrets.token_secret)?;
        properties::set_property(&path, KEY_IDENTITY_KEY, &secrets.identity_key)?;
        properties::set_property(&path, KEY_IDENTITY_VALUE, &secrets.identity_value)?;
        properties::set_property(&path, KEY_ADMIN_PASSWORD, &secrets.admin_password)?;
        Ok(())
    }

    /// Loads the shared security material persisted at create time.
    pub fn load_shared_secrets(&self) -> Result<SharedSecrets> {
        let path = self.cluster_dir.join(SHARE_PROPERTIES_FILE);
        if !path.exists() {
            return Err(NacosctlError::MissingClusterState(format!(
                "{} not found in {}; was this cluster created here?",
                SHARE_PROPERTIES_FILE,
                self.cluster_dir.display()
            )));
        }
        let read = |key: &str| -> Result<String> {
            properties::read_property(&path, key)?.ok_or_else(|| {
                NacosctlError::MissingClusterState(format!(
                    "{} is missing {key}",
                    path.display()
                ))
            })
        };
        Ok(SharedSecrets {
            token_secret: read(KEY_TOKEN_SECRET)?,
            identity_key: read(KEY_IDENTITY_KEY)?,
            identity_value: read(KEY_IDENTITY_VALUE)?,
            admin_password: read(KEY_ADMIN_PASSWORD)?,
        })
    }

    /// Node directories on disk, sorted by index. Files and foreign
    /// directories under the cluster root are ignored.
    pub fn list_nodes(&self) -> Result<Vec<NodeEntry>> {
        if !self.cluster_dir.is_dir() {
            return Err(NacosctlError::MissingClusterState(format!(
                "cluster directory {} does not exist",
                self.cluster_dir.display()
            )));
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.cluster_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some((index, version)) = node::parse_node_dir_name(&name.to_string_lossy()) else {
                continue;
            };
            entries.push(NodeEntry {
                index,
                version,
                directory: entry.path(),
            });
        }
        entries.sort_by_key(|e| e.index);
        Ok(entries)
    }
}

fn member_lines(members: &[String]) -> String {
    let mut text = members.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

fn read_members(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn remove_member_lines(path: &Path, port: u16) -> Result<()> {
    let suffix = format!(":{port}");
    let members = read_members(path)?;
    let kept: Vec<String> = members
        .into_iter()
        .filter(|m| !m.ends_with(&suffix))
        .collect();
    fs::write(path, member_lines(&kept))?;
    Ok(())
}
