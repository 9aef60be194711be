//! Starting, watching, and stopping one server node.
//!
//! The launch script forks the JVM and exits, so a started node is
//! tracked by scanning the process table for a command line that
//! carries the node directory, not through a child handle.

use super::{ProcessHandle, ServerVersion, StartMode};
use crate::error::{NacosctlError, Result};
use crate::java;
use crate::ports::PortSet;
use crate::process;
use crate::retry::poll_until;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Attempts made (one per second) to find the forked server PID.
const PID_DISCOVERY_ATTEMPTS: u32 = 10;
/// Per-request timeout for readiness probes.
const PROBE_REQUEST_TIMEOUT_SECS: u64 = 2;
/// Per-request timeout for the admin password call.
const ADMIN_REQUEST_TIMEOUT_SECS: u64 = 5;
/// Factory default password; initializing to it would be a no-op.
const DEFAULT_ADMIN_PASSWORD: &str = "nacos";
/// Launch script, relative to a node directory.
const LAUNCH_SCRIPT: &str = "bin/startup.sh";

/// Default seconds to wait for a node to become ready.
pub const READY_TIMEOUT_SECS: u64 = 60;
/// Default TERM-to-KILL budget when stopping a node.
pub const STOP_TIMEOUT_SECS: u64 = 10;

/// Process control for a single node.
#[async_trait]
pub trait NodeLifecycle: Send + Sync {
    /// Checks that the host can run this server version at all.
    async fn preflight(&self, version: &ServerVersion) -> Result<()>;

    /// Launches the node and returns a handle to the forked server
    /// process. `embedded_cluster` selects embedded storage for
    /// cluster-mode launches.
    async fn start(
        &self,
        node_dir: &Path,
        mode: StartMode,
        embedded_cluster: bool,
    ) -> Result<ProcessHandle>;

    /// Polls the node's health endpoint until it answers or
    /// `timeout_secs` one-second attempts have passed.
    async fn wait_until_ready(&self, ip: &str, ports: &PortSet, major: u32, timeout_secs: u64)
        -> bool;

    /// Stops the node, TERM first then KILL. True once the process is
    /// confirmed gone; stopping a dead node is a successful no-op.
    async fn stop(&self, handle: ProcessHandle, graceful_secs: u64) -> bool;

    /// One-time admin password setup through a running node. Never
    /// fatal; returns whether the server accepted it.
    async fn init_admin_password(
        &self,
        ip: &str,
        ports: &PortSet,
        major: u32,
        password: &str,
        identity_key: &str,
        identity_value: &str,
    ) -> bool;

    fn is_alive(&self, handle: ProcessHandle) -> bool;
}

/// The real lifecycle: launch scripts, process table, HTTP probes.
pub struct ServerLifecycle {
    http: reqwest::Client,
}

impl ServerLifecycle {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ServerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeLifecycle for ServerLifecycle {
    async fn preflight(&self, version: &ServerVersion) -> Result<()> {
        let runtime = java::find_java(java::required_major(version.major())).await?;
        debug!(java = %runtime.path.display(), major = runtime.major, "preflight passed");
        Ok(())
    }

    async fn start(
        &self,
        node_dir: &Path,
        mode: StartMode,
        embedded_cluster: bool,
    ) -> Result<ProcessHandle> {
        // The script resolves its own absolute home and bakes it into
        // the JVM command line; matching against the canonical path is
        // what makes the forked PID discoverable.
        let node_dir = std::fs::canonicalize(node_dir)?;
        let script = node_dir.join(LAUNCH_SCRIPT);
        if !script.exists() {
            return Err(NacosctlError::Process(format!(
                "launch script {} is missing; the node directory is not a server installation",
                script.display()
            )));
        }

        let mut command = Command::new("bash");
        command
            .arg(&script)
            .arg("-m")
            .arg(mode.as_arg())
            .current_dir(&node_dir)
            .stdin(std::process::Stdio::null());
        if embedded_cluster && mode == StartMode::Cluster {
            command.arg("-p").arg("embedded");
        }

        let output = command.output().await?;
        if !output.status.success() {
            warn!(
                dir = %node_dir.display(),
                status = %output.status,
                "launch script exited nonzero, still watching for the server process"
            );
        }

        let marker = node_dir.to_string_lossy().into_owned();
        let appeared = {
            let marker = marker.clone();
            poll_until(PID_DISCOVERY_ATTEMPTS, Duration::from_secs(1), move || {
                let marker = marker.clone();
                async move { !process::find_by_cmdline(&marker).is_empty() }
            })
            .await
        };
        if !appeared {
            return Err(NacosctlError::Process(format!(
                "no server process appeared for {} within {PID_DISCOVERY_ATTEMPTS}s",
                node_dir.display()
            )));
        }
        let pids = process::find_by_cmdline(&marker);
        let pid = pids.first().copied().ok_or_else(|| {
            NacosctlError::Process(format!(
                "server process for {} vanished right after starting",
                node_dir.display()
            ))
        })?;
        info!(dir = %node_dir.display(), pid, "node started");
        Ok(ProcessHandle { pid })
    }

    async fn wait_until_ready(
        &self,
        ip: &str,
        ports: &PortSet,
        major: u32,
        timeout_secs: u64,
    ) -> bool {
        let url = readiness_url(ip, ports, major);
        let attempts = timeout_secs.clamp(1, u32::MAX as u64) as u32;
        let client = self.http.clone();
        poll_until(attempts, Duration::from_secs(1), move || {
            let client = client.clone();
            let url = url.clone();
            async move {
                match client
                    .get(&url)
                    .timeout(Duration::from_secs(PROBE_REQUEST_TIMEOUT_SECS))
                    .send()
                    .await
                {
                    Ok(response) => response.status().is_success(),
                    Err(_) => false,
                }
            }
        })
        .await
    }

    async fn stop(&self, handle: ProcessHandle, graceful_secs: u64) -> bool {
        if !self.is_alive(handle) {
            debug!(pid = handle.pid, "node already stopped");
            return true;
        }
        info!(pid = handle.pid, "stopping node");
        process::terminate(handle.pid, graceful_secs).await
    }

    async fn init_admin_password(
        &self,
        ip: &str,
        ports: &PortSet,
        major: u32,
        password: &str,
        identity_key: &str,
        identity_value: &str,
    ) -> bool {
        if password.is_empty() || password == DEFAULT_ADMIN_PASSWORD {
            debug!("keeping the factory default admin password");
            return true;
        }
        let url = admin_password_url(ip, ports, major);
        let result = self
            .http
            .post(&url)
            .header(identity_key, identity_value)
            .form(&[("password", password)])
            .timeout(Duration::from_secs(ADMIN_REQUEST_TIMEOUT_SECS))
            .send()
            .await;
        match result {
            Ok(response) => match response.text().await {
                // The server echoes the account on success.
                Ok(body) => body.contains("username"),
                Err(e) => {
                    warn!(error = %e, "unreadable admin password response");
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, url = %url, "admin password call failed");
                false
            }
        }
    }

    fn is_alive(&self, handle: ProcessHandle) -> bool {
        process::pid_alive(handle.pid)
    }
}

/// Health endpoint for a node. Server 3.x answers on the console port,
/// older servers on the main port under the `/nacos` context.
fn readiness_url(ip: &str, ports: &PortSet, major: u32) -> String {
    match (major >= 3, ports.console) {
        (true, Some(console)) => {
            format!("http://{ip}:{console}/v3/console/health/readiness")
        }
        _ => format!(
            "http://{ip}:{}/nacos/v2/console/health/readiness",
            ports.main
        ),
    }
}

fn admin_password_url(ip: &str, ports: &PortSet, major: u32) -> String {
    match (major >= 3, ports.console) {
        (true, Some(console)) => format!("http://{ip}:{console}/v3/auth/user/admin"),
        _ => format!("http://{ip}:{}/nacos/v1/auth/users/admin", ports.main),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn readiness_goes_through_the_console_on_v3() {
        let ports = PortSet::derive(8848).unwrap().with_console(8080);
        assert_eq!(
            readiness_url("127.0.0.1", &ports, 3),
            "http://127.0.0.1:8080/v3/console/health/readiness"
        );
    }

    #[test]
    fn readiness_uses_the_main_port_before_v3() {
        let ports = PortSet::derive(8848).unwrap();
        assert_eq!(
            readiness_url("127.0.0.1", &ports, 2),
            "http://127.0.0.1:8848/nacos/v2/console/health/readiness"
        );
    }

    #[test]
    fn admin_urls_follow_the_same_split() {
        let v3 = PortSet::derive(8848).unwrap().with_console(8080);
        assert_eq!(
            admin_password_url("127.0.0.1", &v3, 3),
            "http://127.0.0.1:8080/v3/auth/user/admin"
        );
        let v2 = PortSet::derive(8848).unwrap();
        assert_eq!(
            admin_password_url("127.0.0.1", &v2, 2),
            "http://127.0.0.1:8848/nacos/v1/auth/users/admin"
        );
    }

    #[tokio::test]
    async fn starting_without_a_launch_script_fails() {
        let dir = tempdir().unwrap();
        let lifecycle = ServerLifecycle::new();
        let err = lifecycle
            .start(dir.path(), StartMode::Standalone, false)
            .await
            .unwrap_err();
        assert!(matches!(err, NacosctlError::Process(_)));
    }

    #[tokio::test]
    async fn stopping_a_dead_handle_is_a_no_op() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let lifecycle = ServerLifecycle::new();
        assert!(lifecycle.stop(ProcessHandle { pid }, 1).await);
        assert!(!lifecycle.is_alive(ProcessHandle { pid }));
    }

    #[tokio::test]
    async fn start_finds_and_stop_kills_the_forked_process() {
        let dir = tempdir().unwrap();
        let node_dir = dir.path().join("0-v3.0.2");
        std::fs::create_dir_all(node_dir.join("bin")).unwrap();
        // Stand-in for the real launch script: forks a sleeper whose
        // command line carries the node directory, like the JVM does.
        // The compound command stops bash from exec-ing the sleep and
        // losing that argv.
        let script = "#!/bin/bash\n\
                      BASE_DIR=$(cd \"$(dirname \"$0\")/..\" && pwd)\n\
                      nohup bash -c 'sleep 300; true' \"$BASE_DIR\" >/dev/null 2>&1 &\n";
        std::fs::write(node_dir.join("bin/startup.sh"), script).unwrap();

        let lifecycle = ServerLifecycle::new();
        let handle = lifecycle
            .start(&node_dir, StartMode::Standalone, false)
            .await
            .unwrap();
        assert!(lifecycle.is_alive(handle));
        assert!(lifecycle.stop(handle, 2).await);
        assert!(!lifecycle.is_alive(handle));
    }
}
