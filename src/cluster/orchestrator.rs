//! The operation driver: create, join, leave, standalone, clean.
//!
//! One orchestrator owns the port allocator, the package cache, and a
//! [`NodeLifecycle`]. Operations run their whole span here, from
//! validation through provisioning, sequential startup, and the
//! foreground watch, so the teardown guard can cover all of it.

use super::topology::TopologyStore;
use super::{ClusterState, DatasourceMode, SharedSecrets};
use crate::config::ToolConfig;
use crate::error::{NacosctlError, Result};
use crate::node::lifecycle::{ServerLifecycle, STOP_TIMEOUT_SECS};
use crate::node::{provision, NodeDescriptor, NodeLifecycle, ProcessHandle, ServerVersion, StartMode};
use crate::package::PackageCache;
use crate::ports::{PortAllocator, PortSet, SystemPortProbe};
use crate::process;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Seconds between liveness sweeps in the foreground watch.
const MONITOR_INTERVAL_SECS: u64 = 5;

/// Options for `standalone`.
#[derive(Debug, Clone)]
pub struct StandaloneOptions {
    pub version: ServerVersion,
    pub port: u16,
    /// The operator picked the port deliberately; conflicts fail
    /// instead of sliding.
    pub advanced: bool,
    /// Allow reclaiming the port from one of our own servers.
    pub allow_kill: bool,
    pub auto_start: bool,
    pub detach: bool,
    pub ready_timeout_secs: u64,
}

/// Options for `cluster create`.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub cluster_id: String,
    pub version: ServerVersion,
    pub node_count: u32,
    pub base_port: u16,
    pub datasource: DatasourceMode,
    /// Tear an existing cluster of the same id down first.
    pub clean: bool,
    pub auto_start: bool,
    pub detach: bool,
    pub ready_timeout_secs: u64,
}

/// Options for `cluster join`.
#[derive(Debug, Clone)]
pub struct JoinOptions {
    pub cluster_id: String,
    pub base_port: u16,
    pub auto_start: bool,
    pub detach: bool,
    pub ready_timeout_secs: u64,
}

/// Options for `cluster leave`.
#[derive(Debug, Clone)]
pub struct LeaveOptions {
    pub cluster_id: String,
    pub index: u32,
}

/// What an operation reports back for display.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    pub version: String,
    pub ip: String,
    pub nodes: Vec<NodeSummary>,
    pub credentials: CredentialSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub index: u32,
    pub name: String,
    pub directory: String,
    pub ports: PortSet,
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub username: String,
    pub password: String,
    pub token_secret: String,
    pub identity_key: String,
    pub identity_value: String,
}

/// Registry of started processes, stopped together exactly once.
///
/// Armed before the first node starts and fired on every exit path of
/// an operation: normal completion, interrupt, or error. Detach mode
/// bypasses the stop entirely.
#[derive(Clone)]
pub struct TeardownGuard {
    inner: Arc<Mutex<GuardInner>>,
}

struct GuardInner {
    handles: Vec<ProcessHandle>,
    fired: bool,
    detach: bool,
}

impl TeardownGuard {
    pub fn new(detach: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GuardInner {
                handles: Vec::new(),
                fired: false,
                detach,
            })),
        }
    }

    pub fn register(&self, handle: ProcessHandle) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.handles.push(handle);
    }

    pub fn registered(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.handles.len()
    }

    /// Stops every registered process. Only the first call does work;
    /// later calls, and guards in detach mode, return zero.
    pub async fn fire(&self, lifecycle: &dyn NodeLifecycle) -> usize {
        let handles = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.fired || inner.detach {
                return 0;
            }
            inner.fired = true;
            std::mem::take(&mut inner.handles)
        };
        let mut stopped = 0;
        for handle in handles {
            if lifecycle.stop(handle, STOP_TIMEOUT_SECS).await {
                stopped += 1;
            } else {
                warn!(pid = handle.pid, "process survived teardown");
            }
        }
        stopped
    }
}

/// How a foreground run ended.
enum RunOutcome {
    Detached,
    Interrupted,
    AllExited,
}

/// Per-operation settings for the start-and-watch phase.
struct RunPlan<'a> {
    mode: StartMode,
    embedded: bool,
    ready_timeout_secs: u64,
    detach: bool,
    /// Append each started node's address to the earlier nodes'
    /// membership files.
    converge_membership: bool,
    init_password: bool,
    cluster_id: Option<&'a str>,
    version: &'a ServerVersion,
    secrets: &'a SharedSecrets,
}

pub struct Orchestrator {
    config: ToolConfig,
    allocator: PortAllocator,
    lifecycle: Arc<dyn NodeLifecycle>,
    cache: PackageCache,
}

impl Orchestrator {
    pub fn new(config: ToolConfig) -> Self {
        let cache = match &config.cache_dir {
            Some(dir) => PackageCache::with_cache_dir(dir),
            None => PackageCache::new(),
        };
        Self {
            allocator: PortAllocator::new(Box::new(SystemPortProbe::new())),
            lifecycle: Arc::new(ServerLifecycle::new()),
            cache,
            config,
        }
    }

    /// Wires in replacement components; the seam the tests use.
    pub fn with_components(
        config: ToolConfig,
        allocator: PortAllocator,
        lifecycle: Arc<dyn NodeLifecycle>,
        cache: PackageCache,
    ) -> Self {
        Self {
            config,
            allocator,
            lifecycle,
            cache,
        }
    }

    fn ip(&self) -> &str {
        &self.config.ip
    }

    /// Provisions and optionally runs a standalone instance.
    pub async fn run_standalone(&self, opts: &StandaloneOptions) -> Result<ClusterSummary> {
        let major = opts.version.major();
        self.lifecycle.preflight(&opts.version).await?;
        let ports = self
            .allocator
            .allocate_standalone(opts.port, major, opts.advanced, opts.allow_kill)
            .await?;

        fs::create_dir_all(&self.config.root)?;
        let root = fs::canonicalize(&self.config.root)?;
        let name = format!("standalone-v{}", opts.version);
        let install_dir = root.join(&name);
        let secrets = SharedSecrets::generate();
        provision::provision_standalone(&self.cache, &install_dir, &opts.version, &ports, &secrets)
            .await?;

        let mut nodes = vec![NodeDescriptor {
            index: 0,
            name,
            directory: install_dir,
            ports,
            process: None,
        }];

        if !opts.auto_start {
            let summary = self.summary(None, &opts.version, &nodes, &secrets);
            self.render_summary(&summary);
            return Ok(summary);
        }

        let plan = RunPlan {
            mode: StartMode::Standalone,
            embedded: false,
            ready_timeout_secs: opts.ready_timeout_secs,
            detach: opts.detach,
            converge_membership: false,
            init_password: true,
            cluster_id: None,
            version: &opts.version,
            secrets: &secrets,
        };
        let outcome = self.run_guarded(&mut nodes, plan).await?;
        let summary = self.summary(None, &opts.version, &nodes, &secrets);
        finish(outcome, summary)
    }

    /// Creates a cluster: secrets, ports, node directories, membership
    /// files, and (unless told otherwise) a sequential startup.
    pub async fn create_cluster(&self, opts: &CreateOptions) -> Result<ClusterSummary> {
        validate_cluster_id(&opts.cluster_id)?;
        if opts.node_count == 0 {
            return Err(NacosctlError::InvalidArgument(
                "a cluster needs at least one node".to_string(),
            ));
        }

        let cluster_dir = self.config.root.join(&opts.cluster_id);
        if cluster_dir.exists() {
            if opts.clean {
                info!(cluster = %opts.cluster_id, "cleaning existing cluster first");
                self.clean_cluster(&opts.cluster_id).await?;
            } else {
                return Err(NacosctlError::ClusterExists(opts.cluster_id.clone()));
            }
        }

        self.lifecycle.preflight(&opts.version).await?;
        fs::create_dir_all(&cluster_dir)?;
        let cluster_dir = fs::canonicalize(&cluster_dir)?;
        let store = TopologyStore::new(&cluster_dir);

        let secrets = SharedSecrets::generate();
        store.persist_shared_secrets(&secrets)?;
        debug!(embedded = opts.datasource.is_embedded(), "datasource resolved");

        let major = opts.version.major();
        let sets = self
            .allocator
            .allocate_cluster(opts.base_port, opts.node_count, major)
            .await?;

        self.cache.ensure(opts.version.as_str()).await?;
        let mut nodes = Vec::with_capacity(sets.len());
        let mut members = Vec::new();
        for (index, ports) in sets.into_iter().enumerate() {
            let node = provision::provision_node(
                &self.cache,
                &cluster_dir,
                index as u32,
                &opts.version,
                ports,
                &secrets,
                &opts.datasource,
            )
            .await?;
            members.push(node.address(self.ip()));
            // Each node starts knowing only the members provisioned so
            // far; startup convergence teaches the rest.
            TopologyStore::write_node_membership(&node.directory, &members)?;
            nodes.push(node);
        }
        store.write_master_membership(&members)?;
        info!(
            cluster = %opts.cluster_id,
            nodes = nodes.len(),
            "cluster provisioned"
        );

        if !opts.auto_start {
            let summary = self.summary(Some(&opts.cluster_id), &opts.version, &nodes, &secrets);
            self.render_summary(&summary);
            return Ok(summary);
        }

        let plan = RunPlan {
            mode: StartMode::Cluster,
            embedded: opts.datasource.is_embedded(),
            ready_timeout_secs: opts.ready_timeout_secs,
            detach: opts.detach,
            converge_membership: true,
            init_password: true,
            cluster_id: Some(&opts.cluster_id),
            version: &opts.version,
            secrets: &secrets,
        };
        let outcome = self.run_guarded(&mut nodes, plan).await?;
        let summary = self.summary(Some(&opts.cluster_id), &opts.version, &nodes, &secrets);
        finish(outcome, summary)
    }

    /// Adds one node to an existing cluster, reusing its persisted
    /// secrets and avoiding every recorded port.
    pub async fn join_cluster(&self, opts: &JoinOptions) -> Result<ClusterSummary> {
        validate_cluster_id(&opts.cluster_id)?;
        let state = self.load_cluster(&opts.cluster_id)?;
        let version = state.version;
        let major = version.major();
        self.lifecycle.preflight(&version).await?;

        let cluster_dir = self.config.root.join(&opts.cluster_id);
        let cluster_dir = fs::canonicalize(&cluster_dir)?;
        let store = TopologyStore::new(&cluster_dir);

        let mut reserved = Vec::new();
        let mut members = Vec::new();
        for node in &state.nodes {
            reserved.extend(node.ports.all());
            members.push(node.address(self.ip()));
        }
        let next_index = state.nodes.iter().map(|n| n.index).max().map(|i| i + 1).unwrap_or(0);
        let ports = self
            .allocator
            .allocate_node(opts.base_port, next_index, major, &reserved)
            .await?;

        let datasource = match state.nodes.last() {
            Some(last) => provision::recorded_datasource(&last.directory)?,
            None => DatasourceMode::Embedded,
        };
        let node = provision::provision_node(
            &self.cache,
            &cluster_dir,
            next_index,
            &version,
            ports,
            &state.secrets,
            &datasource,
        )
        .await?;

        let new_member = node.address(self.ip());
        let existing_dirs: Vec<PathBuf> =
            state.nodes.iter().map(|n| n.directory.clone()).collect();
        TopologyStore::append_member(&existing_dirs, &new_member)?;
        let mut full = members.clone();
        full.push(new_member.clone());
        TopologyStore::write_node_membership(&node.directory, &full)?;
        let mut master = match store.read_master_membership() {
            Ok(list) => list,
            Err(NacosctlError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => members,
            Err(e) => return Err(e),
        };
        master.push(new_member);
        store.write_master_membership(&master)?;
        info!(cluster = %opts.cluster_id, node = %node.name, "node joined");

        let mut nodes = vec![node];
        if !opts.auto_start {
            let summary = self.summary(Some(&opts.cluster_id), &version, &nodes, &state.secrets);
            self.render_summary(&summary);
            return Ok(summary);
        }

        let plan = RunPlan {
            mode: StartMode::Cluster,
            embedded: datasource.is_embedded(),
            ready_timeout_secs: opts.ready_timeout_secs,
            detach: opts.detach,
            converge_membership: false,
            // The cluster's admin account was set up at create time.
            init_password: false,
            cluster_id: Some(&opts.cluster_id),
            version: &version,
            secrets: &state.secrets,
        };
        let outcome = self.run_guarded(&mut nodes, plan).await?;
        let summary = self.summary(Some(&opts.cluster_id), &version, &nodes, &state.secrets);
        finish(outcome, summary)
    }

    /// Removes one node: its directory first, then its address from
    /// every remaining membership file, then its process.
    pub async fn leave_cluster(&self, opts: &LeaveOptions) -> Result<()> {
        validate_cluster_id(&opts.cluster_id)?;
        let cluster_dir = self.config.root.join(&opts.cluster_id);
        if !cluster_dir.is_dir() {
            return Err(NacosctlError::MissingClusterState(format!(
                "cluster '{}' does not exist under {}",
                opts.cluster_id,
                self.config.root.display()
            )));
        }
        let cluster_dir = fs::canonicalize(&cluster_dir)?;
        let store = TopologyStore::new(&cluster_dir);
        let entries = store.list_nodes()?;
        let Some(target) = entries.iter().find(|e| e.index == opts.index).cloned() else {
            return Err(NacosctlError::MissingClusterState(format!(
                "cluster '{}' has no node {}",
                opts.cluster_id, opts.index
            )));
        };

        let version = ServerVersion::parse(&target.version)?;
        let recorded = provision::recorded_ports(&target.directory, version.major())?;
        let marker = target.directory.to_string_lossy().into_owned();
        let remaining: Vec<PathBuf> = entries
            .iter()
            .filter(|e| e.index != opts.index)
            .map(|e| e.directory.clone())
            .collect();

        fs::remove_dir_all(&target.directory)?;
        match recorded {
            Some(ports) => {
                TopologyStore::remove_member(&remaining, ports.main)?;
                store.remove_master_member(ports.main)?;
                info!(port = ports.main, "membership contracted");
            }
            None => warn!(
                node = opts.index,
                "no recorded main port, leaving membership files untouched"
            ),
        }

        for pid in process::find_by_cmdline(&marker) {
            if self.lifecycle.stop(ProcessHandle { pid }, STOP_TIMEOUT_SECS).await {
                info!(pid, "node process stopped");
            } else {
                warn!(pid, "node process survived stop");
            }
        }
        info!(cluster = %opts.cluster_id, node = opts.index, "node removed");
        Ok(())
    }

    /// Stops a cluster's processes and deletes its directory.
    pub async fn clean_cluster(&self, cluster_id: &str) -> Result<()> {
        validate_cluster_id(cluster_id)?;
        let cluster_dir = self.config.root.join(cluster_id);
        if !cluster_dir.exists() {
            return Err(NacosctlError::MissingClusterState(format!(
                "cluster '{cluster_id}' does not exist under {}",
                self.config.root.display()
            )));
        }
        let cluster_dir = fs::canonicalize(&cluster_dir)?;
        let marker = cluster_dir.to_string_lossy().into_owned();
        for pid in process::find_by_cmdline(&marker) {
            self.lifecycle.stop(ProcessHandle { pid }, STOP_TIMEOUT_SECS).await;
        }
        fs::remove_dir_all(&cluster_dir)?;
        info!(cluster = cluster_id, "cluster removed");
        Ok(())
    }

    /// Reconstructs a cluster's state from disk.
    pub fn load_cluster(&self, cluster_id: &str) -> Result<ClusterState> {
        let cluster_dir = self.config.root.join(cluster_id);
        if !cluster_dir.is_dir() {
            return Err(NacosctlError::MissingClusterState(format!(
                "cluster '{cluster_id}' does not exist under {}; create it first",
                self.config.root.display()
            )));
        }
        let cluster_dir = fs::canonicalize(&cluster_dir)?;
        let store = TopologyStore::new(&cluster_dir);
        let entries = store.list_nodes()?;
        let Some(latest) = entries.last() else {
            return Err(NacosctlError::MissingClusterState(format!(
                "cluster '{cluster_id}' has no nodes"
            )));
        };
        let version = ServerVersion::parse(&latest.version)?;
        let secrets = store.load_shared_secrets()?;

        let mut nodes = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(ports) = provision::recorded_ports(&entry.directory, version.major())? else {
                warn!(
                    node = %entry.directory.display(),
                    "node has no recorded ports and will be ignored"
                );
                continue;
            };
            nodes.push(NodeDescriptor {
                index: entry.index,
                name: entry
                    .directory
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                directory: entry.directory.clone(),
                ports,
                process: None,
            });
        }
        Ok(ClusterState {
            cluster_id: cluster_id.to_string(),
            version,
            nodes,
            secrets,
        })
    }

    /// Starts the nodes in order and watches them, with the teardown
    /// guard wrapped around every exit path including Ctrl-C.
    async fn run_guarded(
        &self,
        nodes: &mut [NodeDescriptor],
        plan: RunPlan<'_>,
    ) -> Result<RunOutcome> {
        let guard = TeardownGuard::new(plan.detach);
        let outcome = tokio::select! {
            result = self.run_nodes(nodes, &guard, &plan) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                Ok(RunOutcome::Interrupted)
            }
        };
        let stopped = guard.fire(self.lifecycle.as_ref()).await;
        if stopped > 0 {
            info!(stopped, "nodes stopped");
        }
        outcome
    }

    async fn run_nodes(
        &self,
        nodes: &mut [NodeDescriptor],
        guard: &TeardownGuard,
        plan: &RunPlan<'_>,
    ) -> Result<RunOutcome> {
        for i in 0..nodes.len() {
            let handle = self
                .lifecycle
                .start(&nodes[i].directory, plan.mode, plan.embedded)
                .await?;
            guard.register(handle);
            nodes[i].process = Some(handle);

            let ready = self
                .lifecycle
                .wait_until_ready(self.ip(), &nodes[i].ports, plan.version.major(), plan.ready_timeout_secs)
                .await;
            if !ready {
                match plan.mode {
                    StartMode::Cluster => {
                        warn!(node = %nodes[i].name, "node never became ready, aborting startup");
                        self.lifecycle.stop(handle, STOP_TIMEOUT_SECS).await;
                        return Err(NacosctlError::StartupTimeout {
                            name: nodes[i].name.clone(),
                            timeout_secs: plan.ready_timeout_secs,
                        });
                    }
                    StartMode::Standalone => {
                        warn!(
                            node = %nodes[i].name,
                            "instance is answering slowly; continuing, it may still be warming up"
                        );
                    }
                }
            }

            if plan.converge_membership && i > 0 {
                let address = nodes[i].address(self.ip());
                let earlier: Vec<PathBuf> =
                    nodes[..i].iter().map(|n| n.directory.clone()).collect();
                TopologyStore::append_member(&earlier, &address)?;
                debug!(node = %nodes[i].name, "earlier nodes told about the new member");
            }
        }

        if plan.init_password {
            if let Some(first) = nodes.first() {
                let accepted = self
                    .lifecycle
                    .init_admin_password(
                        self.ip(),
                        &first.ports,
                        plan.version.major(),
                        &plan.secrets.admin_password,
                        &plan.secrets.identity_key,
                        &plan.secrets.identity_value,
                    )
                    .await;
                if !accepted {
                    warn!("admin password setup failed; the factory default credentials are still active");
                }
            }
        }

        let summary = self.summary(plan.cluster_id, plan.version, nodes, plan.secrets);
        self.render_summary(&summary);

        if plan.detach {
            info!("detach requested, leaving nodes running");
            return Ok(RunOutcome::Detached);
        }
        self.monitor(nodes).await
    }

    async fn monitor(&self, nodes: &[NodeDescriptor]) -> Result<RunOutcome> {
        info!("watching nodes; press Ctrl-C to stop them");
        loop {
            sleep(Duration::from_secs(MONITOR_INTERVAL_SECS)).await;
            let alive = nodes
                .iter()
                .filter(|n| {
                    n.process
                        .map(|handle| self.lifecycle.is_alive(handle))
                        .unwrap_or(false)
                })
                .count();
            if alive == 0 {
                warn!("all nodes have exited");
                return Ok(RunOutcome::AllExited);
            }
            debug!(alive, total = nodes.len(), "liveness sweep");
        }
    }

    fn summary(
        &self,
        cluster_id: Option<&str>,
        version: &ServerVersion,
        nodes: &[NodeDescriptor],
        secrets: &SharedSecrets,
    ) -> ClusterSummary {
        ClusterSummary {
            cluster_id: cluster_id.map(str::to_string),
            version: version.to_string(),
            ip: self.config.ip.clone(),
            nodes: nodes
                .iter()
                .map(|n| NodeSummary {
                    index: n.index,
                    name: n.name.clone(),
                    directory: n.directory.display().to_string(),
                    ports: n.ports,
                    started: n.process.is_some(),
                })
                .collect(),
            credentials: CredentialSummary {
                username: "nacos".to_string(),
                password: secrets.admin_password.clone(),
                token_secret: secrets.token_secret.clone(),
                identity_key: secrets.identity_key.clone(),
                identity_value: secrets.identity_value.clone(),
            },
        }
    }

    fn render_summary(&self, summary: &ClusterSummary) {
        if self.config.json {
            match serde_json::to_string_pretty(summary) {
                Ok(text) => println!("{text}"),
                Err(e) => warn!(error = %e, "summary serialization failed"),
            }
            return;
        }

        println!();
        match &summary.cluster_id {
            Some(id) => println!(
                "{} {} ({} nodes, v{})",
                "cluster".green().bold(),
                id.bold(),
                summary.nodes.len(),
                summary.version
            ),
            None => println!(
                "{} (v{})",
                "standalone instance".green().bold(),
                summary.version
            ),
        }
        for node in &summary.nodes {
            let state = if node.started {
                "running".green()
            } else {
                "provisioned".yellow()
            };
            println!("  {} [{}]", node.name.bold(), state);
            println!("    dir    {}", node.directory);
            let mut ports = format!(
                "main={} grpc-client={} grpc-server={} raft={}",
                node.ports.main, node.ports.grpc_client, node.ports.grpc_server, node.ports.raft
            );
            if let Some(console) = node.ports.console {
                ports.push_str(&format!(" console={console}"));
            }
            println!("    ports  {ports}");
            if let Some(console) = node.ports.console {
                println!(
                    "    url    http://{}:{}/",
                    summary.ip, console
                );
            } else {
                println!(
                    "    url    http://{}:{}/nacos",
                    summary.ip, node.ports.main
                );
            }
        }
        let creds = &summary.credentials;
        println!("  {}", "credentials".bold());
        println!("    username  {}", creds.username);
        println!("    password  {}", creds.password);
        println!("    token     {}", creds.token_secret);
        println!(
            "    identity  {}: {}",
            creds.identity_key, creds.identity_value
        );
        println!();
    }
}

/// Maps a finished run to the operation's exit disposition.
fn finish(outcome: RunOutcome, summary: ClusterSummary) -> Result<ClusterSummary> {
    match outcome {
        RunOutcome::AllExited => Err(NacosctlError::Process(
            "all nodes have exited".to_string(),
        )),
        RunOutcome::Detached | RunOutcome::Interrupted => Ok(summary),
    }
}

fn validate_cluster_id(cluster_id: &str) -> Result<()> {
    if cluster_id.is_empty() {
        return Err(NacosctlError::InvalidArgument(
            "cluster id must not be empty".to_string(),
        ));
    }
    if cluster_id == "." || cluster_id == ".." || cluster_id.contains(['/', '\\']) {
        return Err(NacosctlError::InvalidArgument(format!(
            "cluster id '{cluster_id}' is not a valid directory name"
        )));
    }
    Ok(())
}
