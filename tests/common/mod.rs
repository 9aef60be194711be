//! Shared test doubles: a scripted port probe, a recording lifecycle,
//! and a pre-seeded package cache so no test touches the network or a
//! real server process.
#![allow(dead_code)]

use async_trait::async_trait;
use nacosctl::cluster::{CreateOptions, DatasourceMode, Orchestrator};
use nacosctl::config::ToolConfig;
use nacosctl::error::Result;
use nacosctl::node::{NodeLifecycle, ProcessHandle, ServerVersion, StartMode};
use nacosctl::package::PackageCache;
use nacosctl::ports::{PortAllocator, PortProbe, PortSet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_VERSION: &str = "3.0.2";

/// Probe that answers from a fixed busy set instead of real sockets.
pub struct ScriptedProbe {
    busy: HashSet<u16>,
}

impl ScriptedProbe {
    pub fn all_free() -> Self {
        Self {
            busy: HashSet::new(),
        }
    }

    pub fn with_busy(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            busy: ports.into_iter().collect(),
        }
    }
}

impl PortProbe for ScriptedProbe {
    fn is_port_free(&self, port: u16) -> bool {
        !self.busy.contains(&port)
    }

    fn owner_of_port(&self, _port: u16) -> Option<u32> {
        None
    }

    fn is_managed_process(&self, _pid: u32) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct StartRecord {
    pub dir: PathBuf,
    pub mode: StartMode,
    pub embedded: bool,
    pub pid: u32,
}

/// Lifecycle that records every call and never spawns anything.
#[derive(Default)]
pub struct RecordingLifecycle {
    next_pid: AtomicU32,
    starts: Mutex<Vec<StartRecord>>,
    stops: Mutex<Vec<u32>>,
    alive: Mutex<HashSet<u32>>,
    passwords: Mutex<Vec<String>>,
    fail_ready_mains: Mutex<HashSet<u16>>,
    exit_immediately: Mutex<bool>,
}

impl RecordingLifecycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_pid: AtomicU32::new(5000),
            ..Default::default()
        })
    }

    /// Readiness polls against this main port will report not-ready.
    pub fn fail_ready_on(&self, main_port: u16) {
        self.fail_ready_mains.lock().unwrap().insert(main_port);
    }

    /// Started processes immediately read as dead, as if they crashed.
    pub fn exit_immediately(&self) {
        *self.exit_immediately.lock().unwrap() = true;
    }

    pub fn starts(&self) -> Vec<StartRecord> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<u32> {
        self.stops.lock().unwrap().clone()
    }

    pub fn passwords(&self) -> Vec<String> {
        self.passwords.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeLifecycle for RecordingLifecycle {
    async fn preflight(&self, _version: &ServerVersion) -> Result<()> {
        Ok(())
    }

    async fn start(
        &self,
        node_dir: &Path,
        mode: StartMode,
        embedded_cluster: bool,
    ) -> Result<ProcessHandle> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        if !*self.exit_immediately.lock().unwrap() {
            self.alive.lock().unwrap().insert(pid);
        }
        self.starts.lock().unwrap().push(StartRecord {
            dir: node_dir.to_path_buf(),
            mode,
            embedded: embedded_cluster,
            pid,
        });
        Ok(ProcessHandle { pid })
    }

    async fn wait_until_ready(
        &self,
        _ip: &str,
        ports: &PortSet,
        _major: u32,
        _timeout_secs: u64,
    ) -> bool {
        !self.fail_ready_mains.lock().unwrap().contains(&ports.main)
    }

    async fn stop(&self, handle: ProcessHandle, _graceful_secs: u64) -> bool {
        self.alive.lock().unwrap().remove(&handle.pid);
        self.stops.lock().unwrap().push(handle.pid);
        true
    }

    async fn init_admin_password(
        &self,
        _ip: &str,
        _ports: &PortSet,
        _major: u32,
        password: &str,
        _identity_key: &str,
        _identity_value: &str,
    ) -> bool {
        self.passwords.lock().unwrap().push(password.to_string());
        true
    }

    fn is_alive(&self, handle: ProcessHandle) -> bool {
        self.alive.lock().unwrap().contains(&handle.pid)
    }
}

/// Cache directory pre-seeded with a minimal unpacked package, so
/// installs are pure file copies.
pub fn seeded_cache(cache_root: &Path, version: &str) -> PackageCache {
    let cache = PackageCache::with_cache_dir(cache_root);
    let pkg = cache.package_dir(version);
    std::fs::create_dir_all(pkg.join("bin")).unwrap();
    std::fs::create_dir_all(pkg.join("conf")).unwrap();
    std::fs::write(pkg.join("bin/startup.sh"), "#!/bin/bash\n").unwrap();
    std::fs::write(
        pkg.join("conf/application.properties"),
        "# nacos.core.auth.enabled=false\n# nacos.console.port=8080\n",
    )
    .unwrap();
    cache
}

pub fn test_config(root: &Path) -> ToolConfig {
    ToolConfig {
        root: root.to_path_buf(),
        ip: "127.0.0.1".to_string(),
        version: TEST_VERSION.to_string(),
        base_port: 8848,
        nodes: 3,
        cache_dir: None,
        log_level: "info".to_string(),
        json: true,
    }
}

pub fn orchestrator_with(
    root: &Path,
    cache: PackageCache,
    lifecycle: Arc<RecordingLifecycle>,
) -> Orchestrator {
    orchestrator_with_probe(root, cache, lifecycle, ScriptedProbe::all_free())
}

pub fn orchestrator_with_probe(
    root: &Path,
    cache: PackageCache,
    lifecycle: Arc<RecordingLifecycle>,
    probe: ScriptedProbe,
) -> Orchestrator {
    let allocator = PortAllocator::new(Box::new(probe));
    Orchestrator::with_components(test_config(root), allocator, lifecycle, cache)
}

/// Three embedded nodes from 8848, detached so runs return promptly.
pub fn create_opts(cluster_id: &str) -> CreateOptions {
    CreateOptions {
        cluster_id: cluster_id.to_string(),
        version: ServerVersion::parse(TEST_VERSION).unwrap(),
        node_count: 3,
        base_port: 8848,
        datasource: DatasourceMode::Embedded,
        clean: false,
        auto_start: true,
        detach: true,
        ready_timeout_secs: 5,
    }
}
