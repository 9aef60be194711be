//! Conflict-aware assignment of node port sets.
//!
//! All probing happens through [`PortProbe`], and every port handed
//! out within one allocation call is remembered, so two nodes of the
//! same cluster can never be assigned overlapping sets even when
//! conflicts force a node off its target port.

use super::probe::PortProbe;
use super::{PortSet, CONSOLE_PORT_BASE, GRPC_CLIENT_OFFSET, NODE_PORT_STRIDE, PORT_SET_CEILING};
use crate::error::{NacosctlError, Result};
use crate::process;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// First candidate of the high search space used when the requested
/// base conflicts in simplified mode.
const FALLBACK_MAIN_PORT: u16 = 18849;
/// Candidates tried per console search range.
const CONSOLE_RANGE_ATTEMPTS: u16 = 10;
/// Second and third console search ranges.
const CONSOLE_FALLBACK_BASE: u16 = CONSOLE_PORT_BASE;
const CONSOLE_HIGH_BASE: u16 = 18080;
/// Grace given to a reclaimed process before its ports are re-checked.
const RECLAIM_SETTLE_SECS: u64 = 2;
/// TERM-to-KILL budget when reclaiming an occupant.
const RECLAIM_STOP_TIMEOUT_SECS: u64 = 10;

/// Terminates the process occupying a wanted port.
#[async_trait]
pub trait ProcessReclaimer: Send + Sync {
    /// True when the process is confirmed gone and the OS has had time
    /// to release its sockets.
    async fn reclaim(&self, pid: u32) -> bool;
}

/// Reclaims with TERM, escalating to KILL, then waits a settle
/// interval for the kernel to tear the listeners down.
pub struct SystemReclaimer;

#[async_trait]
impl ProcessReclaimer for SystemReclaimer {
    async fn reclaim(&self, pid: u32) -> bool {
        let gone = process::terminate(pid, RECLAIM_STOP_TIMEOUT_SECS).await;
        if gone {
            sleep(Duration::from_secs(RECLAIM_SETTLE_SECS)).await;
        }
        gone
    }
}

pub struct PortAllocator {
    probe: Box<dyn PortProbe>,
    reclaimer: Box<dyn ProcessReclaimer>,
}

impl PortAllocator {
    pub fn new(probe: Box<dyn PortProbe>) -> Self {
        Self::with_reclaimer(probe, Box::new(SystemReclaimer))
    }

    pub fn with_reclaimer(probe: Box<dyn PortProbe>, reclaimer: Box<dyn ProcessReclaimer>) -> Self {
        Self { probe, reclaimer }
    }

    /// Picks the port set for a standalone instance.
    ///
    /// The requested base is accepted when its main and client gRPC
    /// ports are both free. A conflicting base is reclaimed when its
    /// occupant is one of our own servers and `allow_kill` is set.
    /// Otherwise advanced mode fails, the operator chose that port
    /// explicitly, while simplified mode slides to the first fully
    /// free set in the high port space.
    pub async fn allocate_standalone(
        &self,
        base_port: u16,
        major: u32,
        advanced: bool,
        allow_kill: bool,
    ) -> Result<PortSet> {
        let mut claimed = HashSet::new();
        let requested = PortSet::derive(base_port).ok_or_else(|| {
            NacosctlError::InvalidArgument(format!(
                "port {base_port} cannot host the derived port set; pick one between 1001 and {}",
                PORT_SET_CEILING - 1
            ))
        })?;

        let set = match self.resolve_base_conflict(&requested, advanced, allow_kill).await? {
            Some(set) => set,
            None => {
                info!(
                    base_port,
                    from = FALLBACK_MAIN_PORT,
                    "base port unavailable, searching the high port space"
                );
                self.search_port_set(FALLBACK_MAIN_PORT, &claimed)?
            }
        };
        claim(&mut claimed, &set);

        if major < 3 {
            return Ok(set);
        }
        let near = CONSOLE_PORT_BASE
            .saturating_add(set.main.saturating_sub(base_port) / NODE_PORT_STRIDE);
        let console = self.search_console(
            &[
                (near, CONSOLE_RANGE_ATTEMPTS),
                (CONSOLE_FALLBACK_BASE, CONSOLE_RANGE_ATTEMPTS),
                (CONSOLE_HIGH_BASE, CONSOLE_RANGE_ATTEMPTS),
            ],
            &claimed,
        )?;
        Ok(set.with_console(console))
    }

    /// Picks disjoint port sets for `node_count` cluster nodes.
    ///
    /// Node `i` targets `base_port + i * 10` and slides upward from
    /// there when the target set is not fully free. Ports already
    /// granted to earlier nodes count as taken.
    pub async fn allocate_cluster(
        &self,
        base_port: u16,
        node_count: u32,
        major: u32,
    ) -> Result<Vec<PortSet>> {
        let mut claimed = HashSet::new();
        let mut sets = Vec::with_capacity(node_count as usize);
        for index in 0..node_count {
            let set = self.node_port_set(base_port, index, &mut claimed, major)?;
            sets.push(set);
        }
        Ok(sets)
    }

    /// Picks the port set for one node joining an existing cluster.
    ///
    /// `reserved` carries every port already recorded for the
    /// cluster's current members.
    pub async fn allocate_node(
        &self,
        base_port: u16,
        index: u32,
        major: u32,
        reserved: &[u16],
    ) -> Result<PortSet> {
        let mut claimed: HashSet<u16> = reserved.iter().copied().collect();
        self.node_port_set(base_port, index, &mut claimed, major)
    }

    async fn resolve_base_conflict(
        &self,
        requested: &PortSet,
        advanced: bool,
        allow_kill: bool,
    ) -> Result<Option<PortSet>> {
        let entry_ports = [requested.main, requested.main + GRPC_CLIENT_OFFSET];
        let busy = |ports: &[u16; 2], probe: &dyn PortProbe| {
            ports.iter().copied().find(|p| !probe.is_port_free(*p))
        };

        let Some(mut conflicting) = busy(&entry_ports, self.probe.as_ref()) else {
            return Ok(Some(*requested));
        };

        if conflicting == requested.main && allow_kill {
            if let Some(pid) = self.probe.owner_of_port(requested.main) {
                if self.probe.is_managed_process(pid) {
                    warn!(port = requested.main, pid, "reclaiming port from a managed server");
                    if self.reclaimer.reclaim(pid).await {
                        match busy(&entry_ports, self.probe.as_ref()) {
                            None => return Ok(Some(*requested)),
                            Some(still) => conflicting = still,
                        }
                    }
                } else {
                    debug!(
                        port = requested.main,
                        pid, "occupant is not a managed server, leaving it alone"
                    );
                }
            }
        }

        if advanced {
            return Err(self.conflict_error(conflicting));
        }
        Ok(None)
    }

    fn node_port_set(
        &self,
        base_port: u16,
        index: u32,
        claimed: &mut HashSet<u16>,
        major: u32,
    ) -> Result<PortSet> {
        let target = base_port as u32 + index * NODE_PORT_STRIDE as u32;
        if target >= PORT_SET_CEILING as u32 {
            return Err(NacosctlError::AllocationExhausted {
                role: "main",
                start: base_port,
                end: PORT_SET_CEILING,
            });
        }
        let target = target as u16;

        let set = match PortSet::derive(target) {
            Some(set) if self.set_available(&set, claimed) => set,
            _ => {
                debug!(target, index, "target set unavailable, sliding upward");
                self.search_port_set(target + 1, claimed)?
            }
        };
        claim(claimed, &set);

        if major < 3 {
            return Ok(set);
        }
        let ranges = console_ranges_for_node(index)?;
        let console = self.search_console(&ranges, claimed)?;
        claimed.insert(console);
        Ok(set.with_console(console))
    }

    /// First main port at or above `from` whose full derived set is
    /// simultaneously free.
    fn search_port_set(&self, from: u16, claimed: &HashSet<u16>) -> Result<PortSet> {
        let mut candidate = from;
        loop {
            if candidate >= PORT_SET_CEILING {
                return Err(NacosctlError::AllocationExhausted {
                    role: "main",
                    start: from,
                    end: PORT_SET_CEILING,
                });
            }
            if let Some(set) = PortSet::derive(candidate) {
                if self.set_available(&set, claimed) {
                    return Ok(set);
                }
            }
            candidate += 1;
        }
    }

    fn search_console(&self, ranges: &[(u16, u16)], claimed: &HashSet<u16>) -> Result<u16> {
        let mut last = CONSOLE_PORT_BASE;
        for &(base, attempts) in ranges {
            for offset in 0..attempts {
                let Some(candidate) = base.checked_add(offset) else {
                    break;
                };
                last = candidate;
                if self.available(candidate, claimed) {
                    return Ok(candidate);
                }
            }
        }
        Err(NacosctlError::AllocationExhausted {
            role: "console",
            start: ranges.first().map(|r| r.0).unwrap_or(CONSOLE_PORT_BASE),
            end: last,
        })
    }

    fn set_available(&self, set: &PortSet, claimed: &HashSet<u16>) -> bool {
        set.derived().iter().all(|p| self.available(*p, claimed))
    }

    fn available(&self, port: u16, claimed: &HashSet<u16>) -> bool {
        !claimed.contains(&port) && self.probe.is_port_free(port)
    }

    fn conflict_error(&self, port: u16) -> NacosctlError {
        let owner = match self.probe.owner_of_port(port) {
            Some(pid) if self.probe.is_managed_process(pid) => {
                format!("a managed server (pid {pid})")
            }
            Some(pid) => format!("pid {pid}"),
            None => "an unknown process".to_string(),
        };
        NacosctlError::PortConflict {
            port,
            owner,
            hint: "pick a free --port, or pass --kill to reclaim it from a managed server"
                .to_string(),
        }
    }
}

fn claim(claimed: &mut HashSet<u16>, set: &PortSet) {
    for port in set.all() {
        claimed.insert(port);
    }
}

fn console_ranges_for_node(index: u32) -> Result<[(u16, u16); 2]> {
    let near = CONSOLE_PORT_BASE as u32 + index * NODE_PORT_STRIDE as u32;
    let high = CONSOLE_HIGH_BASE as u32 + index * NODE_PORT_STRIDE as u32;
    if high > u16::MAX as u32 {
        return Err(NacosctlError::AllocationExhausted {
            role: "console",
            start: CONSOLE_PORT_BASE,
            end: u16::MAX,
        });
    }
    Ok([
        (near as u16, CONSOLE_RANGE_ATTEMPTS),
        (high as u16, CONSOLE_RANGE_ATTEMPTS),
    ])
}
