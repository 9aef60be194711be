//! Port probing strategies.
//!
//! A probe answers one question: is anything listening on this port?
//! Mechanisms are consulted in order and the first decisive answer
//! wins. When no mechanism can decide, the port is reported as taken;
//! handing out a port we could not verify risks a double bind, while
//! skipping a free one merely moves the allocation up.

use crate::process;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

/// Substring that marks a command line as one of our server processes.
const MANAGED_PROCESS_MARKER: &str = "nacos";
/// Connect-probe timeout. Local connects resolve in microseconds.
const CONNECT_TIMEOUT_MS: u64 = 200;

/// What a single probing mechanism concluded about a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Free,
    Occupied,
    /// The mechanism could not run or gave no decisive answer.
    Unavailable,
}

/// One way of testing a port, ordered from most to least reliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMechanism {
    /// Bind a listener on the wildcard address.
    Bind,
    /// Connect to the loopback address and see who answers.
    Connect,
}

impl ProbeMechanism {
    fn probe(self, port: u16) -> ProbeOutcome {
        match self {
            Self::Bind => bind_probe(port),
            Self::Connect => connect_probe(port),
        }
    }
}

/// How allocation sees the local port landscape.
pub trait PortProbe: Send + Sync {
    /// True iff no local process is listening on `port`.
    fn is_port_free(&self, port: u16) -> bool;

    /// PID of the process listening on `port`, when discoverable.
    fn owner_of_port(&self, port: u16) -> Option<u32>;

    /// True iff `pid`'s command line identifies a managed server.
    fn is_managed_process(&self, pid: u32) -> bool;
}

/// Which OS utility resolves listener PIDs, detected once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OwnerLookup {
    Lsof,
    Ss,
    Netstat,
    None,
}

/// Probe backed by real sockets and the local process table.
pub struct SystemPortProbe {
    mechanisms: Vec<ProbeMechanism>,
    owner_lookup: OwnerLookup,
}

impl SystemPortProbe {
    pub fn new() -> Self {
        Self::with_mechanisms(vec![ProbeMechanism::Bind, ProbeMechanism::Connect])
    }

    pub fn with_mechanisms(mechanisms: Vec<ProbeMechanism>) -> Self {
        Self {
            mechanisms,
            owner_lookup: detect_owner_lookup(),
        }
    }
}

impl Default for SystemPortProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PortProbe for SystemPortProbe {
    fn is_port_free(&self, port: u16) -> bool {
        for mechanism in &self.mechanisms {
            match mechanism.probe(port) {
                ProbeOutcome::Free => return true,
                ProbeOutcome::Occupied => return false,
                ProbeOutcome::Unavailable => continue,
            }
        }
        debug!(port, "no probe mechanism gave a decisive answer, treating port as taken");
        false
    }

    fn owner_of_port(&self, port: u16) -> Option<u32> {
        match self.owner_lookup {
            OwnerLookup::Lsof => {
                let out = run_lookup("lsof", &["-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])?;
                parse_lsof_owner(&out)
            }
            OwnerLookup::Ss => {
                let out = run_lookup("ss", &["-H", "-ltnp", &format!("sport = :{port}")])?;
                parse_ss_owner(&out)
            }
            OwnerLookup::Netstat => {
                let out = run_lookup("netstat", &["-tlnp"])?;
                parse_netstat_owner(&out, port)
            }
            OwnerLookup::None => None,
        }
    }

    fn is_managed_process(&self, pid: u32) -> bool {
        process::cmdline(pid)
            .map(|cmd| cmd.to_lowercase().contains(MANAGED_PROCESS_MARKER))
            .unwrap_or(false)
    }
}

fn bind_probe(port: u16) -> ProbeOutcome {
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
        Ok(_) => ProbeOutcome::Free,
        Err(e) if e.kind() == ErrorKind::AddrInUse => ProbeOutcome::Occupied,
        Err(e) => {
            debug!(port, error = %e, "bind probe could not answer");
            ProbeOutcome::Unavailable
        }
    }
}

fn connect_probe(port: u16) -> ProbeOutcome {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match TcpStream::connect_timeout(&addr, Duration::from_millis(CONNECT_TIMEOUT_MS)) {
        Ok(_) => ProbeOutcome::Occupied,
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => ProbeOutcome::Free,
        Err(e) => {
            debug!(port, error = %e, "connect probe could not answer");
            ProbeOutcome::Unavailable
        }
    }
}

fn detect_owner_lookup() -> OwnerLookup {
    if lookup_tool_present("lsof") {
        OwnerLookup::Lsof
    } else if lookup_tool_present("ss") {
        OwnerLookup::Ss
    } else if lookup_tool_present("netstat") {
        OwnerLookup::Netstat
    } else {
        OwnerLookup::None
    }
}

fn lookup_tool_present(tool: &str) -> bool {
    // A spawn failure means the tool is absent; its exit code for a
    // bogus invocation is irrelevant.
    Command::new(tool)
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn run_lookup(tool: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(tool)
        .args(args)
        .stderr(Stdio::null())
        .output()
        .ok()?;
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_lsof_owner(output: &str) -> Option<u32> {
    output.lines().find_map(|line| line.trim().parse().ok())
}

/// Pulls the PID out of an `ss -ltnp` line, which reports users as
/// `users:(("java",pid=1234,fd=120))`.
fn parse_ss_owner(output: &str) -> Option<u32> {
    let line = output.lines().find(|l| l.contains("pid="))?;
    let start = line.find("pid=")? + "pid=".len();
    let digits: String = line[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Finds the listener PID for `port` in `netstat -tlnp` output, where
/// the local address is the fourth column and the owner is `1234/java`.
fn parse_netstat_owner(output: &str, port: u16) -> Option<u32> {
    let suffix = format!(":{port}");
    for line in output.lines() {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 7 || columns[0] != "tcp" && columns[0] != "tcp6" {
            continue;
        }
        if !columns[3].ends_with(&suffix) {
            continue;
        }
        if let Some((pid, _)) = columns[6].split_once('/') {
            return pid.parse().ok();
        }
    }
    None
}
