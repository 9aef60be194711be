//! Process inspection and termination over sysinfo.
//!
//! The server forks away from its launch script, so everything here
//! works from a fresh process-table snapshot rather than from child
//! handles.

use crate::retry::poll_until;
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, Signal, System};
use tracing::{debug, warn};

/// Attempts made while waiting for a killed process to disappear.
const KILL_CONFIRM_ATTEMPTS: u32 = 3;

/// Returns true while `pid` exists in the process table.
///
/// Zombies count as dead: an exited-but-unreaped server holds no
/// ports and serves no requests.
pub fn pid_alive(pid: u32) -> bool {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    sys.process(target)
        .map(|p| p.status() != ProcessStatus::Zombie)
        .unwrap_or(false)
}

/// Full command line of `pid`, joined with single spaces.
pub fn cmdline(pid: u32) -> Option<String> {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    sys.process(target).map(|p| {
        p.cmd()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    })
}

/// PIDs of every process whose command line contains `needle`.
///
/// The calling process is excluded; an orchestration command often
/// carries the same directory path in its own arguments.
pub fn find_by_cmdline(needle: &str) -> Vec<u32> {
    let own_pid = std::process::id();
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);
    let mut pids: Vec<u32> = sys
        .processes()
        .iter()
        .filter(|(pid, proc_)| {
            pid.as_u32() != own_pid
                && proc_
                    .cmd()
                    .iter()
                    .any(|arg| arg.to_string_lossy().contains(needle))
        })
        .map(|(pid, _)| pid.as_u32())
        .collect();
    pids.sort_unstable();
    pids
}

/// Terminates `pid`: TERM first, then KILL once `graceful_secs` of
/// one-second polls have elapsed without it exiting.
///
/// Returns true when the process is confirmed gone. Already-dead
/// processes return true immediately.
pub async fn terminate(pid: u32, graceful_secs: u64) -> bool {
    if !pid_alive(pid) {
        return true;
    }

    send_signal(pid, Signal::Term);
    let graceful_attempts = graceful_secs.clamp(1, u32::MAX as u64) as u32;
    if poll_until(graceful_attempts, Duration::from_secs(1), || async {
        !pid_alive(pid)
    })
    .await
    {
        debug!(pid, "process exited after TERM");
        return true;
    }

    warn!(pid, "process ignored TERM, sending KILL");
    send_signal(pid, Signal::Kill);
    let gone = poll_until(KILL_CONFIRM_ATTEMPTS, Duration::from_secs(1), || async {
        !pid_alive(pid)
    })
    .await;
    if !gone {
        warn!(pid, "process survived KILL");
    }
    gone
}

fn send_signal(pid: u32, signal: Signal) {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    if let Some(proc_) = sys.process(target) {
        // kill_with reports None when the platform lacks the signal;
        // fall back to the unconditional kill.
        if proc_.kill_with(signal).is_none() {
            proc_.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaped_pid() -> u32 {
        let mut child = std::process::Command::new("true")
            .spawn()
            .expect("spawn true");
        let pid = child.id();
        child.wait().expect("wait true");
        pid
    }

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn reaped_pid_is_dead() {
        assert!(!pid_alive(reaped_pid()));
    }

    #[test]
    fn find_by_cmdline_never_reports_the_caller() {
        // Every argument of our own test binary is in our cmdline, so a
        // needle taken from it would match us without the exclusion.
        let own = std::env::args().next().unwrap_or_default();
        let pids = find_by_cmdline(&own);
        assert!(!pids.contains(&std::process::id()));
    }

    #[tokio::test]
    async fn terminate_is_idempotent_on_dead_pids() {
        let pid = reaped_pid();
        assert!(terminate(pid, 1).await);
        assert!(terminate(pid, 1).await);
    }

    #[tokio::test]
    async fn terminate_stops_a_live_child() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        let pid = child.id();
        assert!(pid_alive(pid));
        assert!(terminate(pid, 2).await);
        child.wait().expect("reap sleep");
        assert!(!pid_alive(pid));
    }
}
