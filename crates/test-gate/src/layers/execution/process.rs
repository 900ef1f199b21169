use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};

#[cfg(unix)]
pub(super) fn apply_process_group(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(super) fn apply_process_group(_cmd: &mut Command) {}

/// Signals every process in the runner's group. The group id is the pid of
/// the leader captured at spawn, since `Child::id` is gone once it is reaped.
#[cfg(unix)]
pub(super) fn signal_group(pgid: Option<u32>, signal: i32) {
    if let Some(pgid) = pgid {
        unsafe {
            libc::kill(-(pgid as i32), signal);
        }
    }
}

#[cfg(not(unix))]
pub(super) fn signal_group(_pgid: Option<u32>, _signal: i32) {}

#[cfg(unix)]
pub(super) const SIGINT: i32 = libc::SIGINT;
#[cfg(unix)]
pub(super) const SIGKILL: i32 = libc::SIGKILL;
#[cfg(not(unix))]
pub(super) const SIGINT: i32 = 2;
#[cfg(not(unix))]
pub(super) const SIGKILL: i32 = 9;

pub(super) struct Terminated {
    pub(super) status: Option<ExitStatus>,
    pub(super) forced: bool,
}

/// Interrupts the group first so pytest can print its summary, then kills it
/// once `grace` runs out.
pub(super) async fn terminate_child(
    child: &mut Child,
    pgid: Option<u32>,
    grace: Duration,
) -> Terminated {
    signal_group(pgid, SIGINT);
    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        // Stragglers that ignored SIGINT must not outlive the leader.
        signal_group(pgid, SIGKILL);
        return Terminated {
            status: status.ok(),
            forced: false,
        };
    }
    tracing::warn!(
        grace_ms = grace.as_millis() as u64,
        "runner ignored SIGINT, escalating to SIGKILL"
    );
    signal_group(pgid, SIGKILL);
    let _ = child.kill().await;
    let status = match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status.ok(),
        Err(_) => None,
    };
    Terminated {
        status,
        forced: true,
    }
}
