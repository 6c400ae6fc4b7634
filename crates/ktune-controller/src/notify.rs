// NODE PROCESS NOTIFICATION
// After a committed k change the node process gets SIGUSR1 so it reloads its parameters.
// Every failure here is logged and non-fatal.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyOutcome {
    Signalled,
    /// No node PID configured
    Skipped,
    ProcessMissing,
    PermissionDenied,
    /// Platform has no signals
    Unsupported,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct NodeNotifier {
    pid: Option<i32>,
}

impl NodeNotifier {
    pub fn new(pid: Option<i32>) -> Self {
        NodeNotifier { pid }
    }

    pub fn disabled() -> Self {
        NodeNotifier { pid: None }
    }

    pub fn notify(&self) -> NotifyOutcome {
        let Some(pid) = self.pid else {
            return NotifyOutcome::Skipped;
        };
        if pid <= 0 {
            warn!(pid, "refusing to signal a non-positive pid");
            return NotifyOutcome::Failed(format!("invalid pid {pid}"));
        }

        let outcome = send_reload(pid);
        match &outcome {
            NotifyOutcome::Signalled => debug!(pid, "sent SIGUSR1 to node"),
            other => warn!(pid, outcome = ?other, "node notification failed"),
        }
        outcome
    }
}

#[cfg(unix)]
fn send_reload(pid: i32) -> NotifyOutcome {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid), Signal::SIGUSR1) {
        Ok(()) => NotifyOutcome::Signalled,
        Err(Errno::ESRCH) => NotifyOutcome::ProcessMissing,
        Err(Errno::EPERM) => NotifyOutcome::PermissionDenied,
        Err(e) => NotifyOutcome::Failed(e.to_string()),
    }
}

#[cfg(not(unix))]
fn send_reload(_pid: i32) -> NotifyOutcome {
    NotifyOutcome::Unsupported
}
