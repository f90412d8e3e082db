//! Finding running daemons by executable and signalling them.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};

use crate::error::ServiceError;

/// Access to running processes.
pub trait ProcessControl {
    /// Process ids whose resolved executable is named `binary`.
    fn pids_of(&self, binary: &str) -> Result<Vec<i32>, ServiceError>;

    /// Asks `pid` to reload its configuration.
    fn hangup(&self, pid: i32) -> Result<(), ServiceError>;
}

/// Scans a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn pid_from_exe_link(link: &Path) -> Option<i32> {
    link.parent()?.file_name()?.to_str()?.parse().ok()
}

impl ProcessControl for ProcFs {
    fn pids_of(&self, binary: &str) -> Result<Vec<i32>, ServiceError> {
        let pattern = self.root.join("[0-9]*").join("exe");
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern).map_err(|e| ServiceError::Command {
            program: "glob".to_string(),
            message: e.to_string(),
        })?;

        let mut pids = Vec::new();
        for link in entries.flatten() {
            // Processes exit while we scan, and most links are unreadable
            // without privileges.
            let Ok(target) = std::fs::read_link(&link) else {
                continue;
            };
            let resolved = std::fs::canonicalize(&target).unwrap_or(target);
            if resolved.file_name().and_then(|n| n.to_str()) != Some(binary) {
                continue;
            }
            if let Some(pid) = pid_from_exe_link(&link) {
                pids.push(pid);
            }
        }
        pids.sort_unstable();
        Ok(pids)
    }

    fn hangup(&self, pid: i32) -> Result<(), ServiceError> {
        match kill(Pid::from_raw(pid), Signal::SIGHUP) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ServiceError::Command {
                program: format!("kill -HUP {}", pid),
                message: e.to_string(),
            }),
        }
    }
}
