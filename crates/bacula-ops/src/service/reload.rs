use super::process::ProcessControl;
use super::supervisor::Supervisor;
use crate::error::ServiceError;

/// How a service picks up a freshly committed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadStrategy {
    /// Restart when running, otherwise start and enable.
    RestartOrStart,
    /// Send SIGHUP to every process running `binary`. Falls back to start
    /// and enable when the service is down or no such process exists.
    SignalReload { binary: String },
    /// The service re-reads its configuration by itself; only make sure it
    /// runs.
    StartIfAbsent,
}

impl ReloadStrategy {
    pub fn signal(binary: impl Into<String>) -> Self {
        ReloadStrategy::SignalReload {
            binary: binary.into(),
        }
    }

    pub fn reload(
        &self,
        service: &str,
        supervisor: &dyn Supervisor,
        processes: &dyn ProcessControl,
    ) -> Result<(), ServiceError> {
        let active = supervisor.is_active(service)?;

        match self {
            ReloadStrategy::RestartOrStart => {
                if active {
                    supervisor.restart(service)
                } else {
                    supervisor.start(service, true)
                }
            }
            ReloadStrategy::SignalReload { binary } => {
                if active {
                    let pids = processes.pids_of(binary)?;
                    if !pids.is_empty() {
                        log::info!("Reloading {} (pids {:?})", service, pids);
                        for pid in pids {
                            processes.hangup(pid)?;
                        }
                        return Ok(());
                    }
                    log::warn!("{} is active but no {} process was found", service, binary);
                }
                supervisor.start(service, true)
            }
            ReloadStrategy::StartIfAbsent => {
                if active {
                    Ok(())
                } else {
                    supervisor.start(service, true)
                }
            }
        }
    }
}
