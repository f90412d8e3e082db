//! Process supervisors able to start and restart services by name.

use super::command;
use crate::error::ServiceError;

/// Starts and restarts managed services.
pub trait Supervisor {
    fn is_active(&self, service: &str) -> Result<bool, ServiceError>;

    /// Starts `service`; with `enable` it also starts on boot.
    fn start(&self, service: &str, enable: bool) -> Result<(), ServiceError>;

    fn restart(&self, service: &str) -> Result<(), ServiceError>;
}

/// Services shipped inside a snap, addressed as `<snap>.<service>`.
#[derive(Debug, Clone)]
pub struct SnapSupervisor {
    snap: String,
}

impl SnapSupervisor {
    pub fn new(snap: impl Into<String>) -> Self {
        Self { snap: snap.into() }
    }

    fn qualified(&self, service: &str) -> String {
        format!("{}.{}", self.snap, service)
    }
}

/// Whether `snap services` output lists `qualified` as active.
fn snap_service_active(listing: &str, qualified: &str) -> bool {
    listing.lines().skip(1).any(|line| {
        let mut columns = line.split_whitespace();
        columns.next() == Some(qualified) && columns.nth(1) == Some("active")
    })
}

impl Supervisor for SnapSupervisor {
    fn is_active(&self, service: &str) -> Result<bool, ServiceError> {
        let qualified = self.qualified(service);
        let output = command::run("snap", &["services", &qualified])?;
        Ok(snap_service_active(
            &String::from_utf8_lossy(&output.stdout),
            &qualified,
        ))
    }

    fn start(&self, service: &str, enable: bool) -> Result<(), ServiceError> {
        let qualified = self.qualified(service);
        log::info!("Starting {}", qualified);
        if enable {
            command::run("snap", &["start", "--enable", &qualified])?;
        } else {
            command::run("snap", &["start", &qualified])?;
        }
        Ok(())
    }

    fn restart(&self, service: &str) -> Result<(), ServiceError> {
        let qualified = self.qualified(service);
        log::info!("Restarting {}", qualified);
        command::run("snap", &["restart", &qualified])?;
        Ok(())
    }
}

/// Plain systemd units.
#[derive(Debug, Clone, Default)]
pub struct SystemdSupervisor;

impl Supervisor for SystemdSupervisor {
    fn is_active(&self, service: &str) -> Result<bool, ServiceError> {
        let output = command::output("systemctl", &["is-active", "--quiet", service])?;
        Ok(output.status.success())
    }

    fn start(&self, service: &str, enable: bool) -> Result<(), ServiceError> {
        log::info!("Starting {}", service);
        if enable {
            command::run("systemctl", &["enable", "--now", service])?;
        } else {
            command::run("systemctl", &["start", service])?;
        }
        Ok(())
    }

    fn restart(&self, service: &str) -> Result<(), ServiceError> {
        log::info!("Restarting {}", service);
        command::run("systemctl", &["restart", service])?;
        Ok(())
    }
}
