use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::relation::DEFAULT_FD_PORT;

/// Operator settings for every role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub fd: FdSettings,
    #[serde(default)]
    pub integrator: IntegratorSettings,
    #[serde(default)]
    pub paths: PathSettings,
}

fn default_retention() -> String {
    "1 year".to_string()
}

/// Retention periods written into the director configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerSettings {
    #[serde(default = "default_retention")]
    pub file_retention: String,
    #[serde(default = "default_retention")]
    pub job_retention: String,
    #[serde(default = "default_retention")]
    pub volume_retention: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            file_retention: default_retention(),
            job_retention: default_retention(),
            volume_retention: default_retention(),
        }
    }
}

fn default_fd_port() -> u16 {
    DEFAULT_FD_PORT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FdSettings {
    #[serde(default = "default_fd_port")]
    pub port: u16,
    /// Comma-joined schedule expressions; empty means no schedule.
    #[serde(default)]
    pub schedule: String,
}

impl Default for FdSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_FD_PORT,
            schedule: String::new(),
        }
    }
}

/// What the integrator asks to back up. Hook settings hold script
/// contents, not paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IntegratorSettings {
    #[serde(default)]
    pub fileset: String,
    #[serde(default)]
    pub run_before_backup: Option<String>,
    #[serde(default)]
    pub run_after_backup: Option<String>,
    #[serde(default)]
    pub run_before_restore: Option<String>,
    #[serde(default)]
    pub run_after_restore: Option<String>,
}

fn default_snap_common() -> PathBuf {
    PathBuf::from("/var/snap/charmed-bacula-server/common")
}

fn default_snap_install() -> PathBuf {
    PathBuf::from("/snap/charmed-bacula-server")
}

fn default_fd_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_proc() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_noop_script() -> String {
    "/usr/local/lib/bacula-ops/noop".to_string()
}

fn default_integrator_scripts() -> PathBuf {
    PathBuf::from("/opt/backup-integrator-charm")
}

/// Host locations. Only overridden in tests and unusual installs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathSettings {
    #[serde(default = "default_snap_common")]
    pub snap_common: PathBuf,
    #[serde(default = "default_snap_install")]
    pub snap_install: PathBuf,
    #[serde(default = "default_fd_root")]
    pub fd_root: PathBuf,
    #[serde(default = "default_proc")]
    pub proc: PathBuf,
    #[serde(default)]
    pub templates: Option<PathBuf>,
    #[serde(default = "default_noop_script")]
    pub noop_script: String,
    #[serde(default = "default_integrator_scripts")]
    pub integrator_scripts: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            snap_common: default_snap_common(),
            snap_install: default_snap_install(),
            fd_root: default_fd_root(),
            proc: default_proc(),
            templates: None,
            noop_script: default_noop_script(),
            integrator_scripts: default_integrator_scripts(),
        }
    }
}
