//! Test harness for isolated reconcile runs.
//!
//! The `TestHarness` struct provides:
//! - A temporary host root for every managed file and script
//! - Recording fakes for the supervisor, processes, installer, catalog and
//!   user directory, all writing to one shared `CallLog`
//! - Registries for the server and file daemon roles wired to those fakes

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use secrecy::SecretString;
use tempfile::TempDir;

use bacula_ops::service::{
    Catalog, DbConfig, Installer, ProcessControl, ServiceKind, UserDirectory, UserRealm,
};
use bacula_ops::{ServiceError, ServiceRegistry, ServiceSpec, Settings, Supervisor, TemplateRenderer, Validator};

/// Every side effect the fakes observed, in order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Returns and clears the recorded calls.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

pub struct RecordingSupervisor {
    pub log: CallLog,
    pub active: bool,
}

impl Supervisor for RecordingSupervisor {
    fn is_active(&self, _service: &str) -> Result<bool, ServiceError> {
        Ok(self.active)
    }

    fn start(&self, service: &str, enable: bool) -> Result<(), ServiceError> {
        self.log.record(format!("start {} enable={}", service, enable));
        Ok(())
    }

    fn restart(&self, service: &str) -> Result<(), ServiceError> {
        self.log.record(format!("restart {}", service));
        Ok(())
    }
}

pub struct FakeProcesses {
    pub log: CallLog,
    pub pids: Vec<i32>,
}

impl ProcessControl for FakeProcesses {
    fn pids_of(&self, _binary: &str) -> Result<Vec<i32>, ServiceError> {
        Ok(self.pids.clone())
    }

    fn hangup(&self, pid: i32) -> Result<(), ServiceError> {
        self.log.record(format!("hangup {}", pid));
        Ok(())
    }
}

pub struct FakeInstaller {
    pub log: CallLog,
    pub installed: bool,
}

impl Installer for FakeInstaller {
    fn is_installed(&self) -> bool {
        self.installed
    }

    fn install(&self) -> Result<(), ServiceError> {
        self.log.record("install");
        Ok(())
    }
}

pub struct FakeCatalog {
    pub log: CallLog,
    pub initialized: bool,
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn is_initialized(&self, _db: &DbConfig) -> Result<bool, ServiceError> {
        Ok(self.initialized)
    }

    async fn initialize(&self, db: &DbConfig) -> Result<(), ServiceError> {
        self.log.record(format!("initialize {}", db.name));
        Ok(())
    }
}

pub struct FakeUsers {
    pub log: CallLog,
}

impl UserDirectory for FakeUsers {
    fn set_user(
        &self,
        realm: UserRealm,
        username: &str,
        _password: &SecretString,
    ) -> Result<(), ServiceError> {
        self.log.record(format!("set-user {:?} {}", realm, username));
        Ok(())
    }
}

/// Collaborator behavior for a registry built by the harness.
#[derive(Clone)]
pub struct HostOptions {
    pub installed: bool,
    pub initialized: bool,
    pub active: bool,
    pub pids: Vec<i32>,
    /// Validator for the director; every other service uses `Skip`.
    pub director_validator: Validator,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            installed: true,
            initialized: true,
            active: true,
            pids: vec![4242],
            director_validator: Validator::Skip,
        }
    }
}

/// Test harness providing an isolated host for integration tests.
pub struct TestHarness {
    /// Temporary directory standing in for the host filesystem.
    temp_dir: TempDir,
    /// Shared log of every side effect.
    pub calls: CallLog,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            calls: CallLog::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn snap_common(&self) -> PathBuf {
        self.root().join("snap-common")
    }

    pub fn fd_root(&self) -> PathBuf {
        self.root().join("fd-root")
    }

    /// Settings whose host paths all point inside the harness.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.paths.snap_common = self.snap_common();
        settings.paths.snap_install = self.root().join("snap-install");
        settings.paths.fd_root = self.fd_root();
        settings.paths.proc = self.root().join("proc");
        settings.paths.integrator_scripts = self.root().join("integrator");
        settings
    }

    pub fn server_registry(&self) -> ServiceRegistry {
        self.server_registry_with(HostOptions::default())
    }

    pub fn server_registry_with(&self, options: HostOptions) -> ServiceRegistry {
        let specs = ServiceSpec::server_set(&self.snap_common())
            .into_iter()
            .map(|mut spec| {
                spec.validator = if spec.name == ServiceKind::Director.service_name() {
                    options.director_validator.clone()
                } else {
                    Validator::Skip
                };
                spec
            })
            .collect();

        ServiceRegistry::builder(
            specs,
            TemplateRenderer::embedded().expect("Failed to load templates"),
            FakeInstaller {
                log: self.calls.clone(),
                installed: options.installed,
            },
        )
        .supervisor(RecordingSupervisor {
            log: self.calls.clone(),
            active: options.active,
        })
        .processes(FakeProcesses {
            log: self.calls.clone(),
            pids: options.pids,
        })
        .catalog(FakeCatalog {
            log: self.calls.clone(),
            initialized: options.initialized,
        })
        .users(FakeUsers {
            log: self.calls.clone(),
        })
        .build()
    }

    pub fn fd_registry(&self, installed: bool, validator: Validator) -> ServiceRegistry {
        let mut spec = ServiceSpec::fd_client(&self.fd_root());
        spec.validator = validator;

        ServiceRegistry::builder(
            vec![spec],
            TemplateRenderer::embedded().expect("Failed to load templates"),
            FakeInstaller {
                log: self.calls.clone(),
                installed,
            },
        )
        .supervisor(RecordingSupervisor {
            log: self.calls.clone(),
            active: true,
        })
        .processes(FakeProcesses {
            log: self.calls.clone(),
            pids: vec![],
        })
        .build()
    }

    /// Content of a managed server file, given its absolute host path.
    pub fn read_server_file(&self, host_path: &str) -> String {
        let path = self.snap_common().join(host_path.trim_start_matches('/'));
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
    }

    pub fn read_fd_file(&self, host_path: &str) -> String {
        let path = self.fd_root().join(host_path.trim_start_matches('/'));
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
    }

    /// Modification time and content of every file under the root.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, (SystemTime, String)> {
        let pattern = format!("{}/**/*", self.root().display());
        glob::glob(&pattern)
            .expect("Invalid glob pattern")
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .map(|p| {
                let modified = std::fs::metadata(&p).unwrap().modified().unwrap();
                let content = std::fs::read_to_string(&p).unwrap_or_default();
                (p, (modified, content))
            })
            .collect()
    }

    /// Paths of leftover staged files.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        self.snapshot()
            .into_keys()
            .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
