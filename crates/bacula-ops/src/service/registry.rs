use secrecy::SecretString;
use serde_json::Value;

use super::lifecycle::{
    AptInstaller, Catalog, DbConfig, HtpasswdUsers, Installer, PostgresCatalog, SnapInstaller,
    UserDirectory, UserRealm,
};
use super::process::{ProcFs, ProcessControl};
use super::reconciler::{ApplyOutcome, ConfigReconciler};
use super::spec::{ServiceSpec, SERVER_SNAP};
use super::supervisor::{SnapSupervisor, Supervisor, SystemdSupervisor};
use crate::config::PathSettings;
use crate::error::ServiceError;
use crate::template::{TemplateError, TemplateRenderer};

/// The managed services of one host and the collaborators needed to
/// install, configure and reload them.
pub struct ServiceRegistry {
    specs: Vec<ServiceSpec>,
    renderer: TemplateRenderer,
    supervisor: Box<dyn Supervisor>,
    processes: Box<dyn ProcessControl>,
    installer: Box<dyn Installer>,
    catalog: Option<Box<dyn Catalog>>,
    users: Option<Box<dyn UserDirectory>>,
}

pub struct ServiceRegistryBuilder {
    specs: Vec<ServiceSpec>,
    renderer: TemplateRenderer,
    installer: Box<dyn Installer>,
    supervisor: Box<dyn Supervisor>,
    processes: Box<dyn ProcessControl>,
    catalog: Option<Box<dyn Catalog>>,
    users: Option<Box<dyn UserDirectory>>,
}

impl ServiceRegistryBuilder {
    pub fn supervisor(mut self, supervisor: impl Supervisor + 'static) -> Self {
        self.supervisor = Box::new(supervisor);
        self
    }

    pub fn processes(mut self, processes: impl ProcessControl + 'static) -> Self {
        self.processes = Box::new(processes);
        self
    }

    pub fn catalog(mut self, catalog: impl Catalog + 'static) -> Self {
        self.catalog = Some(Box::new(catalog));
        self
    }

    pub fn users(mut self, users: impl UserDirectory + 'static) -> Self {
        self.users = Some(Box::new(users));
        self
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            specs: self.specs,
            renderer: self.renderer,
            supervisor: self.supervisor,
            processes: self.processes,
            installer: self.installer,
            catalog: self.catalog,
            users: self.users,
        }
    }
}

fn renderer_for(paths: &PathSettings) -> Result<TemplateRenderer, TemplateError> {
    match &paths.templates {
        Some(dir) => TemplateRenderer::with_overrides(dir),
        None => TemplateRenderer::embedded(),
    }
}

impl ServiceRegistry {
    /// Starts a registry for `specs`, applied in the given order. The
    /// supervisor defaults to systemd and processes are looked up in
    /// `/proc`.
    pub fn builder(
        specs: Vec<ServiceSpec>,
        renderer: TemplateRenderer,
        installer: impl Installer + 'static,
    ) -> ServiceRegistryBuilder {
        ServiceRegistryBuilder {
            specs,
            renderer,
            installer: Box::new(installer),
            supervisor: Box::new(SystemdSupervisor),
            processes: Box::new(ProcFs::default()),
            catalog: None,
            users: None,
        }
    }

    /// Director, storage, file daemon and web front end from the server
    /// snap.
    pub fn server(paths: &PathSettings) -> Result<Self, TemplateError> {
        Ok(Self::builder(
            ServiceSpec::server_set(&paths.snap_common),
            renderer_for(paths)?,
            SnapInstaller::server(&paths.snap_install),
        )
        .supervisor(SnapSupervisor::new(SERVER_SNAP))
        .processes(ProcFs::new(&paths.proc))
        .catalog(PostgresCatalog::default())
        .users(HtpasswdUsers::new(&paths.snap_common))
        .build())
    }

    /// A standalone file daemon from the distribution package.
    pub fn fd_client(paths: &PathSettings) -> Result<Self, TemplateError> {
        Ok(Self::builder(
            vec![ServiceSpec::fd_client(&paths.fd_root)],
            renderer_for(paths)?,
            AptInstaller::bacula_fd(&paths.fd_root),
        )
        .processes(ProcFs::new(&paths.proc))
        .build())
    }

    pub fn specs(&self) -> &[ServiceSpec] {
        &self.specs
    }

    pub fn is_installed(&self) -> bool {
        self.installer.is_installed()
    }

    /// Installs the services unless they already are.
    pub fn install(&self) -> Result<(), ServiceError> {
        if self.installer.is_installed() {
            return Ok(());
        }
        self.installer.install()
    }

    /// Hosts without a catalog are always initialized.
    pub async fn is_initialized(&self, db: &DbConfig) -> Result<bool, ServiceError> {
        match &self.catalog {
            Some(catalog) => catalog.is_initialized(db).await,
            None => Ok(true),
        }
    }

    /// Creates the catalog tables unless they already exist.
    pub async fn initialize(&self, db: &DbConfig) -> Result<(), ServiceError> {
        let Some(catalog) = &self.catalog else {
            return Ok(());
        };
        if catalog.is_initialized(db).await? {
            return Ok(());
        }
        catalog.initialize(db).await
    }

    pub fn reconciler<'a>(&'a self, spec: &'a ServiceSpec) -> ConfigReconciler<'a> {
        ConfigReconciler::new(
            spec,
            &self.renderer,
            self.supervisor.as_ref(),
            self.processes.as_ref(),
        )
    }

    /// Applies every service in order with one shared variable set,
    /// stopping at the first failure.
    pub fn apply(&self, variables: &Value) -> Result<Vec<(String, ApplyOutcome)>, ServiceError> {
        let mut outcomes = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let outcome = self.reconciler(spec).apply(variables)?;
            outcomes.push((spec.name.clone(), outcome));
        }
        Ok(outcomes)
    }

    pub fn set_user(
        &self,
        realm: UserRealm,
        username: &str,
        password: &SecretString,
    ) -> Result<(), ServiceError> {
        match &self.users {
            Some(users) => users.set_user(realm, username, password),
            None => Err(ServiceError::Command {
                program: "htpasswd".to_string(),
                message: "this host has no web front end".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::reload::ReloadStrategy;
    use crate::service::spec::ManagedFile;
    use crate::service::validator::Validator;
    use async_trait::async_trait;
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FakeInstaller {
        installed: bool,
        installs: Arc<AtomicUsize>,
    }

    impl Installer for FakeInstaller {
        fn is_installed(&self) -> bool {
            self.installed
        }

        fn install(&self) -> Result<(), ServiceError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeCatalog {
        initialized: bool,
        initializations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn is_initialized(&self, _db: &DbConfig) -> Result<bool, ServiceError> {
            Ok(self.initialized)
        }

        async fn initialize(&self, _db: &DbConfig) -> Result<(), ServiceError> {
            self.initializations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct AlwaysActive(Cell<usize>);

    impl Supervisor for AlwaysActive {
        fn is_active(&self, _service: &str) -> Result<bool, ServiceError> {
            Ok(true)
        }

        fn start(&self, _service: &str, _enable: bool) -> Result<(), ServiceError> {
            Ok(())
        }

        fn restart(&self, _service: &str) -> Result<(), ServiceError> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn db() -> DbConfig {
        DbConfig {
            host: "db".to_string(),
            port: 5432,
            name: "bacula".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        }
    }

    fn spec(temp_dir: &TempDir, name: &str, validator: Validator) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            files: vec![ManagedFile {
                path: temp_dir.path().join(format!("{}.conf", name)),
                template: "t".to_string(),
            }],
            validator,
            reload: ReloadStrategy::RestartOrStart,
        }
    }

    fn renderer() -> TemplateRenderer {
        let mut renderer = TemplateRenderer::new();
        renderer.add("t", "{{ x }}\n").unwrap();
        renderer
    }

    #[test]
    fn test_install_is_skipped_when_installed() {
        let installs = Arc::new(AtomicUsize::new(0));
        for installed in [true, false] {
            let registry = ServiceRegistry::builder(
                vec![],
                TemplateRenderer::new(),
                FakeInstaller {
                    installed,
                    installs: installs.clone(),
                },
            )
            .build();
            registry.install().unwrap();
        }
        assert_eq!(installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initialize_checks_predicate_first() {
        let initializations = Arc::new(AtomicUsize::new(0));
        for initialized in [true, false] {
            let registry = ServiceRegistry::builder(
                vec![],
                TemplateRenderer::new(),
                FakeInstaller {
                    installed: true,
                    installs: Arc::default(),
                },
            )
            .catalog(FakeCatalog {
                initialized,
                initializations: initializations.clone(),
            })
            .build();
            registry.initialize(&db()).await.unwrap();
        }
        assert_eq!(initializations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_without_catalog_is_initialized() {
        let registry = ServiceRegistry::builder(
            vec![],
            TemplateRenderer::new(),
            FakeInstaller {
                installed: true,
                installs: Arc::default(),
            },
        )
        .build();
        assert!(registry.is_initialized(&db()).await.unwrap());
    }

    #[test]
    fn test_apply_in_order_and_stop_at_first_failure() {
        let temp_dir = TempDir::new().unwrap();
        let specs = vec![
            spec(&temp_dir, "first", Validator::Skip),
            spec(&temp_dir, "second", Validator::command("false")),
            spec(&temp_dir, "third", Validator::Skip),
        ];
        let registry = ServiceRegistry::builder(
            specs,
            renderer(),
            FakeInstaller {
                installed: true,
                installs: Arc::default(),
            },
        )
        .supervisor(AlwaysActive(Cell::new(0)))
        .build();

        let err = registry.apply(&json!({"x": 1})).unwrap_err();
        assert_eq!(err.to_string(), "error in second configuration");
        assert!(temp_dir.path().join("first.conf").exists());
        assert!(!temp_dir.path().join("second.conf").exists());
        assert!(!temp_dir.path().join("third.conf").exists());
    }

    #[test]
    fn test_apply_reports_outcomes() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::builder(
            vec![
                spec(&temp_dir, "a", Validator::Skip),
                spec(&temp_dir, "b", Validator::Skip),
            ],
            renderer(),
            FakeInstaller {
                installed: true,
                installs: Arc::default(),
            },
        )
        .supervisor(AlwaysActive(Cell::new(0)))
        .build();

        let first = registry.apply(&json!({"x": 1})).unwrap();
        assert!(first.iter().all(|(_, o)| *o == ApplyOutcome::Applied));

        let second = registry.apply(&json!({"x": 1})).unwrap();
        assert_eq!(
            second,
            vec![
                ("a".to_string(), ApplyOutcome::Unchanged),
                ("b".to_string(), ApplyOutcome::Unchanged)
            ]
        );
    }
}
