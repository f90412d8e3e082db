//! Managed services: what files they own, how a new configuration is
//! validated and committed, and how the running daemon picks it up.

mod command;
pub mod lifecycle;
pub mod process;
pub mod reconciler;
pub mod registry;
pub mod reload;
pub mod spec;
pub mod supervisor;
pub mod validator;

pub use lifecycle::{
    AptInstaller, Catalog, DbConfig, HtpasswdUsers, Installer, PostgresCatalog, SnapInstaller,
    UserDirectory, UserRealm,
};
pub use process::{ProcFs, ProcessControl};
pub use reconciler::{ApplyOutcome, ConfigReconciler, RenderedConfig};
pub use registry::{ServiceRegistry, ServiceRegistryBuilder};
pub use reload::ReloadStrategy;
pub use spec::{ManagedFile, ServiceKind, ServiceSpec, SERVER_SNAP};
pub use supervisor::{SnapSupervisor, Supervisor, SystemdSupervisor};
pub use validator::{Validation, Validator};
