pub mod config;
pub mod error;
pub mod fd;
pub mod identity;
pub mod integrator;
pub mod relation;
pub mod secrets;
pub mod server;
pub mod service;
pub mod state;
pub mod status;
pub mod storage;
pub mod template;

pub use config::{load_settings, Settings};
pub use error::{ConfigError, ReconcileError, Result, ServiceError};
pub use identity::IdentityAllocator;
pub use relation::{
    BackupSpec, ClientAggregator, ClientDescriptor, DirectorInfo, DirectorRequirer, RelationError,
};
pub use secrets::{
    generate_password, FileSecretStore, MemorySecretStore, SecretContent, SecretDistributor,
    SecretError, SecretStore,
};
pub use service::{
    ApplyOutcome, ConfigReconciler, ReloadStrategy, ServiceKind, ServiceRegistry, ServiceSpec,
    Supervisor, Validator,
};
pub use state::{Databag, Relation, StateError, UnitContext, UnitState};
pub use status::UnitStatus;
pub use template::{TemplateError, TemplateRenderer};
