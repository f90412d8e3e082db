//! Data exchanged over relations: client descriptors flowing to the
//! director, director info flowing back, and backup specs.

mod aggregator;
mod backup;
mod client;
mod director;

use thiserror::Error;

pub use aggregator::ClientAggregator;
pub use backup::{get_backup_spec, BackupDynamicRequirer, BackupRequirer, BackupSpec};
pub use client::{
    parse_fileset, parse_schedule, strip_role_suffix, validate_fileset, ClientDescriptor, Hook,
    Hooks, DEFAULT_FD_PORT,
};
pub use director::{ClientAnnouncement, DirectorInfo, DirectorRequirer};

/// Endpoint linking file daemons to the director.
pub const BACULA_DIR_ENDPOINT: &str = "bacula-dir";
/// Endpoint carrying backup specs.
pub const BACKUP_ENDPOINT: &str = "backup";
pub const POSTGRESQL_ENDPOINT: &str = "postgresql";
pub const S3_ENDPOINT: &str = "s3";

/// Name the director publishes to every client.
pub const DIRECTOR_NAME: &str = "charm-bacula-dir";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationError {
    #[error("fileset cannot be empty")]
    EmptyFileset,

    #[error("path cannot start or end with whitespaces: '{0}'")]
    Whitespace(String),

    #[error("path cannot contain commas: '{0}'")]
    Comma(String),

    #[error("path must be absolute: '{0}'")]
    NotAbsolute(String),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("{field} cannot contain quotes or control characters: {value:?}")]
    UnsafeValue { field: String, value: String },
}
