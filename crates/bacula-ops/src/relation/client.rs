use serde_json::{json, Value};
use std::path::Path;

use super::RelationError;
use crate::identity::FD_SUFFIX;
use crate::state::Databag;

pub const DEFAULT_FD_PORT: u16 = 9102;

/// Script hooks run by the file daemon around backup and restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BeforeBackup,
    AfterBackup,
    BeforeRestore,
    AfterRestore,
}

impl Hook {
    pub const ALL: [Hook; 4] = [
        Hook::BeforeBackup,
        Hook::AfterBackup,
        Hook::BeforeRestore,
        Hook::AfterRestore,
    ];

    /// Key in a backup spec databag, also the integrator setting name.
    pub fn spec_key(self) -> &'static str {
        match self {
            Hook::BeforeBackup => "run-before-backup",
            Hook::AfterBackup => "run-after-backup",
            Hook::BeforeRestore => "run-before-restore",
            Hook::AfterRestore => "run-after-restore",
        }
    }

    /// Key in a client descriptor databag.
    pub fn client_key(self) -> &'static str {
        match self {
            Hook::BeforeBackup => "client-run-before-backup",
            Hook::AfterBackup => "client-run-after-backup",
            Hook::BeforeRestore => "client-run-before-restore",
            Hook::AfterRestore => "client-run-after-restore",
        }
    }

    fn template_key(self) -> &'static str {
        match self {
            Hook::BeforeBackup => "client_run_before_backup",
            Hook::AfterBackup => "client_run_after_backup",
            Hook::BeforeRestore => "client_run_before_restore",
            Hook::AfterRestore => "client_run_after_restore",
        }
    }
}

/// The four optional hook script paths. Every present path is absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    before_backup: Option<String>,
    after_backup: Option<String>,
    before_restore: Option<String>,
    after_restore: Option<String>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hook: Hook) -> Option<&str> {
        match hook {
            Hook::BeforeBackup => self.before_backup.as_deref(),
            Hook::AfterBackup => self.after_backup.as_deref(),
            Hook::BeforeRestore => self.before_restore.as_deref(),
            Hook::AfterRestore => self.after_restore.as_deref(),
        }
    }

    /// Sets a hook path, rejecting relative paths. Empty values clear it.
    pub fn set(&mut self, hook: Hook, path: Option<String>) -> Result<(), RelationError> {
        let path = path.filter(|p| !p.is_empty());
        if let Some(p) = &path {
            check_directive_value(hook.spec_key(), p)?;
            if !Path::new(p).is_absolute() {
                return Err(RelationError::NotAbsolute(p.clone()));
            }
        }
        let slot = match hook {
            Hook::BeforeBackup => &mut self.before_backup,
            Hook::AfterBackup => &mut self.after_backup,
            Hook::BeforeRestore => &mut self.before_restore,
            Hook::AfterRestore => &mut self.after_restore,
        };
        *slot = path;
        Ok(())
    }

    pub fn with(mut self, hook: Hook, path: impl Into<String>) -> Result<Self, RelationError> {
        self.set(hook, Some(path.into()))?;
        Ok(self)
    }

    /// Reads hooks from `data` using `key` to name each entry.
    pub fn from_databag(data: &Databag, key: fn(Hook) -> &'static str) -> Result<Self, RelationError> {
        let mut hooks = Hooks::new();
        for hook in Hook::ALL {
            hooks.set(hook, data.get(key(hook)).cloned())?;
        }
        Ok(hooks)
    }

    /// Path for `hook`, or `noop` when none was declared.
    pub fn resolved<'a>(&'a self, hook: Hook, noop: &'a str) -> &'a str {
        self.get(hook).unwrap_or(noop)
    }
}

/// Rejects values that cannot sit inside a quoted director directive.
pub fn check_directive_value(field: &str, value: &str) -> Result<(), RelationError> {
    if value.chars().any(|c| c == '"' || c.is_control()) {
        return Err(RelationError::UnsafeValue {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Removes the trailing `-fd` role suffix from a declared name.
pub fn strip_role_suffix(name: &str) -> &str {
    name.strip_suffix(FD_SUFFIX).unwrap_or(name)
}

pub fn validate_fileset(fileset: &[String]) -> Result<(), RelationError> {
    if fileset.is_empty() {
        return Err(RelationError::EmptyFileset);
    }
    for path in fileset {
        if path.trim() != path {
            return Err(RelationError::Whitespace(path.clone()));
        }
        check_directive_value("fileset", path)?;
        if path.contains(',') {
            return Err(RelationError::Comma(path.clone()));
        }
        if !Path::new(path).is_absolute() {
            return Err(RelationError::NotAbsolute(path.clone()));
        }
    }
    Ok(())
}

/// Splits a comma-joined fileset, dropping blank entries, and validates it.
pub fn parse_fileset(raw: &str) -> Result<Vec<String>, RelationError> {
    let fileset: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();
    validate_fileset(&fileset)?;
    Ok(fileset)
}

/// Splits a comma-joined schedule. Absent or blank input yields no entries.
pub fn parse_schedule(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// One file daemon as announced on the director relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDescriptor {
    pub name: String,
    pub password: String,
    pub fileset: Vec<String>,
    pub host: String,
    pub port: u16,
    pub schedule: Vec<String>,
    pub hooks: Hooks,
}

impl ClientDescriptor {
    /// Builds a descriptor from a remote unit's databag and the relation
    /// password.
    pub fn from_databag(data: &Databag, password: &str) -> Result<Self, RelationError> {
        let name = data
            .get("name")
            .ok_or_else(|| RelationError::MissingField("name".to_string()))?;
        let fileset = data
            .get("fileset")
            .ok_or_else(|| RelationError::MissingField("fileset".to_string()))?;
        let host = data
            .get("ingress-address")
            .ok_or_else(|| RelationError::MissingField("ingress-address".to_string()))?;
        check_directive_value("name", name)?;
        check_directive_value("ingress-address", host)?;
        let schedule = parse_schedule(data.get("schedule").map(String::as_str));
        for entry in &schedule {
            check_directive_value("schedule", entry)?;
        }
        let port = match data.get("port") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| RelationError::InvalidPort(raw.clone()))?,
            None => DEFAULT_FD_PORT,
        };

        Ok(Self {
            name: strip_role_suffix(name).to_string(),
            password: password.to_string(),
            fileset: parse_fileset(fileset)?,
            host: host.clone(),
            port,
            schedule,
            hooks: Hooks::from_databag(data, Hook::client_key)?,
        })
    }

    /// Template variables for one entry of `relation_fd_list`.
    pub fn to_template_value(&self, noop: &str) -> Value {
        let mut value = json!({
            "name": self.name,
            "password": self.password,
            "fileset": self.fileset,
            "host": self.host,
            "port": self.port,
            "schedule": self.schedule,
        });
        if let Value::Object(map) = &mut value {
            for hook in Hook::ALL {
                map.insert(
                    hook.template_key().to_string(),
                    Value::String(self.hooks.resolved(hook, noop).to_string()),
                );
            }
        }
        value
    }
}
