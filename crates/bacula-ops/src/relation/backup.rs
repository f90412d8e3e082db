use super::client::{parse_fileset, validate_fileset, Hook, Hooks};
use super::{RelationError, BACKUP_ENDPOINT};
use crate::state::{Databag, Relation, UnitState};

/// What a unit wants backed up and which hooks run around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSpec {
    fileset: Vec<String>,
    hooks: Hooks,
}

impl BackupSpec {
    pub fn new(fileset: Vec<String>, hooks: Hooks) -> Result<Self, RelationError> {
        validate_fileset(&fileset)?;
        Ok(Self { fileset, hooks })
    }

    pub fn fileset(&self) -> &[String] {
        &self.fileset
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Parses a published spec. An empty databag means nothing was
    /// published yet.
    pub fn from_databag(data: &Databag) -> Result<Option<Self>, RelationError> {
        if data.is_empty() {
            return Ok(None);
        }
        let fileset = data
            .get("fileset")
            .ok_or_else(|| RelationError::MissingField("fileset".to_string()))?;
        let fileset = parse_fileset(fileset)?;
        let hooks = Hooks::from_databag(data, Hook::spec_key)?;
        Ok(Some(Self { fileset, hooks }))
    }

    /// Serialized form: comma-joined `fileset` plus the hooks that are set.
    pub fn to_databag(&self) -> Databag {
        let mut data = Databag::new();
        data.insert("fileset".to_string(), self.fileset.join(","));
        for hook in Hook::ALL {
            if let Some(path) = self.hooks.get(hook) {
                data.insert(hook.spec_key().to_string(), path.to_string());
            }
        }
        data
    }
}

/// Reads the backup spec the remote application published on `relation`.
pub fn get_backup_spec(relation: &Relation) -> Result<Option<BackupSpec>, RelationError> {
    if relation.remote_app.is_none() {
        return Ok(None);
    }
    BackupSpec::from_databag(&relation.remote_app_data)
}

/// Publishes a spec supplied on every call.
#[derive(Debug, Clone)]
pub struct BackupDynamicRequirer {
    endpoint: String,
}

impl Default for BackupDynamicRequirer {
    fn default() -> Self {
        Self::new(BACKUP_ENDPOINT)
    }
}

impl BackupDynamicRequirer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Writes `spec` to the application databag of every backup relation
    /// whose content differs. Must only be called on the leader. Returns the
    /// number of relations updated.
    pub fn require_backup(&self, state: &mut UnitState, spec: &BackupSpec) -> usize {
        let data = spec.to_databag();
        let mut updated = 0;
        for relation in state.relations_mut(&self.endpoint) {
            if relation.replace_local_app_data(data.clone()) {
                log::info!("Requesting backup with {:?}", data);
                updated += 1;
            }
        }
        updated
    }
}

/// Publishes a spec fixed at construction.
#[derive(Debug, Clone)]
pub struct BackupRequirer {
    spec: BackupSpec,
    inner: BackupDynamicRequirer,
}

impl BackupRequirer {
    pub fn new(spec: BackupSpec) -> Self {
        Self {
            spec,
            inner: BackupDynamicRequirer::default(),
        }
    }

    pub fn spec(&self) -> &BackupSpec {
        &self.spec
    }

    /// Publishes the backup spec if this unit is the leader.
    pub fn publish(&self, state: &mut UnitState) -> usize {
        if !state.unit.leader {
            return 0;
        }
        self.inner.require_backup(state, &self.spec)
    }
}
