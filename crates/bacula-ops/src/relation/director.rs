use super::client::{Hook, Hooks};
use crate::secrets::{SecretError, SecretStore, PASSWORD_KEY};
use crate::state::Relation;

/// What a file daemon learns about its director.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorInfo {
    pub name: String,
    pub password: String,
}

/// What a file daemon tells its director about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAnnouncement {
    pub name: String,
    pub fileset: Vec<String>,
    pub port: u16,
    pub schedule: Vec<String>,
    pub hooks: Hooks,
}

/// File daemon side of the `bacula-dir` relation.
#[derive(Debug, Clone)]
pub struct DirectorRequirer {
    noop_script: String,
}

impl DirectorRequirer {
    pub fn new(noop_script: impl Into<String>) -> Self {
        Self {
            noop_script: noop_script.into(),
        }
    }

    /// Writes `announcement` into the local unit databag. Hooks that are not
    /// set are published as the no-op script; an empty schedule removes the
    /// `schedule` key.
    pub fn send_to_director(&self, relation: &mut Relation, announcement: &ClientAnnouncement) {
        let data = &mut relation.local_unit_data;
        data.insert("name".to_string(), announcement.name.clone());
        data.insert("fileset".to_string(), announcement.fileset.join(","));
        data.insert("port".to_string(), announcement.port.to_string());
        for hook in Hook::ALL {
            data.insert(
                hook.client_key().to_string(),
                announcement
                    .hooks
                    .resolved(hook, &self.noop_script)
                    .to_string(),
            );
        }
        if announcement.schedule.is_empty() {
            data.remove("schedule");
        } else {
            data.insert("schedule".to_string(), announcement.schedule.join(","));
        }
    }

    /// Reads the director name and password once the director has
    /// published both.
    pub fn receive_from_director(
        &self,
        relation: &Relation,
        store: &dyn SecretStore,
    ) -> Result<Option<DirectorInfo>, SecretError> {
        if relation.remote_app.is_none() {
            return Ok(None);
        }
        let data = &relation.remote_app_data;
        let (Some(name), Some(secret_id)) = (
            data.get("name").filter(|n| !n.is_empty()),
            data.get(PASSWORD_KEY).filter(|p| !p.is_empty()),
        ) else {
            return Ok(None);
        };

        let content = store.get(secret_id)?;
        Ok(Some(DirectorInfo {
            name: name.clone(),
            password: content.require(PASSWORD_KEY)?.to_string(),
        }))
    }
}
