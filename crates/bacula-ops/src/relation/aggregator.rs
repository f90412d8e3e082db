use serde_json::Value;

use super::client::ClientDescriptor;
use super::{BACULA_DIR_ENDPOINT, DIRECTOR_NAME};
use crate::secrets::{SecretDistributor, SecretError, SecretStore, PASSWORD_KEY};
use crate::state::UnitState;

/// Director side of the `bacula-dir` relation.
///
/// Publishes the director name and a per-relation password, and collects
/// the file daemons announced by every remote unit.
#[derive(Debug, Clone)]
pub struct ClientAggregator {
    noop_script: String,
}

impl ClientAggregator {
    pub fn new(noop_script: impl Into<String>) -> Self {
        Self {
            noop_script: noop_script.into(),
        }
    }

    /// Ensures every client relation carries the director name and a
    /// password secret.
    pub fn send_to_clients(
        &self,
        state: &mut UnitState,
        store: &mut dyn SecretStore,
    ) -> Result<(), SecretError> {
        let mut distributor = SecretDistributor::new(store);
        for relation in state.relations_mut(BACULA_DIR_ENDPOINT) {
            distributor.ensure_secret(relation)?;
            relation
                .local_app_data
                .insert("name".to_string(), DIRECTOR_NAME.to_string());
        }
        Ok(())
    }

    /// Collects a descriptor for every remote unit that announced itself.
    ///
    /// Units that have not published a name yet are skipped silently.
    /// Malformed announcements are logged and skipped without affecting the
    /// others.
    pub fn receive_from_clients(
        &self,
        state: &UnitState,
        store: &dyn SecretStore,
    ) -> Result<Vec<ClientDescriptor>, SecretError> {
        let mut clients = Vec::new();

        for relation in state.relations(BACULA_DIR_ENDPOINT) {
            let Some(remote_app) = &relation.remote_app else {
                continue;
            };
            let Some(secret_id) = relation.local_app_data.get(PASSWORD_KEY) else {
                log::warn!(
                    "No password published on bacula-dir relation (id: {}) yet",
                    relation.id
                );
                continue;
            };
            let content = store.get(secret_id)?;
            let password = content.require(PASSWORD_KEY)?;

            for (unit, data) in &relation.remote_units {
                if !data.contains_key("name") {
                    continue;
                }
                match ClientDescriptor::from_databag(data, password) {
                    Ok(client) => clients.push(client),
                    Err(e) => {
                        log::error!(
                            "skipping invalid bacula-dir relation (id: {}) from {} ({}): {}",
                            relation.id,
                            remote_app,
                            unit,
                            e
                        );
                    }
                }
            }
        }

        Ok(clients)
    }

    /// The `relation_fd_list` template variable.
    pub fn template_list(&self, clients: &[ClientDescriptor]) -> Value {
        Value::Array(
            clients
                .iter()
                .map(|c| c.to_template_value(&self.noop_script))
                .collect(),
        )
    }
}
