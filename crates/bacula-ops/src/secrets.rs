//! Secret storage and idempotent distribution.
//!
//! Secrets are opaque content maps referenced by an id of the form
//! `secret:<uuid>`. Only the id ever travels through relation data; readers
//! dereference it through a [`SecretStore`].
//!
//! Every secret the distributor creates carries a reserved label derived from
//! what it is for. Creation always looks for that label first, so a crash
//! between "store the secret" and "publish its id" is healed on the next run
//! by reusing the stored secret instead of generating a second one.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::state::{Databag, Relation};
use crate::storage;

pub type SecretId = String;

/// Relation databag key holding the secret id published for a relation.
pub const PASSWORD_KEY: &str = "password";

const ID_PREFIX: &str = "secret:";

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("Secret store I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize secret: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to generate random bytes: {0}")]
    Random(String),

    #[error("Secret is missing key '{key}'")]
    MissingKey { key: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Content of one secret. Values never show up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretContent(BTreeMap<String, String>);

impl SecretContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| SecretError::MissingKey {
            key: key.to_string(),
        })
    }

    pub fn secret(&self, key: &str) -> Result<SecretString> {
        self.require(key).map(|v| SecretString::from(v.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Debug for SecretContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "[REDACTED]")))
            .finish()
    }
}

/// Access to an opaque key/value secret store with grant semantics.
pub trait SecretStore {
    /// Stores a new secret and returns its id.
    fn create(&mut self, label: &str, content: SecretContent) -> Result<SecretId>;

    fn find_by_label(&self, label: &str) -> Result<Option<SecretId>>;

    fn get(&self, id: &str) -> Result<SecretContent>;

    /// Grants the remote side of `relation_id` read access. Granting twice is
    /// a no-op.
    fn grant(&mut self, id: &str, relation_id: u32) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StoredSecret {
    id: SecretId,
    label: String,
    content: SecretContent,
    #[serde(default)]
    grants: BTreeSet<u32>,
    created_at: DateTime<Utc>,
}

impl StoredSecret {
    fn new(label: &str, content: SecretContent) -> Self {
        Self {
            id: format!("{}{}", ID_PREFIX, uuid::Uuid::new_v4()),
            label: label.to_string(),
            content,
            grants: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }
}

/// Secret store keeping one JSON document per secret in a directory.
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let uuid = id
            .strip_prefix(ID_PREFIX)
            .and_then(|raw| uuid::Uuid::parse_str(raw).ok())
            .ok_or_else(|| SecretError::NotFound(id.to_string()))?;
        Ok(self.dir.join(format!("{}.json", uuid)))
    }

    fn read(&self, path: &Path) -> Result<StoredSecret> {
        let content = std::fs::read_to_string(path).map_err(|e| SecretError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, secret: &StoredSecret) -> Result<()> {
        let path = self.path_for(&secret.id)?;
        let content = serde_json::to_string_pretty(secret)?;
        storage::write_atomic(&path, content.as_bytes()).map_err(|e| SecretError::Io {
            path,
            source: e,
        })
    }

    fn load(&self, id: &str) -> Result<StoredSecret> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(SecretError::NotFound(id.to_string()));
        }
        self.read(&path)
    }
}

impl SecretStore for FileSecretStore {
    fn create(&mut self, label: &str, content: SecretContent) -> Result<SecretId> {
        let secret = StoredSecret::new(label, content);
        self.write(&secret)?;
        Ok(secret.id)
    }

    fn find_by_label(&self, label: &str) -> Result<Option<SecretId>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SecretError::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        for path in paths {
            let secret = self.read(&path)?;
            if secret.label == label {
                return Ok(Some(secret.id));
            }
        }
        Ok(None)
    }

    fn get(&self, id: &str) -> Result<SecretContent> {
        Ok(self.load(id)?.content)
    }

    fn grant(&mut self, id: &str, relation_id: u32) -> Result<()> {
        let mut secret = self.load(id)?;
        if secret.grants.insert(relation_id) {
            self.write(&secret)?;
        }
        Ok(())
    }
}

/// In-process secret store, used when no persistent store is configured and
/// throughout the tests.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: BTreeMap<SecretId, StoredSecret>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of secrets ever created.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn grants(&self, id: &str) -> Vec<u32> {
        self.secrets
            .get(id)
            .map(|s| s.grants.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl SecretStore for MemorySecretStore {
    fn create(&mut self, label: &str, content: SecretContent) -> Result<SecretId> {
        let secret = StoredSecret::new(label, content);
        let id = secret.id.clone();
        self.secrets.insert(id.clone(), secret);
        Ok(id)
    }

    fn find_by_label(&self, label: &str) -> Result<Option<SecretId>> {
        Ok(self
            .secrets
            .values()
            .find(|s| s.label == label)
            .map(|s| s.id.clone()))
    }

    fn get(&self, id: &str) -> Result<SecretContent> {
        self.secrets
            .get(id)
            .map(|s| s.content.clone())
            .ok_or_else(|| SecretError::NotFound(id.to_string()))
    }

    fn grant(&mut self, id: &str, relation_id: u32) -> Result<()> {
        let secret = self
            .secrets
            .get_mut(id)
            .ok_or_else(|| SecretError::NotFound(id.to_string()))?;
        secret.grants.insert(relation_id);
        Ok(())
    }
}

/// Generates `bytes` random bytes and encodes them as URL-safe base64.
pub fn generate_password(bytes: usize) -> Result<String> {
    let mut buf = vec![0u8; bytes];
    getrandom::getrandom(&mut buf).map_err(|e| SecretError::Random(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Creates secrets at most once and hands out their ids.
pub struct SecretDistributor<'a> {
    store: &'a mut dyn SecretStore,
}

impl<'a> SecretDistributor<'a> {
    pub fn new(store: &'a mut dyn SecretStore) -> Self {
        Self { store }
    }

    /// Returns the id of the password secret published on `relation`,
    /// creating, granting and publishing it if it does not exist yet.
    pub fn ensure_secret(&mut self, relation: &mut Relation) -> Result<SecretId> {
        if let Some(id) = relation.local_app_data.get(PASSWORD_KEY) {
            return Ok(id.clone());
        }

        let label = format!("relation-{}", relation.id);
        let id = match self.store.find_by_label(&label)? {
            Some(id) => {
                log::info!("Reusing unpublished secret for relation {}", relation.id);
                id
            }
            None => {
                let content = SecretContent::new().with(PASSWORD_KEY, generate_password(32)?);
                let id = self.store.create(&label, content)?;
                log::info!("Created secret for relation {}", relation.id);
                id
            }
        };

        self.store.grant(&id, relation.id)?;
        relation
            .local_app_data
            .insert(PASSWORD_KEY.to_string(), id.clone());
        Ok(id)
    }

    /// Returns a bundle of independently generated passwords published in
    /// `databag` under `key`.
    ///
    /// Only the leader creates the bundle. Everyone else gets `None` until it
    /// has been published.
    pub fn ensure_bundle(
        &mut self,
        databag: &mut Databag,
        key: &str,
        label: &str,
        fields: &[&str],
        leader: bool,
    ) -> Result<Option<SecretContent>> {
        if let Some(id) = databag.get(key) {
            return self.store.get(id).map(Some);
        }
        if !leader {
            return Ok(None);
        }

        let id = match self.store.find_by_label(label)? {
            Some(id) => id,
            None => {
                let mut content = SecretContent::new();
                for field in fields {
                    content = content.with(*field, generate_password(32)?);
                }
                let id = self.store.create(label, content)?;
                log::info!("Created {} secret", label);
                id
            }
        };

        databag.insert(key.to_string(), id.clone());
        self.store.get(&id).map(Some)
    }

    pub fn read(&self, id: &str) -> Result<SecretContent> {
        self.store.get(id)
    }
}
