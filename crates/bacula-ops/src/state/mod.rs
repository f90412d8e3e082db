//! The observable unit environment: who we are, which relations exist and
//! what every participant has published on them.
//!
//! The state is loaded from a JSON file at the start of every invocation and
//! written back atomically at the end.

mod relation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::ReconcileError;
use crate::status::{StatusRecord, UnitStatus};
use crate::storage;

pub use relation::{unit_number, Databag, Relation};

/// Endpoint of the relation every unit of an application shares with its
/// siblings.
pub const PEER_ENDPOINT: &str = "bacula-peer";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write state file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitContext {
    pub model_name: String,
    pub model_uuid: String,
    pub app_name: String,
    pub unit_name: String,
    #[serde(default)]
    pub leader: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitState {
    pub unit: UnitContext,

    #[serde(default)]
    pub relations: Vec<Relation>,

    #[serde(default)]
    pub opened_ports: BTreeSet<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusRecord>,
}

impl UnitState {
    pub fn new(unit: UnitContext) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, StateError> {
        let content = std::fs::read_to_string(path).map_err(|e| StateError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| StateError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(self)?;
        storage::write_atomic(path, content.as_bytes()).map_err(|e| StateError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// First relation on `endpoint`, for endpoints that allow only one.
    pub fn relation(&self, endpoint: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.endpoint == endpoint)
    }

    pub fn relation_mut(&mut self, endpoint: &str) -> Option<&mut Relation> {
        self.relations.iter_mut().find(|r| r.endpoint == endpoint)
    }

    pub fn relations<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.endpoint == endpoint)
    }

    pub fn relations_mut<'a>(
        &'a mut self,
        endpoint: &'a str,
    ) -> impl Iterator<Item = &'a mut Relation> + 'a {
        self.relations
            .iter_mut()
            .filter(move |r| r.endpoint == endpoint)
    }

    pub fn peer_relation(&self) -> Option<&Relation> {
        self.relation(PEER_ENDPOINT)
    }

    pub fn peer_relation_mut(&mut self) -> Option<&mut Relation> {
        self.relation_mut(PEER_ENDPOINT)
    }

    /// Replaces the set of opened ports.
    pub fn set_ports(&mut self, ports: &[u16]) {
        self.opened_ports = ports.iter().copied().collect();
    }

    pub fn set_status(&mut self, status: UnitStatus) {
        self.status = Some(StatusRecord::now(status));
    }

    /// Records the status for a finished reconcile and returns it.
    /// Waiting is logged at info, blocked at error.
    pub fn record_outcome(&mut self, outcome: &Result<(), ReconcileError>) -> UnitStatus {
        match outcome {
            Ok(()) => log::debug!("reconcile finished"),
            Err(ReconcileError::NotReady(reason)) => log::info!("not ready: {}", reason),
            Err(ReconcileError::Unrecoverable(reason)) => log::error!("blocked: {}", reason),
        }
        let status = UnitStatus::from_outcome(outcome);
        self.set_status(status.clone());
        status
    }
}
