//! Externally visible outcome of a reconcile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReconcileError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    Active,
    Maintenance(String),
    Waiting(String),
    Blocked(String),
}

impl UnitStatus {
    /// Maps a reconcile result onto the status shown to operators.
    pub fn from_outcome(outcome: &Result<(), ReconcileError>) -> Self {
        match outcome {
            Ok(()) => UnitStatus::Active,
            Err(ReconcileError::NotReady(reason)) => UnitStatus::Waiting(reason.clone()),
            Err(ReconcileError::Unrecoverable(reason)) => UnitStatus::Blocked(reason.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnitStatus::Active => "active",
            UnitStatus::Maintenance(_) => "maintenance",
            UnitStatus::Waiting(_) => "waiting",
            UnitStatus::Blocked(_) => "blocked",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Active => "",
            UnitStatus::Maintenance(m) | UnitStatus::Waiting(m) | UnitStatus::Blocked(m) => m,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}

/// Last status written by a reconcile, persisted in the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusRecord {
    pub status: UnitStatus,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn now(status: UnitStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
        }
    }
}
