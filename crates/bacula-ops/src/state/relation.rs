use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat key/value data published by one side of a relation.
pub type Databag = BTreeMap<String, String>;

/// One established relation as seen from the local unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Relation {
    pub id: u32,
    pub endpoint: String,

    /// Remote application name, absent while the relation is being torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_app: Option<String>,

    #[serde(default)]
    pub local_app_data: Databag,

    #[serde(default)]
    pub local_unit_data: Databag,

    #[serde(default)]
    pub remote_app_data: Databag,

    /// Remote unit name -> that unit's databag.
    #[serde(default)]
    pub remote_units: BTreeMap<String, Databag>,
}

impl Relation {
    pub fn new(id: u32, endpoint: impl Into<String>) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_remote_app(mut self, app: impl Into<String>) -> Self {
        self.remote_app = Some(app.into());
        self
    }

    pub fn with_remote_app_data(mut self, data: Databag) -> Self {
        self.remote_app_data = data;
        self
    }

    pub fn with_remote_unit(mut self, unit: impl Into<String>, data: Databag) -> Self {
        self.remote_units.insert(unit.into(), data);
        self
    }

    /// Replaces the local application databag only when its content differs.
    /// Returns true if anything changed.
    pub fn replace_local_app_data(&mut self, data: Databag) -> bool {
        if self.local_app_data == data {
            return false;
        }
        self.local_app_data = data;
        true
    }
}

/// Numeric suffix of a unit name such as `bacula-server/3`.
pub fn unit_number(unit_name: &str) -> Option<u32> {
    unit_name.rsplit_once('/')?.1.parse().ok()
}
