//! Builders for unit states and relation data.
//!
//! These keep the scenario tests focused on what differs between cases
//! instead of on the shape of every databag.

#![allow(dead_code)]

use bacula_ops::relation::{BACKUP_ENDPOINT, BACULA_DIR_ENDPOINT, POSTGRESQL_ENDPOINT, S3_ENDPOINT};
use bacula_ops::state::PEER_ENDPOINT;
use bacula_ops::{Databag, Relation, UnitContext, UnitState};

pub const SERVER_ADDRESS: &str = "10.0.0.10";

/// Builder for `Databag` instances.
#[derive(Default)]
pub struct DatabagBuilder {
    data: Databag,
}

impl DatabagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Databag {
        self.data
    }
}

/// What one file daemon unit announces to the director.
pub fn client_announcement(name: &str, fileset: &str, host: &str) -> DatabagBuilder {
    DatabagBuilder::new()
        .set("name", name)
        .set("fileset", fileset)
        .set("ingress-address", host)
        .set("port", "9102")
}

/// Builder for `UnitState` instances.
pub struct UnitStateBuilder {
    state: UnitState,
    next_id: u32,
}

impl UnitStateBuilder {
    pub fn new(app: &str, unit: &str) -> Self {
        Self {
            state: UnitState::new(UnitContext {
                model_name: "backups".to_string(),
                model_uuid: "6f1c2b3a-4d5e-4f60-8a7b-9c0d1e2f3a4b".to_string(),
                app_name: app.to_string(),
                unit_name: unit.to_string(),
                leader: true,
            }),
            next_id: 1,
        }
    }

    pub fn leader(mut self, leader: bool) -> Self {
        self.state.unit.leader = leader;
        self
    }

    /// Adds the peer relation with this unit's address.
    pub fn peer(mut self, address: &str) -> Self {
        let mut relation = Relation::new(self.take_id(), PEER_ENDPOINT);
        relation
            .local_unit_data
            .insert("ingress-address".to_string(), address.to_string());
        self.state.relations.push(relation);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.state.relations.push(relation);
        self
    }

    pub fn postgresql(mut self) -> Self {
        let data = DatabagBuilder::new()
            .set("database", "bacula")
            .set("endpoints", "10.0.0.2:5432")
            .set("username", "relation-5")
            .set("password", "db-secret")
            .build();
        let relation = Relation::new(self.take_id(), POSTGRESQL_ENDPOINT)
            .with_remote_app("postgresql")
            .with_remote_app_data(data);
        self.state.relations.push(relation);
        self
    }

    pub fn s3(mut self) -> Self {
        let data = DatabagBuilder::new()
            .set("endpoint", "https://s3.example.com")
            .set("bucket", "bacula")
            .set("access-key", "access")
            .set("secret-key", "secret")
            .build();
        let relation = Relation::new(self.take_id(), S3_ENDPOINT)
            .with_remote_app("s3-integrator")
            .with_remote_app_data(data);
        self.state.relations.push(relation);
        self
    }

    /// Adds one `bacula-dir` relation from `app` with the given units.
    pub fn client_app(mut self, app: &str, units: Vec<(&str, Databag)>) -> Self {
        let mut relation =
            Relation::new(self.take_id(), BACULA_DIR_ENDPOINT).with_remote_app(app);
        for (unit, data) in units {
            relation = relation.with_remote_unit(unit, data);
        }
        self.state.relations.push(relation);
        self
    }

    /// Adds the backup relation with a spec published by `app`.
    pub fn backup_source(mut self, app: &str, spec: Databag) -> Self {
        let relation = Relation::new(self.take_id(), BACKUP_ENDPOINT)
            .with_remote_app(app)
            .with_remote_app_data(spec);
        self.state.relations.push(relation);
        self
    }

    /// Adds the director relation as seen from a file daemon.
    pub fn director(mut self, published: Databag) -> Self {
        let relation = Relation::new(self.take_id(), BACULA_DIR_ENDPOINT)
            .with_remote_app("bacula-server")
            .with_remote_app_data(published);
        self.state.relations.push(relation);
        self
    }

    pub fn build(self) -> UnitState {
        self.state
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// A server unit with every input but clients in place.
pub fn ready_server() -> UnitStateBuilder {
    UnitStateBuilder::new("bacula-server", "bacula-server/0")
        .peer(SERVER_ADDRESS)
        .postgresql()
        .s3()
}
