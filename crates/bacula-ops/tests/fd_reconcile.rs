//! File daemon role scenarios.

mod common;

use bacula_ops::relation::BACULA_DIR_ENDPOINT;
use bacula_ops::state::PEER_ENDPOINT;
use bacula_ops::{
    fd, Databag, MemorySecretStore, Relation, SecretContent, SecretStore, UnitState, UnitStatus,
    Validator,
};
use common::{DatabagBuilder, TestHarness, UnitStateBuilder};

const FD_CONF: &str = "/etc/bacula/bacula-fd.conf";
const FD_NAME: &str = "relation-backups-ubuntu-0-9c0d1e2f3a4b-fd";
const NOOP: &str = "/usr/local/lib/bacula-ops/noop";

fn backup_spec() -> Databag {
    DatabagBuilder::new()
        .set("fileset", "/var/lib/app,/etc/app")
        .set("run-before-backup", "/opt/hooks/dump")
        .build()
}

/// Director data as published by the server, with its password stored.
fn director_data(store: &mut MemorySecretStore) -> Databag {
    let id = store
        .create(
            "relation-9",
            SecretContent::new().with("password", "director-secret"),
        )
        .unwrap();
    DatabagBuilder::new()
        .set("name", "charm-bacula-dir")
        .set("password", &id)
        .build()
}

fn fd_unit() -> UnitStateBuilder {
    UnitStateBuilder::new("ubuntu", "ubuntu/0").peer("10.0.0.20")
}

/// Peer relation established but no address assigned yet.
fn fd_unit_without_address() -> UnitStateBuilder {
    UnitStateBuilder::new("ubuntu", "ubuntu/0").relation(Relation::new(90, PEER_ENDPOINT))
}

fn director_unit_data(state: &UnitState) -> Databag {
    state
        .relation(BACULA_DIR_ENDPOINT)
        .map(|r| r.local_unit_data.clone())
        .unwrap_or_default()
}

#[test]
fn test_fd_configured_from_backup_spec_and_director() {
    let harness = TestHarness::new();
    let registry = harness.fd_registry(true, Validator::Skip);
    let mut store = MemorySecretStore::new();
    let director = director_data(&mut store);
    let mut state = fd_unit()
        .backup_source("ubuntu", backup_spec())
        .director(director)
        .build();

    let outcome = fd::reconcile(&mut state, &harness.settings(), &store, &registry);
    assert_eq!(state.record_outcome(&outcome), UnitStatus::Active);

    let config = harness.read_fd_file(FD_CONF);
    assert!(config.contains(&format!("Name = {}", FD_NAME)));
    assert!(config.contains("Password = \"director-secret\""));
    assert!(config.contains("FDAddress = 10.0.0.20"));
    assert!(config.contains("FDport = 9102"));

    let published = director_unit_data(&state);
    assert_eq!(published.get("name").unwrap(), FD_NAME);
    assert_eq!(published.get("fileset").unwrap(), "/var/lib/app,/etc/app");
    assert_eq!(published.get("port").unwrap(), "9102");
    assert_eq!(published.get("ingress-address").unwrap(), "10.0.0.20");
    assert_eq!(published.get("client-run-before-backup").unwrap(), "/opt/hooks/dump");
    assert_eq!(published.get("client-run-after-backup").unwrap(), NOOP);
    assert_eq!(published.get("client-run-before-restore").unwrap(), NOOP);
    assert_eq!(published.get("client-run-after-restore").unwrap(), NOOP);
    assert!(!published.contains_key("schedule"));

    let peer = state.relation(PEER_ENDPOINT).unwrap();
    assert_eq!(peer.local_app_data.get("name").unwrap(), FD_NAME);
    assert_eq!(state.opened_ports.iter().copied().collect::<Vec<_>>(), vec![9102]);
    assert_eq!(harness.calls.entries(), vec!["restart bacula-fd"]);

    let noop = harness.fd_root().join(NOOP.trim_start_matches('/'));
    assert!(noop.is_file());
}

#[test]
fn test_fd_second_run_changes_nothing() {
    let harness = TestHarness::new();
    let registry = harness.fd_registry(true, Validator::Skip);
    let settings = harness.settings();
    let mut store = MemorySecretStore::new();
    let director = director_data(&mut store);
    let mut state = fd_unit()
        .backup_source("ubuntu", backup_spec())
        .director(director)
        .build();

    fd::reconcile(&mut state, &settings, &store, &registry).unwrap();
    let before = harness.snapshot();
    let relations = state.relations.clone();
    harness.calls.take();

    fd::reconcile(&mut state, &settings, &store, &registry).unwrap();

    assert_eq!(harness.snapshot(), before);
    assert_eq!(state.relations, relations);
    assert!(harness.calls.entries().is_empty());
}

#[test]
fn test_schedule_setting_is_published() {
    let harness = TestHarness::new();
    let registry = harness.fd_registry(true, Validator::Skip);
    let mut settings = harness.settings();
    settings.fd.schedule = "Level=Full sun at 01:00, Level=Incremental mon-sat at 01:00".to_string();
    let mut store = MemorySecretStore::new();
    let director = director_data(&mut store);
    let mut state = fd_unit()
        .backup_source("ubuntu", backup_spec())
        .director(director)
        .build();

    fd::reconcile(&mut state, &settings, &store, &registry).unwrap();

    assert_eq!(
        director_unit_data(&state).get("schedule").unwrap(),
        "Level=Full sun at 01:00,Level=Incremental mon-sat at 01:00"
    );

    settings.fd.schedule = String::new();
    fd::reconcile(&mut state, &settings, &store, &registry).unwrap();
    assert!(!director_unit_data(&state).contains_key("schedule"));
}

#[test]
fn test_announces_before_director_answers() {
    let harness = TestHarness::new();
    let registry = harness.fd_registry(true, Validator::Skip);
    let store = MemorySecretStore::new();
    let mut state = fd_unit()
        .backup_source("ubuntu", backup_spec())
        .director(Databag::new())
        .build();

    let outcome = fd::reconcile(&mut state, &harness.settings(), &store, &registry);

    assert_eq!(
        state.record_outcome(&outcome),
        UnitStatus::Waiting("waiting for bacula-dir relation data".to_string())
    );
    assert_eq!(director_unit_data(&state).get("name").unwrap(), FD_NAME);
    assert!(!harness.fd_root().join(FD_CONF.trim_start_matches('/')).exists());
}

#[test]
fn test_installs_when_missing() {
    let harness = TestHarness::new();
    let registry = harness.fd_registry(false, Validator::Skip);
    let store = MemorySecretStore::new();
    let mut state = fd_unit().build();

    let _ = fd::reconcile(&mut state, &harness.settings(), &store, &registry);

    assert_eq!(harness.calls.entries(), vec!["install"]);
}

#[test]
fn test_rejected_config_blocks() {
    let harness = TestHarness::new();
    let registry = harness.fd_registry(true, Validator::command("false"));
    let mut store = MemorySecretStore::new();
    let director = director_data(&mut store);
    let mut state = fd_unit()
        .backup_source("ubuntu", backup_spec())
        .director(director)
        .build();

    let outcome = fd::reconcile(&mut state, &harness.settings(), &store, &registry);

    assert_eq!(
        state.record_outcome(&outcome),
        UnitStatus::Blocked("failed to apply bacula-fd configuration".to_string())
    );
    assert!(!harness.fd_root().join(FD_CONF.trim_start_matches('/')).exists());
    assert!(harness.staged_files().is_empty());
    assert!(harness.calls.entries().is_empty());
}

/// One scenario where the file daemon cannot finish yet.
struct StatusCase {
    name: &'static str,
    state: fn() -> UnitState,
    expected: fn() -> UnitStatus,
}

const STATUS_CASES: &[StatusCase] = &[
    StatusCase {
        name: "follower_without_name",
        state: || fd_unit().leader(false).build(),
        expected: || UnitStatus::Waiting("waiting for peer data to be initialized".to_string()),
    },
    StatusCase {
        name: "no_peer_relation",
        state: || UnitStateBuilder::new("ubuntu", "ubuntu/0").build(),
        expected: || UnitStatus::Waiting("waiting for peer data to be initialized".to_string()),
    },
    StatusCase {
        name: "no_backup_relation",
        state: || fd_unit().build(),
        expected: || UnitStatus::Waiting("waiting for backup relation".to_string()),
    },
    StatusCase {
        name: "no_address_reports_relations_first",
        state: || fd_unit_without_address().build(),
        expected: || UnitStatus::Waiting("waiting for backup relation".to_string()),
    },
    StatusCase {
        name: "no_address",
        state: || {
            fd_unit_without_address()
                .backup_source("ubuntu", backup_spec())
                .director(Databag::new())
                .build()
        },
        expected: || UnitStatus::Waiting("waiting for unit address".to_string()),
    },
    StatusCase {
        name: "empty_backup_relation",
        state: || fd_unit().backup_source("ubuntu", Databag::new()).build(),
        expected: || UnitStatus::Waiting("waiting for backup relation data".to_string()),
    },
    StatusCase {
        name: "invalid_backup_relation",
        state: || {
            fd_unit()
                .backup_source("ubuntu", DatabagBuilder::new().set("fileset", "var/lib").build())
                .build()
        },
        expected: || {
            UnitStatus::Blocked(
                "invalid backup relation data: path must be absolute: 'var/lib'".to_string(),
            )
        },
    },
    StatusCase {
        name: "no_director_relation",
        state: || fd_unit().backup_source("ubuntu", backup_spec()).build(),
        expected: || UnitStatus::Waiting("waiting for bacula-dir relation".to_string()),
    },
];

#[test]
fn test_statuses() {
    for case in STATUS_CASES {
        let harness = TestHarness::new();
        let registry = harness.fd_registry(true, Validator::Skip);
        let store = MemorySecretStore::new();
        let mut state = (case.state)();

        let outcome = fd::reconcile(&mut state, &harness.settings(), &store, &registry);

        assert_eq!(state.record_outcome(&outcome), (case.expected)(), "case {}", case.name);
        assert!(harness.calls.entries().is_empty(), "case {} had side effects", case.name);
    }
}
