//! Reconcile for a backup source running only a file daemon.

use serde_json::json;
use std::path::{Path, PathBuf};

use crate::config::{PathSettings, Settings};
use crate::error::{ReconcileError, Result, ServiceError};
use crate::identity::{fd_identity, IdentityAllocator};
use crate::relation::{
    get_backup_spec, parse_schedule, ClientAnnouncement, DirectorRequirer, BACKUP_ENDPOINT,
    BACULA_DIR_ENDPOINT,
};
use crate::secrets::SecretStore;
use crate::service::ServiceRegistry;
use crate::state::UnitState;
use crate::status::UnitStatus;
use crate::storage;

const NAME_KEY: &str = "name";
const NOOP_SCRIPT: &str = "#!/bin/sh\nexit 0\n";

/// Brings the file daemon in line with its inputs.
pub fn reconcile(
    state: &mut UnitState,
    settings: &Settings,
    store: &dyn SecretStore,
    registry: &ServiceRegistry,
) -> Result<()> {
    let span = tracing::info_span!("reconcile", role = "fd", unit = %state.unit.unit_name);
    span.in_scope(|| reconcile_fd(state, settings, store, registry))
}

fn reconcile_fd(
    state: &mut UnitState,
    settings: &Settings,
    store: &dyn SecretStore,
    registry: &ServiceRegistry,
) -> Result<()> {
    if !registry.is_installed() {
        log::info!("installing bacula-fd");
        state.set_status(UnitStatus::Maintenance("installing bacula-fd".to_string()));
        registry.install()?;
    }

    let name = ensure_name(state)?;

    let backup = state
        .relation(BACKUP_ENDPOINT)
        .ok_or_else(|| ReconcileError::not_ready("waiting for backup relation"))?;
    let spec = get_backup_spec(backup)
        .map_err(|e| ReconcileError::unrecoverable(format!("invalid backup relation data: {}", e)))?
        .ok_or_else(|| ReconcileError::not_ready("waiting for backup relation data"))?;

    if state.relation(BACULA_DIR_ENDPOINT).is_none() {
        return Err(ReconcileError::not_ready("waiting for bacula-dir relation"));
    }
    let host = state
        .peer_relation()
        .and_then(|peer| peer.local_unit_data.get("ingress-address"))
        .cloned()
        .ok_or_else(|| ReconcileError::not_ready("waiting for unit address"))?;

    let port = settings.fd.port;
    state.set_ports(&[port]);
    ensure_noop_script(&settings.paths)?;

    let requirer = DirectorRequirer::new(settings.paths.noop_script.clone());
    let announcement = ClientAnnouncement {
        name: name.clone(),
        fileset: spec.fileset().to_vec(),
        port,
        schedule: parse_schedule(Some(&settings.fd.schedule)),
        hooks: spec.hooks().clone(),
    };
    let director = match state.relation_mut(BACULA_DIR_ENDPOINT) {
        Some(relation) => {
            relation
                .local_unit_data
                .entry("ingress-address".to_string())
                .or_insert_with(|| host.clone());
            requirer.send_to_director(relation, &announcement);
            requirer.receive_from_director(relation, store)?
        }
        None => None,
    }
    .ok_or_else(|| ReconcileError::not_ready("waiting for bacula-dir relation data"))?;

    let variables = json!({
        "name": name,
        "host": host,
        "port": port,
        "director_name": director.name,
        "director_password": director.password,
    });
    registry.apply(&variables).map_err(|e| match e {
        ServiceError::InvalidConfig { .. } => {
            ReconcileError::unrecoverable("failed to apply bacula-fd configuration")
        }
        other => other.into(),
    })?;
    Ok(())
}

/// Reads the file daemon name from the peer app databag, publishing it
/// first when this unit is the leader.
fn ensure_name(state: &mut UnitState) -> Result<String> {
    let waiting = || ReconcileError::not_ready("waiting for peer data to be initialized");
    let unit = state.unit.clone();
    let peer = state.peer_relation_mut().ok_or_else(waiting)?;
    IdentityAllocator::new(unit.leader)
        .ensure(&mut peer.local_app_data, NAME_KEY, || fd_identity(&unit))
        .ok_or_else(waiting)
}

/// Location of the no-op hook script on this host.
pub fn noop_script_path(paths: &PathSettings) -> PathBuf {
    let relative = Path::new(&paths.noop_script)
        .strip_prefix("/")
        .unwrap_or_else(|_| Path::new(&paths.noop_script));
    paths.fd_root.join(relative)
}

fn ensure_noop_script(paths: &PathSettings) -> Result<()> {
    let path = noop_script_path(paths);
    let written = storage::write_executable(&path, NOOP_SCRIPT).map_err(|source| {
        ServiceError::WriteFile {
            path: path.clone(),
            source,
        }
    })?;
    if written {
        log::info!("Installed no-op hook script at {}", path.display());
    }
    Ok(())
}
