//! Reconcile for an application that only declares what it wants backed
//! up. Hook settings carry script contents which are saved to executable
//! files and published by path.

use std::path::{Path, PathBuf};

use crate::config::{IntegratorSettings, Settings};
use crate::error::{ReconcileError, Result, ServiceError};
use crate::relation::{
    parse_fileset, BackupDynamicRequirer, BackupSpec, Hook, Hooks, RelationError, BACKUP_ENDPOINT,
};
use crate::state::UnitState;
use crate::storage;

pub fn reconcile(state: &mut UnitState, settings: &Settings) -> Result<()> {
    let span = tracing::info_span!("reconcile", role = "integrator", unit = %state.unit.unit_name);
    span.in_scope(|| reconcile_integrator(state, settings))
}

fn reconcile_integrator(state: &mut UnitState, settings: &Settings) -> Result<()> {
    let config = &settings.integrator;
    if config.fileset.trim().is_empty() {
        return Err(ReconcileError::unrecoverable("missing fileset config"));
    }
    if state.relation(BACKUP_ENDPOINT).is_none() {
        return Err(ReconcileError::not_ready("waiting for backup relation"));
    }
    if !state.unit.leader {
        return Ok(());
    }

    let scripts_dir = settings
        .paths
        .integrator_scripts
        .join(state.unit.unit_name.replace('/', "-"))
        .join("scripts");

    let mut saved = Vec::new();
    for hook in Hook::ALL {
        saved.push((hook, save_script(&scripts_dir, hook, config)?));
    }

    let spec = match build_spec(&config.fileset, saved) {
        Ok(spec) => spec,
        Err(e) => {
            log::error!("invalid integrator configuration: {}", e);
            return Err(ReconcileError::unrecoverable("invalid config, see logs"));
        }
    };

    let updated = BackupDynamicRequirer::default().require_backup(state, &spec);
    log::debug!("backup spec published on {} relation(s)", updated);
    Ok(())
}

fn script_content(config: &IntegratorSettings, hook: Hook) -> Option<&str> {
    match hook {
        Hook::BeforeBackup => config.run_before_backup.as_deref(),
        Hook::AfterBackup => config.run_after_backup.as_deref(),
        Hook::BeforeRestore => config.run_before_restore.as_deref(),
        Hook::AfterRestore => config.run_after_restore.as_deref(),
    }
}

/// Saves the script for `hook`, named after its setting. Returns `None`
/// when the setting is empty.
fn save_script(
    dir: &Path,
    hook: Hook,
    config: &IntegratorSettings,
) -> Result<Option<PathBuf>> {
    let Some(content) = script_content(config, hook).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let path = dir.join(hook.spec_key());
    if storage::write_executable(&path, content).map_err(|source| ServiceError::WriteFile {
        path: path.clone(),
        source,
    })? {
        log::info!("Saved {} script to {}", hook.spec_key(), path.display());
    }
    Ok(Some(path))
}

fn build_spec(
    fileset: &str,
    scripts: Vec<(Hook, Option<PathBuf>)>,
) -> std::result::Result<BackupSpec, RelationError> {
    let fileset = parse_fileset(fileset)?;
    let mut hooks = Hooks::new();
    for (hook, path) in scripts {
        hooks.set(hook, path.map(|p| p.to_string_lossy().into_owned()))?;
    }
    BackupSpec::new(fileset, hooks)
}
