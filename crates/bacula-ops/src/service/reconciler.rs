//! Render → diff → stage → validate → commit → reload, for one service.

use serde_json::Value;
use std::path::PathBuf;

use super::process::ProcessControl;
use super::spec::ServiceSpec;
use super::supervisor::Supervisor;
use crate::error::ServiceError;
use crate::storage;
use crate::template::TemplateRenderer;

/// Rendered content of every managed file, in spec order.
pub type RenderedConfig = Vec<(PathBuf, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Unchanged,
}

/// Applies one service's configuration.
pub struct ConfigReconciler<'a> {
    spec: &'a ServiceSpec,
    renderer: &'a TemplateRenderer,
    supervisor: &'a dyn Supervisor,
    processes: &'a dyn ProcessControl,
}

impl<'a> ConfigReconciler<'a> {
    pub fn new(
        spec: &'a ServiceSpec,
        renderer: &'a TemplateRenderer,
        supervisor: &'a dyn Supervisor,
        processes: &'a dyn ProcessControl,
    ) -> Self {
        Self {
            spec,
            renderer,
            supervisor,
            processes,
        }
    }

    pub fn spec(&self) -> &ServiceSpec {
        self.spec
    }

    pub fn new_config(&self, variables: &Value) -> Result<RenderedConfig, ServiceError> {
        self.spec
            .files
            .iter()
            .map(|file| {
                let content = self.renderer.render(&file.template, variables)?;
                Ok((file.path.clone(), content))
            })
            .collect()
    }

    /// Live content of every managed file; missing files read as empty.
    pub fn current_config(&self) -> Result<RenderedConfig, ServiceError> {
        self.spec
            .files
            .iter()
            .map(|file| {
                let content =
                    storage::read_or_empty(&file.path).map_err(|e| ServiceError::ReadFile {
                        path: file.path.clone(),
                        source: e,
                    })?;
                Ok((file.path.clone(), content))
            })
            .collect()
    }

    /// Brings the live configuration in line with `variables`.
    ///
    /// Nothing is written and nothing is reloaded when the rendered files
    /// are byte-identical to the live ones. Live files are only replaced
    /// after the staged primary file passed validation.
    pub fn apply(&self, variables: &Value) -> Result<ApplyOutcome, ServiceError> {
        let new_config = self.new_config(variables)?;
        let current_config = self.current_config()?;
        if new_config == current_config {
            return Ok(ApplyOutcome::Unchanged);
        }

        log::info!("Applying new configuration to {}", self.spec.name);
        let staged = self.stage(&new_config)?;

        if let Err(e) = self.validate(&staged) {
            discard(&staged);
            return Err(e);
        }

        for (index, ((live, _), staged_path)) in new_config.iter().zip(&staged).enumerate() {
            if let Err(e) = storage::move_file(staged_path, live) {
                let committed: Vec<_> = new_config[..index]
                    .iter()
                    .map(|(path, _)| path.display().to_string())
                    .collect();
                log::error!(
                    "Failed to commit {} for {}, already committed: {:?}",
                    live.display(),
                    self.spec.name,
                    committed
                );
                discard(&staged[index..]);
                return Err(ServiceError::Commit {
                    from: staged_path.clone(),
                    to: live.clone(),
                    source: e,
                });
            }
        }

        self.spec
            .reload
            .reload(&self.spec.name, self.supervisor, self.processes)?;
        Ok(ApplyOutcome::Applied)
    }

    fn stage(&self, config: &RenderedConfig) -> Result<Vec<PathBuf>, ServiceError> {
        let mut staged = Vec::with_capacity(config.len());
        for (live, content) in config {
            let path = storage::staging_path(live);
            let written = storage::ensure_parent(&path).and_then(|_| std::fs::write(&path, content));
            if let Err(e) = written {
                discard(&staged);
                return Err(ServiceError::WriteFile { path, source: e });
            }
            staged.push(path);
        }
        Ok(staged)
    }

    fn validate(&self, staged: &[PathBuf]) -> Result<(), ServiceError> {
        let Some(primary) = staged.first() else {
            return Ok(());
        };
        let validation = self.spec.validator.validate(primary)?;
        if validation.valid {
            return Ok(());
        }

        log::error!(
            "errors detected in {} configuration: {}",
            self.spec.name,
            validation.output
        );
        Err(ServiceError::InvalidConfig {
            service: self.spec.name.clone(),
            output: validation.output,
        })
    }
}

fn discard(staged: &[PathBuf]) {
    for path in staged {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!("Failed to remove staged file {}: {}", path.display(), e);
            }
        }
    }
}
