mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use secrecy::ExposeSecret;
use serde_json::json;
use thiserror::Error;

use bacula_ops::service::UserRealm;
use bacula_ops::{
    fd, integrator, load_settings, server, ConfigError, FileSecretStore, ReconcileError,
    ServiceRegistry, Settings, StateError, TemplateError, UnitState,
};

#[derive(Parser, Debug)]
#[command(name = "bacula-ops")]
#[command(version, about = "Reconcile Bacula backup hosts from relation data", long_about = None)]
struct Cli {
    /// Unit state file, read at start and written back at exit
    #[arg(long, global = true, default_value = "/var/lib/bacula-ops/state.json")]
    state: PathBuf,

    /// Operator settings (YAML); defaults apply when the file is absent
    #[arg(long, global = true, default_value = "/etc/bacula-ops/settings.yaml")]
    settings: PathBuf,

    /// Secret store directory
    #[arg(long, global = true, default_value = "/var/lib/bacula-ops/secrets")]
    secrets: PathBuf,

    /// Log filter, overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconcile for a role and record the resulting status
    Reconcile {
        #[arg(value_enum)]
        role: Role,
    },
    /// Create or update a user of the web front end's API
    CreateApiUser { username: String },
    /// Create or update a user of the web front end
    CreateWebUser { username: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Server,
    Fd,
    Integrator,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level.as_deref(), cli.log_json) {
        eprintln!("bacula-ops: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        state,
        settings,
        secrets,
        command,
        ..
    } = cli;
    let settings = read_settings(&settings)?;

    match command {
        Commands::Reconcile { role } => reconcile(role, &state, &secrets, &settings).await,
        Commands::CreateApiUser { username } => create_user(UserRealm::Api, &username, &settings),
        Commands::CreateWebUser { username } => create_user(UserRealm::Web, &username, &settings),
    }
}

fn read_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        log::info!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    load_settings(path)
}

async fn reconcile(
    role: Role,
    state_path: &Path,
    secrets: &Path,
    settings: &Settings,
) -> Result<(), CliError> {
    let mut state = UnitState::load(state_path)?;
    let mut store = FileSecretStore::new(secrets);

    let outcome = match role {
        Role::Server => {
            let registry = ServiceRegistry::server(&settings.paths)?;
            server::reconcile(&mut state, settings, &mut store, &registry).await
        }
        Role::Fd => {
            let registry = ServiceRegistry::fd_client(&settings.paths)?;
            fd::reconcile(&mut state, settings, &store, &registry)
        }
        Role::Integrator => integrator::reconcile(&mut state, settings),
    };

    let status = state.record_outcome(&outcome);
    state.save(state_path)?;
    println!("{}", status);
    Ok(())
}

fn create_user(realm: UserRealm, username: &str, settings: &Settings) -> Result<(), CliError> {
    let registry = ServiceRegistry::server(&settings.paths)?;
    let password = server::create_user(&registry, realm, username)?;
    println!(
        "{}",
        json!({
            "username": username,
            "password": password.expose_secret(),
        })
    );
    Ok(())
}
