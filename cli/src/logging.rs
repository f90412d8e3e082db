use thiserror::Error;
use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to bridge log records: {0}")]
    Logger(#[from] log::SetLoggerError),
}

/// Installs the global subscriber. `level` takes precedence over
/// `RUST_LOG`; without either everything at info and above is shown.
pub fn init(level: Option<&str>, json: bool) -> Result<(), LoggingError> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        install(builder.json().finish())
    } else {
        install(builder.finish())
    }
}

fn install(subscriber: impl Subscriber + Send + Sync + 'static) -> Result<(), LoggingError> {
    tracing::subscriber::set_global_default(subscriber)?;
    LogTracer::init()?;
    Ok(())
}
