use thiserror::Error;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("logging already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Installs the global subscriber: a compact console layer on stderr, so
/// stdout stays free for command output.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"warn"`,
/// `"lib_cnzip=info"`) is used.
pub fn init_logging(default_level: &str) -> Result<(), LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level).map_err(|source| LoggerError::Filter {
            filter: default_level.to_string(),
            source,
        })?,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;
    Ok(())
}
