//! Log output setup and the leveled log shim.
//!
//! [`init_logging`] installs the process-wide `tracing` subscriber. In
//! production mode only errors are emitted unless an explicit filter is
//! configured. [`emit`] lets collaborators that speak in plain levels (the
//! runtime's console output, for instance) log through `tracing`.

use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use embed_supervisor_common::config_file::LoggingConfigFile;

const DEVELOPMENT_DIRECTIVE: &str = "info,embed_supervisor=debug";
const PRODUCTION_DIRECTIVE: &str = "error";

/// Log output configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Only errors unless `filter` overrides.
    pub production: bool,
    /// JSON lines instead of human-readable output.
    pub json: bool,
    /// Explicit `EnvFilter` directive.
    pub filter: Option<String>,
}

impl From<&LoggingConfigFile> for LogConfig {
    fn from(file: &LoggingConfigFile) -> Self {
        Self {
            production: file.production,
            json: file.json,
            filter: file.filter.clone(),
        }
    }
}

impl LogConfig {
    /// The filter to install. An explicit filter wins, then `RUST_LOG`
    /// (development only), then the mode default.
    pub fn env_filter(&self) -> Result<EnvFilter, ParseError> {
        if let Some(filter) = &self.filter {
            return EnvFilter::try_new(filter);
        }
        if self.production {
            return EnvFilter::try_new(PRODUCTION_DIRECTIVE);
        }
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEVELOPMENT_DIRECTIVE))
    }
}

/// Logging setup errors.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Logging already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }

    Ok(())
}

/// Plain log level used by external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Map a console method name to a level. `log` and unknown names map to
    /// `Info`.
    pub fn from_console(method: &str) -> Self {
        match method {
            "debug" => Self::Debug,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Emit a message from `source` at `level`.
pub fn emit(level: LogLevel, source: &str, message: &str) {
    match level {
        LogLevel::Debug => debug!(source, external = true, "{}", message),
        LogLevel::Info => info!(source, external = true, "{}", message),
        LogLevel::Warn => warn!(source, external = true, "{}", message),
        LogLevel::Error => error!(source, external = true, "{}", message),
    }
}
