//! Configuration file structures for embed-supervisor.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`LoggingConfigFile`]: Log output settings
//! - [`SessionConfigFile`]: Host session handshake settings
//! - [`SimulationConfigFile`]: Simulated environment used by the CLI

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::SupervisorConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [supervisor.build]
/// build_url = "/Build"
/// name = "thirdB"
///
/// [supervisor.budget]
/// limit_mb = 256.0
/// warn_mb = 200.0
/// critical_mb = 240.0
///
/// [logging]
/// production = false
/// json = false
///
/// [session]
/// version = "0.16.0"
///
/// [simulation]
/// webgl = true
/// memory_profile_mb = [120.0, 180.0, 210.0, 245.0]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Supervisor configuration.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfigFile,

    /// Host session configuration.
    #[serde(default)]
    pub session: SessionConfigFile,

    /// Simulated environment configuration.
    #[serde(default)]
    pub simulation: SimulationConfigFile,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// supervisor section is inconsistent.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML or fails
    /// validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })?;

        config
            .supervisor
            .validate()
            .map_err(|e| ConfigFileError::Invalid {
                message: e.to_string(),
            })?;

        Ok(config)
    }
}

/// Logging configuration from config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfigFile {
    /// Suppress everything below error level unless `filter` is set.
    #[serde(default)]
    pub production: bool,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Explicit `EnvFilter` directive.
    pub filter: Option<String>,
}

/// Host session handshake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfigFile {
    /// Capabilities requested from the host.
    #[serde(default = "defaults::capabilities")]
    pub capabilities: Vec<String>,

    /// Host SDK version.
    #[serde(default = "defaults::sdk_version")]
    pub version: String,
}

impl Default for SessionConfigFile {
    fn default() -> Self {
        Self {
            capabilities: defaults::capabilities(),
            version: defaults::sdk_version(),
        }
    }
}

/// Simulated environment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfigFile {
    /// Whether the simulated document supports WebGL.
    #[serde(default = "defaults::webgl")]
    pub webgl: bool,

    /// User agent reported by the simulated document.
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Container rectangle as `[width, height]`.
    #[serde(default = "defaults::container")]
    pub container: [f64; 2],

    /// Viewport as `[width, height]`.
    #[serde(default = "defaults::viewport")]
    pub viewport: [f64; 2],

    /// Delay before the canvas is attached to the document; `None` means
    /// it is attached from the start.
    pub attach_delay_ms: Option<u64>,

    /// Whether the loader script loads successfully.
    #[serde(default = "defaults::script_loads")]
    pub script_loads: bool,

    /// Instantiation error message; `None` means instantiation succeeds.
    pub instantiation_error: Option<String>,

    /// Total memory in megabytes reported on successive metrics reads.
    /// The last value repeats.
    #[serde(default = "defaults::memory_profile_mb")]
    pub memory_profile_mb: Vec<f64>,

    /// Whether `quit` on the simulated runtime never completes.
    #[serde(default)]
    pub quit_hangs: bool,
}

impl Default for SimulationConfigFile {
    fn default() -> Self {
        Self {
            webgl: defaults::webgl(),
            user_agent: defaults::user_agent(),
            container: defaults::container(),
            viewport: defaults::viewport(),
            attach_delay_ms: None,
            script_loads: defaults::script_loads(),
            instantiation_error: None,
            memory_profile_mb: defaults::memory_profile_mb(),
            quit_hangs: false,
        }
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },

    /// The file parsed but the values are inconsistent.
    #[error("Invalid config file: {message}")]
    Invalid { message: String },
}

/// Default value functions for serde.
mod defaults {
    pub fn capabilities() -> Vec<String> {
        [
            "expandApp",
            "openUrl",
            "getMeetingContext",
            "getMeetingParticipants",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    pub fn sdk_version() -> String {
        "0.16.0".to_string()
    }

    pub const fn webgl() -> bool {
        true
    }

    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)".to_string()
    }

    pub const fn container() -> [f64; 2] {
        [1024.0, 768.0]
    }

    pub const fn viewport() -> [f64; 2] {
        [1280.0, 800.0]
    }

    pub const fn script_loads() -> bool {
        true
    }

    pub fn memory_profile_mb() -> Vec<f64> {
        vec![96.0, 128.0, 150.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert!(!config.logging.production);
        assert!(!config.logging.json);
        assert!(config.logging.filter.is_none());
        assert_eq!(config.session.version, "0.16.0");
        assert_eq!(config.session.capabilities.len(), 4);
        assert!(config.simulation.webgl);
        assert!(config.simulation.script_loads);
        assert!(!config.simulation.quit_hangs);
        assert!(config.simulation.attach_delay_ms.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [supervisor.monitor]
            interval_ms = 1000
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.supervisor.monitor.interval_ms, 1000);
        // Defaults applied
        assert_eq!(config.supervisor.build.name, "thirdB");
        assert_eq!(config.supervisor.monitor.gc_method, "GC.Collect");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [supervisor.build]
            build_url = "/assets/build"
            name = "quest"
            streaming_assets_url = "/assets/streaming"

            [supervisor.product]
            company_name = "Acme"
            product_name = "Quest"
            product_version = "1.2.3"

            [supervisor.budget]
            limit_mb = 512.0
            warn_mb = 400.0
            critical_mb = 480.0

            [supervisor.lifecycle]
            quit_timeout_ms = 2000

            [logging]
            production = true
            json = true
            filter = "warn"

            [session]
            capabilities = ["getMeetingContext"]
            version = "0.17.0"

            [simulation]
            webgl = false
            user_agent = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"
            container = [0.0, 0.0]
            memory_profile_mb = [250.0]
            quit_hangs = true
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.supervisor.build.loader_url(), "/assets/build/quest.loader.js");
        assert_eq!(config.supervisor.product.company_name, "Acme");
        assert!((config.supervisor.budget.limit_mb - 512.0).abs() < f64::EPSILON);
        assert_eq!(config.supervisor.lifecycle.quit_timeout_ms, 2000);
        assert!(config.logging.production);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter.as_deref(), Some("warn"));
        assert_eq!(config.session.capabilities, vec!["getMeetingContext"]);
        assert_eq!(config.session.version, "0.17.0");
        assert!(!config.simulation.webgl);
        assert!(config.simulation.user_agent.contains("iPhone"));
        assert_eq!(config.simulation.memory_profile_mb, vec![250.0]);
        assert!(config.simulation.quit_hangs);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(matches!(result, Err(ConfigFileError::Parse { .. })));
    }

    #[test]
    fn test_parse_inconsistent_budget() {
        let toml = r#"
            [supervisor.budget]
            warn_mb = 250.0
            critical_mb = 240.0
        "#;

        let result = ConfigFile::from_toml(toml);
        assert!(matches!(result, Err(ConfigFileError::Invalid { .. })));
    }
}
