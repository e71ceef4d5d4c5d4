//! Common types, errors, and configuration for embed-supervisor.
//!
//! This crate provides shared functionality used across the embed-supervisor workspace:
//! - Error types using `thiserror` for the failure taxonomy of a mount
//! - Configuration structures for the supervisor and its components
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{
    BannerConfig, BuildConfig, CanvasConfig, LifecycleConfig, MemoryBudget, MonitorConfig,
    ProductConfig, SupervisorConfig,
};
pub use config_file::{
    ConfigFile, ConfigFileError, LoggingConfigFile, SessionConfigFile, SimulationConfigFile,
};
pub use error::{FailureKind, InstantiationFailureKind, RuntimeCallError, SupervisorError};
