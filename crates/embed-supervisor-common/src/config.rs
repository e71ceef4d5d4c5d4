//! Configuration structures for the supervisor.
//!
//! This module defines configuration options for various components:
//! - [`SupervisorConfig`]: Top-level configuration containing all settings
//! - [`BuildConfig`]: Location of the runtime build artifacts
//! - [`MemoryBudget`]: Host-imposed memory ceiling and its thresholds
//! - [`MonitorConfig`]: Metrics polling and mitigation settings
//! - [`LifecycleConfig`]: Readiness retry and teardown bounds

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SupervisorError;

/// Top-level supervisor configuration.
///
/// Created once per process and shared by every mount. Nothing in here is
/// mutated after a mount starts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SupervisorConfig {
    /// Runtime build artifact layout.
    #[serde(default)]
    pub build: BuildConfig,

    /// Product metadata handed to the runtime.
    #[serde(default)]
    pub product: ProductConfig,

    /// Memory ceiling enforced by the metrics monitor.
    #[serde(default)]
    pub budget: MemoryBudget,

    /// Metrics polling settings.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Readiness and teardown settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Render surface sizing policy.
    #[serde(default)]
    pub canvas: CanvasConfig,

    /// Banner board settings.
    #[serde(default)]
    pub banner: BannerConfig,
}

impl SupervisorConfig {
    /// Check the configuration for inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidConfig`] if the memory thresholds are
    /// out of order, the polling interval is zero, or the build name is empty.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        self.budget.validate()?;

        if self.monitor.interval_ms == 0 {
            return Err(SupervisorError::invalid_config(
                "monitor.interval_ms must be greater than zero",
            ));
        }
        if self.build.name.trim().is_empty() {
            return Err(SupervisorError::invalid_config("build.name must not be empty"));
        }
        if self.canvas.min_width == 0 || self.canvas.min_height == 0 {
            return Err(SupervisorError::invalid_config(
                "canvas minimum dimensions must be non-zero",
            ));
        }

        Ok(())
    }
}

/// Location of the runtime build artifacts.
///
/// The build directory exposes `<name>.loader.js`, `<name>.data`,
/// `<name>.framework.js` and `<name>.wasm`. Streaming assets live in a
/// separate directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Base URL of the build directory.
    #[serde(default = "defaults::build_url")]
    pub build_url: String,

    /// Artifact base name.
    #[serde(default = "defaults::build_name")]
    pub name: String,

    /// URL of the streaming assets directory.
    #[serde(default = "defaults::streaming_assets_url")]
    pub streaming_assets_url: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_url: defaults::build_url(),
            name: defaults::build_name(),
            streaming_assets_url: defaults::streaming_assets_url(),
        }
    }
}

impl BuildConfig {
    fn artifact(&self, suffix: &str) -> String {
        format!(
            "{}/{}{suffix}",
            self.build_url.trim_end_matches('/'),
            self.name
        )
    }

    /// URL of the loader script.
    pub fn loader_url(&self) -> String {
        self.artifact(".loader.js")
    }

    /// URL of the data bundle.
    pub fn data_url(&self) -> String {
        self.artifact(".data")
    }

    /// URL of the framework script.
    pub fn framework_url(&self) -> String {
        self.artifact(".framework.js")
    }

    /// URL of the WebAssembly code.
    pub fn code_url(&self) -> String {
        self.artifact(".wasm")
    }
}

/// Product metadata reported to the runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductConfig {
    #[serde(default = "defaults::company_name")]
    pub company_name: String,

    #[serde(default = "defaults::product_name")]
    pub product_name: String,

    #[serde(default = "defaults::product_version")]
    pub product_version: String,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            company_name: defaults::company_name(),
            product_name: defaults::product_name(),
            product_version: defaults::product_version(),
        }
    }
}

/// Host-imposed memory ceiling.
///
/// The embedded runtime must stay under `limit_mb`. Crossing `warn_mb` is
/// reported, crossing `critical_mb` triggers mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct MemoryBudget {
    /// Hard ceiling in megabytes.
    #[serde(default = "defaults::limit_mb")]
    pub limit_mb: f64,

    /// Warning threshold in megabytes.
    #[serde(default = "defaults::warn_mb")]
    pub warn_mb: f64,

    /// Critical threshold in megabytes.
    #[serde(default = "defaults::critical_mb")]
    pub critical_mb: f64,
}

impl MemoryBudget {
    /// The 256MB panel budget with 200MB/240MB thresholds.
    pub const PANEL: Self = Self {
        limit_mb: 256.0,
        warn_mb: 200.0,
        critical_mb: 240.0,
    };

    /// Check that `warn_mb < critical_mb <= limit_mb`.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        let ordered = self.warn_mb > 0.0
            && self.warn_mb < self.critical_mb
            && self.critical_mb <= self.limit_mb;
        if ordered {
            Ok(())
        } else {
            Err(SupervisorError::invalid_config(format!(
                "memory budget must satisfy 0 < warn ({}) < critical ({}) <= limit ({})",
                self.warn_mb, self.critical_mb, self.limit_mb
            )))
        }
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::PANEL
    }
}

/// Metrics polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Polling interval in milliseconds.
    #[serde(default = "defaults::interval_ms")]
    pub interval_ms: u64,

    /// Object that receives the garbage-collection request.
    #[serde(default = "defaults::gc_target")]
    pub gc_target: String,

    /// Method invoked on `gc_target`.
    #[serde(default = "defaults::gc_method")]
    pub gc_method: String,

    /// Consecutive critical ticks before the mount is marked degraded.
    #[serde(default = "defaults::degrade_after_critical_ticks")]
    pub degrade_after_critical_ticks: u32,

    /// Log a debug line for every nominal tick.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::interval_ms(),
            gc_target: defaults::gc_target(),
            gc_method: defaults::gc_method(),
            degrade_after_critical_ticks: defaults::degrade_after_critical_ticks(),
            verbose: false,
        }
    }
}

impl MonitorConfig {
    /// Get the polling interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Readiness and teardown timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Delay before the single re-check of canvas attachment.
    #[serde(default = "defaults::attach_retry_delay_ms")]
    pub attach_retry_delay_ms: u64,

    /// Upper bound on the graceful quit await during teardown.
    #[serde(default = "defaults::quit_timeout_ms")]
    pub quit_timeout_ms: u64,

    /// Pause after a successful quit so the runtime can release its context.
    #[serde(default = "defaults::quit_settle_ms")]
    pub quit_settle_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            attach_retry_delay_ms: defaults::attach_retry_delay_ms(),
            quit_timeout_ms: defaults::quit_timeout_ms(),
            quit_settle_ms: defaults::quit_settle_ms(),
        }
    }
}

impl LifecycleConfig {
    pub fn attach_retry_delay(&self) -> Duration {
        Duration::from_millis(self.attach_retry_delay_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }

    pub fn quit_settle(&self) -> Duration {
        Duration::from_millis(self.quit_settle_ms)
    }
}

/// Render surface sizing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CanvasConfig {
    /// Smallest backing-store width that still yields a rendering context.
    #[serde(default = "defaults::min_width")]
    pub min_width: u32,

    /// Smallest backing-store height that still yields a rendering context.
    #[serde(default = "defaults::min_height")]
    pub min_height: u32,

    /// User agent tokens that classify a device as mobile.
    #[serde(default = "defaults::mobile_tokens")]
    pub mobile_tokens: Vec<String>,

    /// Class applied to container and canvas on mobile devices.
    #[serde(default = "defaults::mobile_class")]
    pub mobile_class: String,

    /// Class applied to the container on desktop devices.
    #[serde(default = "defaults::desktop_class")]
    pub desktop_class: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            min_width: defaults::min_width(),
            min_height: defaults::min_height(),
            mobile_tokens: defaults::mobile_tokens(),
            mobile_class: defaults::mobile_class(),
            desktop_class: defaults::desktop_class(),
        }
    }
}

/// Banner board configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BannerConfig {
    /// Lifetime of info and warning entries in milliseconds.
    #[serde(default = "defaults::banner_expiry_ms")]
    pub expiry_ms: u64,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            expiry_ms: defaults::banner_expiry_ms(),
        }
    }
}

impl BannerConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_millis(self.expiry_ms)
    }
}

/// Default value functions for serde.
mod defaults {
    pub fn build_url() -> String {
        "/Build".to_string()
    }

    pub fn build_name() -> String {
        "thirdB".to_string()
    }

    pub fn streaming_assets_url() -> String {
        "/StreamingAssets".to_string()
    }

    pub fn company_name() -> String {
        "DefaultCompany".to_string()
    }

    pub fn product_name() -> String {
        "ZoomQuest".to_string()
    }

    pub fn product_version() -> String {
        "5.0.5".to_string()
    }

    pub const fn limit_mb() -> f64 {
        256.0
    }

    pub const fn warn_mb() -> f64 {
        200.0
    }

    pub const fn critical_mb() -> f64 {
        240.0
    }

    pub const fn interval_ms() -> u64 {
        5000
    }

    pub fn gc_target() -> String {
        "System".to_string()
    }

    pub fn gc_method() -> String {
        "GC.Collect".to_string()
    }

    pub const fn degrade_after_critical_ticks() -> u32 {
        3
    }

    pub const fn attach_retry_delay_ms() -> u64 {
        100
    }

    pub const fn quit_timeout_ms() -> u64 {
        5000
    }

    pub const fn quit_settle_ms() -> u64 {
        100
    }

    pub const fn min_width() -> u32 {
        320
    }

    pub const fn min_height() -> u32 {
        240
    }

    pub fn mobile_tokens() -> Vec<String> {
        ["iPhone", "iPad", "iPod", "Android"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn mobile_class() -> String {
        "unity-mobile".to_string()
    }

    pub fn desktop_class() -> String {
        "unity-desktop".to_string()
    }

    pub const fn banner_expiry_ms() -> u64 {
        5000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();

        assert_eq!(config.budget, MemoryBudget::PANEL);
        assert_eq!(config.monitor.interval_ms, 5000);
        assert_eq!(config.monitor.gc_target, "System");
        assert_eq!(config.monitor.gc_method, "GC.Collect");
        assert_eq!(config.lifecycle.attach_retry_delay_ms, 100);
        assert_eq!(config.canvas.min_width, 320);
        assert_eq!(config.canvas.min_height, 240);
        assert_eq!(config.banner.expiry_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_artifact_urls() {
        let build = BuildConfig::default();

        assert_eq!(build.loader_url(), "/Build/thirdB.loader.js");
        assert_eq!(build.data_url(), "/Build/thirdB.data");
        assert_eq!(build.framework_url(), "/Build/thirdB.framework.js");
        assert_eq!(build.code_url(), "/Build/thirdB.wasm");
    }

    #[test]
    fn test_artifact_urls_trailing_slash() {
        let build = BuildConfig {
            build_url: "https://cdn.example.com/game/".into(),
            name: "quest".into(),
            ..Default::default()
        };

        assert_eq!(
            build.loader_url(),
            "https://cdn.example.com/game/quest.loader.js"
        );
    }

    #[test]
    fn test_budget_validation() {
        assert!(MemoryBudget::PANEL.validate().is_ok());

        let inverted = MemoryBudget {
            warn_mb: 240.0,
            critical_mb: 200.0,
            ..MemoryBudget::PANEL
        };
        assert!(inverted.validate().is_err());

        let over_limit = MemoryBudget {
            critical_mb: 300.0,
            ..MemoryBudget::PANEL
        };
        assert!(over_limit.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = SupervisorConfig::default();
        config.monitor.interval_ms = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_ms"));
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"budget": {"warn_mb": 150.0}, "monitor": {"verbose": true}}"#;
        let config: SupervisorConfig = serde_json::from_str(json).unwrap();

        assert!((config.budget.warn_mb - 150.0).abs() < f64::EPSILON);
        assert!((config.budget.limit_mb - 256.0).abs() < f64::EPSILON);
        assert!(config.monitor.verbose);
        assert_eq!(config.monitor.interval(), Duration::from_secs(5));
    }
}
