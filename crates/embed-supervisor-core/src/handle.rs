//! Contract with the embedded runtime.
//!
//! This module provides:
//! - [`RuntimeConfig`]: Immutable instantiation settings
//! - [`RuntimeFactory`]: The entry point registered by the loader script
//! - [`RuntimeHandle`]: Control and introspection of a live instance
//! - [`Metrics`]: A memory/frame-rate snapshot read from the instance

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use embed_supervisor_common::{BuildConfig, ProductConfig, RuntimeCallError};

use crate::surface::Canvas;
use crate::ui::BannerSink;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Callback receiving instantiation progress in `[0, 1]`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Instantiation settings handed to the runtime entry point.
///
/// Built once per mount from the supervisor configuration and never mutated.
/// Serializes to the field names the loader expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub arguments: Vec<String>,
    pub data_url: String,
    pub framework_url: String,
    pub code_url: String,
    pub streaming_assets_url: String,
    pub company_name: String,
    pub product_name: String,
    pub product_version: String,
}

impl RuntimeConfig {
    /// Build the instantiation settings from the artifact layout and product
    /// metadata.
    pub fn new(build: &BuildConfig, product: &ProductConfig) -> Self {
        Self {
            arguments: Vec::new(),
            data_url: build.data_url(),
            framework_url: build.framework_url(),
            code_url: build.code_url(),
            streaming_assets_url: build.streaming_assets_url.clone(),
            company_name: product.company_name.clone(),
            product_name: product.product_name.clone(),
            product_version: product.product_version.clone(),
        }
    }

    /// JSON form passed across the entry point boundary.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Memory and frame-rate snapshot of a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Metrics {
    #[serde(rename = "usedWASMHeapSize")]
    pub used_wasm_heap_bytes: u64,
    #[serde(rename = "totalWASMHeapSize")]
    pub total_wasm_heap_bytes: u64,
    #[serde(rename = "usedJSHeapSize")]
    pub used_js_heap_bytes: u64,
    #[serde(rename = "totalJSHeapSize")]
    pub total_js_heap_bytes: u64,
    #[serde(default)]
    pub fps: Option<f64>,
}

impl Metrics {
    pub fn wasm_heap_mb(&self) -> f64 {
        bytes_to_mb(self.total_wasm_heap_bytes)
    }

    pub fn js_heap_mb(&self) -> f64 {
        bytes_to_mb(self.total_js_heap_bytes)
    }

    pub fn used_wasm_heap_mb(&self) -> f64 {
        bytes_to_mb(self.used_wasm_heap_bytes)
    }

    pub fn used_js_heap_mb(&self) -> f64 {
        bytes_to_mb(self.used_js_heap_bytes)
    }

    /// Combined heap reservation of both heaps.
    pub fn total_mb(&self) -> f64 {
        self.wasm_heap_mb() + self.js_heap_mb()
    }

    pub fn wasm_usage_percent(&self) -> f64 {
        percent(self.used_wasm_heap_bytes, self.total_wasm_heap_bytes)
    }

    pub fn js_usage_percent(&self) -> f64 {
        percent(self.used_js_heap_bytes, self.total_js_heap_bytes)
    }
}

#[allow(clippy::cast_precision_loss)]
fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

#[allow(clippy::cast_precision_loss)]
fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// A live runtime instance.
///
/// Owned by the lifecycle coordinator; other components only ever see a
/// borrowed or weak reference.
#[async_trait]
pub trait RuntimeHandle: Send + Sync {
    /// Whether [`RuntimeHandle::metrics`] is implemented.
    fn supports_metrics(&self) -> bool {
        true
    }

    /// Read a metrics snapshot.
    fn metrics(&self) -> Result<Metrics, RuntimeCallError>;

    /// Invoke `method` on the named object inside the instance.
    fn send_message(&self, target: &str, method: &str, value: &str)
    -> Result<(), RuntimeCallError>;

    /// Enter or leave fullscreen.
    fn set_fullscreen(&self, fullscreen: bool) -> Result<(), RuntimeCallError>;

    /// Shut the instance down, releasing its rendering context.
    async fn quit(&self) -> Result<(), RuntimeCallError>;
}

/// Runtime instantiation entry point.
#[async_trait]
pub trait RuntimeFactory: Send + Sync {
    /// Start an instance on `canvas`. Errors carry the runtime's raw message.
    async fn instantiate(
        &self,
        canvas: Arc<dyn Canvas>,
        config: &RuntimeConfig,
        progress: ProgressFn,
        banner: Arc<dyn BannerSink>,
    ) -> Result<Arc<dyn RuntimeHandle>, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_runtime_config_from_build() {
        let config = RuntimeConfig::new(&BuildConfig::default(), &ProductConfig::default());

        assert!(config.arguments.is_empty());
        assert_eq!(config.data_url, "/Build/thirdB.data");
        assert_eq!(config.code_url, "/Build/thirdB.wasm");
        assert_eq!(config.streaming_assets_url, "/StreamingAssets");
        assert_eq!(config.product_name, "ZoomQuest");
    }

    #[test]
    fn test_runtime_config_json_names() {
        let json = RuntimeConfig::new(&BuildConfig::default(), &ProductConfig::default()).to_json();

        assert_eq!(json["frameworkUrl"], "/Build/thirdB.framework.js");
        assert_eq!(json["streamingAssetsUrl"], "/StreamingAssets");
        assert_eq!(json["productVersion"], "5.0.5");
    }

    #[test]
    fn test_metrics_totals() {
        let metrics = Metrics {
            used_wasm_heap_bytes: 64 * MB,
            total_wasm_heap_bytes: 128 * MB,
            used_js_heap_bytes: 16 * MB,
            total_js_heap_bytes: 64 * MB,
            fps: Some(60.0),
        };

        assert!((metrics.total_mb() - 192.0).abs() < 1e-9);
        assert!((metrics.wasm_usage_percent() - 50.0).abs() < 1e-9);
        assert!((metrics.js_usage_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_empty_heap_percent() {
        let metrics = Metrics::default();
        assert!(metrics.wasm_usage_percent().abs() < f64::EPSILON);
        assert!(metrics.total_mb().abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_deserialize_runtime_names() {
        let json = r#"{
            "usedWASMHeapSize": 1048576,
            "totalWASMHeapSize": 2097152,
            "usedJSHeapSize": 0,
            "totalJSHeapSize": 1048576,
            "fps": 59.5
        }"#;
        let metrics: Metrics = serde_json::from_str(json).unwrap();

        assert_eq!(metrics.total_wasm_heap_bytes, 2 * MB);
        assert_eq!(metrics.fps, Some(59.5));
        assert!((metrics.total_mb() - 3.0).abs() < 1e-9);
    }
}
