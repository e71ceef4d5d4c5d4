//! Memory pressure classification.
//!
//! A [`MemoryReport`] is derived from one [`Metrics`] snapshot and classified
//! against the [`MemoryBudget`], highest threshold first.

use std::fmt;

use tracing::{debug, error, warn};

use embed_supervisor_common::MemoryBudget;

use crate::handle::Metrics;

/// Memory pressure level for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PressureLevel {
    Nominal,
    Warning,
    Critical,
}

impl PressureLevel {
    /// Classify a combined heap size. Thresholds are exclusive.
    pub fn classify(total_mb: f64, budget: &MemoryBudget) -> Self {
        if total_mb > budget.critical_mb {
            Self::Critical
        } else if total_mb > budget.warn_mb {
            Self::Warning
        } else {
            Self::Nominal
        }
    }
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nominal => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Interpreted metrics for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryReport {
    pub level: PressureLevel,
    pub total_mb: f64,
    pub limit_mb: f64,
    pub wasm_mb: f64,
    pub js_mb: f64,
    pub used_wasm_mb: f64,
    pub used_js_mb: f64,
    pub wasm_usage_percent: f64,
    pub js_usage_percent: f64,
    pub fps: Option<f64>,
}

impl MemoryReport {
    pub fn new(metrics: &Metrics, budget: &MemoryBudget) -> Self {
        let total_mb = metrics.total_mb();
        Self {
            level: PressureLevel::classify(total_mb, budget),
            total_mb,
            limit_mb: budget.limit_mb,
            wasm_mb: metrics.wasm_heap_mb(),
            js_mb: metrics.js_heap_mb(),
            used_wasm_mb: metrics.used_wasm_heap_mb(),
            used_js_mb: metrics.used_js_heap_mb(),
            wasm_usage_percent: metrics.wasm_usage_percent(),
            js_usage_percent: metrics.js_usage_percent(),
            fps: metrics.fps,
        }
    }

    /// Headroom left under the hard limit. Negative once exceeded.
    pub fn remaining_mb(&self) -> f64 {
        self.limit_mb - self.total_mb
    }

    /// Emit the diagnostic for this report at the level matching its
    /// pressure. Nominal reports are only logged when `verbose` is set.
    pub fn log(&self, verbose: bool) {
        let total_mb = format!("{:.2}", self.total_mb);
        let remaining_mb = format!("{:.2}", self.remaining_mb());
        let wasm_mb = format!("{:.2}", self.wasm_mb);
        let js_mb = format!("{:.2}", self.js_mb);
        let wasm_usage = format!("{:.1}%", self.wasm_usage_percent);
        let js_usage = format!("{:.1}%", self.js_usage_percent);
        let fps = self.fps.map(|fps| format!("{fps:.2}"));

        match self.level {
            PressureLevel::Critical => error!(
                total_mb = %total_mb,
                limit_mb = self.limit_mb,
                remaining_mb = %remaining_mb,
                wasm_mb = %wasm_mb,
                js_mb = %js_mb,
                wasm_usage = %wasm_usage,
                js_usage = %js_usage,
                fps = ?fps,
                "CRITICAL: memory approaching host limit"
            ),
            PressureLevel::Warning => warn!(
                total_mb = %total_mb,
                limit_mb = self.limit_mb,
                remaining_mb = %remaining_mb,
                wasm_mb = %wasm_mb,
                js_mb = %js_mb,
                wasm_usage = %wasm_usage,
                js_usage = %js_usage,
                fps = ?fps,
                "Memory usage high, approaching host limit"
            ),
            PressureLevel::Nominal if verbose => debug!(
                total_mb = %total_mb,
                limit_mb = self.limit_mb,
                used_wasm_mb = self.used_wasm_mb,
                used_js_mb = self.used_js_mb,
                wasm_usage = %wasm_usage,
                js_usage = %js_usage,
                fps = ?fps,
                status = %self.level,
                "Runtime memory metrics"
            ),
            PressureLevel::Nominal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn metrics_with_total_mb(total: u64) -> Metrics {
        Metrics {
            used_wasm_heap_bytes: total * MB / 4,
            total_wasm_heap_bytes: total * MB / 2,
            used_js_heap_bytes: total * MB / 4,
            total_js_heap_bytes: total * MB / 2,
            fps: Some(30.0),
        }
    }

    #[test]
    fn test_classify_boundaries() {
        let budget = MemoryBudget::PANEL;

        assert_eq!(PressureLevel::classify(200.0, &budget), PressureLevel::Nominal);
        assert_eq!(PressureLevel::classify(201.0, &budget), PressureLevel::Warning);
        assert_eq!(PressureLevel::classify(240.0, &budget), PressureLevel::Warning);
        assert_eq!(PressureLevel::classify(241.0, &budget), PressureLevel::Critical);
    }

    #[test]
    fn test_classify_monotonic() {
        let budget = MemoryBudget::PANEL;
        let mut previous = PressureLevel::Nominal;

        for mb in 0..400 {
            let level = PressureLevel::classify(f64::from(mb), &budget);
            assert!(level >= previous, "classification decreased at {mb}MB");
            previous = level;
        }
    }

    #[test]
    fn test_report_fields() {
        let report = MemoryReport::new(&metrics_with_total_mb(250), &MemoryBudget::PANEL);

        assert_eq!(report.level, PressureLevel::Critical);
        assert!((report.total_mb - 250.0).abs() < 1e-9);
        assert!((report.remaining_mb() - 6.0).abs() < 1e-9);
        assert!((report.wasm_usage_percent - 50.0).abs() < 1e-9);
        assert_eq!(report.fps, Some(30.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(PressureLevel::Nominal.to_string(), "OK");
        assert_eq!(PressureLevel::Critical.to_string(), "CRITICAL");
    }
}
