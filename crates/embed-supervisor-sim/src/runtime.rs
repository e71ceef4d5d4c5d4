//! Simulated runtime entry point and instance.
//!
//! [`SimRuntimeFactory`] plays the part of the entry point registered by the
//! loader script. Every instance it creates is kept so tests can inspect
//! quit calls and forwarded messages after the supervisor let go of it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use embed_supervisor_common::RuntimeCallError;
use embed_supervisor_core::{
    BannerSeverity, BannerSink, Canvas, Metrics, ProgressFn, RuntimeConfig, RuntimeFactory,
    RuntimeHandle,
};
use embed_supervisor_host::{LogLevel, emit};

const MB: f64 = 1024.0 * 1024.0;

/// How `quit` behaves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuitBehavior {
    #[default]
    Succeed,
    Fail(String),
    /// Never resolves.
    Hang,
}

/// Behaviour shared by every instance a factory creates.
#[derive(Debug, Clone)]
pub struct RuntimeBehavior {
    /// Total heap reservation in MB on successive metrics reads. The last
    /// value repeats; an empty profile reports empty heaps.
    pub memory_profile_mb: Vec<f64>,
    pub supports_metrics: bool,
    pub fail_metrics: bool,
    /// `send_message` records the call and then fails.
    pub fail_messages: bool,
    pub quit: QuitBehavior,
    pub fps: Option<f64>,
}

impl Default for RuntimeBehavior {
    fn default() -> Self {
        Self {
            memory_profile_mb: vec![96.0, 128.0, 150.0],
            supports_metrics: true,
            fail_metrics: false,
            fail_messages: false,
            quit: QuitBehavior::Succeed,
            fps: Some(60.0),
        }
    }
}

/// A message forwarded into the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: String,
    pub method: String,
    pub value: String,
}

/// A simulated live instance.
#[derive(Debug)]
pub struct SimRuntime {
    behavior: RuntimeBehavior,
    reads: AtomicUsize,
    messages: Mutex<Vec<SentMessage>>,
    fullscreen: AtomicBool,
    quit_calls: AtomicUsize,
    quit: AtomicBool,
}

impl SimRuntime {
    pub fn new(behavior: RuntimeBehavior) -> Self {
        Self {
            behavior,
            reads: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
            fullscreen: AtomicBool::new(false),
            quit_calls: AtomicUsize::new(0),
            quit: AtomicBool::new(false),
        }
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.messages.lock().clone()
    }

    /// Number of GC requests received for `target`/`method`.
    pub fn gc_requests(&self, target: &str, method: &str) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.target == target && m.method == method)
            .count()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    pub fn quit_calls(&self) -> usize {
        self.quit_calls.load(Ordering::SeqCst)
    }

    /// Whether a quit has completed.
    pub fn has_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub fn metrics_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn current_total_mb(&self) -> f64 {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        let profile = &self.behavior.memory_profile_mb;
        profile
            .get(read)
            .or_else(|| profile.last())
            .copied()
            .unwrap_or(0.0)
    }

    fn ensure_live(&self) -> Result<(), RuntimeCallError> {
        if self.has_quit() {
            Err(RuntimeCallError::Released)
        } else {
            Ok(())
        }
    }
}

/// Split `total_mb` three to one between the WASM and JS heaps, half used.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn metrics_for(total_mb: f64, fps: Option<f64>) -> Metrics {
    let total = (total_mb.max(0.0) * MB).round() as u64;
    let wasm = total / 4 * 3;
    let js = total - wasm;

    Metrics {
        used_wasm_heap_bytes: wasm / 2,
        total_wasm_heap_bytes: wasm,
        used_js_heap_bytes: js / 2,
        total_js_heap_bytes: js,
        fps,
    }
}

#[async_trait]
impl RuntimeHandle for SimRuntime {
    fn supports_metrics(&self) -> bool {
        self.behavior.supports_metrics
    }

    fn metrics(&self) -> Result<Metrics, RuntimeCallError> {
        self.ensure_live()?;
        if !self.behavior.supports_metrics {
            return Err(RuntimeCallError::Unsupported {
                operation: "GetMetricsInfo".into(),
            });
        }
        if self.behavior.fail_metrics {
            return Err(RuntimeCallError::Failed("metrics read failed".into()));
        }
        Ok(metrics_for(self.current_total_mb(), self.behavior.fps))
    }

    fn send_message(&self, target: &str, method: &str, value: &str) -> Result<(), RuntimeCallError> {
        self.ensure_live()?;
        self.messages.lock().push(SentMessage {
            target: target.to_string(),
            method: method.to_string(),
            value: value.to_string(),
        });
        if self.behavior.fail_messages {
            return Err(RuntimeCallError::Failed(format!("{target} has no method {method}")));
        }
        Ok(())
    }

    fn set_fullscreen(&self, fullscreen: bool) -> Result<(), RuntimeCallError> {
        self.ensure_live()?;
        self.fullscreen.store(fullscreen, Ordering::SeqCst);
        Ok(())
    }

    async fn quit(&self) -> Result<(), RuntimeCallError> {
        self.quit_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior.quit {
            QuitBehavior::Succeed => {
                tokio::task::yield_now().await;
                self.quit.store(true, Ordering::SeqCst);
                debug!("Simulated runtime quit");
                Ok(())
            }
            QuitBehavior::Fail(reason) => Err(RuntimeCallError::Failed(reason.clone())),
            QuitBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Simulated runtime entry point.
#[derive(Debug, Default)]
pub struct SimRuntimeFactory {
    progress_steps: Vec<f64>,
    banners: Vec<(String, String)>,
    delay: Duration,
    error: Option<String>,
    behavior: RuntimeBehavior,
    instances: Mutex<Vec<Arc<SimRuntime>>>,
    calls: AtomicUsize,
}

impl SimRuntimeFactory {
    pub fn new() -> Self {
        Self {
            progress_steps: vec![0.0, 0.25, 0.6, 0.9, 1.0],
            ..Default::default()
        }
    }

    /// Progress values reported during instantiation, in order.
    #[must_use]
    pub fn with_progress(mut self, steps: Vec<f64>) -> Self {
        self.progress_steps = steps;
        self
    }

    /// Banner messages the runtime raises while starting, as
    /// `(message, severity)` pairs.
    #[must_use]
    pub fn with_banner(mut self, message: &str, severity: &str) -> Self {
        self.banners.push((message.to_string(), severity.to_string()));
        self
    }

    /// Time instantiation takes after progress was reported.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reject instantiation with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: RuntimeBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Every instance created so far.
    pub fn instances(&self) -> Vec<Arc<SimRuntime>> {
        self.instances.lock().clone()
    }

    /// The most recent instance.
    pub fn last_instance(&self) -> Option<Arc<SimRuntime>> {
        self.instances.lock().last().cloned()
    }

    pub fn instantiate_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuntimeFactory for SimRuntimeFactory {
    async fn instantiate(
        &self,
        canvas: Arc<dyn Canvas>,
        config: &RuntimeConfig,
        progress: ProgressFn,
        banner: Arc<dyn BannerSink>,
    ) -> Result<Arc<dyn RuntimeHandle>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(
            config = %config.to_json(),
            backing = ?canvas.backing_size(),
            "Simulated instantiation started"
        );

        emit(
            LogLevel::from_console("log"),
            "runtime",
            &format!("Loading {} {}", config.product_name, config.product_version),
        );

        for (message, severity) in &self.banners {
            banner.show_banner(message, BannerSeverity::from_runtime(severity));
        }

        for step in &self.progress_steps {
            progress(*step);
            tokio::task::yield_now().await;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(message) = &self.error {
            emit(LogLevel::from_console("error"), "runtime", message);
            return Err(message.clone());
        }

        let instance = Arc::new(SimRuntime::new(self.behavior.clone()));
        self.instances.lock().push(Arc::clone(&instance));
        Ok(instance)
    }
}
