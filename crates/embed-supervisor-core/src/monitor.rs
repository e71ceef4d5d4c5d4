//! Periodic memory monitoring of a running instance.
//!
//! [`MetricsMonitor::start`] spawns a polling task and returns the
//! [`MonitorHandle`] that owns it. The task only holds a weak reference to
//! the runtime handle, so releasing the handle during teardown is never
//! blocked by the monitor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use embed_supervisor_common::{MemoryBudget, MonitorConfig, SupervisorError};

use crate::handle::RuntimeHandle;
use crate::metrics::{MemoryReport, PressureLevel};

/// Callback receiving the pressure level of every completed tick.
pub type PressureObserver = Arc<dyn Fn(PressureLevel) + Send + Sync>;

/// Memory monitor settings and tick logic.
#[derive(Clone)]
pub struct MetricsMonitor {
    budget: MemoryBudget,
    config: MonitorConfig,
    observer: Option<PressureObserver>,
}

impl MetricsMonitor {
    pub fn new(budget: MemoryBudget, config: MonitorConfig) -> Self {
        Self {
            budget,
            config,
            observer: None,
        }
    }

    /// Report every tick's pressure level to `observer`.
    pub fn with_observer(mut self, observer: PressureObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run one tick against `handle`.
    ///
    /// Returns `Ok(None)` when the handle does not expose metrics. On
    /// critical pressure a garbage-collection request is sent; its failure is
    /// swallowed.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Monitoring`] when reading metrics fails.
    pub fn tick(&self, handle: &dyn RuntimeHandle) -> Result<Option<MemoryReport>, SupervisorError> {
        if !handle.supports_metrics() {
            return Ok(None);
        }

        let metrics = handle.metrics()?;
        let report = MemoryReport::new(&metrics, &self.budget);
        report.log(self.config.verbose);

        if report.level == PressureLevel::Critical {
            self.request_gc(handle);
        }

        Ok(Some(report))
    }

    fn request_gc(&self, handle: &dyn RuntimeHandle) {
        match handle.send_message(&self.config.gc_target, &self.config.gc_method, "") {
            Ok(()) => info!("Triggered runtime garbage collection"),
            Err(e) => debug!(error = %e, "Garbage collection request failed"),
        }
    }

    /// Start polling `handle` every configured interval. The first tick fires
    /// one interval after start.
    pub fn start(&self, handle: &Arc<dyn RuntimeHandle>) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let weak = Arc::downgrade(handle);

        let task = tokio::spawn(poll_loop(self.clone(), weak, cancel.clone(), ticks.clone()));

        debug!(interval_ms = self.config.interval_ms, "Metrics monitor started");

        MonitorHandle {
            cancel,
            task,
            ticks,
        }
    }
}

async fn poll_loop(
    monitor: MetricsMonitor,
    handle: Weak<dyn RuntimeHandle>,
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
) {
    let period = monitor.config.interval();
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        ticks.fetch_add(1, Ordering::Relaxed);

        // The strong reference lives only for the duration of the tick.
        let Some(live) = handle.upgrade() else {
            continue;
        };
        let outcome = monitor.tick(live.as_ref());
        drop(live);

        match outcome {
            Ok(Some(report)) => {
                if let Some(observer) = &monitor.observer {
                    observer(report.level);
                }
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "Error in memory monitoring"),
        }
    }

    debug!("Metrics monitor stopped");
}

/// Ownership of a running polling task.
///
/// Stopping consumes the handle, so a monitor can be stopped at most once.
/// Dropping the handle also cancels the task.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

impl MonitorHandle {
    /// Cancel the polling task.
    pub fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }

    /// Whether the polling task is still scheduled.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Number of ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("ticks", &self.ticks())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::handle::Metrics;
    use embed_supervisor_common::RuntimeCallError;

    const MB: u64 = 1024 * 1024;

    /// Handle reporting a fixed total, split evenly across both heaps.
    struct FixedHandle {
        total_mb: Mutex<u64>,
        fail_metrics: Mutex<bool>,
        fail_gc: bool,
        messages: Mutex<Vec<(String, String, String)>>,
    }

    impl FixedHandle {
        fn new(total_mb: u64) -> Arc<Self> {
            Arc::new(Self {
                total_mb: Mutex::new(total_mb),
                fail_metrics: Mutex::new(false),
                fail_gc: false,
                messages: Mutex::new(Vec::new()),
            })
        }

        fn gc_requests(&self) -> usize {
            self.messages
                .lock()
                .iter()
                .filter(|(target, method, _)| target == "System" && method == "GC.Collect")
                .count()
        }
    }

    #[async_trait]
    impl RuntimeHandle for FixedHandle {
        fn metrics(&self) -> Result<Metrics, RuntimeCallError> {
            if *self.fail_metrics.lock() {
                return Err(RuntimeCallError::Failed("metrics unavailable".into()));
            }
            let total = *self.total_mb.lock();
            Ok(Metrics {
                used_wasm_heap_bytes: total * MB / 4,
                total_wasm_heap_bytes: total * MB / 2,
                used_js_heap_bytes: total * MB / 4,
                total_js_heap_bytes: total * MB / 2,
                fps: Some(60.0),
            })
        }

        fn send_message(
            &self,
            target: &str,
            method: &str,
            value: &str,
        ) -> Result<(), RuntimeCallError> {
            self.messages
                .lock()
                .push((target.into(), method.into(), value.into()));
            if self.fail_gc {
                Err(RuntimeCallError::Failed("no such object".into()))
            } else {
                Ok(())
            }
        }

        fn set_fullscreen(&self, _fullscreen: bool) -> Result<(), RuntimeCallError> {
            Ok(())
        }

        async fn quit(&self) -> Result<(), RuntimeCallError> {
            Ok(())
        }
    }

    struct NoMetricsHandle;

    #[async_trait]
    impl RuntimeHandle for NoMetricsHandle {
        fn supports_metrics(&self) -> bool {
            false
        }

        fn metrics(&self) -> Result<Metrics, RuntimeCallError> {
            Err(RuntimeCallError::Unsupported {
                operation: "metrics".into(),
            })
        }

        fn send_message(&self, _: &str, _: &str, _: &str) -> Result<(), RuntimeCallError> {
            Ok(())
        }

        fn set_fullscreen(&self, _: bool) -> Result<(), RuntimeCallError> {
            Ok(())
        }

        async fn quit(&self) -> Result<(), RuntimeCallError> {
            Ok(())
        }
    }

    fn monitor() -> MetricsMonitor {
        MetricsMonitor::new(MemoryBudget::PANEL, MonitorConfig::default())
    }

    #[test]
    fn test_warning_sends_no_gc() {
        let handle = FixedHandle::new(201);
        let report = monitor().tick(handle.as_ref()).unwrap().unwrap();

        assert_eq!(report.level, PressureLevel::Warning);
        assert_eq!(handle.gc_requests(), 0);
    }

    #[test]
    fn test_critical_sends_exactly_one_gc() {
        let handle = FixedHandle::new(241);
        let report = monitor().tick(handle.as_ref()).unwrap().unwrap();

        assert_eq!(report.level, PressureLevel::Critical);
        assert_eq!(handle.gc_requests(), 1);
        assert_eq!(handle.messages.lock()[0].2, "");
    }

    #[test]
    fn test_gc_failure_swallowed() {
        let handle = Arc::new(FixedHandle {
            total_mb: Mutex::new(250),
            fail_metrics: Mutex::new(false),
            fail_gc: true,
            messages: Mutex::new(Vec::new()),
        });

        let report = monitor().tick(handle.as_ref()).unwrap().unwrap();
        assert_eq!(report.level, PressureLevel::Critical);
        assert_eq!(handle.gc_requests(), 1);
    }

    #[test]
    fn test_unsupported_metrics_skipped() {
        assert!(monitor().tick(&NoMetricsHandle).unwrap().is_none());
    }

    #[test]
    fn test_metrics_error_reported() {
        let handle = FixedHandle::new(100);
        *handle.fail_metrics.lock() = true;

        let err = monitor().tick(handle.as_ref()).unwrap_err();
        assert!(matches!(err, SupervisorError::Monitoring(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_survives_metrics_error() {
        let fixed = FixedHandle::new(100);
        *fixed.fail_metrics.lock() = true;
        let handle: Arc<dyn RuntimeHandle> = fixed.clone();

        let levels = Arc::new(Mutex::new(Vec::new()));
        let sink = levels.clone();
        let monitor = monitor().with_observer(Arc::new(move |level| sink.lock().push(level)));
        let running = monitor.start(&handle);

        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert_eq!(running.ticks(), 1);
        assert!(levels.lock().is_empty());
        assert!(running.is_active());

        *fixed.fail_metrics.lock() = false;
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(running.ticks(), 2);
        assert_eq!(*levels.lock(), vec![PressureLevel::Nominal]);

        running.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_handle_skipped() {
        let fixed = FixedHandle::new(250);
        let handle: Arc<dyn RuntimeHandle> = fixed.clone();
        let running = monitor().start(&handle);

        drop(handle);
        drop(fixed);

        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert_eq!(running.ticks(), 1);
        assert!(running.is_active());
        running.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_polling() {
        let fixed = FixedHandle::new(250);
        let handle: Arc<dyn RuntimeHandle> = fixed.clone();
        let running = monitor().start(&handle);
        let ticks = running.ticks.clone();

        running.stop();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(ticks.load(Ordering::Relaxed), 0);
        assert_eq!(fixed.gc_requests(), 0);
    }
}
