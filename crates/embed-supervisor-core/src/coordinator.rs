//! Lifecycle coordination of one mounted runtime.
//!
//! [`Supervisor::mount`] starts the bring-up sequence in a background task:
//!
//! ```text
//! next frame ─► probe ─► attach check (one retry) ─► provision
//!            ─► show progress ─► next frame ─► inject script ─► load
//!            ─► start monitor
//! ```
//!
//! [`Supervisor::unmount`] runs the teardown sequence at most once, whatever
//! phase was reached. The sequence runs in its own task, so it completes even
//! if the caller stops waiting for it:
//!
//! 1. cancel pending bring-up timers
//! 2. stop the metrics monitor
//! 3. quit the runtime (bounded) and release the handle
//! 4. remove the loader script
//! 5. clear the progress indicator and banner
//!
//! A load that is still in flight when teardown starts is not cancelled; its
//! result is discarded when it arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

use embed_supervisor_common::{
    LifecycleConfig, RuntimeCallError, SupervisorConfig, SupervisorError,
};

use crate::canvas;
use crate::handle::{RuntimeConfig, RuntimeHandle};
use crate::loader::RuntimeLoader;
use crate::metrics::PressureLevel;
use crate::monitor::{MetricsMonitor, MonitorHandle};
use crate::phase::LifecyclePhase;
use crate::probe;
use crate::surface::{Canvas, Container, Document, InjectedScript};
use crate::ui::{BannerSeverity, BannerSink, ProgressSink};

/// The page elements and services owned by one mount.
#[derive(Clone)]
pub struct MountContext {
    pub document: Arc<dyn Document>,
    pub canvas: Arc<dyn Canvas>,
    pub container: Arc<dyn Container>,
    pub progress: Arc<dyn ProgressSink>,
    pub banner: Arc<dyn BannerSink>,
}

/// How the graceful quit ended during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuitOutcome {
    /// No runtime was live.
    NoRuntime,
    Completed,
    Failed(String),
    /// The runtime did not answer within the quit timeout.
    TimedOut,
}

/// Result of a teardown run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    /// Phase the mount was in when teardown started.
    pub phase_at_unmount: LifecyclePhase,
    pub monitor_stopped: bool,
    pub quit: QuitOutcome,
    pub script_removed: bool,
}

/// Outcome of [`Supervisor::unmount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unmount {
    /// This call ran the teardown sequence.
    Performed(TeardownReport),
    /// Another call already started it.
    AlreadyRequested,
}

/// Mutable per-mount state. Never held across an await.
struct MountState {
    phase: LifecyclePhase,
    runtime: Option<Arc<dyn RuntimeHandle>>,
    monitor: Option<MonitorHandle>,
    script: Option<Arc<dyn InjectedScript>>,
    critical_streak: u32,
}

struct Shared {
    id: Uuid,
    mount: MountContext,
    config: SupervisorConfig,
    state: Mutex<MountState>,
    phases: watch::Sender<LifecyclePhase>,
    cancel: CancellationToken,
    teardown_started: AtomicBool,
}

impl Shared {
    /// Apply `next` if allowed from the current phase.
    fn transition(&self, state: &mut MountState, next: LifecyclePhase) -> bool {
        let from = state.phase;
        if !from.can_transition_to(next) {
            if matches!(from, LifecyclePhase::TearingDown | LifecyclePhase::TornDown) {
                debug!(%from, to = %next, "Transition ignored after teardown");
            } else {
                warn!(%from, to = %next, "Rejected lifecycle transition");
            }
            return false;
        }

        debug_assert!(
            next.holds_runtime() || state.runtime.is_none(),
            "{next} cannot hold a runtime"
        );
        debug!(%from, to = %next, "Lifecycle transition");
        state.phase = next;
        self.phases.send_replace(next);
        true
    }

    fn advance(&self, next: LifecyclePhase) -> bool {
        let mut state = self.state.lock();
        self.transition(&mut state, next)
    }

    /// Move to the terminal error phase for `err`. Returns `false` if the
    /// mount had already moved on (torn down meanwhile).
    fn fail(&self, err: &SupervisorError) -> bool {
        let Some(kind) = err.kind() else {
            return false;
        };
        let applied = self.advance(LifecyclePhase::TerminalError(kind));
        if applied {
            error!(error = %err, "Mount failed");
        }
        applied
    }

    fn on_pressure(&self, level: PressureLevel) {
        let threshold = self.config.monitor.degrade_after_critical_ticks.max(1);
        let mut state = self.state.lock();

        if level == PressureLevel::Critical {
            state.critical_streak = state.critical_streak.saturating_add(1);
            if state.critical_streak >= threshold
                && state.phase == LifecyclePhase::Running
                && self.transition(&mut state, LifecyclePhase::Degraded)
            {
                error!(
                    critical_ticks = state.critical_streak,
                    "Runtime degraded by sustained memory pressure"
                );
            }
        } else {
            state.critical_streak = 0;
            if state.phase == LifecyclePhase::Degraded
                && self.transition(&mut state, LifecyclePhase::Running)
            {
                info!("Memory pressure relieved, runtime no longer degraded");
            }
        }
    }

    /// Sleep or wait for the next frame unless teardown cancels first.
    /// Returns `false` when cancelled.
    async fn wait_frame(&self) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = self.mount.document.next_frame() => true,
        }
    }

    async fn wait(&self, delay: std::time::Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    /// Claim the teardown. Only the first caller gets `true`.
    fn begin_teardown(&self) -> bool {
        !self.teardown_started.swap(true, Ordering::SeqCst)
    }

    fn guarded_progress(&self) -> Arc<dyn ProgressSink> {
        Arc::new(GuardedProgress {
            inner: Arc::clone(&self.mount.progress),
            cancel: self.cancel.clone(),
        })
    }
}

/// Bring-up sequence for one mount.
async fn bring_up(shared: Arc<Shared>) {
    if !shared.wait_frame().await || !shared.advance(LifecyclePhase::ProbingCapability) {
        return;
    }

    if !probe::probe(shared.mount.document.as_ref()) {
        let err = SupervisorError::EnvironmentUnsupported;
        if shared.fail(&err) {
            shared
                .mount
                .banner
                .show_banner(&err.user_message(), BannerSeverity::Error);
        }
        return;
    }

    if !shared.advance(LifecyclePhase::Provisioning) {
        return;
    }

    if !shared.mount.canvas.is_attached() {
        warn!("Canvas not attached to the document, waiting");
        let delay = shared.config.lifecycle.attach_retry_delay();
        if !shared.wait(delay).await {
            return;
        }
        if !shared.mount.canvas.is_attached() {
            warn!("Canvas still not attached, abandoning mount attempt");
            shared.advance(LifecyclePhase::Idle);
            return;
        }
    }

    canvas::provision(
        shared.mount.canvas.as_ref(),
        shared.mount.container.as_ref(),
        shared.mount.document.as_ref(),
        &shared.config.canvas,
    );

    if !shared.advance(LifecyclePhase::Loading) {
        return;
    }

    let progress = shared.guarded_progress();
    progress.show();

    if !shared.wait_frame().await {
        return;
    }

    load(shared, progress).await;
}

async fn load(shared: Arc<Shared>, progress: Arc<dyn ProgressSink>) {
    let loader = RuntimeLoader::new(
        Arc::clone(&shared.mount.document),
        shared.config.build.loader_url(),
    );

    let script = loader.inject();
    {
        let mut state = shared.state.lock();
        if state.phase != LifecyclePhase::Loading {
            drop(state);
            script.remove();
            return;
        }
        state.script = Some(Arc::clone(&script));
    }

    let config = RuntimeConfig::new(&shared.config.build, &shared.config.product);
    let banner: Arc<dyn BannerSink> = Arc::new(GuardedBanner {
        inner: Arc::clone(&shared.mount.banner),
        cancel: shared.cancel.clone(),
    });

    let result = loader
        .load(
            script.as_ref(),
            &config,
            Arc::clone(&shared.mount.canvas),
            progress,
            banner,
        )
        .await;

    match result {
        Ok(handle) => adopt(&shared, handle),
        Err(err) => {
            shared.fail(&err);
        }
    }
}

/// Take ownership of a freshly instantiated runtime, or dispose of it if the
/// mount has moved on.
fn adopt(shared: &Arc<Shared>, handle: Arc<dyn RuntimeHandle>) {
    let mut state = shared.state.lock();

    if state.phase != LifecyclePhase::Loading {
        drop(state);
        info!("Runtime resolved after teardown, quitting it");
        let lifecycle = shared.config.lifecycle.clone();
        tokio::spawn(
            async move {
                quit_runtime(handle, &lifecycle).await;
            }
            .in_current_span(),
        );
        return;
    }

    let observer = Arc::downgrade(shared);
    let monitor = MetricsMonitor::new(shared.config.budget, shared.config.monitor.clone())
        .with_observer(Arc::new(move |level| {
            if let Some(shared) = Weak::upgrade(&observer) {
                shared.on_pressure(level);
            }
        }));

    state.monitor = Some(monitor.start(&handle));
    state.runtime = Some(handle);
    shared.transition(&mut state, LifecyclePhase::Running);
}

/// Quit `handle` within the configured bound, then drop it.
async fn quit_runtime(handle: Arc<dyn RuntimeHandle>, lifecycle: &LifecycleConfig) -> QuitOutcome {
    match tokio::time::timeout(lifecycle.quit_timeout(), handle.quit()).await {
        Ok(Ok(())) => {
            info!("Runtime instance quit successfully");
            tokio::time::sleep(lifecycle.quit_settle()).await;
            QuitOutcome::Completed
        }
        Ok(Err(e)) => {
            let err = SupervisorError::quit_failure(e.to_string());
            error!(error = %err, "Error quitting runtime instance");
            QuitOutcome::Failed(e.to_string())
        }
        Err(_) => {
            error!(
                timeout_ms = lifecycle.quit_timeout_ms,
                "Runtime quit timed out, releasing handle"
            );
            QuitOutcome::TimedOut
        }
    }
}

/// Teardown body. Callers claim it first with [`Shared::begin_teardown`].
async fn teardown(shared: Arc<Shared>) -> TeardownReport {
    info!("Starting runtime cleanup");

    let phase_at_unmount = {
        let mut state = shared.state.lock();
        let before = state.phase;
        shared.transition(&mut state, LifecyclePhase::TearingDown);
        before
    };

    // 1. Pending bring-up timers.
    shared.cancel.cancel();

    // 2. Monitor.
    let monitor = shared.state.lock().monitor.take();
    let monitor_stopped = monitor.is_some();
    if let Some(monitor) = monitor {
        monitor.stop();
    }

    // 3. Runtime.
    let runtime = shared.state.lock().runtime.take();
    let quit = match runtime {
        Some(handle) => quit_runtime(handle, &shared.config.lifecycle).await,
        None => QuitOutcome::NoRuntime,
    };

    // 4. Loader script.
    let script = shared.state.lock().script.take();
    let script_removed = script.is_some_and(|script| {
        let removed = script.remove();
        if !removed {
            debug!(url = script.url(), "Loader script was already detached");
        }
        removed
    });

    // 5. Transient UI.
    shared.mount.progress.remove();
    shared.mount.banner.clear();

    {
        let mut state = shared.state.lock();
        shared.transition(&mut state, LifecyclePhase::TornDown);
    }

    info!(quit = ?quit, "Runtime cleanup completed");

    TeardownReport {
        phase_at_unmount,
        monitor_stopped,
        quit,
        script_removed,
    }
}

/// Supervisor of one embedded runtime mount.
///
/// # Example
///
/// ```ignore
/// let supervisor = Supervisor::mount(mount, SupervisorConfig::default())?;
/// let mut phases = supervisor.subscribe();
/// phases.wait_for(|p| *p == LifecyclePhase::Running).await?;
///
/// supervisor.unmount().await;
/// ```
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    /// Start a new mount. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn mount(mount: MountContext, config: SupervisorConfig) -> Result<Self, SupervisorError> {
        config.validate()?;

        let id = Uuid::new_v4();
        let (phases, _) = watch::channel(LifecyclePhase::Idle);
        let shared = Arc::new(Shared {
            id,
            mount,
            config,
            state: Mutex::new(MountState {
                phase: LifecyclePhase::Idle,
                runtime: None,
                monitor: None,
                script: None,
                critical_streak: 0,
            }),
            phases,
            cancel: CancellationToken::new(),
            teardown_started: AtomicBool::new(false),
        });

        info!(mount_id = %id, "Mounting runtime supervisor");
        tokio::spawn(
            bring_up(Arc::clone(&shared)).instrument(info_span!("mount", mount_id = %id)),
        );

        Ok(Self { shared })
    }

    pub fn mount_id(&self) -> Uuid {
        self.shared.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.shared.state.lock().phase
    }

    /// Observe phase changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.shared.phases.subscribe()
    }

    /// Whether a runtime handle is currently held.
    pub fn has_runtime(&self) -> bool {
        self.shared.state.lock().runtime.is_some()
    }

    /// Whether the metrics monitor is currently polling.
    pub fn monitor_active(&self) -> bool {
        self.shared
            .state
            .lock()
            .monitor
            .as_ref()
            .is_some_and(MonitorHandle::is_active)
    }

    fn live_runtime(&self) -> Result<Arc<dyn RuntimeHandle>, RuntimeCallError> {
        let state = self.shared.state.lock();
        match state.phase {
            LifecyclePhase::Running | LifecyclePhase::Degraded => {
                state.runtime.clone().ok_or(RuntimeCallError::Released)
            }
            _ => Err(RuntimeCallError::Released),
        }
    }

    /// Put the runtime into fullscreen.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeCallError::Released`] when no runtime is running.
    pub fn request_fullscreen(&self) -> Result<(), RuntimeCallError> {
        self.live_runtime()?.set_fullscreen(true)
    }

    /// Forward a message into the running instance.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeCallError::Released`] when no runtime is running, or
    /// the runtime's own error.
    pub fn send_message(&self, target: &str, method: &str, value: &str) -> Result<(), RuntimeCallError> {
        self.live_runtime()?.send_message(target, method, value)
    }

    /// Tear the mount down. Only the first call runs the sequence; later or
    /// concurrent calls return [`Unmount::AlreadyRequested`] immediately.
    ///
    /// The sequence runs in a spawned task. Dropping the returned future
    /// stops the wait, not the teardown; use [`Supervisor::torn_down`] to
    /// wait for it again.
    #[instrument(skip(self), fields(mount_id = %self.shared.id))]
    pub async fn unmount(&self) -> Unmount {
        if !self.shared.begin_teardown() {
            return Unmount::AlreadyRequested;
        }

        let task = tokio::spawn(teardown(Arc::clone(&self.shared)).in_current_span());
        match task.await {
            Ok(report) => Unmount::Performed(report),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!(error = %e, "Teardown task cancelled");
                Unmount::AlreadyRequested
            }
        }
    }

    /// Wait until teardown has completed.
    pub async fn torn_down(&self) {
        let mut phases = self.subscribe();
        // The sender lives in `self.shared`, so the channel cannot close here.
        let _ = phases.wait_for(|phase| *phase == LifecyclePhase::TornDown).await;
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if !self.shared.begin_teardown() {
            return;
        }
        // Dropping without unmounting still has to release the runtime.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(teardown(Arc::clone(&self.shared)));
        } else {
            self.shared.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("mount_id", &self.shared.id)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

/// Progress sink that goes quiet once teardown has started.
struct GuardedProgress {
    inner: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl ProgressSink for GuardedProgress {
    fn show(&self) {
        if !self.cancel.is_cancelled() {
            self.inner.show();
        }
    }

    fn set_fraction(&self, fraction: f64) {
        if !self.cancel.is_cancelled() {
            self.inner.set_fraction(fraction);
        }
    }

    fn hide(&self) {
        if !self.cancel.is_cancelled() {
            self.inner.hide();
        }
    }

    fn remove(&self) {
        if !self.cancel.is_cancelled() {
            self.inner.remove();
        }
    }
}

/// Banner sink that goes quiet once teardown has started.
struct GuardedBanner {
    inner: Arc<dyn BannerSink>,
    cancel: CancellationToken,
}

impl BannerSink for GuardedBanner {
    fn show_banner(&self, message: &str, severity: BannerSeverity) {
        if !self.cancel.is_cancelled() {
            self.inner.show_banner(message, severity);
        }
    }

    fn clear(&self) {
        if !self.cancel.is_cancelled() {
            self.inner.clear();
        }
    }
}
