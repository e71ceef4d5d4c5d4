//! Loader script injection and runtime instantiation.
//!
//! Loading happens in two steps so the coordinator can own the script
//! element before anything is awaited:
//!
//! 1. [`RuntimeLoader::inject`] appends the loader script and hands it back
//! 2. [`RuntimeLoader::load`] waits for the script, then calls the entry
//!    point it registered, forwarding progress to the indicator the
//!    coordinator showed after provisioning

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, instrument};

use embed_supervisor_common::SupervisorError;

use crate::handle::{ProgressFn, RuntimeConfig, RuntimeHandle};
use crate::surface::{Canvas, Document, InjectedScript};
use crate::ui::{BannerSeverity, BannerSink, ProgressSink};

/// Progress filter for one load attempt.
///
/// Values are clamped into `[0, 1]`; anything below the last forwarded value
/// (or NaN) is dropped, so the indicator never moves backwards.
#[derive(Debug, Default)]
pub struct MonotonicProgress {
    last: Mutex<Option<f64>>,
}

impl MonotonicProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value to display, or `None` if it must be dropped.
    pub fn accept(&self, fraction: f64) -> Option<f64> {
        if fraction.is_nan() {
            return None;
        }
        let fraction = fraction.clamp(0.0, 1.0);

        let mut last = self.last.lock();
        match *last {
            Some(previous) if fraction < previous => None,
            _ => {
                *last = Some(fraction);
                Some(fraction)
            }
        }
    }
}

/// Loads the external runtime into a provisioned canvas.
pub struct RuntimeLoader {
    document: Arc<dyn Document>,
    loader_url: String,
}

impl RuntimeLoader {
    pub fn new(document: Arc<dyn Document>, loader_url: impl Into<String>) -> Self {
        Self {
            document,
            loader_url: loader_url.into(),
        }
    }

    /// Append the loader script to the document. The returned element must
    /// be removed by its owner during teardown.
    pub fn inject(&self) -> Arc<dyn InjectedScript> {
        self.document.inject_script(&self.loader_url)
    }

    /// Wait for `script` and instantiate the runtime.
    ///
    /// The caller shows the progress indicator before the load starts; it is
    /// hidden here whatever the outcome. Failures are surfaced on the banner
    /// with a message matching their kind.
    ///
    /// # Errors
    ///
    /// - [`SupervisorError::LoaderScriptUnavailable`] if the script fails to
    ///   load or registers no entry point
    /// - [`SupervisorError::Instantiation`] if the entry point rejects
    #[instrument(skip_all, fields(url = %self.loader_url))]
    pub async fn load(
        &self,
        script: &dyn InjectedScript,
        config: &RuntimeConfig,
        canvas: Arc<dyn Canvas>,
        progress: Arc<dyn ProgressSink>,
        banner: Arc<dyn BannerSink>,
    ) -> Result<Arc<dyn RuntimeHandle>, SupervisorError> {
        let result = self.instantiate(script, config, canvas, &progress, &banner).await;
        progress.hide();

        match result {
            Ok(handle) => {
                info!("Runtime instance initialized successfully");
                Ok(handle)
            }
            Err(e) => {
                error!(error = %e, "Runtime initialization error");
                banner.show_banner(&e.user_message(), BannerSeverity::Error);
                Err(e)
            }
        }
    }

    async fn instantiate(
        &self,
        script: &dyn InjectedScript,
        config: &RuntimeConfig,
        canvas: Arc<dyn Canvas>,
        progress: &Arc<dyn ProgressSink>,
        banner: &Arc<dyn BannerSink>,
    ) -> Result<Arc<dyn RuntimeHandle>, SupervisorError> {
        script
            .loaded()
            .await
            .map_err(|reason| SupervisorError::loader_unavailable(&self.loader_url, reason))?;

        let factory = self.document.runtime_entry_point().ok_or_else(|| {
            SupervisorError::loader_unavailable(&self.loader_url, "entry point not registered")
        })?;

        let filter = Arc::new(MonotonicProgress::new());
        let sink = Arc::clone(progress);
        let on_progress: ProgressFn = Arc::new(move |fraction| {
            if let Some(value) = filter.accept(fraction) {
                sink.set_fraction(value);
            }
        });

        factory
            .instantiate(canvas, config, on_progress, Arc::clone(banner))
            .await
            .map_err(SupervisorError::instantiation)
    }
}

impl std::fmt::Debug for RuntimeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeLoader")
            .field("loader_url", &self.loader_url)
            .finish_non_exhaustive()
    }
}
