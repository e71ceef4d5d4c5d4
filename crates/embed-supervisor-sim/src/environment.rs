//! A complete simulated page assembled from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use embed_supervisor_common::SimulationConfigFile;
use embed_supervisor_core::{BannerSink, MountContext, ProgressSink, RuntimeFactory, Size};

use crate::document::{ScriptBehavior, SimDocument, SimDocumentBuilder};
use crate::element::{SimCanvas, SimContainer};
use crate::runtime::{QuitBehavior, RuntimeBehavior, SimRuntimeFactory};

/// Document, elements and runtime entry point for one mount.
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    pub document: Arc<SimDocument>,
    pub canvas: Arc<SimCanvas>,
    pub container: Arc<SimContainer>,
    pub factory: Arc<SimRuntimeFactory>,
    /// When set, the canvas starts detached and [`SimEnvironment::schedule_attach`]
    /// attaches it after this delay.
    pub attach_delay: Option<Duration>,
}

impl SimEnvironment {
    /// A desktop page with WebGL and a loader that succeeds.
    pub fn desktop() -> Self {
        Self::from_config(&SimulationConfigFile::default())
    }

    pub fn from_config(config: &SimulationConfigFile) -> Self {
        let mut factory = SimRuntimeFactory::new().with_behavior(RuntimeBehavior {
            memory_profile_mb: config.memory_profile_mb.clone(),
            quit: if config.quit_hangs {
                QuitBehavior::Hang
            } else {
                QuitBehavior::Succeed
            },
            ..Default::default()
        });
        if let Some(message) = &config.instantiation_error {
            factory = factory.failing(message.clone());
        }

        let script = if config.script_loads {
            ScriptBehavior::Load
        } else {
            ScriptBehavior::Fail("network error".to_string())
        };

        let env = Self::with_factory(
            factory,
            SimDocument::builder()
                .webgl(config.webgl)
                .user_agent(config.user_agent.clone())
                .viewport(Size::new(config.viewport[0], config.viewport[1]))
                .script(script),
            Size::new(config.container[0], config.container[1]),
        );

        match config.attach_delay_ms {
            Some(ms) => Self {
                attach_delay: Some(Duration::from_millis(ms)),
                ..env.with_canvas(SimCanvas::detached())
            },
            None => env,
        }
    }

    /// Assemble an environment around `factory`. The builder's entry point
    /// is replaced by `factory`.
    pub fn with_factory(
        factory: SimRuntimeFactory,
        document: SimDocumentBuilder,
        container: Size,
    ) -> Self {
        let factory = Arc::new(factory);
        let entry_point: Arc<dyn RuntimeFactory> = factory.clone();
        let document = document.entry_point(entry_point).build();

        Self {
            document: Arc::new(document),
            canvas: Arc::new(SimCanvas::attached()),
            container: Arc::new(SimContainer::new(container)),
            factory,
            attach_delay: None,
        }
    }

    /// Replace the canvas, e.g. with a detached one.
    #[must_use]
    pub fn with_canvas(mut self, canvas: SimCanvas) -> Self {
        self.canvas = Arc::new(canvas);
        self
    }

    /// Attach a detached canvas once the configured delay has passed. Must be
    /// called from within a tokio runtime.
    pub fn schedule_attach(&self) {
        let Some(delay) = self.attach_delay else {
            return;
        };
        let canvas = Arc::clone(&self.canvas);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            canvas.attach();
            debug!(?delay, "Canvas attached");
        });
    }

    /// Mount context wiring this environment to the given UI sinks.
    pub fn mount_context(
        &self,
        progress: Arc<dyn ProgressSink>,
        banner: Arc<dyn BannerSink>,
    ) -> MountContext {
        MountContext {
            document: self.document.clone(),
            canvas: self.canvas.clone(),
            container: self.container.clone(),
            progress,
            banner,
        }
    }
}
