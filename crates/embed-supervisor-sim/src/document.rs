//! Simulated document: frames, capability probe, script injection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use embed_supervisor_core::{
    ContextKind, Document, InjectedScript, RuntimeFactory, ScratchSurface, Size,
};

const DEFAULT_FRAME: Duration = Duration::from_millis(16);
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// How an injected loader script behaves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScriptBehavior {
    /// Loads and registers the entry point.
    #[default]
    Load,
    /// Loads without registering an entry point.
    LoadWithoutEntryPoint,
    /// Fails with the given reason.
    Fail(String),
    /// Never settles.
    Hang,
}

type EntryPoint = Arc<Mutex<Option<Arc<dyn RuntimeFactory>>>>;

/// A loader script element.
pub struct SimScript {
    url: String,
    behavior: ScriptBehavior,
    delay: Duration,
    attached: AtomicBool,
    registry: EntryPoint,
    factory: Option<Arc<dyn RuntimeFactory>>,
}

impl SimScript {
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SimScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimScript")
            .field("url", &self.url)
            .field("behavior", &self.behavior)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InjectedScript for SimScript {
    fn url(&self) -> &str {
        &self.url
    }

    async fn loaded(&self) -> Result<(), String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            ScriptBehavior::Load => {
                if let Some(factory) = &self.factory {
                    *self.registry.lock() = Some(Arc::clone(factory));
                }
                Ok(())
            }
            ScriptBehavior::LoadWithoutEntryPoint => Ok(()),
            ScriptBehavior::Fail(reason) => Err(reason.clone()),
            ScriptBehavior::Hang => std::future::pending().await,
        }
    }

    fn remove(&self) -> bool {
        let was_attached = self.attached.swap(false, Ordering::SeqCst);
        if was_attached {
            debug!(url = %self.url, "Loader script removed");
        }
        was_attached
    }
}

/// Scratch surface that records which context kinds were requested.
struct SimScratch {
    webgl: bool,
    attempts: Arc<Mutex<Vec<ContextKind>>>,
}

impl ScratchSurface for SimScratch {
    fn acquire_context(&mut self, kind: ContextKind) -> bool {
        self.attempts.lock().push(kind);
        self.webgl
    }
}

/// Simulated document.
pub struct SimDocument {
    webgl: bool,
    user_agent: String,
    viewport: Mutex<Size>,
    frame: Duration,
    script_behavior: ScriptBehavior,
    script_delay: Duration,
    factory: Option<Arc<dyn RuntimeFactory>>,
    registry: EntryPoint,
    scripts: Mutex<Vec<Arc<SimScript>>>,
    context_attempts: Arc<Mutex<Vec<ContextKind>>>,
    frames: AtomicUsize,
}

impl SimDocument {
    pub fn builder() -> SimDocumentBuilder {
        SimDocumentBuilder::default()
    }

    /// Every script injected so far.
    pub fn scripts(&self) -> Vec<Arc<SimScript>> {
        self.scripts.lock().clone()
    }

    /// Scripts still attached to the document.
    pub fn attached_scripts(&self) -> usize {
        self.scripts.lock().iter().filter(|s| s.is_attached()).count()
    }

    /// Context kinds requested by capability probes.
    pub fn context_attempts(&self) -> Vec<ContextKind> {
        self.context_attempts.lock().clone()
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn resize_viewport(&self, size: Size) {
        *self.viewport.lock() = size;
    }
}

impl std::fmt::Debug for SimDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDocument")
            .field("webgl", &self.webgl)
            .field("user_agent", &self.user_agent)
            .field("script_behavior", &self.script_behavior)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Document for SimDocument {
    async fn next_frame(&self) {
        tokio::time::sleep(self.frame).await;
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn viewport(&self) -> Size {
        *self.viewport.lock()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn create_scratch_surface(&self) -> Box<dyn ScratchSurface> {
        Box::new(SimScratch {
            webgl: self.webgl,
            attempts: Arc::clone(&self.context_attempts),
        })
    }

    fn inject_script(&self, url: &str) -> Arc<dyn InjectedScript> {
        let script = Arc::new(SimScript {
            url: url.to_string(),
            behavior: self.script_behavior.clone(),
            delay: self.script_delay,
            attached: AtomicBool::new(true),
            registry: Arc::clone(&self.registry),
            factory: self.factory.clone(),
        });
        self.scripts.lock().push(Arc::clone(&script));
        debug!(url, "Loader script injected");
        script
    }

    fn runtime_entry_point(&self) -> Option<Arc<dyn RuntimeFactory>> {
        self.registry.lock().clone()
    }
}

/// Builder for [`SimDocument`].
pub struct SimDocumentBuilder {
    webgl: bool,
    user_agent: String,
    viewport: Size,
    frame: Duration,
    script_behavior: ScriptBehavior,
    script_delay: Duration,
    factory: Option<Arc<dyn RuntimeFactory>>,
}

impl Default for SimDocumentBuilder {
    fn default() -> Self {
        Self {
            webgl: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: Size::new(1280.0, 720.0),
            frame: DEFAULT_FRAME,
            script_behavior: ScriptBehavior::Load,
            script_delay: Duration::ZERO,
            factory: None,
        }
    }
}

impl SimDocumentBuilder {
    #[must_use]
    pub fn webgl(mut self, supported: bool) -> Self {
        self.webgl = supported;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn viewport(mut self, viewport: Size) -> Self {
        self.viewport = viewport;
        self
    }

    /// Duration of one animation frame.
    #[must_use]
    pub fn frame(mut self, frame: Duration) -> Self {
        self.frame = frame;
        self
    }

    #[must_use]
    pub fn script(mut self, behavior: ScriptBehavior) -> Self {
        self.script_behavior = behavior;
        self
    }

    /// Time a script takes to load or fail.
    #[must_use]
    pub fn script_delay(mut self, delay: Duration) -> Self {
        self.script_delay = delay;
        self
    }

    /// Entry point registered by a successfully loaded script.
    #[must_use]
    pub fn entry_point(mut self, factory: Arc<dyn RuntimeFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> SimDocument {
        SimDocument {
            webgl: self.webgl,
            user_agent: self.user_agent,
            viewport: Mutex::new(self.viewport),
            frame: self.frame,
            script_behavior: self.script_behavior,
            script_delay: self.script_delay,
            factory: self.factory,
            registry: Arc::new(Mutex::new(None)),
            scripts: Mutex::new(Vec::new()),
            context_attempts: Arc::new(Mutex::new(Vec::new())),
            frames: AtomicUsize::new(0),
        }
    }
}
