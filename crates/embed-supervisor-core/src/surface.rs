//! Document and render surface abstractions.
//!
//! The supervisor never looks elements up globally. Each mount receives
//! explicit handles to the pieces of the page it owns:
//! - [`Document`]: readiness, viewport, user agent, script injection
//! - [`Canvas`]: the render surface the runtime draws into
//! - [`Container`]: the structural element wrapping the canvas
//!
//! Implementations live outside this crate (a browser binding, or the
//! simulated document used in tests).

use std::sync::Arc;

use async_trait::async_trait;

use crate::handle::RuntimeFactory;

/// A width/height pair in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Rendering context flavours tried by the capability probe, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    WebGl,
    WebGl2,
    ExperimentalWebGl,
}

impl ContextKind {
    /// Probe order.
    pub const ALL: [Self; 3] = [Self::WebGl, Self::WebGl2, Self::ExperimentalWebGl];

    /// Context identifier as understood by the document.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebGl => "webgl",
            Self::WebGl2 => "webgl2",
            Self::ExperimentalWebGl => "experimental-webgl",
        }
    }
}

/// A detached surface created only to test context acquisition.
pub trait ScratchSurface: Send {
    /// Try to acquire a rendering context of the given kind.
    fn acquire_context(&mut self, kind: ContextKind) -> bool;
}

/// The render surface handed to the runtime.
pub trait Canvas: Send + Sync {
    /// Whether the canvas is attached to the document.
    fn is_attached(&self) -> bool;

    /// Make the canvas keyboard-focusable without a focus outline.
    fn make_focusable(&self);

    /// Set the element class.
    fn set_class(&self, class: &str);

    /// Set the CSS (visual) size.
    fn set_css_size(&self, width: &str, height: &str);

    /// Set the backing-store (render resolution) size.
    fn set_backing_size(&self, width: u32, height: u32);

    /// Current backing-store size.
    fn backing_size(&self) -> (u32, u32);
}

/// The structural element wrapping the canvas. Reused by the host page
/// across mounts, so it is never removed.
pub trait Container: Send + Sync {
    /// The rendered rectangle size; zero when not laid out yet.
    fn bounding_size(&self) -> Size;

    /// Set the element class.
    fn set_class(&self, class: &str);
}

/// A loader script element injected into the document.
#[async_trait]
pub trait InjectedScript: Send + Sync {
    /// URL the element points at.
    fn url(&self) -> &str;

    /// Wait until the script has loaded or failed.
    async fn loaded(&self) -> Result<(), String>;

    /// Remove the element from the document. Returns `false` if it was no
    /// longer attached.
    fn remove(&self) -> bool;
}

/// Document-level services used by one mount.
#[async_trait]
pub trait Document: Send + Sync {
    /// Resolve on the next animation frame.
    async fn next_frame(&self);

    /// Current viewport size.
    fn viewport(&self) -> Size;

    /// User agent string.
    fn user_agent(&self) -> String;

    /// Create a detached scratch surface.
    fn create_scratch_surface(&self) -> Box<dyn ScratchSurface>;

    /// Append a script element pointing at `url` and return it immediately.
    fn inject_script(&self, url: &str) -> Arc<dyn InjectedScript>;

    /// The runtime entry point registered by a loaded script, if any.
    fn runtime_entry_point(&self) -> Option<Arc<dyn RuntimeFactory>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_kind_order() {
        let names: Vec<_> = ContextKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["webgl", "webgl2", "experimental-webgl"]);
    }
}
