//! Simulated page elements: the canvas and its container.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use embed_supervisor_core::{Canvas, Container, Size};

#[derive(Debug, Default)]
struct CanvasState {
    class: Option<String>,
    css_size: Option<(String, String)>,
    backing: (u32, u32),
    focusable: bool,
}

/// Canvas recording every style and size change applied to it.
#[derive(Debug)]
pub struct SimCanvas {
    attached: AtomicBool,
    state: Mutex<CanvasState>,
}

impl SimCanvas {
    /// A canvas already attached to the document, with the browser's default
    /// 300×150 backing store.
    pub fn attached() -> Self {
        Self {
            attached: AtomicBool::new(true),
            state: Mutex::new(CanvasState {
                backing: (300, 150),
                ..Default::default()
            }),
        }
    }

    /// A canvas not yet in the document.
    pub fn detached() -> Self {
        let canvas = Self::attached();
        canvas.attached.store(false, Ordering::SeqCst);
        canvas
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::SeqCst);
    }

    pub fn class(&self) -> Option<String> {
        self.state.lock().class.clone()
    }

    pub fn css_size(&self) -> Option<(String, String)> {
        self.state.lock().css_size.clone()
    }

    pub fn is_focusable(&self) -> bool {
        self.state.lock().focusable
    }
}

impl Canvas for SimCanvas {
    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn make_focusable(&self) {
        self.state.lock().focusable = true;
    }

    fn set_class(&self, class: &str) {
        self.state.lock().class = Some(class.to_string());
    }

    fn set_css_size(&self, width: &str, height: &str) {
        self.state.lock().css_size = Some((width.to_string(), height.to_string()));
    }

    fn set_backing_size(&self, width: u32, height: u32) {
        self.state.lock().backing = (width, height);
    }

    fn backing_size(&self) -> (u32, u32) {
        self.state.lock().backing
    }
}

/// Container with a fixed layout rectangle.
#[derive(Debug)]
pub struct SimContainer {
    size: Mutex<Size>,
    class: Mutex<Option<String>>,
}

impl SimContainer {
    pub fn new(size: Size) -> Self {
        Self {
            size: Mutex::new(size),
            class: Mutex::new(None),
        }
    }

    /// Change the laid-out size, as a host page resize would.
    pub fn resize(&self, size: Size) {
        *self.size.lock() = size;
    }

    pub fn class(&self) -> Option<String> {
        self.class.lock().clone()
    }
}

impl Container for SimContainer {
    fn bounding_size(&self) -> Size {
        *self.size.lock()
    }

    fn set_class(&self, class: &str) {
        *self.class.lock() = Some(class.to_string());
    }
}
