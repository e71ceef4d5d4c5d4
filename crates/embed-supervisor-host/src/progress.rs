//! Loading bar implementing the progress sink.

use std::sync::Arc;

use parking_lot::Mutex;

use embed_supervisor_core::ProgressSink;

#[derive(Debug, Default)]
struct BarState {
    visible: bool,
    removed: bool,
    fraction: f64,
    history: Vec<f64>,
}

/// Loading bar state.
///
/// Once removed the bar ignores further updates; the host page recreates it
/// for the next mount.
#[derive(Debug, Clone, Default)]
pub struct ProgressBar {
    state: Arc<Mutex<BarState>>,
}

impl ProgressBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        let state = self.state.lock();
        state.visible && !state.removed
    }

    pub fn is_removed(&self) -> bool {
        self.state.lock().removed
    }

    /// Width of the filled part, in percent.
    pub fn width_percent(&self) -> f64 {
        100.0 * self.state.lock().fraction
    }

    /// Every fraction displayed so far, in order.
    pub fn history(&self) -> Vec<f64> {
        self.state.lock().history.clone()
    }
}

impl ProgressSink for ProgressBar {
    fn show(&self) {
        let mut state = self.state.lock();
        if !state.removed {
            state.visible = true;
        }
    }

    fn set_fraction(&self, fraction: f64) {
        let mut state = self.state.lock();
        if !state.removed {
            state.fraction = fraction;
            state.history.push(fraction);
        }
    }

    fn hide(&self) {
        self.state.lock().visible = false;
    }

    fn remove(&self) {
        let mut state = self.state.lock();
        state.visible = false;
        state.removed = true;
    }
}
