//! Banner board for user-facing runtime messages.
//!
//! Entries stack in arrival order. Info and warning entries expire after
//! the configured delay; error entries stay until the board is cleared.
//! The board is visible whenever it holds at least one entry.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use embed_supervisor_common::BannerConfig;
use embed_supervisor_core::{BannerSeverity, BannerSink};

/// One message on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerEntry {
    pub id: u64,
    pub message: String,
    pub severity: BannerSeverity,
}

impl BannerEntry {
    /// Inline style applied to the entry element.
    pub fn style(&self) -> Option<&'static str> {
        match self.severity {
            BannerSeverity::Error => Some("background: red; padding: 10px;"),
            BannerSeverity::Warning => Some("background: yellow; padding: 10px;"),
            BannerSeverity::Info => None,
        }
    }
}

#[derive(Debug, Default)]
struct BoardState {
    next_id: u64,
    entries: Vec<BannerEntry>,
}

impl BoardState {
    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }
}

/// Stack of banner messages.
#[derive(Debug, Clone)]
pub struct BannerBoard {
    state: Arc<Mutex<BoardState>>,
    expiry: Duration,
}

impl BannerBoard {
    pub fn new(config: &BannerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState::default())),
            expiry: config.expiry(),
        }
    }

    /// Entry point for the runtime's own banner callback, which passes the
    /// severity as a string.
    pub fn show_runtime_banner(&self, message: &str, severity: &str) {
        self.show_banner(message, BannerSeverity::from_runtime(severity));
    }

    /// Snapshot of the current entries.
    pub fn entries(&self) -> Vec<BannerEntry> {
        self.state.lock().entries.clone()
    }

    pub fn is_visible(&self) -> bool {
        !self.state.lock().entries.is_empty()
    }

    fn schedule_expiry(&self, id: u64) {
        // Without a runtime the entry simply stays until cleared.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let state = Arc::clone(&self.state);
        let expiry = self.expiry;
        runtime.spawn(async move {
            tokio::time::sleep(expiry).await;
            if state.lock().remove(id) {
                debug!(id, "Banner entry expired");
            }
        });
    }
}

impl Default for BannerBoard {
    fn default() -> Self {
        Self::new(&BannerConfig::default())
    }
}

impl BannerSink for BannerBoard {
    fn show_banner(&self, message: &str, severity: BannerSeverity) {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(BannerEntry {
                id,
                message: message.to_string(),
                severity,
            });
            id
        };

        debug!(id, %severity, "Banner entry shown");

        if severity.expires() {
            self.schedule_expiry(id);
        }
    }

    fn clear(&self) {
        self.state.lock().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_info_and_warning_expire() {
        let board = BannerBoard::default();

        board.show_banner("loading assets", BannerSeverity::Info);
        board.show_runtime_banner("slow network", "warning");
        assert_eq!(board.entries().len(), 2);
        assert!(board.is_visible());

        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert_eq!(board.entries().len(), 2);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(board.entries().is_empty());
        assert!(!board.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_persists_until_cleared() {
        let board = BannerBoard::default();

        board.show_runtime_banner("fatal", "error");
        tokio::time::sleep(Duration::from_secs(60)).await;

        let entries = board.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, BannerSeverity::Error);
        assert_eq!(entries[0].style(), Some("background: red; padding: 10px;"));

        board.clear();
        assert!(!board.is_visible());
    }

    #[test]
    fn test_without_runtime_entries_stay() {
        let board = BannerBoard::default();
        board.show_banner("hello", BannerSeverity::Info);
        assert_eq!(board.entries()[0].message, "hello");
        assert_eq!(board.entries()[0].style(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_after_clear_is_noop() {
        let board = BannerBoard::default();

        board.show_banner("first", BannerSeverity::Info);
        board.clear();
        board.show_banner("second", BannerSeverity::Error);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let entries = board.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "second");
    }
}
