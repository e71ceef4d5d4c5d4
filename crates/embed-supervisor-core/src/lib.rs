//! Lifecycle supervision of an embedded WebGL/WASM runtime.
//!
//! This crate provides the supervisor that brings one runtime instance up
//! inside a host page, keeps it inside its memory budget, and tears it down
//! without leaks:
//! - [`probe`]: WebGL capability check on a throwaway surface
//! - [`canvas`]: Backing-store sizing and device-class styling
//! - [`RuntimeLoader`]: Loader script injection and instantiation
//! - [`MetricsMonitor`]: Periodic memory pressure classification
//! - [`Supervisor`]: Phase sequencing and at-most-once teardown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Supervisor                         │
//! │  (One per mount, owns runtime handle + script)          │
//! │  - Phase state machine                                  │
//! │  - Idempotent teardown                                  │
//! └─────────────────────────────────────────────────────────┘
//!          │                  │                   │
//!          ▼                  ▼                   ▼
//! ┌────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │ probe + canvas │ │  RuntimeLoader  │ │ MetricsMonitor  │
//! │ (synchronous)  │ │ (script, entry  │ │ (weak handle,   │
//! │                │ │  point, progress│ │  fixed interval)│
//! └────────────────┘ └─────────────────┘ └─────────────────┘
//!          │                  │                   │
//!          ▼                  ▼                   ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │    Document / Canvas / Container / UI sinks (traits)    │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod canvas;
pub mod coordinator;
pub mod handle;
pub mod loader;
pub mod metrics;
pub mod monitor;
pub mod phase;
pub mod probe;
pub mod surface;
pub mod ui;

pub use canvas::{DeviceClass, Dimensions};
pub use coordinator::{MountContext, QuitOutcome, Supervisor, TeardownReport, Unmount};
pub use handle::{Metrics, ProgressFn, RuntimeConfig, RuntimeFactory, RuntimeHandle};
pub use loader::{MonotonicProgress, RuntimeLoader};
pub use metrics::{MemoryReport, PressureLevel};
pub use monitor::{MetricsMonitor, MonitorHandle, PressureObserver};
pub use phase::LifecyclePhase;
pub use surface::{Canvas, Container, ContextKind, Document, InjectedScript, ScratchSurface, Size};
pub use ui::{BannerSeverity, BannerSink, ProgressSink};
