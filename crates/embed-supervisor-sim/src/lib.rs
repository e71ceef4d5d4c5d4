//! Simulated host page for embed-supervisor.
//!
//! Implements the document, element and runtime traits of
//! `embed-supervisor-core` in memory so the supervisor can be driven
//! without a browser, from the CLI or from tests:
//! - [`SimDocument`]: frames, WebGL probe, loader script injection
//! - [`SimCanvas`] / [`SimContainer`]: layout and styling targets
//! - [`SimRuntimeFactory`] / [`SimRuntime`]: scripted runtime behaviour
//! - [`SimHostSession`]: host SDK handshake
//! - [`SimEnvironment`]: all of the above assembled from configuration

pub mod document;
pub mod element;
pub mod environment;
pub mod runtime;
pub mod session;

pub use document::{ScriptBehavior, SimDocument, SimDocumentBuilder, SimScript};
pub use element::{SimCanvas, SimContainer};
pub use environment::SimEnvironment;
pub use runtime::{QuitBehavior, RuntimeBehavior, SentMessage, SimRuntime, SimRuntimeFactory};
pub use session::SimHostSession;
