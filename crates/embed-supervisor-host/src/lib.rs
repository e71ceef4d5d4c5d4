//! Host page integration for embed-supervisor.
//!
//! This crate provides the host-side collaborators a mount is wired to.
//! None of them make lifecycle decisions; the supervisor only writes to them.
//!
//! # Interfaces
//!
//! - [`logging`]: Subscriber setup and a leveled log shim
//! - [`banner`]: Message board implementing the banner sink
//! - [`progress`]: Loading bar implementing the progress sink
//! - [`capabilities`]: Capability set requested from the host session
//! - [`session`]: Host session handshake
//!
//! # Session Model
//!
//! The host session is bootstrapped independently of the supervisor:
//!
//! 1. **Configure**: The app requests its capability set at a fixed SDK version.
//! 2. **Context**: The meeting context is fetched once configured.
//! 3. **Status**: Failures become a recoverable status for the shell; they
//!    never stop a mount.

pub mod banner;
pub mod capabilities;
pub mod logging;
pub mod progress;
pub mod session;

pub use banner::{BannerBoard, BannerEntry};
pub use capabilities::{Capabilities, CapabilitiesBuilder};
pub use logging::{LogConfig, LogLevel, LoggingError, emit, init_logging};
pub use progress::ProgressBar;
pub use session::{
    ConfigureAck, HostSession, MeetingContext, SessionBootstrap, SessionError, SessionStatus,
};
