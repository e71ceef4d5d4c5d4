//! Host session handshake.
//!
//! The host SDK is consumed through [`HostSession`]. [`SessionBootstrap`]
//! configures it with the app's capabilities and then fetches the meeting
//! context. Failures end up in [`SessionStatus::Failed`], which the shell
//! shows as a recoverable state; the supervisor does not depend on it.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info, instrument};

use crate::capabilities::Capabilities;

const DEFAULT_SDK_VERSION: &str = "0.16.0";

/// Acknowledgement returned by `configure`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureAck {
    /// Where the app is running (`inMeeting`, `inMainClient`, ...).
    pub running_context: Option<String>,
    /// Requested capabilities the host refused.
    #[serde(default)]
    pub unsupported_apis: Vec<String>,
}

/// Meeting context reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MeetingContext {
    #[serde(rename = "meetingID")]
    pub meeting_id: Option<String>,
    #[serde(rename = "meetingTopic")]
    pub meeting_topic: Option<String>,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Session handshake errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Host session configuration failed: {0}")]
    Configure(String),

    #[error("Meeting context unavailable: {0}")]
    Context(String),

    #[error("Capability not requested: {0}")]
    NotPermitted(String),
}

/// The host SDK surface used by the app.
#[async_trait]
pub trait HostSession: Send + Sync {
    async fn configure(
        &self,
        capabilities: &[String],
        version: &str,
    ) -> Result<ConfigureAck, SessionError>;

    async fn meeting_context(&self) -> Result<MeetingContext, SessionError>;
}

/// Outcome of the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Ready {
        ack: ConfigureAck,
        context: MeetingContext,
    },
    Failed {
        message: String,
    },
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Status line for the shell.
    pub fn status_text(&self, product_name: &str) -> String {
        match self {
            Self::Ready { .. } => format!("Welcome to {product_name}! Host SDK loaded."),
            Self::Failed { .. } => "Error: Unable to load host SDK".to_string(),
        }
    }

    /// Meeting id to display, `N/A` when unknown.
    pub fn meeting_id(&self) -> &str {
        match self {
            Self::Ready { context, .. } => context.meeting_id.as_deref().unwrap_or("N/A"),
            Self::Failed { .. } => "N/A",
        }
    }
}

/// Runs the configure + context handshake.
#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    capabilities: Capabilities,
    version: String,
}

impl Default for SessionBootstrap {
    fn default() -> Self {
        Self::new(Capabilities::app_default(), DEFAULT_SDK_VERSION)
    }
}

impl SessionBootstrap {
    pub fn new(capabilities: Capabilities, version: impl Into<String>) -> Self {
        Self {
            capabilities,
            version: version.into(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Configure the session and fetch the meeting context.
    #[instrument(skip_all, fields(version = %self.version))]
    pub async fn connect(&self, session: &dyn HostSession) -> SessionStatus {
        match self.try_connect(session).await {
            Ok((ack, context)) => {
                info!(
                    meeting_id = context.meeting_id.as_deref().unwrap_or("N/A"),
                    running_context = ?ack.running_context,
                    "Host session ready"
                );
                SessionStatus::Ready { ack, context }
            }
            Err(e) => {
                error!(error = %e, "Host session error");
                SessionStatus::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn try_connect(
        &self,
        session: &dyn HostSession,
    ) -> Result<(ConfigureAck, MeetingContext), SessionError> {
        let ack = session
            .configure(&self.capabilities.to_vec(), &self.version)
            .await?;

        if !self.capabilities.allows_meeting_context() {
            return Err(SessionError::NotPermitted(
                crate::capabilities::GET_MEETING_CONTEXT.to_string(),
            ));
        }

        let context = session.meeting_context().await?;
        Ok((ack, context))
    }
}
