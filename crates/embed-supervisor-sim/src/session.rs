//! Simulated host session.

use async_trait::async_trait;
use parking_lot::Mutex;

use embed_supervisor_host::{ConfigureAck, HostSession, MeetingContext, SessionError};

/// Host session answering from fixed values.
#[derive(Debug, Default)]
pub struct SimHostSession {
    meeting_id: Option<String>,
    configure_error: Option<String>,
    configured: Mutex<Option<Vec<String>>>,
}

impl SimHostSession {
    /// A session inside a meeting with the given id.
    pub fn in_meeting(meeting_id: impl Into<String>) -> Self {
        Self {
            meeting_id: Some(meeting_id.into()),
            ..Default::default()
        }
    }

    /// A session that cannot be configured, as outside the host client.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            configure_error: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Capabilities passed to the last `configure` call.
    pub fn configured_capabilities(&self) -> Option<Vec<String>> {
        self.configured.lock().clone()
    }
}

#[async_trait]
impl HostSession for SimHostSession {
    async fn configure(
        &self,
        capabilities: &[String],
        _version: &str,
    ) -> Result<ConfigureAck, SessionError> {
        *self.configured.lock() = Some(capabilities.to_vec());

        if let Some(reason) = &self.configure_error {
            return Err(SessionError::Configure(reason.clone()));
        }

        Ok(ConfigureAck {
            running_context: Some("inMeeting".to_string()),
            unsupported_apis: Vec::new(),
        })
    }

    async fn meeting_context(&self) -> Result<MeetingContext, SessionError> {
        Ok(MeetingContext {
            meeting_id: self.meeting_id.clone(),
            ..Default::default()
        })
    }
}
