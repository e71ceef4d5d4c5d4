//! Capability set requested from the host session.
//!
//! The app asks the host for a fixed set of APIs when it configures the
//! session. Anything not requested is unavailable for the whole session.

use std::collections::BTreeSet;

pub const EXPAND_APP: &str = "expandApp";
pub const OPEN_URL: &str = "openUrl";
pub const GET_MEETING_CONTEXT: &str = "getMeetingContext";
pub const GET_MEETING_PARTICIPANTS: &str = "getMeetingParticipants";

/// Ordered, de-duplicated set of capability names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    names: BTreeSet<String>,
}

impl Capabilities {
    /// An empty set.
    pub fn none() -> Self {
        Self::default()
    }

    /// The set the game panel needs.
    pub fn app_default() -> Self {
        Self::builder()
            .expand_app()
            .open_url()
            .meeting_context()
            .meeting_participants()
            .build()
    }

    /// Create a builder for constructing a capability set.
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::default()
    }

    /// Build a set from configured names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether the meeting context can be fetched after configuring.
    pub fn allows_meeting_context(&self) -> bool {
        self.contains(GET_MEETING_CONTEXT)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in the form sent to the host.
    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

/// Builder for [`Capabilities`].
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    names: BTreeSet<String>,
}

impl CapabilitiesBuilder {
    pub fn expand_app(mut self) -> Self {
        self.names.insert(EXPAND_APP.to_string());
        self
    }

    pub fn open_url(mut self) -> Self {
        self.names.insert(OPEN_URL.to_string());
        self
    }

    pub fn meeting_context(mut self) -> Self {
        self.names.insert(GET_MEETING_CONTEXT.to_string());
        self
    }

    pub fn meeting_participants(mut self) -> Self {
        self.names.insert(GET_MEETING_PARTICIPANTS.to_string());
        self
    }

    /// Add a capability not covered by the named helpers.
    pub fn custom(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn build(self) -> Capabilities {
        Capabilities { names: self.names }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none() {
        let caps = Capabilities::none();
        assert!(caps.is_empty());
        assert!(!caps.allows_meeting_context());
    }

    #[test]
    fn test_app_default() {
        let caps = Capabilities::app_default();

        assert_eq!(caps.len(), 4);
        assert!(caps.contains(EXPAND_APP));
        assert!(caps.contains(OPEN_URL));
        assert!(caps.allows_meeting_context());
        assert!(caps.contains(GET_MEETING_PARTICIPANTS));
    }

    #[test]
    fn test_builder_dedupes() {
        let caps = Capabilities::builder()
            .open_url()
            .open_url()
            .custom("shareApp")
            .build();

        assert_eq!(caps.to_vec(), vec!["openUrl", "shareApp"]);
    }

    #[test]
    fn test_from_names() {
        let caps = Capabilities::from_names(["getMeetingContext", "expandApp"]);
        assert_eq!(caps, Capabilities::builder().meeting_context().expand_app().build());
    }
}
