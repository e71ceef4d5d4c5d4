//! Error types for the supervisor.
//!
//! This module defines the failure taxonomy of a mount using `thiserror`:
//! - [`SupervisorError`]: Errors that end a mount attempt, plus non-fatal
//!   monitoring and quit failures that are contained where they occur
//! - [`InstantiationFailureKind`]: Classification of runtime start-up failures
//! - [`RuntimeCallError`]: Errors from calls into a live runtime handle

use std::fmt;

use thiserror::Error;

/// Top-level supervisor errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupervisorError {
    /// The environment cannot create a WebGL context.
    #[error("WebGL is not supported in this environment")]
    EnvironmentUnsupported,

    /// The loader script could not be fetched or did not register the
    /// runtime entry point.
    #[error("Loader script unavailable: {url} ({reason})")]
    LoaderScriptUnavailable {
        /// URL of the loader script.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// The runtime entry point rejected instantiation.
    #[error("Runtime instantiation failed ({kind}): {message}")]
    Instantiation {
        /// Classified failure kind.
        kind: InstantiationFailureKind,
        /// Raw failure message from the runtime.
        message: String,
    },

    /// Reading or interpreting metrics failed. Never fatal.
    #[error("Monitoring error: {0}")]
    Monitoring(#[from] RuntimeCallError),

    /// The runtime failed to quit. Never fatal.
    #[error("Quit failed: {reason}")]
    QuitFailure {
        /// Description of the failure.
        reason: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

/// Classification of a runtime instantiation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantiationFailureKind {
    /// The WebGL context could not be created or was lost.
    WebGlContext,
    /// The device ran out of memory while starting the runtime.
    Memory,
    /// Anything else.
    Unknown,
}

impl InstantiationFailureKind {
    /// Classify a failure message by substring.
    ///
    /// WebGL markers take precedence over memory markers.
    pub fn classify(message: &str) -> Self {
        if message.contains("GLctx") || message.contains("WebGL") {
            Self::WebGlContext
        } else if message.contains("memory") || message.contains("Memory") {
            Self::Memory
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for InstantiationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebGlContext => write!(f, "webgl-context"),
            Self::Memory => write!(f, "memory"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Kind of terminal failure recorded in the lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    EnvironmentUnsupported,
    LoaderScriptUnavailable,
    Instantiation(InstantiationFailureKind),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvironmentUnsupported => write!(f, "environment-unsupported"),
            Self::LoaderScriptUnavailable => write!(f, "loader-script-unavailable"),
            Self::Instantiation(kind) => write!(f, "instantiation:{kind}"),
        }
    }
}

/// Errors from calls into a live runtime handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCallError {
    /// The handle does not implement the requested operation.
    #[error("Operation not supported by runtime: {operation}")]
    Unsupported {
        /// Name of the operation.
        operation: String,
    },

    /// The runtime raised an error while handling the call.
    #[error("Runtime call failed: {0}")]
    Failed(String),

    /// The handle has already been released.
    #[error("Runtime handle released")]
    Released,
}

impl SupervisorError {
    /// Create a new `LoaderScriptUnavailable` error.
    pub fn loader_unavailable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoaderScriptUnavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a classified `Instantiation` error from a runtime message.
    pub fn instantiation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Instantiation {
            kind: InstantiationFailureKind::classify(&message),
            message,
        }
    }

    /// Create a new `QuitFailure` error.
    pub fn quit_failure(reason: impl Into<String>) -> Self {
        Self::QuitFailure {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns the terminal failure kind if this error ends a mount.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::EnvironmentUnsupported => Some(FailureKind::EnvironmentUnsupported),
            Self::LoaderScriptUnavailable { .. } => Some(FailureKind::LoaderScriptUnavailable),
            Self::Instantiation { kind, .. } => Some(FailureKind::Instantiation(*kind)),
            Self::Monitoring(_) | Self::QuitFailure { .. } | Self::InvalidConfig { .. } => None,
        }
    }

    /// Returns `true` if this error terminates the mount attempt.
    pub fn is_fatal(&self) -> bool {
        self.kind().is_some()
    }

    /// Message shown to the user for fatal errors.
    pub fn user_message(&self) -> String {
        match self {
            Self::EnvironmentUnsupported => "WebGL is not supported in your browser. \
                 Please use a modern browser with WebGL support."
                .to_string(),
            Self::LoaderScriptUnavailable { .. } => "Failed to load the game. \
                 Please check that the build files are deployed."
                .to_string(),
            Self::Instantiation { kind, message } => {
                let detail = match kind {
                    InstantiationFailureKind::WebGlContext => "WebGL context error. Please try:\n\
                         1. Refresh the page\n\
                         2. Update your browser\n\
                         3. Check if WebGL is enabled in browser settings"
                        .to_string(),
                    InstantiationFailureKind::Memory => {
                        "Memory error. The game requires more memory than available.".to_string()
                    }
                    InstantiationFailureKind::Unknown => {
                        format!("Failed to load the game: {message}")
                    }
                };
                format!(
                    "{detail}\n\nPlease try refreshing the page or contact support if the issue persists."
                )
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_webgl() {
        assert_eq!(
            InstantiationFailureKind::classify("GLctx is undefined"),
            InstantiationFailureKind::WebGlContext
        );
        assert_eq!(
            InstantiationFailureKind::classify("WebGL context lost"),
            InstantiationFailureKind::WebGlContext
        );
    }

    #[test]
    fn test_classify_memory() {
        assert_eq!(
            InstantiationFailureKind::classify("Out of memory"),
            InstantiationFailureKind::Memory
        );
        assert_eq!(
            InstantiationFailureKind::classify("Memory allocation failed"),
            InstantiationFailureKind::Memory
        );
    }

    #[test]
    fn test_classify_precedence_and_fallback() {
        assert_eq!(
            InstantiationFailureKind::classify("WebGL out of memory"),
            InstantiationFailureKind::WebGlContext
        );
        assert_eq!(
            InstantiationFailureKind::classify("abort(404)"),
            InstantiationFailureKind::Unknown
        );
    }

    #[test]
    fn test_kind_and_fatality() {
        assert_eq!(
            SupervisorError::EnvironmentUnsupported.kind(),
            Some(FailureKind::EnvironmentUnsupported)
        );
        assert_eq!(
            SupervisorError::instantiation("Out of memory").kind(),
            Some(FailureKind::Instantiation(InstantiationFailureKind::Memory))
        );
        assert!(!SupervisorError::quit_failure("boom").is_fatal());
        assert!(!SupervisorError::from(RuntimeCallError::Released).is_fatal());
    }

    #[test]
    fn test_user_messages() {
        let webgl = SupervisorError::instantiation("GLctx missing").user_message();
        assert!(webgl.contains("Refresh the page"));

        let memory = SupervisorError::instantiation("out of memory").user_message();
        assert!(memory.contains("requires more memory"));

        let unknown = SupervisorError::instantiation("abort(7)").user_message();
        assert!(unknown.contains("abort(7)"));
    }

    #[test]
    fn test_error_display() {
        let err = SupervisorError::loader_unavailable("/Build/x.loader.js", "404");
        assert_eq!(
            err.to_string(),
            "Loader script unavailable: /Build/x.loader.js (404)"
        );
        assert_eq!(
            FailureKind::Instantiation(InstantiationFailureKind::Memory).to_string(),
            "instantiation:memory"
        );
    }
}
