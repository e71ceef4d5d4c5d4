//! Observer interfaces for the transient UI owned by a mount.
//!
//! Both sinks are write-only side channels: components push updates into
//! them and never read them back for decisions.

use std::fmt;

/// Severity of a banner message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerSeverity {
    Info,
    Warning,
    Error,
}

impl BannerSeverity {
    /// Parse the severity string used by the runtime. Unknown values map to
    /// `Info`.
    pub fn from_runtime(value: &str) -> Self {
        match value {
            "error" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Whether entries of this severity expire on their own.
    pub fn expires(self) -> bool {
        !matches!(self, Self::Error)
    }
}

impl fmt::Display for BannerSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Loading progress indicator.
pub trait ProgressSink: Send + Sync {
    /// Make the indicator visible.
    fn show(&self);

    /// Display a fraction in `[0, 1]`.
    fn set_fraction(&self, fraction: f64);

    /// Hide the indicator.
    fn hide(&self);

    /// Remove the indicator from the mount's subtree.
    fn remove(&self);
}

/// Stack of user-facing messages.
pub trait BannerSink: Send + Sync {
    /// Append a message.
    fn show_banner(&self, message: &str, severity: BannerSeverity);

    /// Drop every message, keeping the banner element itself.
    fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_runtime() {
        assert_eq!(BannerSeverity::from_runtime("error"), BannerSeverity::Error);
        assert_eq!(
            BannerSeverity::from_runtime("warning"),
            BannerSeverity::Warning
        );
        assert_eq!(BannerSeverity::from_runtime("info"), BannerSeverity::Info);
        assert_eq!(BannerSeverity::from_runtime("other"), BannerSeverity::Info);
    }

    #[test]
    fn test_severity_expiry() {
        assert!(BannerSeverity::Info.expires());
        assert!(BannerSeverity::Warning.expires());
        assert!(!BannerSeverity::Error.expires());
    }
}
