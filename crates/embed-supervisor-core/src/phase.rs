//! Lifecycle phases of one mount and the transitions between them.

use std::fmt;

use embed_supervisor_common::FailureKind;

/// Phase of a mounted supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Waiting for the document, or abandoned because the canvas never
    /// attached.
    Idle,
    ProbingCapability,
    Provisioning,
    Loading,
    Running,
    /// Running under sustained critical memory pressure. Advisory only.
    Degraded,
    /// The mount failed; no runtime exists.
    TerminalError(FailureKind),
    TearingDown,
    TornDown,
}

impl LifecyclePhase {
    /// Whether a move from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        use LifecyclePhase::{
            Degraded, Idle, Loading, ProbingCapability, Provisioning, Running, TearingDown,
            TerminalError, TornDown,
        };

        match (self, next) {
            (Idle, ProbingCapability)
            | (ProbingCapability, TerminalError(FailureKind::EnvironmentUnsupported) | Provisioning)
            | (Provisioning, Idle | Loading)
            | (Loading, Running)
            | (Running, Degraded)
            | (Degraded, Running)
            | (TearingDown, TornDown) => true,
            (Loading, TerminalError(kind)) => kind != FailureKind::EnvironmentUnsupported,
            (from, TearingDown) => !matches!(from, TearingDown | TornDown),
            _ => false,
        }
    }

    /// Whether a runtime handle may exist in this phase.
    pub fn holds_runtime(self) -> bool {
        matches!(self, Self::Running | Self::Degraded | Self::TearingDown)
    }

    /// Whether no further progress happens for this mount until teardown.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::TerminalError(_) | Self::TornDown)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ProbingCapability => write!(f, "probing-capability"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Loading => write!(f, "loading"),
            Self::Running => write!(f, "running"),
            Self::Degraded => write!(f, "degraded"),
            Self::TerminalError(kind) => write!(f, "terminal-error({kind})"),
            Self::TearingDown => write!(f, "tearing-down"),
            Self::TornDown => write!(f, "torn-down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_supervisor_common::InstantiationFailureKind;
    use LifecyclePhase::*;

    #[test]
    fn test_happy_path() {
        let path = [Idle, ProbingCapability, Provisioning, Loading, Running, Degraded, Running];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failure_transitions() {
        let unsupported = TerminalError(FailureKind::EnvironmentUnsupported);
        let memory = TerminalError(FailureKind::Instantiation(InstantiationFailureKind::Memory));

        assert!(ProbingCapability.can_transition_to(unsupported));
        assert!(!ProbingCapability.can_transition_to(memory));
        assert!(Loading.can_transition_to(memory));
        assert!(Loading.can_transition_to(TerminalError(FailureKind::LoaderScriptUnavailable)));
        assert!(!Loading.can_transition_to(unsupported));
        assert!(Provisioning.can_transition_to(Idle));
    }

    #[test]
    fn test_teardown_from_any_live_phase() {
        let live = [
            Idle,
            ProbingCapability,
            Provisioning,
            Loading,
            Running,
            Degraded,
            TerminalError(FailureKind::LoaderScriptUnavailable),
        ];
        for phase in live {
            assert!(phase.can_transition_to(TearingDown), "{phase}");
        }
        assert!(!TearingDown.can_transition_to(TearingDown));
        assert!(!TornDown.can_transition_to(TearingDown));
        assert!(TearingDown.can_transition_to(TornDown));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!Idle.can_transition_to(Running));
        assert!(!Running.can_transition_to(Loading));
        assert!(!TornDown.can_transition_to(Idle));
        assert!(!TerminalError(FailureKind::LoaderScriptUnavailable).can_transition_to(Running));
    }

    #[test]
    fn test_holds_runtime() {
        assert!(Running.holds_runtime());
        assert!(Degraded.holds_runtime());
        assert!(!Loading.holds_runtime());
        assert!(!TornDown.holds_runtime());
    }
}
