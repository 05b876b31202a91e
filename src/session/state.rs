use crate::foundation::error::{ArError, ErrorCode};

/// Which subsystem of the session is active.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SessionState {
    /// Probing render and camera capability.
    CheckingCompatibility,
    /// Marker pipeline running.
    Ready,
    /// QR scanner running instead of the marker pipeline.
    Scanning,
    /// Fatal failure; only a retry leaves this state.
    Error {
        /// Error category.
        code: ErrorCode,
        /// Diagnostic detail.
        message: String,
    },
}

impl SessionState {
    /// Error state for `err`.
    pub fn from_error(err: &ArError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Error code when in [`SessionState::Error`].
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Short name, e.g. `checking-compatibility`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckingCompatibility => "checking-compatibility",
            Self::Ready => "ready",
            Self::Scanning => "scanning",
            Self::Error { .. } => "error",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error { code, message } => write!(f, "error ({code}): {message}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Inputs to the session state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Render and camera probes succeeded.
    CompatibilityPassed,
    /// A fatal error occurred.
    Failed {
        /// Error category.
        code: ErrorCode,
        /// Diagnostic detail.
        message: String,
    },
    /// User asked to scan a campaign code.
    ScanRequested,
    /// A valid payload was scanned.
    ScanCompleted,
    /// User left scan mode without a payload.
    ScanCancelled,
    /// User pressed retry on the error screen.
    Retry,
}

/// Pure transition function. `None` means the event does not apply in `state`.
pub fn next_state(state: &SessionState, event: &SessionEvent) -> Option<SessionState> {
    use SessionEvent as E;
    use SessionState as S;
    match (state, event) {
        (S::Error { .. }, E::Retry) => Some(S::CheckingCompatibility),
        (S::Error { .. }, _) => None,
        (_, E::Failed { code, message }) => Some(S::Error {
            code: *code,
            message: message.clone(),
        }),
        (S::CheckingCompatibility, E::CompatibilityPassed) => Some(S::Ready),
        (S::Ready, E::ScanRequested) => Some(S::Scanning),
        (S::Scanning, E::ScanCompleted | E::ScanCancelled) => Some(S::Ready),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/state.rs"]
mod tests;
