use serde::{Deserialize, Serialize};

/// Outcome of the one-shot permission-gated session setup.
///
/// State transitions:
/// ```text
/// none → noAccessToMic
///      → success  (stopped ⇄ running)
///      → failed
/// ```
///
/// Once a value other than `None` is recorded it never changes for the
/// lifetime of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupResult {
    #[default]
    None,
    /// Reserved. Never produced by the audio-only pipeline.
    NoAccessToCamera,
    NoAccessToMic,
    Success,
    Failed,
}

impl SetupResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for SetupResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupResult::None => write!(f, "none"),
            SetupResult::NoAccessToCamera => write!(f, "no_access_to_camera"),
            SetupResult::NoAccessToMic => write!(f, "no_access_to_mic"),
            SetupResult::Success => write!(f, "success"),
            SetupResult::Failed => write!(f, "failed"),
        }
    }
}

/// Microphone authorization as reported by a permission gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Authorized,
    /// The user has not been asked yet.
    NotDetermined,
    Denied,
    /// Blocked by policy (parental controls, MDM, privacy settings).
    Restricted,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }
}
