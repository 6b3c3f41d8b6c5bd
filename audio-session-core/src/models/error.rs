use thiserror::Error;

/// Errors reported through session operation completions.
///
/// Every kind is specific so callers can branch on it; none of them are
/// raised across the caller-facing context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no default audio capture device is available")]
    UnableToCreateCaptureDevice,

    #[error("capture engine rejected the audio device input")]
    UnableToAddCaptureDeviceInput,

    #[error("capture engine rejected the audio data output")]
    UnableToAddCaptureDataOutput,

    #[error("capture session is not set up")]
    CaptureSessionIsNotSetup,

    #[error("capture session did not start running")]
    UnableToStartSession,

    #[error("capture session did not stop running")]
    UnableToStopSession,

    #[error("session worker unavailable: {0}")]
    ExecutorUnavailable(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

/// Errors raised by a capture engine backend.
///
/// These never reach callers directly; the session translates them into a
/// [`SessionError`] on the serial executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("input rejected: {0}")]
    InputRejected(String),

    #[error("stream failed: {0}")]
    StreamFailed(String),
}

/// Errors loading or validating a [`SessionConfiguration`](super::config::SessionConfiguration).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
