use crate::models::error::SessionError;
use crate::models::state::SetupResult;

/// Boxed completion handler for an asynchronous session operation.
pub type Completion<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Asynchronous capture session interface.
///
/// Every method returns immediately; the outcome arrives on the
/// caller-facing context through the completion.
pub trait CaptureSession: Send + Sync {
    /// Current setup outcome. `None` until the first setup finishes.
    fn setup_result(&self) -> SetupResult;

    /// Ask for microphone access and configure the session once.
    fn request_access_and_setup(&self, completion: Completion<SetupResult>);

    /// Start capture. No-op success when already running.
    fn start_running(&self, completion: Completion<Result<(), SessionError>>);

    /// Stop capture. No-op success when already stopped.
    fn stop_running(&self, completion: Completion<Result<(), SessionError>>);

    /// Swap the active input for a fresh default-device input, live.
    fn refresh_audio(&self, completion: Completion<Result<(), SessionError>>);
}
