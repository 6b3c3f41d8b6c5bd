use crate::bridge::output::AudioDataOutput;
use crate::models::error::EngineError;

/// The OS-level capture pipeline driven by the session.
///
/// Implemented by:
/// - `SimulatedCaptureEngine` (in-memory, this crate)
/// - `CpalCaptureEngine` (audio-session-cpal)
///
/// The session owns the engine exclusively and calls it only from its serial
/// executor, so implementations need `Send` but not `Sync`. Input and output
/// changes are always bracketed by `begin_configuration` /
/// `commit_configuration`; an engine applies them atomically at commit.
pub trait CaptureEngine: Send + 'static {
    /// A physical input device.
    type Device: Send;

    /// Binding of a device to this engine. Cloned handles refer to the same
    /// binding.
    type Input: Clone + Send;

    fn begin_configuration(&mut self);

    fn commit_configuration(&mut self);

    fn can_add_output(&self, output: &AudioDataOutput) -> bool;

    fn add_output(&mut self, output: AudioDataOutput);

    /// The system default audio input device, if one exists.
    fn default_input_device(&self) -> Option<Self::Device>;

    fn create_input(&self, device: Self::Device) -> Result<Self::Input, EngineError>;

    fn can_add_input(&self, input: &Self::Input) -> bool;

    fn add_input(&mut self, input: Self::Input);

    fn remove_input(&mut self, input: &Self::Input);

    /// Start the pipeline. Success is observed through [`is_running`](Self::is_running).
    fn start_running(&mut self);

    /// Stop the pipeline. Success is observed through [`is_running`](Self::is_running).
    fn stop_running(&mut self);

    fn is_running(&self) -> bool;
}
