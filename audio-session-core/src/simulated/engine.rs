use std::sync::Arc;

use parking_lot::Mutex;

use crate::bridge::output::AudioDataOutput;
use crate::models::audio_models::{AudioBufferList, SampleBuffer};
use crate::models::error::EngineError;
use crate::models::route::{AudioPortType, AudioRoute};
use crate::traits::capture_engine::CaptureEngine;

const SIMULATED_SAMPLE_RATE: f64 = 48000.0;
const SIMULATED_FRAMES: usize = 480;

/// A simulated physical input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDevice {
    pub name: String,
    pub channels: u32,
    pub port_type: AudioPortType,
}

impl SimulatedDevice {
    pub fn built_in_mic() -> Self {
        Self {
            name: "Built-in Microphone".into(),
            channels: 1,
            port_type: AudioPortType::BuiltInMic,
        }
    }

    pub fn usb_interface(channels: u32) -> Self {
        Self {
            name: format!("USB Audio Interface ({}ch)", channels),
            channels,
            port_type: AudioPortType::UsbAudio,
        }
    }

    pub fn route(&self) -> AudioRoute {
        AudioRoute::with_input(self.name.clone(), self.port_type)
    }
}

/// A device bound to the simulated engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedInput {
    pub id: u64,
    pub device: SimulatedDevice,
}

/// One call the session made into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    BeginConfiguration,
    CommitConfiguration,
    AddOutput,
    CreateInput(String),
    AddInput(u64),
    RemoveInput(u64),
    StartRunning,
    StopRunning,
}

#[derive(Default)]
struct SimState {
    default_device: Option<SimulatedDevice>,
    reject_output: bool,
    reject_input: bool,
    fail_create_input: bool,
    refuse_start: bool,
    refuse_stop: bool,
    stop_on_input_change: bool,
    panic_on_create_input: bool,
    panic_on_start: bool,

    transaction_depth: usize,
    inputs_changed: bool,
    mutations_outside_transaction: usize,
    output: Option<AudioDataOutput>,
    inputs: Vec<SimulatedInput>,
    running: bool,
    next_input_id: u64,
    journal: Vec<EngineCall>,
}

impl SimState {
    fn mutate(&mut self, call: EngineCall) {
        if self.transaction_depth == 0 {
            log::warn!("Simulated engine mutated outside a configuration transaction: {:?}", call);
            self.mutations_outside_transaction += 1;
        }
        self.journal.push(call);
    }
}

/// In-memory [`CaptureEngine`].
///
/// The engine is moved into the session; the paired
/// [`SimulatedEngineHandle`] stays with the caller to steer and inspect it.
pub struct SimulatedCaptureEngine {
    state: Arc<Mutex<SimState>>,
}

/// Control side of a [`SimulatedCaptureEngine`].
#[derive(Clone)]
pub struct SimulatedEngineHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedCaptureEngine {
    pub fn new(default_device: Option<SimulatedDevice>) -> (Self, SimulatedEngineHandle) {
        let state = Arc::new(Mutex::new(SimState {
            default_device,
            ..Default::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedEngineHandle { state },
        )
    }
}

impl CaptureEngine for SimulatedCaptureEngine {
    type Device = SimulatedDevice;
    type Input = SimulatedInput;

    fn begin_configuration(&mut self) {
        let mut s = self.state.lock();
        s.transaction_depth += 1;
        s.journal.push(EngineCall::BeginConfiguration);
    }

    fn commit_configuration(&mut self) {
        let mut s = self.state.lock();
        if s.transaction_depth == 0 {
            log::warn!("Simulated engine committed without a matching begin");
        }
        s.transaction_depth = s.transaction_depth.saturating_sub(1);
        s.journal.push(EngineCall::CommitConfiguration);
        if s.transaction_depth == 0 && std::mem::take(&mut s.inputs_changed) && s.stop_on_input_change {
            log::warn!("Simulated engine lost capture applying the input change");
            s.running = false;
        }
    }

    fn can_add_output(&self, _output: &AudioDataOutput) -> bool {
        let s = self.state.lock();
        !s.reject_output && s.output.is_none()
    }

    fn add_output(&mut self, output: AudioDataOutput) {
        let mut s = self.state.lock();
        s.mutate(EngineCall::AddOutput);
        s.output = Some(output);
    }

    fn default_input_device(&self) -> Option<SimulatedDevice> {
        self.state.lock().default_device.clone()
    }

    fn create_input(&self, device: SimulatedDevice) -> Result<SimulatedInput, EngineError> {
        let mut s = self.state.lock();
        s.journal.push(EngineCall::CreateInput(device.name.clone()));
        if s.panic_on_create_input {
            panic!("simulated driver fault creating input for {}", device.name);
        }
        if s.fail_create_input {
            return Err(EngineError::InputRejected(format!("{} is busy", device.name)));
        }
        s.next_input_id += 1;
        Ok(SimulatedInput {
            id: s.next_input_id,
            device,
        })
    }

    fn can_add_input(&self, _input: &SimulatedInput) -> bool {
        let s = self.state.lock();
        !s.reject_input && s.inputs.is_empty()
    }

    fn add_input(&mut self, input: SimulatedInput) {
        let mut s = self.state.lock();
        s.mutate(EngineCall::AddInput(input.id));
        s.inputs_changed = true;
        s.inputs.push(input);
    }

    fn remove_input(&mut self, input: &SimulatedInput) {
        let mut s = self.state.lock();
        s.mutate(EngineCall::RemoveInput(input.id));
        s.inputs_changed = true;
        s.inputs.retain(|attached| attached.id != input.id);
    }

    fn start_running(&mut self) {
        let mut s = self.state.lock();
        s.journal.push(EngineCall::StartRunning);
        if s.panic_on_start {
            panic!("simulated driver fault starting capture");
        }
        if !s.refuse_start {
            s.running = true;
        }
    }

    fn stop_running(&mut self) {
        let mut s = self.state.lock();
        s.journal.push(EngineCall::StopRunning);
        if !s.refuse_stop {
            s.running = false;
        }
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

impl SimulatedEngineHandle {
    pub fn set_default_device(&self, device: Option<SimulatedDevice>) {
        self.state.lock().default_device = device;
    }

    pub fn set_reject_output(&self, reject: bool) {
        self.state.lock().reject_output = reject;
    }

    pub fn set_reject_input(&self, reject: bool) {
        self.state.lock().reject_input = reject;
    }

    pub fn set_fail_create_input(&self, fail: bool) {
        self.state.lock().fail_create_input = fail;
    }

    pub fn set_refuse_start(&self, refuse: bool) {
        self.state.lock().refuse_start = refuse;
    }

    pub fn set_refuse_stop(&self, refuse: bool) {
        self.state.lock().refuse_stop = refuse;
    }

    /// Drop capture whenever a committed transaction changed the inputs, as
    /// a backend does when it cannot restart its stream on the new device.
    pub fn set_stop_on_input_change(&self, stop: bool) {
        self.state.lock().stop_on_input_change = stop;
    }

    pub fn set_panic_on_create_input(&self, panic: bool) {
        self.state.lock().panic_on_create_input = panic;
    }

    pub fn set_panic_on_start(&self, panic: bool) {
        self.state.lock().panic_on_start = panic;
    }

    pub fn journal(&self) -> Vec<EngineCall> {
        self.state.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    pub fn count_calls(&self, call: &EngineCall) -> usize {
        self.state.lock().journal.iter().filter(|c| *c == call).count()
    }

    pub fn attached_inputs(&self) -> Vec<SimulatedInput> {
        self.state.lock().inputs.clone()
    }

    pub fn has_output(&self) -> bool {
        self.state.lock().output.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn transaction_depth(&self) -> usize {
        self.state.lock().transaction_depth
    }

    pub fn mutations_outside_transaction(&self) -> usize {
        self.state.lock().mutations_outside_transaction
    }

    /// Current route as the host would report it.
    pub fn current_route(&self) -> AudioRoute {
        let s = self.state.lock();
        s.inputs
            .first()
            .map(|input| input.device.route())
            .unwrap_or_default()
    }

    /// Capture one buffer from the attached input, as the hardware would.
    ///
    /// Returns false when nothing is captured: the engine is stopped, or has
    /// no output or input.
    pub fn capture_buffer(&self) -> bool {
        let (output, channels) = {
            let s = self.state.lock();
            let (Some(output), Some(input)) = (s.output.clone(), s.inputs.first()) else {
                return false;
            };
            if !s.running {
                return false;
            }
            (output, input.device.channels)
        };

        let bytes = channels * 4 * SIMULATED_FRAMES as u32;
        output.emit(SampleBuffer::new(
            AudioBufferList::interleaved(channels, bytes),
            SIMULATED_FRAMES,
            SIMULATED_SAMPLE_RATE,
        ));
        true
    }
}
