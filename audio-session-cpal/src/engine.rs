//! cpal capture engine.
//!
//! Binds the host's default input device and feeds every captured callback
//! into the session's [`AudioDataOutput`] as a [`SampleBuffer`].
//!
//! `cpal::Stream` cannot leave the thread that built it, so each running
//! stream lives on a dedicated `audio-session-stream` thread that parks until
//! told to stop. Input changes made inside a configuration transaction take
//! effect at commit: if capture is running the stream thread is replaced,
//! otherwise the new input is simply remembered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use crossbeam_channel::{bounded, Sender};
use uuid::Uuid;

use audio_session_core::bridge::output::AudioDataOutput;
use audio_session_core::models::audio_models::{AudioBufferList, SampleBuffer};
use audio_session_core::models::error::EngineError;
use audio_session_core::models::route::AudioPortType;
use audio_session_core::traits::capture_engine::CaptureEngine;

use crate::port::classify_port;

/// Tunables for [`CpalCaptureEngine`].
#[derive(Debug, Clone)]
pub struct CpalEngineOptions {
    /// How long `start_running` waits for the stream thread to report that
    /// the stream is playing.
    pub stream_start_timeout: Duration,
}

impl Default for CpalEngineOptions {
    fn default() -> Self {
        Self {
            stream_start_timeout: Duration::from_millis(2000),
        }
    }
}

/// A physical input device as reported by the default host.
pub struct CpalDevice {
    device: cpal::Device,
    name: String,
}

impl CpalDevice {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A device bound to the engine with its default input configuration.
#[derive(Clone)]
pub struct CpalDeviceInput {
    id: Uuid,
    device: cpal::Device,
    name: String,
    port_type: AudioPortType,
    config: cpal::SupportedStreamConfig,
}

impl CpalDeviceInput {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port_type(&self) -> AudioPortType {
        self.port_type
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }
}

struct StreamWorker {
    input_id: Uuid,
    stop: Sender<()>,
    handle: thread::JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl StreamWorker {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn shutdown(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            log::error!("Stream thread for input {} panicked", self.input_id);
        }
    }
}

/// [`CaptureEngine`] over the cpal default host.
pub struct CpalCaptureEngine {
    options: CpalEngineOptions,
    output: Option<AudioDataOutput>,
    input: Option<CpalDeviceInput>,
    transaction_depth: usize,
    input_changed: bool,
    /// Capture was requested and not stopped since. Stays set while the
    /// session briefly has no input during a swap.
    running: bool,
    worker: Option<StreamWorker>,
}

impl CpalCaptureEngine {
    pub fn new(options: CpalEngineOptions) -> Self {
        Self {
            options,
            output: None,
            input: None,
            transaction_depth: 0,
            input_changed: false,
            running: false,
            worker: None,
        }
    }

    /// The currently attached input, if any.
    pub fn input(&self) -> Option<&CpalDeviceInput> {
        self.input.as_ref()
    }

    fn apply_input_change(&mut self) {
        if !self.input_changed {
            return;
        }
        self.input_changed = false;

        if !self.running {
            return;
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        if self.input.is_none() {
            log::warn!("Input detached while running; capture idle until an input is attached");
            return;
        }
        if let Err(e) = self.spawn_worker() {
            log::error!("Failed to restart capture on the new input: {}", e);
            self.running = false;
        }
    }

    fn spawn_worker(&mut self) -> Result<(), EngineError> {
        let (Some(input), Some(output)) = (self.input.clone(), self.output.clone()) else {
            return Err(EngineError::StreamFailed("no input or output attached".into()));
        };

        let worker = spawn_stream_worker(input, output, self.options.stream_start_timeout)?;
        self.worker = Some(worker);
        Ok(())
    }
}

impl Default for CpalCaptureEngine {
    fn default() -> Self {
        Self::new(CpalEngineOptions::default())
    }
}

impl CaptureEngine for CpalCaptureEngine {
    type Device = CpalDevice;
    type Input = CpalDeviceInput;

    fn begin_configuration(&mut self) {
        self.transaction_depth += 1;
    }

    fn commit_configuration(&mut self) {
        if self.transaction_depth == 0 {
            log::warn!("commit_configuration without matching begin_configuration");
            return;
        }
        self.transaction_depth -= 1;
        if self.transaction_depth == 0 {
            self.apply_input_change();
        }
    }

    fn can_add_output(&self, _output: &AudioDataOutput) -> bool {
        self.output.is_none()
    }

    fn add_output(&mut self, output: AudioDataOutput) {
        self.output = Some(output);
    }

    fn default_input_device(&self) -> Option<CpalDevice> {
        let device = cpal::default_host().default_input_device()?;
        let name = device.name().unwrap_or_else(|_| "Unknown input".into());
        Some(CpalDevice { device, name })
    }

    fn create_input(&self, device: CpalDevice) -> Result<CpalDeviceInput, EngineError> {
        let config = device
            .device
            .default_input_config()
            .map_err(|e| EngineError::InputRejected(format!("{}: {}", device.name, e)))?;

        let port_type = classify_port(&device.name);
        log::info!(
            "Bound input '{}' ({:?}): {} ch, {:?}, {} Hz",
            device.name,
            port_type,
            config.channels(),
            config.sample_format(),
            config.sample_rate().0
        );

        Ok(CpalDeviceInput {
            id: Uuid::new_v4(),
            device: device.device,
            name: device.name,
            port_type,
            config,
        })
    }

    fn can_add_input(&self, input: &CpalDeviceInput) -> bool {
        self.input.is_none() && input.channels() > 0
    }

    fn add_input(&mut self, input: CpalDeviceInput) {
        self.input = Some(input);
        self.input_changed = true;
        if self.transaction_depth == 0 {
            self.apply_input_change();
        }
    }

    fn remove_input(&mut self, input: &CpalDeviceInput) {
        if self.input.as_ref().is_some_and(|current| current.id == input.id) {
            self.input = None;
            self.input_changed = true;
            if self.transaction_depth == 0 {
                self.apply_input_change();
            }
        }
    }

    fn start_running(&mut self) {
        if self.is_running() {
            return;
        }
        if let Some(stale) = self.worker.take() {
            stale.shutdown();
        }
        match self.spawn_worker() {
            Ok(()) => self.running = true,
            Err(e) => log::error!("Failed to start capture: {}", e),
        }
    }

    fn stop_running(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running && self.worker.as_ref().map_or(true, StreamWorker::is_alive)
    }
}

impl Drop for CpalCaptureEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

/// Spawn a thread owning a playing input stream and wait for it to report in.
fn spawn_stream_worker(
    input: CpalDeviceInput,
    output: AudioDataOutput,
    timeout: Duration,
) -> Result<StreamWorker, EngineError> {
    let (ready_tx, ready_rx) = bounded::<Result<(), EngineError>>(1);
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let alive = Arc::new(AtomicBool::new(false));
    let input_id = input.id;

    let thread_alive = Arc::clone(&alive);
    let handle = thread::Builder::new()
        .name("audio-session-stream".into())
        .spawn(move || {
            let stream = match build_input_stream_dispatch(&input, output, Arc::clone(&thread_alive)) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(EngineError::StreamFailed(format!("play failed: {}", e))));
                return;
            }

            thread_alive.store(true, Ordering::SeqCst);
            let _ = ready_tx.send(Ok(()));
            log::debug!("Stream for '{}' playing", input.name);

            // Either an explicit stop or the engine dropping the sender.
            let _ = stop_rx.recv();
            thread_alive.store(false, Ordering::SeqCst);
            drop(stream);
            log::debug!("Stream for '{}' stopped", input.name);
        })
        .map_err(|e| EngineError::StreamFailed(format!("failed to spawn stream thread: {}", e)))?;

    match ready_rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(StreamWorker {
            input_id,
            stop: stop_tx,
            handle,
            alive,
        }),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            // The thread exits on its own once it sees the stop sender gone.
            drop(stop_tx);
            Err(EngineError::StreamFailed(format!(
                "stream did not start within {} ms",
                timeout.as_millis()
            )))
        }
    }
}

fn build_input_stream_dispatch(
    input: &CpalDeviceInput,
    output: AudioDataOutput,
    alive: Arc<AtomicBool>,
) -> Result<cpal::Stream, EngineError> {
    let config: cpal::StreamConfig = input.config.config();
    match input.config.sample_format() {
        SampleFormat::F32 => build_input_stream::<f32>(&input.device, &config, output, alive),
        SampleFormat::I16 => build_input_stream::<i16>(&input.device, &config, output, alive),
        SampleFormat::U16 => build_input_stream::<u16>(&input.device, &config, output, alive),
        SampleFormat::I32 => build_input_stream::<i32>(&input.device, &config, output, alive),
        SampleFormat::U8 => build_input_stream::<u8>(&input.device, &config, output, alive),
        format => Err(EngineError::StreamFailed(format!(
            "unsupported sample format: {:?}",
            format
        ))),
    }
}

fn build_input_stream<T: SizedSample + Send + 'static>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    output: AudioDataOutput,
    alive: Arc<AtomicBool>,
) -> Result<cpal::Stream, EngineError> {
    let channels = u32::from(config.channels);
    let sample_rate = f64::from(config.sample_rate.0);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                output.emit(sample_buffer_for(data.len(), std::mem::size_of::<T>(), channels, sample_rate));
            },
            move |err| {
                log::error!("Capture stream error: {}", err);
                alive.store(false, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| EngineError::StreamFailed(format!("failed to build input stream: {}", e)))
}

/// Describe one interleaved callback of `samples` values as a sample buffer.
fn sample_buffer_for(samples: usize, sample_size: usize, channels: u32, sample_rate: f64) -> SampleBuffer {
    let frame_count = if channels == 0 { 0 } else { samples / channels as usize };
    let byte_size = u32::try_from(samples * sample_size).unwrap_or(u32::MAX);
    SampleBuffer::new(AudioBufferList::interleaved(channels, byte_size), frame_count, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_becomes_interleaved_buffer() {
        let buffer = sample_buffer_for(960, 4, 2, 48_000.0);
        assert_eq!(buffer.frame_count, 480);
        assert_eq!(buffer.sample_rate, 48_000.0);
        let first = buffer.buffer_list.first().unwrap();
        assert_eq!(first.number_channels, 2);
        assert_eq!(first.data_byte_size, 3840);
    }

    #[test]
    fn zero_channel_callback_has_no_frames() {
        let buffer = sample_buffer_for(128, 2, 0, 44_100.0);
        assert_eq!(buffer.frame_count, 0);
    }

    #[test]
    fn unconfigured_engine_refuses_to_start() {
        let mut engine = CpalCaptureEngine::default();
        engine.start_running();
        assert!(!engine.is_running());

        engine.stop_running();
        assert!(!engine.is_running());
    }

    #[test]
    fn single_output_slot() {
        let mut engine = CpalCaptureEngine::default();
        let output = AudioDataOutput::new();
        assert!(engine.can_add_output(&output));
        engine.add_output(output);
        assert!(!engine.can_add_output(&AudioDataOutput::new()));
    }

    #[test]
    fn unbalanced_commit_is_ignored() {
        let mut engine = CpalCaptureEngine::default();
        engine.commit_configuration();
        engine.begin_configuration();
        engine.commit_configuration();
        assert_eq!(engine.transaction_depth, 0);
    }
}
