use std::sync::Arc;

use parking_lot::Mutex;

use crate::bridge::output::AudioDataOutput;
use crate::models::audio_models::SessionDiagnostics;
use crate::models::error::SessionError;
use crate::traits::capture_engine::CaptureEngine;

/// Begin/commit bracket around engine input and output changes.
///
/// Commits on drop, so every exit path (including `?` returns) leaves the
/// engine with a balanced transaction.
pub(crate) struct ConfigurationTransaction<'a, E: CaptureEngine> {
    engine: &'a mut E,
}

impl<'a, E: CaptureEngine> ConfigurationTransaction<'a, E> {
    pub(crate) fn begin(engine: &'a mut E) -> Self {
        engine.begin_configuration();
        Self { engine }
    }

    pub(crate) fn add_output(&mut self, output: &AudioDataOutput) -> Result<(), SessionError> {
        if !self.engine.can_add_output(output) {
            log::warn!("Engine rejected audio data output {}", output.id());
            return Err(SessionError::UnableToAddCaptureDataOutput);
        }
        self.engine.add_output(output.clone());
        Ok(())
    }

    /// Bind the current default input device and attach it.
    pub(crate) fn attach_default_input(&mut self) -> Result<E::Input, SessionError> {
        let device = self.engine.default_input_device().ok_or_else(|| {
            log::warn!("No default audio input device");
            SessionError::UnableToCreateCaptureDevice
        })?;

        let input = self.engine.create_input(device).map_err(|e| {
            log::warn!("Failed to create device input: {}", e);
            SessionError::UnableToAddCaptureDeviceInput
        })?;

        if !self.engine.can_add_input(&input) {
            log::warn!("Engine rejected device input");
            return Err(SessionError::UnableToAddCaptureDeviceInput);
        }
        self.engine.add_input(input.clone());
        Ok(input)
    }

    pub(crate) fn remove_input(&mut self, input: &E::Input) {
        self.engine.remove_input(input);
    }
}

impl<E: CaptureEngine> Drop for ConfigurationTransaction<'_, E> {
    fn drop(&mut self) {
        self.engine.commit_configuration();
    }
}

/// The engine together with what the session has attached to it.
///
/// Lives behind the manager's mutex and is only touched from the serial
/// executor.
pub(crate) struct SessionGraph<E: CaptureEngine> {
    engine: E,
    output: Option<AudioDataOutput>,
    current_input: Option<E::Input>,
    diagnostics: Arc<Mutex<SessionDiagnostics>>,
}

impl<E: CaptureEngine> SessionGraph<E> {
    pub(crate) fn new(engine: E, diagnostics: Arc<Mutex<SessionDiagnostics>>) -> Self {
        Self {
            engine,
            output: None,
            current_input: None,
            diagnostics,
        }
    }

    /// Initial configuration: the single audio output plus a default-device
    /// input, in one transaction.
    pub(crate) fn configure(&mut self, output: &AudioDataOutput) -> Result<(), SessionError> {
        self.diagnostics.lock().configuration_transactions += 1;

        let mut transaction = ConfigurationTransaction::begin(&mut self.engine);
        transaction.add_output(output)?;
        self.output = Some(output.clone());

        let input = transaction.attach_default_input()?;
        self.current_input = Some(input);
        Ok(())
    }

    /// Detach the current input and attach a fresh default-device input.
    ///
    /// Safe while running. On failure the session is left with no input.
    /// Capture that was running must still be running after the commit.
    pub(crate) fn refresh_input(&mut self) -> Result<(), SessionError> {
        self.diagnostics.lock().configuration_transactions += 1;
        let was_running = self.engine.is_running();

        let input = {
            let mut transaction = ConfigurationTransaction::begin(&mut self.engine);
            if let Some(previous) = self.current_input.take() {
                transaction.remove_input(&previous);
            }
            transaction.attach_default_input()?
        };
        self.current_input = Some(input);
        self.diagnostics.lock().input_swaps += 1;

        if was_running && !self.engine.is_running() {
            log::warn!("Capture stopped while switching to the new input");
            return Err(SessionError::UnableToAddCaptureDeviceInput);
        }
        Ok(())
    }

    pub(crate) fn start(&mut self) -> Result<(), SessionError> {
        if self.engine.is_running() {
            log::debug!("Capture already running");
            return Ok(());
        }

        self.engine.start_running();
        if self.engine.is_running() {
            Ok(())
        } else {
            Err(SessionError::UnableToStartSession)
        }
    }

    pub(crate) fn stop(&mut self) -> Result<(), SessionError> {
        if !self.engine.is_running() {
            log::debug!("Capture already stopped");
            return Ok(());
        }

        self.engine.stop_running();
        if self.engine.is_running() {
            Err(SessionError::UnableToStopSession)
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.engine.is_running()
    }
}
