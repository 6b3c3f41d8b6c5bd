//! Host microphone permission gateway.
//!
//! | Platform | Status query                  | Request                          |
//! |----------|-------------------------------|----------------------------------|
//! | Windows  | privacy probe on the endpoint | re-probe                         |
//! | macOS    | always `NotDetermined`        | open the default input (prompts) |
//! | other    | always `Authorized`           | open the default input           |
//!
//! Requests run on a short-lived thread and the answer is delivered on the
//! caller-facing context.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use audio_session_core::models::state::AuthorizationStatus;
use audio_session_core::traits::callback_context::CallbackContext;
use audio_session_core::traits::permission_gateway::{AuthorizationCallback, PermissionGateway};

pub struct HostPermissionGateway {
    callback_context: Arc<dyn CallbackContext>,
}

impl HostPermissionGateway {
    pub fn new(callback_context: Arc<dyn CallbackContext>) -> Self {
        Self { callback_context }
    }
}

impl PermissionGateway for HostPermissionGateway {
    fn current_authorization(&self) -> AuthorizationStatus {
        host_authorization()
    }

    fn request_authorization(&self, callback: AuthorizationCallback) {
        // Shared so the answer can still be delivered if the thread fails to spawn.
        let slot = Arc::new(Mutex::new(Some(callback)));
        let context = Arc::clone(&self.callback_context);

        let thread_slot = Arc::clone(&slot);
        let thread_context = Arc::clone(&self.callback_context);
        let spawned = thread::Builder::new()
            .name("audio-session-permission".into())
            .spawn(move || {
                let granted = request_access();
                log::info!("Microphone access {}", if granted { "granted" } else { "denied" });
                deliver(&thread_context, &thread_slot, granted);
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn permission request thread: {}", e);
            deliver(&context, &slot, false);
        }
    }
}

fn deliver(
    context: &Arc<dyn CallbackContext>,
    slot: &Arc<Mutex<Option<AuthorizationCallback>>>,
    granted: bool,
) {
    if let Some(callback) = slot.lock().take() {
        context.dispatch(Box::new(move || callback(granted)));
    }
}

/// `E_ACCESSDENIED`
const E_ACCESS_DENIED: i32 = -2147024891;

/// Whether a failed endpoint activation still leaves microphone access
/// granted.
///
/// Only an access-denied HRESULT is a privacy refusal. Anything else, such as
/// `AUDCLNT_E_DEVICE_IN_USE` from an exclusive-mode holder, is a device
/// problem that setup reports on its own.
pub fn activation_grants_access(hresult: i32) -> bool {
    hresult != E_ACCESS_DENIED
}

/// Map a privacy probe outcome to an authorization status.
///
/// A probe that could not run leaves the question open so that a request
/// gets a second chance.
pub fn status_from_probe(probe: Result<bool, String>) -> AuthorizationStatus {
    match probe {
        Ok(true) => AuthorizationStatus::Authorized,
        Ok(false) => AuthorizationStatus::Denied,
        Err(e) => {
            log::warn!("Microphone privacy probe failed: {}", e);
            AuthorizationStatus::NotDetermined
        }
    }
}

#[cfg(target_os = "windows")]
fn host_authorization() -> AuthorizationStatus {
    status_from_probe(crate::windows_privacy::probe_microphone_access())
}

#[cfg(target_os = "macos")]
fn host_authorization() -> AuthorizationStatus {
    // TCC has no query through cpal; opening the device triggers the prompt.
    AuthorizationStatus::NotDetermined
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn host_authorization() -> AuthorizationStatus {
    AuthorizationStatus::Authorized
}

#[cfg(target_os = "windows")]
fn request_access() -> bool {
    host_authorization().is_authorized()
}

/// Opening the default input's configuration is what surfaces the host
/// prompt. No device at all is not a permission problem.
#[cfg(not(target_os = "windows"))]
fn request_access() -> bool {
    use cpal::traits::{DeviceTrait, HostTrait};

    cpal::default_host()
        .default_input_device()
        .map_or(true, |device| device.default_input_config().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_session_core::executor::run_loop::RunLoop;
    use std::time::Duration;

    #[test]
    fn probe_outcomes_map_to_statuses() {
        assert_eq!(status_from_probe(Ok(true)), AuthorizationStatus::Authorized);
        assert_eq!(status_from_probe(Ok(false)), AuthorizationStatus::Denied);
        assert_eq!(
            status_from_probe(Err("CoInitializeEx failed".into())),
            AuthorizationStatus::NotDetermined
        );
    }

    #[test]
    fn only_access_denied_counts_as_refusal() {
        // E_ACCESSDENIED
        assert!(!activation_grants_access(-2147024891));
        // AUDCLNT_E_DEVICE_IN_USE
        assert!(activation_grants_access(-2004287478));
        // AUDCLNT_E_DEVICE_INVALIDATED
        assert!(activation_grants_access(-2004287484));
    }

    #[test]
    fn request_answer_arrives_on_callback_context() {
        let run_loop = RunLoop::new();
        let gateway = HostPermissionGateway::new(Arc::new(run_loop.handle()));

        let caller = thread::current().id();
        let answer = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&answer);
        gateway.request_authorization(Box::new(move |granted| {
            *sink.lock() = Some((granted, thread::current().id()));
        }));

        assert!(run_loop.run_until(Duration::from_secs(10), || answer.lock().is_some()));
        let (_, delivered_on) = answer.lock().take().unwrap();
        assert_eq!(delivered_on, caller);
    }
}
