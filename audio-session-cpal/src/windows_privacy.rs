//! Windows microphone privacy probe.
//!
//! On Windows 10 1803+ microphone access is governed by Settings > Privacy >
//! Microphone. Unpackaged desktop apps get no consent dialog, so the only
//! signal is whether the default capture endpoint can be activated.

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use crate::permissions::activation_grants_access;

/// Whether the default capture endpoint can be opened.
///
/// `Ok(true)` when no capture endpoint exists: there is nothing to deny, and
/// setup reports the missing device on its own.
pub fn probe_microphone_access() -> Result<bool, String> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| format!("CoInitializeEx failed: {}", e))?;
        let _com_guard = CoUninitializeGuard;

        let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| format!("failed to create enumerator: {}", e))?;

        let device = match enumerator.GetDefaultAudioEndpoint(eCapture, eConsole) {
            Ok(device) => device,
            Err(_) => return Ok(true),
        };

        let activated: windows::core::Result<IAudioClient> = device.Activate(CLSCTX_ALL, None);
        match activated {
            Ok(_) => Ok(true),
            Err(e) => {
                log::debug!("Default capture endpoint activation failed: {}", e);
                Ok(activation_grants_access(e.code().0))
            }
        }
    }
}

struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
