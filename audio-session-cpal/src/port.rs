//! Port classification for cpal input devices.
//!
//! cpal exposes only a device name, so the port kind is inferred from it.
//! Names carry the enumerator hints the host puts there (`USB`, `BTHENUM`,
//! `bluez`, ...) on Windows and Linux, and product names on macOS.

use audio_session_core::models::route::{AudioPortType, AudioRoute};

const USB_HINTS: &[&str] = &["usb", "scarlett", "focusrite", "audient", "motu", "behringer", "presonus", "steinberg"];
const BLUETOOTH_HINTS: &[&str] = &["bluetooth", "bthenum", "bthleenum", "bluez", "airpods", "hands-free", "handsfree"];
const HEADSET_HINTS: &[&str] = &["headset", "headphone"];
const LINE_IN_HINTS: &[&str] = &["line in", "line-in", "linein"];
const BUILT_IN_HINTS: &[&str] = &["built-in", "builtin", "internal", "macbook", "microphone array"];

/// Classify an input device by name.
///
/// Bluetooth wins over headset so that a Bluetooth headset is reported as
/// the hands-free profile it actually records through.
pub fn classify_port(device_name: &str) -> AudioPortType {
    let name = device_name.to_lowercase();
    let matches = |hints: &[&str]| hints.iter().any(|hint| name.contains(hint));

    if matches(USB_HINTS) {
        AudioPortType::UsbAudio
    } else if matches(BLUETOOTH_HINTS) {
        AudioPortType::BluetoothHfp
    } else if matches(HEADSET_HINTS) {
        AudioPortType::HeadsetMic
    } else if matches(LINE_IN_HINTS) {
        AudioPortType::LineIn
    } else if matches(BUILT_IN_HINTS) {
        AudioPortType::BuiltInMic
    } else {
        AudioPortType::Unknown
    }
}

/// Route for a single named default input.
pub fn route_for_device(device_name: &str) -> AudioRoute {
    AudioRoute::with_input(device_name, classify_port(device_name))
}
