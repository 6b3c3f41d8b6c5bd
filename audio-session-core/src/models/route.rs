use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of hardware port carrying an audio input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioPortType {
    BuiltInMic,
    HeadsetMic,
    LineIn,
    BluetoothHfp,
    /// External (USB) audio interface.
    UsbAudio,
    Unknown,
}

impl AudioPortType {
    /// Whether this port is the distinguished external audio interface.
    pub fn is_external_interface(&self) -> bool {
        matches!(self, Self::UsbAudio)
    }
}

/// One port in an audio route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPortDescription {
    pub name: String,
    pub port_type: AudioPortType,
}

/// The set of active input ports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioRoute {
    pub inputs: Vec<AudioPortDescription>,
}

impl AudioRoute {
    pub fn with_input(name: impl Into<String>, port_type: AudioPortType) -> Self {
        Self {
            inputs: vec![AudioPortDescription {
                name: name.into(),
                port_type,
            }],
        }
    }

    /// Port type of the active (first) input, if any.
    pub fn input_port_type(&self) -> Option<AudioPortType> {
        self.inputs.first().map(|port| port.port_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteChangeReason {
    NewDeviceAvailable,
    OldDeviceUnavailable,
    Override,
    Unknown,
}

/// A hardware route change as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteChange {
    pub reason: RouteChangeReason,
    pub previous: AudioRoute,
    pub current: AudioRoute,
    pub observed_at: DateTime<Utc>,
}

impl RouteChange {
    pub fn new(reason: RouteChangeReason, previous: AudioRoute, current: AudioRoute) -> Self {
        Self {
            reason,
            previous,
            current,
            observed_at: Utc::now(),
        }
    }
}
