//! # audio-session-cpal
//!
//! cpal backend for audio-session-kit.
//!
//! Provides:
//! - `CpalCaptureEngine`: `CaptureEngine` over the default cpal host's default input
//! - `HostPermissionGateway`: microphone permission per platform
//! - `RouteMonitor`: polls the default input and reports route changes
//! - `classify_port`: infers the port kind from a device name
//!
//! ## Platform Notes
//! - Windows: permission status comes from probing the capture endpoint (WASAPI)
//! - macOS: the first stream open triggers the TCC prompt
//! - Linux: ALSA/PulseAudio impose no permission model
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_session_core::{CaptureSessionManager, RunLoop, SessionConfiguration};
//! use audio_session_cpal::{CpalCaptureEngine, HostPermissionGateway};
//!
//! let run_loop = RunLoop::new();
//! let context = Arc::new(run_loop.handle());
//! let gateway = Arc::new(HostPermissionGateway::new(context.clone()));
//! let manager = CaptureSessionManager::new(
//!     CpalCaptureEngine::default(),
//!     gateway,
//!     context,
//!     SessionConfiguration::default(),
//! )?;
//! manager.request_access_and_setup(|result| println!("setup: {}", result));
//! ```

pub mod engine;
pub mod permissions;
pub mod port;
pub mod route_monitor;
#[cfg(target_os = "windows")]
mod windows_privacy;

pub use engine::{CpalCaptureEngine, CpalDevice, CpalDeviceInput, CpalEngineOptions};
pub use permissions::HostPermissionGateway;
pub use port::classify_port;
pub use route_monitor::{diff_routes, RouteMonitor, DEFAULT_POLL_INTERVAL};
