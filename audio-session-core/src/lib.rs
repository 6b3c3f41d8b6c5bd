//! # audio-session-core
//!
//! Platform-agnostic audio capture session core.
//!
//! Manages the lifecycle of a capture session on a device with one shared
//! audio input: permission-gated one-shot setup, idempotent start/stop, live
//! refresh of the input device, and delivery of the per-buffer channel count
//! to an observer. Platform backends implement the `CaptureEngine` and
//! `PermissionGateway` traits and plug into the generic
//! `CaptureSessionManager`.
//!
//! ## Architecture
//!
//! ```text
//! audio-session-core (this crate)
//! ├── traits/     ← CaptureEngine, PermissionGateway, CaptureSession, ChannelCountObserver, CallbackContext
//! ├── models/     ← SetupResult, SessionError, SessionConfiguration, buffers, routes
//! ├── executor/   ← DispatchQueue, SerialExecutor, RunLoop
//! ├── session/    ← CaptureSessionManager (state machine), configuration transactions
//! ├── bridge/     ← AudioDataOutput, SampleDeliveryBridge
//! ├── route/      ← RouteChangeReactor
//! └── simulated/  ← in-memory engine and permission gateway
//! ```
//!
//! ## Threading
//!
//! Three contexts are explicit: the caller-facing `CallbackContext` supplied
//! by the host, the serial executor that alone mutates the engine, and the
//! delivery queue that receives raw buffers. Completions and observer calls
//! always land on the caller-facing context.

pub mod bridge;
pub mod executor;
pub mod models;
pub mod route;
pub mod session;
pub mod simulated;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use bridge::output::AudioDataOutput;
pub use bridge::sample_delivery::{first_channel_count, SampleDeliveryBridge};
pub use executor::dispatch_queue::DispatchQueue;
pub use executor::run_loop::{RunLoop, RunLoopHandle};
pub use executor::serial_executor::SerialExecutor;
pub use models::audio_models::{AudioBuffer, AudioBufferList, SampleBuffer, SessionDiagnostics};
pub use models::config::{DeliveryPolicy, SessionConfiguration};
pub use models::error::{ConfigError, EngineError, SessionError};
pub use models::route::{AudioPortDescription, AudioPortType, AudioRoute, RouteChange, RouteChangeReason};
pub use models::state::{AuthorizationStatus, SetupResult};
pub use route::reactor::{should_refresh, RouteChangeReactor};
pub use session::manager::CaptureSessionManager;
pub use traits::callback_context::{CallbackContext, Job};
pub use traits::capture_engine::CaptureEngine;
pub use traits::capture_session::{CaptureSession, Completion};
pub use traits::channel_observer::{ChannelCountObserver, SampleBufferConsumer};
pub use traits::permission_gateway::{AuthorizationCallback, PermissionGateway};
