//! In-memory engine and permission gateway.
//!
//! Behave like a single-input hardware pipeline with knobs for every failure
//! the session must survive, and keep a journal of engine calls so callers
//! can check what the session actually did.

pub mod engine;
pub mod permission;

pub use engine::{EngineCall, SimulatedCaptureEngine, SimulatedDevice, SimulatedEngineHandle, SimulatedInput};
pub use permission::SimulatedPermissionGateway;
