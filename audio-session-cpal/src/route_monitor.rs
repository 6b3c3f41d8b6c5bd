//! Route-change detection by polling the default input device.
//!
//! cpal has no route-change notification, so a background thread samples
//! the default input every `poll_interval` and reports differences as
//! [`RouteChange`]s.

use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use audio_session_core::models::error::EngineError;
use audio_session_core::models::route::{AudioRoute, RouteChange, RouteChangeReason};

use crate::port::route_for_device;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Compare two route snapshots.
///
/// Moving onto an external interface (or onto any input from none) is a new
/// device; moving off one is the old device going away; any other change is
/// an override.
pub fn diff_routes(previous: &AudioRoute, current: &AudioRoute) -> Option<RouteChange> {
    if previous == current {
        return None;
    }

    let external = |route: &AudioRoute| {
        route
            .input_port_type()
            .is_some_and(|port| port.is_external_interface())
    };

    let reason = if current.inputs.is_empty() || (external(previous) && !external(current)) {
        RouteChangeReason::OldDeviceUnavailable
    } else if previous.inputs.is_empty() || (external(current) && !external(previous)) {
        RouteChangeReason::NewDeviceAvailable
    } else {
        RouteChangeReason::Override
    };

    Some(RouteChange::new(reason, previous.clone(), current.clone()))
}

/// The default host's current input route.
pub fn current_route() -> AudioRoute {
    cpal::default_host()
        .default_input_device()
        .and_then(|device| device.name().ok())
        .map(|name| route_for_device(&name))
        .unwrap_or_default()
}

/// Background poller for the default input route.
pub struct RouteMonitor {
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RouteMonitor {
    /// Start polling the default host. `on_change` runs on the monitor thread.
    pub fn start<F>(poll_interval: Duration, on_change: F) -> Result<Self, EngineError>
    where
        F: Fn(RouteChange) + Send + 'static,
    {
        Self::start_with_probe(poll_interval, current_route, on_change)
    }

    /// Start polling with a custom route probe.
    pub fn start_with_probe<P, F>(poll_interval: Duration, probe: P, on_change: F) -> Result<Self, EngineError>
    where
        P: Fn() -> AudioRoute + Send + 'static,
        F: Fn(RouteChange) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("audio-session-route-monitor".into())
            .spawn(move || {
                let mut previous = probe();
                log::debug!("Route monitor started on {:?}", previous.input_port_type());

                loop {
                    match stop_rx.recv_timeout(poll_interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }

                    let current = probe();
                    if let Some(change) = diff_routes(&previous, &current) {
                        log::info!(
                            "Route change ({:?}): {:?} -> {:?}",
                            change.reason,
                            previous.inputs.first().map(|port| &port.name),
                            current.inputs.first().map(|port| &port.name)
                        );
                        on_change(change);
                        previous = current;
                    }
                }
                log::debug!("Route monitor stopped");
            })
            .map_err(|e| EngineError::StreamFailed(format!("failed to spawn route monitor: {}", e)))?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RouteMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
