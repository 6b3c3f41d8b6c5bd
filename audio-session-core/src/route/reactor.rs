use std::sync::Arc;

use crate::models::route::{AudioRoute, RouteChange};
use crate::traits::capture_session::CaptureSession;

/// Whether a route change moves the input into or out of an external audio
/// interface.
pub fn should_refresh(change: &RouteChange) -> bool {
    let external = |route: &AudioRoute| {
        route
            .input_port_type()
            .is_some_and(|port| port.is_external_interface())
    };
    external(&change.previous) || external(&change.current)
}

/// Reacts to host route-change notifications by refreshing the session's
/// audio input.
///
/// The host owns the subscription to route changes and forwards each one to
/// [`handle_route_change`](Self::handle_route_change).
pub struct RouteChangeReactor {
    session: Arc<dyn CaptureSession>,
}

impl RouteChangeReactor {
    pub fn new(session: Arc<dyn CaptureSession>) -> Self {
        Self { session }
    }

    /// Returns whether a refresh was requested.
    pub fn handle_route_change(&self, change: &RouteChange) -> bool {
        if !should_refresh(change) {
            log::debug!(
                "Route change ({:?}) does not involve an external interface",
                change.reason
            );
            return false;
        }

        log::info!(
            "Route change ({:?}): {:?} -> {:?}; refreshing audio input",
            change.reason,
            change.previous.input_port_type(),
            change.current.input_port_type()
        );
        self.session.refresh_audio(Box::new(|result| {
            if let Err(e) = result {
                log::warn!("Audio refresh after route change failed: {}", e);
            }
        }));
        true
    }
}
