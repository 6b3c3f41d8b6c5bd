use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::state::AuthorizationStatus;
use crate::traits::callback_context::CallbackContext;
use crate::traits::permission_gateway::{AuthorizationCallback, PermissionGateway};

/// Permission gateway with a scripted user.
///
/// `grant_on_request` is the answer the simulated user gives when prompted;
/// the answer also becomes the recorded status, as on a real host.
pub struct SimulatedPermissionGateway {
    status: Mutex<AuthorizationStatus>,
    grant_on_request: bool,
    callback_context: Arc<dyn CallbackContext>,
    queries: AtomicUsize,
    requests: AtomicUsize,
}

impl SimulatedPermissionGateway {
    pub fn new(
        status: AuthorizationStatus,
        grant_on_request: bool,
        callback_context: Arc<dyn CallbackContext>,
    ) -> Self {
        Self {
            status: Mutex::new(status),
            grant_on_request,
            callback_context,
            queries: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionGateway for SimulatedPermissionGateway {
    fn current_authorization(&self) -> AuthorizationStatus {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *self.status.lock()
    }

    fn request_authorization(&self, callback: AuthorizationCallback) {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let granted = {
            let mut status = self.status.lock();
            if *status == AuthorizationStatus::NotDetermined {
                *status = if self.grant_on_request {
                    AuthorizationStatus::Authorized
                } else {
                    AuthorizationStatus::Denied
                };
            }
            status.is_authorized()
        };

        self.callback_context
            .dispatch(Box::new(move || callback(granted)));
    }
}
