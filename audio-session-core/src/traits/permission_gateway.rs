use crate::models::state::AuthorizationStatus;

/// Callback receiving the user's answer to an authorization prompt.
pub type AuthorizationCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Reports and requests the user's microphone authorization.
///
/// Owned by the host platform; the session only consults it.
pub trait PermissionGateway: Send + Sync {
    fn current_authorization(&self) -> AuthorizationStatus;

    /// Prompt the user. `callback` receives `true` if access was granted and
    /// must be delivered on the caller-facing context.
    fn request_authorization(&self, callback: AuthorizationCallback);
}
