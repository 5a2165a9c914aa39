// Navigation boundary
// Tells the session layer where the user is and receives forced-logout redirects

use parking_lot::RwLock;

/// Login screen route
pub const LOGIN_ROUTE: &str = "/login";

/// Account-creation route, exempt from the forced-logout redirect
pub const SIGNUP_ROUTE: &str = "/signup";

/// UI-side collaborator of the session layer
pub trait Navigator: Send + Sync {
    /// Path of the currently active route
    fn current_path(&self) -> String;

    /// Send the user to the login screen
    fn redirect_to_login(&self);
}

/// True while the user is in the signup flow
pub fn is_signup_route(path: &str) -> bool {
    path.contains(SIGNUP_ROUTE)
}

/// In-process navigator that only tracks the current path
pub struct RouteTracker {
    current: RwLock<String>,
}

impl RouteTracker {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(initial.into()),
        }
    }

    /// Record a navigation to `path`
    pub fn navigate(&self, path: impl Into<String>) {
        let path = path.into();
        tracing::debug!("Navigating to {}", path);
        *self.current.write() = path;
    }
}

impl Navigator for RouteTracker {
    fn current_path(&self) -> String {
        self.current.read().clone()
    }

    fn redirect_to_login(&self) {
        let mut current = self.current.write();
        tracing::warn!("Session ended, redirecting from {} to {}", *current, LOGIN_ROUTE);
        *current = LOGIN_ROUTE.to_string();
    }
}
