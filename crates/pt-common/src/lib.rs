//! Portico Common
//!
//! Types shared by every layer that talks to the rendering router:
//! - `RoutePaths`: well-known paths (login, unauthorized, home)
//! - `Redirect`: where a guard or the session manager sends the user
//! - `Navigator`: the router boundary ("navigate to X", "current path")

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub mod logging;

// ============================================================================
// Well-known Paths
// ============================================================================

/// Paths the control layer redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePaths {
    pub login: String,
    pub unauthorized: String,
    pub home: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            unauthorized: "/unauthorized".to_string(),
            home: "/".to_string(),
        }
    }
}

// ============================================================================
// Redirects
// ============================================================================

/// Query parameter carrying the post-login return path.
pub const RETURN_TO_PARAM: &str = "from";

/// A navigation request issued by a route guard or the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Send the user to the login route, remembering where they were.
    Login { return_to: Option<String> },
    /// Authenticated but not allowed.
    Unauthorized,
    /// Any other path.
    To(String),
}

impl Redirect {
    pub fn login(return_to: impl Into<String>) -> Self {
        Self::Login {
            return_to: Some(return_to.into()),
        }
    }

    /// Render the redirect as a location string.
    ///
    /// A login redirect keeps the return path as `?from=<encoded path>`; the
    /// login page itself and the root are not recorded.
    pub fn location(&self, paths: &RoutePaths) -> String {
        match self {
            Redirect::Login { return_to: Some(path) }
                if !path.is_empty() && path != &paths.login && path != "/" =>
            {
                format!(
                    "{}?{}={}",
                    paths.login,
                    RETURN_TO_PARAM,
                    urlencoding::encode(path)
                )
            }
            Redirect::Login { .. } => paths.login.clone(),
            Redirect::Unauthorized => paths.unauthorized.clone(),
            Redirect::To(path) => path.clone(),
        }
    }
}

// ============================================================================
// Router Boundary
// ============================================================================

/// The rendering router as seen by the control layer.
pub trait Navigator: Send + Sync {
    /// Path the user is currently on.
    fn current_path(&self) -> String;

    /// Ask the router to move the user.
    fn navigate(&self, redirect: Redirect);
}

/// In-process navigator that records every redirect.
///
/// Used by the development binary and tests in place of a browser router.
#[derive(Debug)]
pub struct MemoryNavigator {
    current: Mutex<String>,
    history: Mutex<Vec<Redirect>>,
    paths: RoutePaths,
}

impl MemoryNavigator {
    pub fn new(initial_path: impl Into<String>, paths: RoutePaths) -> Self {
        Self {
            current: Mutex::new(initial_path.into()),
            history: Mutex::new(Vec::new()),
            paths,
        }
    }

    /// Simulate the user visiting a path.
    pub fn visit(&self, path: impl Into<String>) {
        *self.current.lock() = path.into();
    }

    /// All redirects issued so far, oldest first.
    pub fn history(&self) -> Vec<Redirect> {
        self.history.lock().clone()
    }

    pub fn last_redirect(&self) -> Option<Redirect> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.current.lock().clone()
    }

    fn navigate(&self, redirect: Redirect) {
        let location = redirect.location(&self.paths);
        tracing::debug!(%location, "Navigating");
        // The location may carry a query string; the path is what the router lands on.
        let path = location.split('?').next().unwrap_or_default().to_string();
        *self.current.lock() = path;
        self.history.lock().push(redirect);
    }
}
