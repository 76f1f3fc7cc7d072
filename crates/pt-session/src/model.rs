//! Session data

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pt_access::{AccessContext, PermissionSet, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::to_delta;

/// Authentication state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
    Expired,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
            SessionState::Expired => "expired",
        }
    }

    /// The current access token is usable (it stays valid during a refresh).
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Refreshing)
    }

    /// A new login may start from here.
    pub fn can_login(&self) -> bool {
        matches!(self, SessionState::Unauthenticated | SessionState::Expired)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logged-in user as last reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub permissions: PermissionSet,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login as returned by the backend
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Backend-chosen expiry, if it sends one
    pub expires_at: Option<DateTime<Utc>>,
    pub user: UserProfile,
}

/// Result of a token refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// None when the backend does not rotate refresh tokens
    pub refresh_token: Option<String>,
}

/// Fresh permissions for the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub permissions: PermissionSet,
    pub role: Option<Role>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Local identifier used to correlate log lines
    pub id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

impl Session {
    /// New session from a login. A backend expiry that is not in the future
    /// is ignored in favour of `now + duration`.
    pub fn from_grant(grant: LoginGrant, now: DateTime<Utc>, duration: Duration) -> Self {
        let expires_at = grant
            .expires_at
            .filter(|at| *at > now)
            .unwrap_or_else(|| now + to_delta(duration));
        Self {
            id: Uuid::new_v4(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            issued_at: now,
            expires_at,
            user: grant.user,
        }
    }

    /// The same session with rotated tokens and a new lifetime.
    pub fn rotated(&self, tokens: TokenPair, now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            id: self.id,
            access_token: tokens.access_token,
            refresh_token: tokens
                .refresh_token
                .unwrap_or_else(|| self.refresh_token.clone()),
            issued_at: now,
            expires_at: now + to_delta(duration),
            user: self.user.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now >= self.expires_at - to_delta(threshold)
    }

    pub fn access_context(&self) -> AccessContext {
        AccessContext::new(
            self.user.id.clone(),
            self.user.username.clone(),
            self.user.role,
            self.user.permissions.clone(),
        )
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.user.username)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("permissions", &self.user.permissions.len())
            .finish_non_exhaustive()
    }
}
