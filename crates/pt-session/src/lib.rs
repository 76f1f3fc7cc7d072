//! Portico Session
//!
//! Keeps an authentication session alive for the portal:
//! - `AuthSessionManager`: state machine, single-flight refresh, periodic tasks
//! - `AuthBackend` / `HttpAuthBackend`: login, refresh, permissions, logout
//! - `SessionStore`: persisted tokens, expiry and user over a `KeyValueStore`

pub mod backend;
pub mod clock;
pub mod error;
pub mod manager;
pub mod model;
pub mod store;
mod tasks;

pub use backend::{AuthBackend, HttpAuthBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, BackendError, Result, StoreError};
pub use manager::AuthSessionManager;
pub use model::{
    Credentials, LoginGrant, PermissionGrant, Session, SessionState, TokenPair, UserProfile,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistedSession, SessionStore};
