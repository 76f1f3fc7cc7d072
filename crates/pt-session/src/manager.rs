//! Auth Session Manager
//!
//! Owns the authentication state machine and is the only writer of the
//! current session:
//! - login / logout / restore at boot
//! - scheduled token refresh ahead of expiry, coalesced with ad-hoc 401s
//! - periodic permission-set refresh that never forces logout
//!
//! Lock order is `persist`, then `pending`, then `session`. Only `persist` is
//! held across an await; the epoch changes only while it is held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use pt_access::{AccessContext, PermissionSet};
use pt_common::{Navigator, Redirect};
use pt_config::SessionConfig;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::backend::AuthBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, BackendError, Result};
use crate::model::{Credentials, Session, SessionState, TokenPair};
use crate::store::SessionStore;
use crate::tasks::SessionTasks;

type RefreshFuture = Shared<BoxFuture<'static, Result<Session>>>;

/// The one refresh allowed in flight, tagged with the session epoch it
/// belongs to.
struct PendingRefresh {
    epoch: u64,
    future: RefreshFuture,
}

struct Inner {
    config: SessionConfig,
    backend: Arc<dyn AuthBackend>,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    session: RwLock<Option<Session>>,
    /// Bumped on logout and expiry; results computed for an older epoch are
    /// discarded.
    epoch: AtomicU64,
    pending: Mutex<Option<PendingRefresh>>,
    /// Serializes writes to the persisted record and epoch changes.
    persist: AsyncMutex<()>,
    state_tx: watch::Sender<SessionState>,
    tasks: Mutex<Option<SessionTasks>>,
}

/// Handle to the session; cheap to clone.
#[derive(Clone)]
pub struct AuthSessionManager {
    inner: Arc<Inner>,
}

impl AuthSessionManager {
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn AuthBackend>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_clock(config, backend, store, navigator, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: SessionConfig,
        backend: Arc<dyn AuthBackend>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                store,
                navigator,
                clock,
                session: RwLock::new(None),
                epoch: AtomicU64::new(0),
                pending: Mutex::new(None),
                persist: AsyncMutex::new(()),
                state_tx,
                tasks: Mutex::new(None),
            }),
        }
    }

    /// Authenticate and start the periodic tasks.
    pub async fn login(&self, credentials: Credentials) -> Result<Session> {
        self.inner.login(credentials).await
    }

    /// Load the persisted session at boot.
    pub async fn restore(&self) -> Result<SessionState> {
        self.inner.restore().await
    }

    /// Refresh the token pair, or attach to the refresh already in flight.
    pub async fn refresh(&self) -> Result<Session> {
        self.inner.refresh().await
    }

    /// For API clients that got a 401: yields a fresh access token.
    pub async fn on_unauthorized(&self) -> Result<String> {
        self.inner.refresh().await.map(|s| s.access_token)
    }

    /// One scheduled token check: expire, refresh, or nothing.
    pub async fn check_token(&self) {
        self.inner.check_token().await
    }

    /// Re-check expiry when the application comes back to the foreground.
    pub async fn resume(&self) -> SessionState {
        self.inner.check_token().await;
        self.state()
    }

    /// Fetch the user's current permissions; the previous set is kept on
    /// failure.
    pub async fn refresh_permissions(&self) -> Result<PermissionSet> {
        self.inner.refresh_permissions().await
    }

    pub async fn logout(&self) {
        self.inner.logout().await
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.session.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Present while authenticated or refreshing.
    pub fn access_context(&self) -> Option<AccessContext> {
        if !self.state().is_active() {
            return None;
        }
        self.inner.session.read().as_ref().map(Session::access_context)
    }

    pub fn tasks_running(&self) -> bool {
        self.inner
            .tasks
            .lock()
            .as_ref()
            .is_some_and(|t| t.len() > 0)
    }

    /// Cancel the periodic tasks without touching the session.
    pub fn shutdown(&self) {
        let tasks = self.inner.tasks.lock().take();
        if let Some(tasks) = tasks {
            info!("Stopping session tasks");
            tasks.abort();
        }
    }
}

impl Inner {
    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "Session state changed");
        }
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate the session and anything in flight for it. Callers hold
    /// the `persist` guard.
    fn cancel_epoch(&self) -> Option<Session> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.session.write().take()
    }

    fn start_tasks(self: &Arc<Self>) {
        let mut tasks = SessionTasks::new();
        let owner = Arc::downgrade(self);

        tasks.spawn(
            "token_check",
            self.config.token_check_interval(),
            true,
            owner.clone(),
            |inner: Arc<Inner>| async move { inner.check_token().await },
        );
        tasks.spawn(
            "permission_refresh",
            self.config.permission_refresh_interval(),
            false,
            owner,
            |inner: Arc<Inner>| async move {
                let _ = inner.refresh_permissions().await;
            },
        );

        let previous = self.tasks.lock().replace(tasks);
        if let Some(previous) = previous {
            previous.shutdown();
        }
    }

    fn stop_tasks(&self) {
        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.shutdown();
        }
    }

    async fn login(self: &Arc<Self>, credentials: Credentials) -> Result<Session> {
        let started = self.state_tx.send_if_modified(|state| {
            if state.can_login() {
                *state = SessionState::Authenticating;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(AuthError::AlreadyAuthenticated);
        }
        info!(username = %credentials.username, "Logging in");
        let epoch = self.current_epoch();

        let grant = match self.backend.login(&credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                let err = match e {
                    BackendError::InvalidCredentials => AuthError::InvalidCredentials,
                    other => AuthError::Backend(other.to_string()),
                };
                warn!(username = %credentials.username, error = %err, "Login failed");
                if self.current_epoch() == epoch {
                    self.set_state(SessionState::Unauthenticated);
                }
                return Err(err);
            }
        };

        let session = Session::from_grant(grant, self.clock.now(), self.config.session_duration());
        {
            let _persist = self.persist.lock().await;
            if self.current_epoch() != epoch {
                // A logout ran meanwhile; the stored record may belong to a
                // newer session.
                debug!("Login superseded by logout");
                return Err(AuthError::SessionCancelled);
            }
            if let Err(e) = self.store.save(&session).await {
                error!(error = %e, store = %self.store.backend_name(), "Failed to persist session");
                self.set_state(SessionState::Unauthenticated);
                return Err(e.into());
            }
            *self.session.write() = Some(session.clone());
            self.set_state(SessionState::Authenticated);
            self.start_tasks();
        }

        metrics::counter!("session.login").increment(1);
        info!(
            session_id = %session.id,
            username = %session.user.username,
            role = %session.user.role,
            permissions = session.user.permissions.len(),
            expires_at = %session.expires_at,
            "Logged in"
        );
        Ok(session)
    }

    async fn restore(self: &Arc<Self>) -> Result<SessionState> {
        if self.state() != SessionState::Unauthenticated {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let persisted = match self.store.load().await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                let _persist = self.persist.lock().await;
                self.store.clear().await?;
                None
            }
        };
        let Some(persisted) = persisted else {
            debug!("No persisted session");
            return Ok(SessionState::Unauthenticated);
        };

        if self.clock.now() >= persisted.expires_at {
            info!(
                username = %persisted.user.username,
                expired_at = %persisted.expires_at,
                "Persisted session has expired"
            );
            let _persist = self.persist.lock().await;
            self.store.clear().await?;
            self.set_state(SessionState::Expired);
            return Ok(SessionState::Expired);
        }

        let session = persisted.into_session(self.config.session_duration());
        *self.session.write() = Some(session.clone());
        self.set_state(SessionState::Authenticated);
        self.start_tasks();
        info!(
            session_id = %session.id,
            username = %session.user.username,
            expires_at = %session.expires_at,
            "Session restored"
        );
        Ok(SessionState::Authenticated)
    }

    async fn refresh(self: &Arc<Self>) -> Result<Session> {
        let future = {
            let mut pending = self.pending.lock();
            let epoch = self.current_epoch();
            let attached = pending
                .as_ref()
                .filter(|p| p.epoch == epoch)
                .map(|p| p.future.clone());

            match attached {
                Some(future) => {
                    debug!("Attaching to in-flight refresh");
                    future
                }
                None => {
                    let snapshot = self.session.read().clone();
                    let Some(session) = snapshot else {
                        return Err(AuthError::NotAuthenticated);
                    };
                    self.set_state(SessionState::Refreshing);

                    // Spawned so the refresh completes even if every caller
                    // stops waiting.
                    let inner = Arc::clone(self);
                    let handle = tokio::spawn(async move { inner.run_refresh(session, epoch).await });
                    let future = async move {
                        handle
                            .await
                            .unwrap_or(Err(AuthError::SessionCancelled))
                    }
                    .boxed()
                    .shared();

                    *pending = Some(PendingRefresh {
                        epoch,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    async fn run_refresh(self: Arc<Self>, session: Session, epoch: u64) -> Result<Session> {
        metrics::counter!("session.refresh").increment(1);
        debug!(session_id = %session.id, "Refreshing token");

        let outcome = match self.backend.refresh(&session.refresh_token).await {
            Ok(tokens) => self.commit_refresh(tokens, epoch).await,
            Err(e) => {
                metrics::counter!("session.refresh.failed").increment(1);
                warn!(session_id = %session.id, error = %e, "Token refresh failed");
                if self.expire(epoch).await {
                    Err(AuthError::RefreshFailed(e.to_string()))
                } else {
                    Err(AuthError::SessionCancelled)
                }
            }
        };

        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|p| p.epoch == epoch) {
            *pending = None;
        }
        outcome
    }

    async fn commit_refresh(&self, tokens: TokenPair, epoch: u64) -> Result<Session> {
        let _persist = self.persist.lock().await;
        let now = self.clock.now();
        let next = {
            let mut slot = self.session.write();
            match slot.as_mut() {
                Some(current) if self.current_epoch() == epoch => {
                    let next = current.rotated(tokens, now, self.config.session_duration());
                    *current = next.clone();
                    Some(next)
                }
                _ => None,
            }
        };
        let Some(next) = next else {
            debug!("Refresh result discarded, session was cancelled");
            return Err(AuthError::SessionCancelled);
        };

        if let Err(e) = self.store.save(&next).await {
            error!(session_id = %next.id, error = %e, "Failed to persist refreshed session");
        }
        self.set_state(SessionState::Authenticated);
        info!(session_id = %next.id, expires_at = %next.expires_at, "Token refreshed");
        Ok(next)
    }

    async fn check_token(self: &Arc<Self>) {
        let epoch = self.current_epoch();
        let snapshot = self.session.read().clone();
        let Some(session) = snapshot else {
            return;
        };
        let now = self.clock.now();

        if session.is_expired(now) {
            warn!(session_id = %session.id, expires_at = %session.expires_at, "Session expired");
            self.expire(epoch).await;
            return;
        }

        if session.needs_refresh(now, self.config.refresh_threshold()) {
            debug!(session_id = %session.id, expires_at = %session.expires_at, "Token close to expiry");
            if let Err(e) = self.refresh().await {
                debug!(error = %e, "Scheduled refresh did not complete");
            }
        }
    }

    /// Terminal: clear everything and send the user to login, remembering
    /// where they were. Does nothing if `epoch` is no longer current.
    async fn expire(&self, epoch: u64) -> bool {
        let persist = self.persist.lock().await;
        if self.current_epoch() != epoch {
            debug!("Session already replaced, not expiring");
            return false;
        }
        let previous = self.cancel_epoch();
        self.set_state(SessionState::Expired);

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }
        drop(persist);

        let return_to = self.navigator.current_path();
        self.navigator.navigate(Redirect::login(return_to.clone()));
        info!(
            session_id = ?previous.as_ref().map(|s| s.id),
            %return_to,
            "Session expired, redirecting to login"
        );

        // Last: this may be running inside one of the tasks.
        self.stop_tasks();
        true
    }

    async fn logout(&self) {
        let persist = self.persist.lock().await;
        let previous = self.cancel_epoch();
        self.stop_tasks();

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }
        self.set_state(SessionState::Unauthenticated);
        drop(persist);

        let Some(session) = previous else {
            return;
        };
        if let Err(e) = self.backend.logout(&session.refresh_token).await {
            warn!(session_id = %session.id, error = %e, "Backend logout failed");
        }
        info!(session_id = %session.id, username = %session.user.username, "Logged out");
    }

    async fn refresh_permissions(&self) -> Result<PermissionSet> {
        let snapshot = self.session.read().clone();
        let Some(session) = snapshot else {
            return Err(AuthError::NotAuthenticated);
        };
        if self.state() != SessionState::Authenticated {
            debug!(session_id = %session.id, "Refresh in progress, keeping permissions for now");
            return Ok(session.user.permissions);
        }
        let epoch = self.current_epoch();

        let grant = match self.backend.fetch_permissions(&session.access_token).await {
            Ok(grant) => grant,
            Err(e) => {
                metrics::counter!("session.permissions.refresh.failed").increment(1);
                warn!(session_id = %session.id, error = %e, "Permission refresh failed, keeping previous set");
                return Err(AuthError::PermissionFetchFailed(e.to_string()));
            }
        };

        let _persist = self.persist.lock().await;
        let updated = {
            let mut slot = self.session.write();
            match slot.as_mut() {
                Some(current) if self.current_epoch() == epoch && current.id == session.id => {
                    let role = grant.role.unwrap_or(current.user.role);
                    let changed =
                        current.user.permissions != grant.permissions || current.user.role != role;
                    current.user.permissions = grant.permissions;
                    current.user.role = role;
                    Some((current.clone(), changed))
                }
                _ => None,
            }
        };
        let Some((current, changed)) = updated else {
            return Err(AuthError::SessionCancelled);
        };

        if changed {
            info!(
                session_id = %current.id,
                role = %current.user.role,
                permissions = current.user.permissions.len(),
                "Permissions updated"
            );
            if let Err(e) = self.store.save(&current).await {
                warn!(error = %e, "Failed to persist updated permissions");
            }
        } else {
            debug!(session_id = %current.id, "Permissions unchanged");
        }
        Ok(current.user.permissions)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.abort();
        }
    }
}
