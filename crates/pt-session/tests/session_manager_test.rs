//! Session Manager Tests
//!
//! Drives the session state machine against a scripted backend:
//! - login / logout / restore
//! - scheduled refresh ahead of expiry
//! - concurrent refresh triggers sharing one backend call
//! - refresh failure expiring the session and redirecting to login
//! - permission refresh failures being non-fatal

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use pt_access::Role;
use pt_common::{MemoryNavigator, Navigator, Redirect, RoutePaths};
use pt_config::SessionConfig;
use pt_session::{
    AuthBackend, AuthError, AuthSessionManager, BackendError, Clock, Credentials, LoginGrant,
    KeyValueStore, ManualClock, MemoryStore, PermissionGrant, SessionState, SessionStore,
    TokenPair, UserProfile,
};

#[derive(Default)]
struct MockBackend {
    refresh_calls: AtomicUsize,
    permission_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    fail_permissions: AtomicBool,
    hold_refresh: AtomicBool,
    release: Notify,
    /// Login for this username waits for `login_release`.
    hold_login_for: Mutex<Option<String>>,
    login_started: Notify,
    login_release: Notify,
    login_expires_at: Mutex<Option<DateTime<Utc>>>,
    permissions: Mutex<Vec<String>>,
}

impl MockBackend {
    fn with_permissions(permissions: &[&str]) -> Self {
        let backend = Self::default();
        *backend.permissions.lock() = permissions.iter().map(|p| p.to_string()).collect();
        backend
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, BackendError> {
        if credentials.password != "secret" {
            return Err(BackendError::InvalidCredentials);
        }
        let held = self.hold_login_for.lock().as_deref() == Some(credentials.username.as_str());
        if held {
            self.login_started.notify_one();
            self.login_release.notified().await;
        }
        Ok(LoginGrant {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: *self.login_expires_at.lock(),
            user: UserProfile {
                id: "21".to_string(),
                username: credentials.username.clone(),
                display_name: Some("Store Keeper".to_string()),
                email: None,
                role: Role::StoreKeeper,
                permissions: self.permissions.lock().clone().into(),
            },
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, BackendError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hold_refresh.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                status: 401,
                body: "token_not_valid".to_string(),
            });
        }
        Ok(TokenPair {
            access_token: format!("access-{}", n + 1),
            refresh_token: None,
        })
    }

    async fn fetch_permissions(&self, _access_token: &str) -> Result<PermissionGrant, BackendError> {
        self.permission_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_permissions.load(Ordering::SeqCst) {
            return Err(BackendError::Decode("backend unavailable".to_string()));
        }
        Ok(PermissionGrant {
            permissions: self.permissions.lock().clone().into(),
            role: None,
        })
    }

    async fn logout(&self, _refresh_token: &str) -> Result<(), BackendError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    manager: AuthSessionManager,
    backend: Arc<MockBackend>,
    store: SessionStore,
    clock: Arc<ManualClock>,
    navigator: Arc<MemoryNavigator>,
}

fn quiet_config() -> SessionConfig {
    SessionConfig {
        token_check_interval_secs: 3600,
        permission_refresh_interval_secs: 3600,
        ..Default::default()
    }
}

fn harness_with(config: SessionConfig, store: SessionStore) -> Harness {
    let backend = Arc::new(MockBackend::with_permissions(&[
        "grpo.view_grpoposting",
        "gate_entry.view_gateentry",
    ]));
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let navigator = Arc::new(MemoryNavigator::new("/grpo/14", RoutePaths::default()));
    let manager = AuthSessionManager::with_clock(
        config,
        backend.clone(),
        store.clone(),
        navigator.clone(),
        clock.clone(),
    );
    Harness {
        manager,
        backend,
        store,
        clock,
        navigator,
    }
}

fn harness() -> Harness {
    harness_with(quiet_config(), SessionStore::memory())
}

async fn logged_in() -> Harness {
    let h = harness();
    h.manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn test_login_persists_session() {
    let h = harness();
    let session = h
        .manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();

    assert_eq!(h.manager.state(), SessionState::Authenticated);
    assert_eq!(session.expires_at - session.issued_at, chrono::Duration::seconds(420));
    assert!(h.manager.tasks_running());

    let persisted = h.store.load().await.unwrap().unwrap();
    assert_eq!(persisted.access_token, "access-1");
    assert_eq!(persisted.refresh_token, "refresh-1");
    assert_eq!(persisted.user.username, "store01");

    let ctx = h.manager.access_context().unwrap();
    assert!(ctx.has_permission(&["grpo.view_grpoposting"]));
    h.manager.shutdown();
}

#[tokio::test]
async fn test_invalid_credentials_leave_session_unauthenticated() {
    let h = harness();
    let err = h
        .manager
        .login(Credentials::new("store01", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err, AuthError::InvalidCredentials);
    assert_eq!(h.manager.state(), SessionState::Unauthenticated);
    assert!(h.store.load().await.unwrap().is_none());
    assert!(h.manager.access_context().is_none());
}

#[tokio::test]
async fn test_second_login_is_rejected() {
    let h = logged_in().await;
    let err = h
        .manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::AlreadyAuthenticated);
    h.manager.shutdown();
}

#[tokio::test]
async fn test_token_near_expiry_moves_to_refreshing() {
    let h = logged_in().await;
    h.backend.hold_refresh.store(true, Ordering::SeqCst);

    // 30s left with a 60s threshold
    h.clock.advance(Duration::from_secs(390));

    let mut rx = h.manager.subscribe();
    let release = async {
        rx.wait_for(|s| *s == SessionState::Refreshing).await.unwrap();
        assert_eq!(h.manager.state(), SessionState::Refreshing);
        // the old token stays usable while refreshing
        assert!(h.manager.access_context().is_some());
        h.backend.release.notify_one();
    };
    tokio::join!(h.manager.check_token(), release);

    assert_eq!(h.manager.state(), SessionState::Authenticated);
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.manager.access_token().as_deref(), Some("access-2"));
    h.manager.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_short_lived_grant_refresh_is_not_masked_by_login() {
    let h = harness();
    // 30s of validity with a 60s threshold: the first scheduled check refreshes
    *h.backend.login_expires_at.lock() = Some(h.clock.now() + chrono::Duration::seconds(30));
    h.backend.hold_refresh.store(true, Ordering::SeqCst);

    let mut rx = h.manager.subscribe();
    h.manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();

    rx.wait_for(|s| *s == SessionState::Refreshing).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.manager.state(), SessionState::Refreshing);

    h.backend.release.notify_one();
    rx.wait_for(|s| *s == SessionState::Authenticated).await.unwrap();
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.manager.access_token().as_deref(), Some("access-2"));
    h.manager.shutdown();
}

#[tokio::test]
async fn test_fresh_token_is_not_refreshed() {
    let h = logged_in().await;
    h.clock.advance(Duration::from_secs(60));
    h.manager.check_token().await;

    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.manager.state(), SessionState::Authenticated);
    h.manager.shutdown();
}

#[tokio::test]
async fn test_concurrent_refresh_triggers_share_one_call() {
    let h = logged_in().await;
    h.backend.hold_refresh.store(true, Ordering::SeqCst);

    let mut rx = h.manager.subscribe();
    let release = async {
        rx.wait_for(|s| *s == SessionState::Refreshing).await.unwrap();
        h.backend.release.notify_one();
    };
    let (timer, unauthorized, ()) =
        tokio::join!(h.manager.refresh(), h.manager.on_unauthorized(), release);

    let session = timer.unwrap();
    assert_eq!(unauthorized.unwrap(), session.access_token);
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.manager.session().unwrap(), session);

    let persisted = h.store.load().await.unwrap().unwrap();
    assert_eq!(persisted.access_token, "access-2");
    // not rotated by the backend, so the original refresh token is kept
    assert_eq!(persisted.refresh_token, "refresh-1");
    h.manager.shutdown();
}

#[tokio::test]
async fn test_refresh_failure_expires_and_redirects_to_login() {
    let h = logged_in().await;
    h.backend.fail_refresh.store(true, Ordering::SeqCst);
    h.clock.advance(Duration::from_secs(400));

    h.manager.check_token().await;

    assert_eq!(h.manager.state(), SessionState::Expired);
    assert!(h.store.load().await.unwrap().is_none());
    assert!(h.manager.session().is_none());
    assert!(h.manager.access_context().is_none());
    assert!(!h.manager.tasks_running());
    assert_eq!(h.navigator.last_redirect(), Some(Redirect::login("/grpo/14")));
    assert_eq!(h.navigator.current_path(), "/login");
}

#[tokio::test]
async fn test_unauthorized_refresh_failure_reports_error() {
    let h = logged_in().await;
    h.backend.fail_refresh.store(true, Ordering::SeqCst);

    let err = h.manager.on_unauthorized().await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshFailed(_)));
    assert_eq!(h.manager.state(), SessionState::Expired);

    // nothing left to refresh
    assert_eq!(h.manager.refresh().await.unwrap_err(), AuthError::NotAuthenticated);
}

#[tokio::test]
async fn test_resume_after_expiry_expires_without_refresh() {
    let h = logged_in().await;
    h.clock.advance(Duration::from_secs(421));

    assert_eq!(h.manager.resume().await, SessionState::Expired);
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(h.store.load().await.unwrap().is_none());
    assert_eq!(h.navigator.last_redirect(), Some(Redirect::login("/grpo/14")));
}

#[tokio::test]
async fn test_login_allowed_after_expiry() {
    let h = logged_in().await;
    h.clock.advance(Duration::from_secs(500));
    h.manager.resume().await;
    assert_eq!(h.manager.state(), SessionState::Expired);

    h.manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();
    assert_eq!(h.manager.state(), SessionState::Authenticated);
    h.manager.shutdown();
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let h = logged_in().await;
    h.manager.logout().await;

    assert_eq!(h.manager.state(), SessionState::Unauthenticated);
    assert!(h.manager.session().is_none());
    assert!(h.store.load().await.unwrap().is_none());
    assert!(!h.manager.tasks_running());
    assert_eq!(h.backend.logout_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_logout_discards_in_flight_refresh() {
    let h = logged_in().await;
    h.backend.hold_refresh.store(true, Ordering::SeqCst);

    let mut rx = h.manager.subscribe();
    let logout = async {
        rx.wait_for(|s| *s == SessionState::Refreshing).await.unwrap();
        h.manager.logout().await;
        h.backend.release.notify_one();
    };
    let (result, ()) = tokio::join!(h.manager.refresh(), logout);

    assert_eq!(result.unwrap_err(), AuthError::SessionCancelled);
    assert_eq!(h.manager.state(), SessionState::Unauthenticated);
    assert!(h.manager.session().is_none());
    assert!(h.store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_superseded_login_keeps_newer_session_persisted() {
    let h = harness();
    *h.backend.hold_login_for.lock() = Some("alice".to_string());

    let interleave = async {
        h.backend.login_started.notified().await;
        h.manager.logout().await;
        h.manager
            .login(Credentials::new("bob", "secret"))
            .await
            .unwrap();
        h.backend.login_release.notify_one();
    };
    let (alice, ()) = tokio::join!(h.manager.login(Credentials::new("alice", "secret")), interleave);

    assert_eq!(alice.unwrap_err(), AuthError::SessionCancelled);
    assert_eq!(h.manager.state(), SessionState::Authenticated);
    assert_eq!(h.manager.session().unwrap().user.username, "bob");
    let persisted = h.store.load().await.unwrap().unwrap();
    assert_eq!(persisted.user.username, "bob");
    h.manager.shutdown();
}

#[tokio::test]
async fn test_permission_refresh_updates_set() {
    let h = logged_in().await;
    h.backend
        .permissions
        .lock()
        .push("quality_control.view_inspection".to_string());

    let permissions = h.manager.refresh_permissions().await.unwrap();
    assert!(permissions.contains("quality_control.view_inspection"));

    let ctx = h.manager.access_context().unwrap();
    assert!(ctx.has_permission(&["quality_control.view_inspection"]));

    let persisted = h.store.load().await.unwrap().unwrap();
    assert!(persisted.user.permissions.contains("quality_control.view_inspection"));
    h.manager.shutdown();
}

#[tokio::test]
async fn test_permission_refresh_failure_keeps_previous_set() {
    let h = logged_in().await;
    h.backend.fail_permissions.store(true, Ordering::SeqCst);

    let err = h.manager.refresh_permissions().await.unwrap_err();
    assert!(matches!(err, AuthError::PermissionFetchFailed(_)));
    assert_eq!(h.manager.state(), SessionState::Authenticated);

    let ctx = h.manager.access_context().unwrap();
    assert!(ctx.has_permission(&["grpo.view_grpoposting", "gate_entry.view_gateentry"]));
    h.manager.shutdown();
}

#[tokio::test]
async fn test_restore_valid_session() {
    let store = SessionStore::memory();
    let first = harness_with(quiet_config(), store.clone());
    first
        .manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();
    first.manager.shutdown();

    let second = harness_with(quiet_config(), store);
    assert_eq!(second.manager.restore().await.unwrap(), SessionState::Authenticated);
    assert_eq!(second.manager.session().unwrap().user.username, "store01");
    assert!(second.manager.tasks_running());
    second.manager.shutdown();
}

#[tokio::test]
async fn test_restore_expired_session_clears_it() {
    let store = SessionStore::memory();
    let first = harness_with(quiet_config(), store.clone());
    first
        .manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();
    first.manager.shutdown();

    let second = harness_with(quiet_config(), store.clone());
    second.clock.advance(Duration::from_secs(3600));
    assert_eq!(second.manager.restore().await.unwrap(), SessionState::Expired);
    assert!(store.load().await.unwrap().is_none());
    assert!(second.manager.session().is_none());
}

#[tokio::test]
async fn test_restore_discards_unreadable_session() {
    let kv = Arc::new(MemoryStore::new());
    let store = SessionStore::new(kv.clone());
    let first = harness_with(quiet_config(), store.clone());
    first
        .manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();
    first.manager.shutdown();
    kv.set("token_expiry", "next tuesday").await.unwrap();
    kv.set("user", "{not a user").await.unwrap();

    let second = harness_with(quiet_config(), store);
    assert_eq!(second.manager.restore().await.unwrap(), SessionState::Unauthenticated);
    assert!(second.manager.session().is_none());
    assert!(!second.manager.tasks_running());
    assert!(kv.get("access_token").await.unwrap().is_none());
    assert!(kv.get("token_expiry").await.unwrap().is_none());
}

#[tokio::test]
async fn test_restore_without_persisted_session() {
    let h = harness();
    assert_eq!(h.manager.restore().await.unwrap(), SessionState::Unauthenticated);
    assert!(!h.manager.tasks_running());
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_check_refreshes_in_background() {
    let config = SessionConfig {
        token_check_interval_secs: 30,
        permission_refresh_interval_secs: 3600,
        ..Default::default()
    };
    let h = harness_with(config, SessionStore::memory());
    h.manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();

    h.clock.advance(Duration::from_secs(400));
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.manager.state(), SessionState::Authenticated);
    assert_eq!(h.manager.access_token().as_deref(), Some("access-2"));

    h.manager.shutdown();
    assert!(!h.manager.tasks_running());
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_permission_refresh_runs_periodically() {
    let config = SessionConfig {
        token_check_interval_secs: 3600,
        permission_refresh_interval_secs: 300,
        ..Default::default()
    };
    let h = harness_with(config, SessionStore::memory());
    h.manager
        .login(Credentials::new("store01", "secret"))
        .await
        .unwrap();
    h.backend.fail_permissions.store(true, Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(601)).await;

    // failures are retried on the next tick and never log the user out
    assert_eq!(h.backend.permission_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.manager.state(), SessionState::Authenticated);
    h.manager.shutdown();
}
