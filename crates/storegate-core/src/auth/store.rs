//! Observable session store.
//!
//! `SessionStore` owns the signed-in account, the session token and a
//! loading flag. Every change is published through a `tokio::sync::watch`
//! channel so UI layers can subscribe instead of polling.
//!
//! Network operations on one store run one at a time: a call that arrives
//! while another is in flight waits its turn, so `loading` always brackets
//! exactly one request and session updates land in call order.

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthApi};
use crate::models::{Account, AuthResponse, SessionSnapshot};

use super::token::SessionTokenStore;

/// Sets `loading` on creation and clears it when dropped, whichever way
/// the call exits.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
}

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a watch::Sender<SessionSnapshot>) -> Self {
        state.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

/// In-flight call: holds the queue slot and the loading bracket
struct Call<'a> {
    _loading: LoadingGuard<'a>,
    _slot: MutexGuard<'a, ()>,
}

pub struct SessionStore<A, S> {
    api: A,
    tokens: S,
    state: watch::Sender<SessionSnapshot>,
    queue: Mutex<()>,
}

impl<A: AuthApi, S: SessionTokenStore> SessionStore<A, S> {
    pub fn new(api: A, tokens: S) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            tokens,
            state,
            queue: Mutex::new(()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn token_store(&self) -> &S {
        &self.tokens
    }

    // ===== Observable state =====

    /// Receive every state change from now on
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn account(&self) -> Option<Account> {
        self.state.borrow().account.clone()
    }

    /// In-memory session token, without touching durable storage
    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    // ===== Session bookkeeping =====

    /// Pull the persisted token into memory if none is cached yet
    pub fn hydrate_token(&self) {
        if self.state.borrow().token.is_some() {
            return;
        }
        if let Some(token) = self.tokens.get() {
            debug!("Hydrated session token from storage");
            self.state.send_modify(|s| s.token = Some(token));
        }
    }

    /// Drop the session: persisted token, in-memory token and account
    pub fn logout(&self) {
        self.tokens.remove();
        self.state.send_if_modified(|s| {
            let changed = s.token.is_some() || s.account.is_some();
            s.token = None;
            s.account = None;
            changed
        });
        info!("Logged out");
    }

    async fn begin(&self) -> Call<'_> {
        let slot = self.queue.lock().await;
        Call {
            _loading: LoadingGuard::start(&self.state),
            _slot: slot,
        }
    }

    fn bearer(&self) -> Option<String> {
        self.hydrate_token();
        self.token()
    }

    fn establish(&self, auth: AuthResponse) -> Account {
        self.tokens.set(&auth.token);
        let account = auth.user;
        self.state.send_modify(|s| {
            s.token = Some(auth.token);
            s.account = Some(account.clone());
        });
        account
    }

    // ===== Remote operations =====

    /// Create an account. The new account still needs activation, so the
    /// session is left untouched.
    pub async fn register(&self, email: &str, password: &str) -> Result<Account, ApiError> {
        let _call = self.begin().await;
        match self.api.register(email, password).await {
            Ok(account) => {
                info!(id = %account.id, "Registered account");
                Ok(account)
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                Err(e)
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Account, ApiError> {
        let _call = self.begin().await;
        let auth = self.api.login(email, password).await.map_err(|e| {
            warn!(error = %e, "Login failed");
            e
        })?;
        let account = self.establish(auth);
        info!(id = %account.id, "Logged in");
        Ok(account)
    }

    /// Exchange a one-time activation token for a session
    pub async fn activate(&self, token: &str) -> Result<Account, ApiError> {
        let _call = self.begin().await;
        let auth = self.api.activate(token).await.map_err(|e| {
            warn!(error = %e, "Activation failed");
            e
        })?;
        let account = self.establish(auth);
        info!(id = %account.id, "Account activated");
        Ok(account)
    }

    /// Refresh the account from `/profile`. Any failure ends the session.
    pub async fn load_profile(&self) -> Result<Account, ApiError> {
        let _call = self.begin().await;
        let bearer = self.bearer();
        match self.api.profile(bearer.as_deref()).await {
            Ok(account) => {
                debug!(id = %account.id, "Profile loaded");
                self.state.send_modify(|s| s.account = Some(account.clone()));
                Ok(account)
            }
            Err(e) => {
                warn!(error = %e, "Profile load failed, clearing session");
                self.logout();
                Err(e)
            }
        }
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let _call = self.begin().await;
        let bearer = self.bearer();
        self.api
            .reset_password(bearer.as_deref(), email)
            .await
            .map_err(|e| {
                warn!(error = %e, "Password reset request failed");
                e
            })?;
        info!("Password reset requested");
        Ok(())
    }

    /// Set a new password using a reset token; the server answers with a
    /// fresh session.
    pub async fn change_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<Account, ApiError> {
        let _call = self.begin().await;
        let bearer = self.bearer();
        let auth = self
            .api
            .change_password(bearer.as_deref(), token, new_password)
            .await
            .map_err(|e| {
                warn!(error = %e, "Password change failed");
                e
            })?;
        let account = self.establish(auth);
        info!(id = %account.id, "Password changed");
        Ok(account)
    }

    /// Delete the loaded account on the server, then log out
    pub async fn delete_account(&self) -> Result<bool, ApiError> {
        let _call = self.begin().await;
        let id = self.account().map(|a| a.id).ok_or(ApiError::NoAccount)?;
        let bearer = self.bearer();
        self.api
            .delete_user(bearer.as_deref(), &id)
            .await
            .map_err(|e| {
                warn!(error = %e, id = %id, "Account deletion failed");
                e
            })?;
        info!(id = %id, "Account deleted");
        self.logout();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use crate::auth::token::MemoryTokenStore;
    use crate::models::AccountId;

    // -------------------------------------------------------------------------
    // StubApi
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct StubApi {
        failures: StdMutex<HashMap<&'static str, u16>>,
        calls: StdMutex<Vec<(&'static str, Option<String>)>>,
        issued: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        observer: StdMutex<Option<watch::Receiver<SessionSnapshot>>>,
        loading_seen: StdMutex<Vec<bool>>,
    }

    impl StubApi {
        fn failing(op: &'static str, status: u16) -> Self {
            let stub = Self::default();
            stub.fail(op, status);
            stub
        }

        fn fail(&self, op: &'static str, status: u16) {
            self.failures.lock().unwrap().insert(op, status);
        }

        fn calls(&self) -> Vec<(&'static str, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }

        fn watch_loading(&self, rx: watch::Receiver<SessionSnapshot>) {
            *self.observer.lock().unwrap() = Some(rx);
        }

        fn loading_seen(&self) -> Vec<bool> {
            self.loading_seen.lock().unwrap().clone()
        }

        async fn enter(&self, op: &'static str, bearer: Option<&str>) -> Result<(), ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((op, bearer.map(str::to_string)));
            let loading = self
                .observer
                .lock()
                .unwrap()
                .as_ref()
                .map(|rx| rx.borrow().loading);
            if let Some(loading) = loading {
                self.loading_seen.lock().unwrap().push(loading);
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let failure = self.failures.lock().unwrap().get(op).copied();
            match failure {
                Some(code) => Err(ApiError::from_status(
                    StatusCode::from_u16(code).unwrap(),
                    "stub failure",
                )),
                None => Ok(()),
            }
        }

        fn session(&self, email: &str) -> AuthResponse {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            AuthResponse {
                token: format!("T{}", n),
                user: Account::new(1, email),
            }
        }
    }

    #[async_trait]
    impl AuthApi for StubApi {
        async fn register(&self, email: &str, _password: &str) -> Result<Account, ApiError> {
            self.enter("register", None).await?;
            Ok(Account::new(5, email))
        }

        async fn login(&self, email: &str, _password: &str) -> Result<AuthResponse, ApiError> {
            self.enter("login", None).await?;
            Ok(self.session(email))
        }

        async fn activate(&self, _token: &str) -> Result<AuthResponse, ApiError> {
            self.enter("activate", None).await?;
            Ok(self.session("new@b.com"))
        }

        async fn profile(&self, bearer: Option<&str>) -> Result<Account, ApiError> {
            self.enter("profile", bearer).await?;
            if bearer.is_none() {
                return Err(ApiError::Unauthorized);
            }
            let mut account = Account::new(1, "a@b.com");
            account
                .profile
                .insert("plan".to_string(), serde_json::Value::from("pro"));
            Ok(account)
        }

        async fn reset_password(&self, bearer: Option<&str>, _email: &str) -> Result<(), ApiError> {
            self.enter("reset_password", bearer).await
        }

        async fn change_password(
            &self,
            bearer: Option<&str>,
            _token: &str,
            _password: &str,
        ) -> Result<AuthResponse, ApiError> {
            self.enter("change_password", bearer).await?;
            Ok(self.session("a@b.com"))
        }

        async fn delete_user(&self, bearer: Option<&str>, id: &AccountId) -> Result<(), ApiError> {
            self.enter("delete_user", bearer).await?;
            assert_eq!(id, &AccountId::Number(1));
            Ok(())
        }
    }

    type TestStore = SessionStore<StubApi, Arc<MemoryTokenStore>>;

    fn store_with(api: StubApi) -> (TestStore, Arc<MemoryTokenStore>) {
        let tokens = Arc::new(MemoryTokenStore::new());
        let store = SessionStore::new(api, Arc::clone(&tokens));
        store.api().watch_loading(store.subscribe());
        (store, tokens)
    }

    async fn logged_in(api: StubApi) -> (TestStore, Arc<MemoryTokenStore>) {
        let (store, tokens) = store_with(api);
        store.login("a@b.com", "pw").await.expect("login");
        (store, tokens)
    }

    fn assert_logged_out(store: &TestStore, tokens: &MemoryTokenStore) {
        assert_eq!(tokens.get(), None);
        assert_eq!(store.token(), None);
        assert_eq!(store.account(), None);
        assert!(!store.is_authenticated());
    }

    // -------------------------------------------------------------------------
    // Session establishment
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_sets_account_token_and_storage() {
        let (store, tokens) = store_with(StubApi::default());

        let account = store.login("a@b.com", "pw").await.expect("login");

        assert_eq!(account.id, AccountId::Number(1));
        assert_eq!(store.account().map(|a| a.id), Some(AccountId::Number(1)));
        assert_eq!(store.token().as_deref(), Some("T1"));
        assert_eq!(tokens.get().as_deref(), Some("T1"));
        assert!(!store.is_loading());
        assert_eq!(store.api().loading_seen(), vec![true]);
        assert_eq!(store.api().calls(), vec![("login", None)]);
    }

    #[tokio::test]
    async fn test_login_failure_leaves_state_alone() {
        let (store, tokens) = store_with(StubApi::failing("login", 401));
        tokens.set("OLD");
        store.hydrate_token();

        let err = store.login("a@b.com", "wrong").await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(store.token().as_deref(), Some("OLD"));
        assert_eq!(tokens.get().as_deref(), Some("OLD"));
        assert_eq!(store.account(), None);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_activate_establishes_session() {
        let (store, tokens) = store_with(StubApi::default());

        let account = store.activate("one-time").await.expect("activate");

        assert_eq!(account.email, "new@b.com");
        assert_eq!(store.account(), Some(account));
        assert_eq!(tokens.get().as_deref(), Some("T1"));
        assert_eq!(store.token().as_deref(), Some("T1"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_activate_failure_propagates() {
        let (store, tokens) = store_with(StubApi::failing("activate", 404));

        let err = store.activate("stale").await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert_logged_out(&store, &tokens);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_register_does_not_authenticate() {
        let (store, tokens) = store_with(StubApi::default());

        let account = store.register("new@b.com", "pw").await.expect("register");

        assert_eq!(account.email, "new@b.com");
        assert_logged_out(&store, &tokens);
        assert!(!store.is_loading());
        assert_eq!(store.api().loading_seen(), vec![true]);
    }

    #[tokio::test]
    async fn test_register_failure_resets_loading() {
        let (store, _tokens) = store_with(StubApi::failing("register", 422));

        let err = store.register("dup@b.com", "pw").await.unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert!(!store.is_loading());
    }

    // -------------------------------------------------------------------------
    // Logout and hydration
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_logout_clears_everything_without_network() {
        let (store, tokens) = logged_in(StubApi::default()).await;
        let calls_before = store.api().calls().len();

        store.logout();

        assert_logged_out(&store, &tokens);
        assert_eq!(store.api().calls().len(), calls_before);
    }

    #[test]
    fn test_logout_when_already_logged_out() {
        let (store, tokens) = store_with(StubApi::default());
        store.logout();
        assert_logged_out(&store, &tokens);
    }

    #[test]
    fn test_hydrate_reads_persisted_token_once() {
        let (store, tokens) = store_with(StubApi::default());
        tokens.set("PERSISTED");

        assert_eq!(store.token(), None);
        store.hydrate_token();
        assert_eq!(store.token().as_deref(), Some("PERSISTED"));

        // In-memory copy wins once hydrated
        tokens.set("CHANGED");
        store.hydrate_token();
        assert_eq!(store.token().as_deref(), Some("PERSISTED"));
    }

    #[test]
    fn test_hydrate_with_empty_storage() {
        let (store, _tokens) = store_with(StubApi::default());
        store.hydrate_token();
        assert_eq!(store.token(), None);
    }

    // -------------------------------------------------------------------------
    // Profile
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_load_profile_uses_persisted_token() {
        let (store, tokens) = store_with(StubApi::default());
        tokens.set("SAVED");

        let account = store.load_profile().await.expect("profile");

        assert_eq!(account.field("plan"), Some(&serde_json::Value::from("pro")));
        assert_eq!(store.account(), Some(account));
        assert_eq!(store.token().as_deref(), Some("SAVED"));
        assert_eq!(
            store.api().calls(),
            vec![("profile", Some("SAVED".to_string()))]
        );
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_load_profile_without_token_logs_out() {
        let (store, tokens) = store_with(StubApi::default());

        let err = store.load_profile().await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert_logged_out(&store, &tokens);
        assert!(!store.is_loading());
        assert_eq!(store.api().calls(), vec![("profile", None)]);
    }

    #[tokio::test]
    async fn test_load_profile_failure_clears_existing_session() {
        let (store, tokens) = logged_in(StubApi::default()).await;
        store.api().fail("profile", 500);

        let err = store.load_profile().await.unwrap_err();

        assert!(matches!(err, ApiError::ServerError { status: 500, .. }));
        assert_logged_out(&store, &tokens);
        assert!(!store.is_loading());
    }

    // -------------------------------------------------------------------------
    // Password management
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_password_reset_sends_bearer_and_keeps_state() {
        let (store, tokens) = logged_in(StubApi::default()).await;
        let before = store.snapshot();

        store
            .request_password_reset("a@b.com")
            .await
            .expect("reset");

        assert_eq!(store.snapshot(), before);
        assert_eq!(tokens.get().as_deref(), Some("T1"));
        assert_eq!(
            store.api().calls().last(),
            Some(&("reset_password", Some("T1".to_string())))
        );
    }

    #[tokio::test]
    async fn test_password_reset_failure_keeps_session() {
        let (store, tokens) = logged_in(StubApi::default()).await;
        store.api().fail("reset_password", 429);

        let err = store.request_password_reset("a@b.com").await.unwrap_err();

        assert!(matches!(err, ApiError::RateLimited));
        assert_eq!(tokens.get().as_deref(), Some("T1"));
        assert!(store.account().is_some());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_change_password_rotates_token() {
        let (store, tokens) = logged_in(StubApi::default()).await;

        let account = store
            .change_password("reset-token", "new-pw")
            .await
            .expect("change password");

        assert_eq!(store.account(), Some(account));
        assert_eq!(store.token().as_deref(), Some("T2"));
        assert_eq!(tokens.get().as_deref(), Some("T2"));
        assert_eq!(
            store.api().calls().last(),
            Some(&("change_password", Some("T1".to_string())))
        );
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_change_password_failure_propagates() {
        let (store, tokens) = logged_in(StubApi::default()).await;
        store.api().fail("change_password", 403);

        let err = store.change_password("bad", "pw").await.unwrap_err();

        assert!(matches!(err, ApiError::AccessDenied(_)));
        assert_eq!(tokens.get().as_deref(), Some("T1"));
        assert!(!store.is_loading());
    }

    // -------------------------------------------------------------------------
    // Account deletion
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_account_logs_out() {
        let (store, tokens) = logged_in(StubApi::default()).await;

        let deleted = store.delete_account().await.expect("delete");

        assert!(deleted);
        assert_logged_out(&store, &tokens);
        assert!(!store.is_loading());
        assert_eq!(
            store.api().calls().last(),
            Some(&("delete_user", Some("T1".to_string())))
        );
    }

    #[tokio::test]
    async fn test_delete_account_failure_is_an_error() {
        let (store, tokens) = logged_in(StubApi::default()).await;
        store.api().fail("delete_user", 500);

        let result = store.delete_account().await;

        assert!(matches!(result, Err(ApiError::ServerError { .. })));
        assert_eq!(tokens.get().as_deref(), Some("T1"));
        assert!(store.account().is_some());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_delete_without_account_skips_network() {
        let (store, _tokens) = store_with(StubApi::default());

        let result = store.delete_account().await;

        assert!(matches!(result, Err(ApiError::NoAccount)));
        assert!(store.api().calls().is_empty());
        assert!(!store.is_loading());
    }

    // -------------------------------------------------------------------------
    // Observation and ordering
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_subscribers_see_session_changes() {
        let (store, _tokens) = store_with(StubApi::default());
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.login("a@b.com", "pw").await.expect("login");
        assert!(rx.has_changed().expect("sender alive"));
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.token.as_deref(), Some("T1"));
        assert!(!snapshot.loading);

        store.logout();
        assert!(rx.has_changed().expect("sender alive"));
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn test_overlapping_calls_run_one_at_a_time() {
        let (store, tokens) = store_with(StubApi::default());

        let (first, second) = futures::join!(
            store.login("first@b.com", "pw"),
            store.login("second@b.com", "pw")
        );

        assert_eq!(first.expect("first login").email, "first@b.com");
        assert_eq!(second.expect("second login").email, "second@b.com");
        assert_eq!(store.api().max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(store.api().loading_seen(), vec![true, true]);

        // Last call wins
        assert_eq!(store.account().map(|a| a.email).as_deref(), Some("second@b.com"));
        assert_eq!(tokens.get().as_deref(), Some("T2"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_dropped_call_resets_loading() {
        let (store, _tokens) = store_with(StubApi::default());

        {
            let call = store.login("a@b.com", "pw");
            futures::pin_mut!(call);
            // Poll once so the call is in flight, then drop it
            assert!(futures::poll!(call.as_mut()).is_pending());
            assert!(store.is_loading());
        }

        assert!(!store.is_loading());
        assert_eq!(store.token(), None);
    }
}
