//! Session store: the single source of truth for who is signed in.
//!
//! The store is a cheap, clonable handle passed to every view. Its fields are
//! private; the only mutations are [`SessionStore::login`],
//! [`SessionStore::register`], [`SessionStore::logout`] and
//! [`SessionStore::refresh`], each written through to [`SessionStorage`].

pub mod storage;

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::http::{self, Endpoint};
use crate::models::{LoginReq, RegisterReq, TokenResponse, User};

pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};

/// Persisted session record, stored as `{token, user, isAuthenticated}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "isAuthenticated")]
    pub is_authenticated: bool,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        *self == Session::default()
    }

    /// Drops the authenticated flag when no token backs it.
    fn normalized(mut self) -> Self {
        if self.token.is_none() {
            self.is_authenticated = false;
        }
        self
    }
}

/// Emitted only when the session actually changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String },
    Refreshed { user_id: String },
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No token held, nothing was sent.
    NoSession,
    Validated(User),
    /// The token changed while the check was in flight; the result was dropped.
    Superseded,
}

struct Inner {
    state: RwLock<Session>,
    storage: Box<dyn SessionStorage>,
    endpoint: Endpoint,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Clone)]
pub struct SessionStore(Arc<Inner>);

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.0.state.read();
        f.debug_struct("SessionStore")
            .field("user", &state.user.as_ref().map(|u| &u.id))
            .field("is_authenticated", &state.is_authenticated)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates the store, rehydrating whatever `storage` holds.
    pub fn new(endpoint: Endpoint, storage: impl SessionStorage + 'static) -> Self {
        let initial = match storage.load() {
            Ok(Some(session)) => session.normalized(),
            Ok(None) => Session::default(),
            Err(err) => {
                warn!("cannot read stored session, starting signed out: {err}");
                Session::default()
            }
        };
        debug!(authenticated = initial.is_authenticated, "session rehydrated");

        let (events, _) = broadcast::channel(16);
        Self(Arc::new(Inner {
            state: RwLock::new(initial),
            storage: Box::new(storage),
            endpoint,
            events,
        }))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.0.endpoint
    }

    pub fn snapshot(&self) -> Session {
        self.0.state.read().clone()
    }

    /// Current bearer token, read fresh on every call.
    pub fn token(&self) -> Option<String> {
        self.0.state.read().token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.0.state.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.state.read().is_authenticated
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.0.events.subscribe()
    }

    /// Signs in with an e-mail (or username) and password.
    ///
    /// Nothing is stored unless both the token and the user profile were
    /// obtained; on failure the previous session is left untouched.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, ClientError> {
        let response = self
            .0
            .endpoint
            .request(Method::POST, "auth/login")?
            .form(&LoginReq {
                username: identifier,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let message = http::error_message(response).await;
            warn!("login rejected: {message}");
            return Err(ClientError::Auth(message));
        }

        let granted: TokenResponse = http::decode(response).await?;
        self.complete_sign_in(granted, "Login failed").await
    }

    /// Creates an account and signs in with it, atomically.
    pub async fn register(
        &self,
        name: &str,
        identifier: &str,
        password: &str,
    ) -> Result<User, ClientError> {
        let response = self
            .0
            .endpoint
            .request(Method::POST, "auth/register")?
            .json(&RegisterReq {
                name,
                email: identifier,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let message = http::error_message(response).await;
            warn!("registration rejected: {message}");
            return Err(ClientError::Auth(message));
        }

        let granted: TokenResponse = http::decode(response).await?;
        self.complete_sign_in(granted, "Registration failed").await
    }

    async fn complete_sign_in(
        &self,
        granted: TokenResponse,
        failure: &str,
    ) -> Result<User, ClientError> {
        let user = match granted.user {
            Some(user) => user,
            None => self
                .fetch_me(&granted.access_token)
                .await
                .map_err(|err| match err {
                    ClientError::Unauthorized => ClientError::Auth(failure.to_string()),
                    other => other,
                })?,
        };

        let mut state = self.0.state.write();
        *state = Session {
            user: Some(user.clone()),
            token: Some(granted.access_token),
            is_authenticated: true,
        };
        self.persist(&state);
        drop(state);

        info!(user = %user.id, "signed in");
        self.emit(SessionEvent::SignedIn {
            user_id: user.id.clone(),
        });
        Ok(user)
    }

    /// Clears the session locally. Returns whether anything was cleared.
    pub fn logout(&self) -> bool {
        let mut state = self.0.state.write();
        if state.is_empty() {
            return false;
        }
        *state = Session::default();
        self.persist(&state);
        drop(state);

        info!("signed out");
        self.emit(SessionEvent::SignedOut);
        true
    }

    /// Clears the session only if it still holds `token`.
    ///
    /// Used when a request made with `token` was rejected: a rejection of a
    /// token that has since been replaced must not end the newer session.
    pub fn expire(&self, token: &str) -> bool {
        {
            let state = self.0.state.read();
            if state.token.as_deref() != Some(token) {
                debug!("ignoring rejection of a replaced token");
                return false;
            }
        }
        // Re-checked under the write lock inside `logout_matching`.
        self.logout_matching(token)
    }

    fn logout_matching(&self, token: &str) -> bool {
        let mut state = self.0.state.write();
        if state.token.as_deref() != Some(token) {
            return false;
        }
        *state = Session::default();
        self.persist(&state);
        drop(state);

        info!("session expired, signed out");
        self.emit(SessionEvent::SignedOut);
        true
    }

    /// Re-validates the held token against `GET /auth/me`.
    ///
    /// Any failure, including a network error, signs the session out.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ClientError> {
        let Some(token) = self.token() else {
            return Ok(RefreshOutcome::NoSession);
        };

        match self.fetch_me(&token).await {
            Ok(user) => {
                let mut state = self.0.state.write();
                if state.token.as_deref() != Some(token.as_str()) {
                    debug!("dropping refresh result for a replaced token");
                    return Ok(RefreshOutcome::Superseded);
                }
                state.user = Some(user.clone());
                state.is_authenticated = true;
                self.persist(&state);
                drop(state);

                debug!(user = %user.id, "session refreshed");
                self.emit(SessionEvent::Refreshed {
                    user_id: user.id.clone(),
                });
                Ok(RefreshOutcome::Validated(user))
            }
            Err(err) => {
                warn!("session validation failed: {err}");
                self.expire(&token);
                Err(err)
            }
        }
    }

    async fn fetch_me(&self, token: &str) -> Result<User, ClientError> {
        let response = self
            .0
            .endpoint
            .request(Method::GET, "auth/me")?
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            http::decode(response).await
        } else {
            Err(http::status_error(response).await)
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(err) = self.0.storage.save(session) {
            warn!("failed to persist session: {err}");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.0.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_endpoint() -> Endpoint {
        Endpoint::with_timeout(
            "http://127.0.0.1:9/".parse().unwrap(),
            Duration::from_millis(200),
        )
        .unwrap()
    }

    fn stored(token: Option<&str>, authenticated: bool) -> Session {
        Session {
            user: Some(User {
                id: "u1".into(),
                email: "user@example.com".into(),
                name: None,
                username: None,
                created_at: None,
            }),
            token: token.map(str::to_string),
            is_authenticated: authenticated,
        }
    }

    #[test]
    fn rehydrates_from_storage() {
        let store = SessionStore::new(
            offline_endpoint(),
            MemoryStorage::with_session(stored(Some("T1"), true)),
        );
        assert_eq!(store.token().as_deref(), Some("T1"));
        assert!(store.is_authenticated());
    }

    #[test]
    fn authenticated_without_token_is_normalized() {
        let store = SessionStore::new(
            offline_endpoint(),
            MemoryStorage::with_session(stored(None, true)),
        );
        assert!(!store.is_authenticated());
    }

    #[test]
    fn logout_is_idempotent() {
        let store = SessionStore::new(
            offline_endpoint(),
            MemoryStorage::with_session(stored(Some("T1"), true)),
        );
        let mut events = store.subscribe();

        assert!(store.logout());
        let once = store.snapshot();
        assert!(!store.logout());
        let twice = store.snapshot();

        assert_eq!(once, Session::default());
        assert_eq!(once, twice);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedOut);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn expire_ignores_replaced_token() {
        let store = SessionStore::new(
            offline_endpoint(),
            MemoryStorage::with_session(stored(Some("T2"), true)),
        );
        assert!(!store.expire("T1"));
        assert!(store.is_authenticated());
        assert!(store.expire("T2"));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn refresh_without_token_is_noop() {
        let store = SessionStore::new(offline_endpoint(), MemoryStorage::new());
        assert_eq!(store.refresh().await.unwrap(), RefreshOutcome::NoSession);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn refresh_network_failure_signs_out() {
        let store = SessionStore::new(
            offline_endpoint(),
            MemoryStorage::with_session(stored(Some("T1"), true)),
        );
        let err = store.refresh().await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {err:?}");
        assert_eq!(store.snapshot(), Session::default());
    }
}
