use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Credentials;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

/// Gate state for one browser session. There is no way back to
/// `Unauthenticated` short of the session expiring.
#[derive(Debug, Clone)]
pub struct Session {
    state: AuthState,
    last_seen: Instant,
}

impl Session {
    pub fn new(now: Instant) -> Self {
        Self {
            state: AuthState::Unauthenticated,
            last_seen: now,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    #[cfg(test)]
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Returns whether this call moved the session to `Authenticated`.
    pub fn login(
        &mut self,
        submitted: &Credentials,
        expected: &Credentials,
    ) -> Result<bool, AuthError> {
        if submitted.username != expected.username || submitted.password != expected.password {
            return Err(AuthError::InvalidCredentials);
        }

        let transitioned = self.state == AuthState::Unauthenticated;
        self.state = AuthState::Authenticated;
        Ok(transitioned)
    }
}

/// One-shot gate for the CLI: a fresh session that has to log in before
/// anything is read.
pub fn authorize(submitted: &Credentials, expected: &Credentials) -> Result<(), AuthError> {
    let mut session = Session::new(Instant::now());
    if let Err(err) = session.login(submitted, expected) {
        tracing::warn!(username = %submitted.username, "rejected report request");
        return Err(err);
    }
    Ok(())
}

/// In-memory sessions keyed by the id stored in the browser cookie.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub async fn state(&self, id: Option<Uuid>) -> AuthState {
        self.state_at(id, Instant::now()).await
    }

    /// Current state of session `id`, refreshing its idle timer. Unknown or
    /// expired sessions are unauthenticated.
    pub async fn state_at(&self, id: Option<Uuid>, now: Instant) -> AuthState {
        let Some(id) = id else {
            return AuthState::Unauthenticated;
        };

        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if now.duration_since(session.last_seen) <= self.idle_ttl => {
                session.last_seen = now;
                session.state()
            }
            Some(_) => {
                sessions.remove(&id);
                tracing::debug!(session = %id, "session expired");
                AuthState::Unauthenticated
            }
            None => AuthState::Unauthenticated,
        }
    }

    pub async fn login(
        &self,
        id: Option<Uuid>,
        submitted: &Credentials,
        expected: &Credentials,
    ) -> Result<Uuid, AuthError> {
        self.login_at(id, submitted, expected, Instant::now()).await
    }

    /// Authenticates session `id`, or a new session when `id` is unknown.
    /// Failed attempts leave the store untouched.
    pub async fn login_at(
        &self,
        id: Option<Uuid>,
        submitted: &Credentials,
        expected: &Credentials,
        now: Instant,
    ) -> Result<Uuid, AuthError> {
        let mut sessions = self.sessions.write().await;
        let idle_ttl = self.idle_ttl;
        sessions.retain(|_, session| now.duration_since(session.last_seen) <= idle_ttl);

        let mut session = id
            .and_then(|id| sessions.get(&id).cloned())
            .unwrap_or_else(|| Session::new(now));

        match session.login(submitted, expected) {
            Ok(_) => {
                session.last_seen = now;
                let id = id
                    .filter(|id| sessions.contains_key(id))
                    .unwrap_or_else(Uuid::new_v4);
                sessions.insert(id, session);
                tracing::info!(username = %submitted.username, "operator logged in");
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(username = %submitted.username, "rejected login attempt");
                Err(err)
            }
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn correct_credentials_transition_exactly_once() {
        let expected = creds("operator", "s3cret");
        let mut session = Session::new(Instant::now());

        assert_eq!(session.login(&expected, &expected), Ok(true));
        assert!(session.is_authenticated());
        assert_eq!(session.login(&expected, &expected), Ok(false));
        assert_eq!(session.state(), AuthState::Authenticated);
    }

    #[test]
    fn wrong_credentials_never_transition() {
        let expected = creds("operator", "s3cret");
        let mut session = Session::new(Instant::now());

        for attempt in [
            creds("operator", "S3cret"),
            creds("Operator", "s3cret"),
            creds("operator ", "s3cret"),
            creds("", ""),
        ] {
            assert_eq!(session.login(&attempt, &expected), Err(AuthError::InvalidCredentials));
            assert_eq!(session.state(), AuthState::Unauthenticated);
        }
    }

    #[test]
    fn cli_gate_needs_the_operator_pair() {
        let expected = creds("operator", "s3cret");

        assert_eq!(authorize(&expected, &expected), Ok(()));
        assert_eq!(
            authorize(&creds("operator", ""), &expected),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            authorize(&creds("", "s3cret"), &expected),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn store_tracks_sessions_independently() {
        let expected = creds("operator", "s3cret");
        let store = SessionStore::new(Duration::from_secs(60));

        let id = store.login(None, &expected, &expected).await.unwrap();
        assert_eq!(store.state(Some(id)).await, AuthState::Authenticated);
        assert_eq!(store.state(Some(Uuid::new_v4())).await, AuthState::Unauthenticated);
        assert_eq!(store.state(None).await, AuthState::Unauthenticated);

        // Logging in again on the same session keeps its id.
        let again = store.login(Some(id), &expected, &expected).await.unwrap();
        assert_eq!(again, id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn failed_login_leaves_store_untouched() {
        let expected = creds("operator", "s3cret");
        let store = SessionStore::new(Duration::from_secs(60));

        for _ in 0..5 {
            let err = store
                .login(None, &creds("operator", "guess"), &expected)
                .await
                .unwrap_err();
            assert_eq!(err, AuthError::InvalidCredentials);
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let expected = creds("operator", "s3cret");
        let store = SessionStore::new(Duration::from_secs(60));
        let start = Instant::now();

        let id = store.login_at(None, &expected, &expected, start).await.unwrap();
        let later = start + Duration::from_secs(30);
        assert_eq!(store.state_at(Some(id), later).await, AuthState::Authenticated);

        let much_later = later + Duration::from_secs(61);
        assert_eq!(store.state_at(Some(id), much_later).await, AuthState::Unauthenticated);
        assert_eq!(store.len().await, 0);
    }
}
