// Session lifecycle - lazy login, single-flight renewal
use crate::application::errors::{AuthError, PlatformError, RequestError};
use crate::application::telemetry_platform::TelemetryPlatform;
use crate::domain::session::{Credentials, Session, TokenPair};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct SessionState {
    session: Option<Session>,
    /// Outcome of the last completed login or renewal, if it failed.
    last_failure: Option<AuthError>,
}

/// Owns the tenant's current session.
///
/// The mutex is held across login and refresh calls, so callers that find the
/// session missing or stale at the same time wait for one network round trip
/// instead of racing each other with competing logins. Callers that queued
/// behind a failed attempt get its error rather than trying again.
pub struct SessionManager {
    platform: Arc<dyn TelemetryPlatform>,
    credentials: Credentials,
    state: Mutex<SessionState>,
    /// Completed login/renewal attempts, bumped under the state lock.
    attempts: AtomicU64,
}

impl SessionManager {
    pub fn new(platform: Arc<dyn TelemetryPlatform>, credentials: Credentials) -> Self {
        Self {
            platform,
            credentials,
            state: Mutex::new(SessionState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Log in with `credentials`, replacing the current session.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let mut state = self.state.lock().await;
        let result = self.request_login(credentials).await;
        self.record(&mut state, &result);
        result
    }

    /// Exchange the refresh token of `session` for a new pair. No retry.
    pub async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let mut state = self.state.lock().await;
        let result = self.request_refresh(session).await;
        self.record(&mut state, &result);
        result
    }

    /// Current session, logging in on first use.
    pub async fn ensure_session(&self) -> Result<Session, AuthError> {
        let seen = self.attempts.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(session) = state.session.as_ref() {
            return Ok(session.clone());
        }
        if let Some(err) = self.failed_since(&state, seen) {
            return Err(err);
        }

        let result = self.request_login(&self.credentials).await;
        self.record(&mut state, &result);
        result
    }

    /// Replace a session the platform rejected.
    ///
    /// If another caller already renewed it, the newer session is returned
    /// without a network call. Otherwise refresh is tried first and a full
    /// login second; when both fail the session is dropped.
    pub async fn renew(&self, stale: &Session) -> Result<Session, AuthError> {
        let seen = self.attempts.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(session) = state.session.as_ref() {
            if session.access_token != stale.access_token {
                return Ok(session.clone());
            }
        }
        if let Some(err) = self.failed_since(&state, seen) {
            return Err(err);
        }

        let result = match self.request_refresh(stale).await {
            Ok(session) => Ok(session),
            Err(err) => {
                tracing::warn!("Token refresh failed, logging in again: {}", err);
                self.request_login(&self.credentials).await
            }
        };
        self.record(&mut state, &result);
        result
    }

    /// Run a platform call with the current token. A 401 triggers one
    /// renewal and one retry; any other failure is returned as is.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T, RequestError>
    where
        F: Fn(Session) -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let session = self.ensure_session().await?;
        match op(session.clone()).await {
            Err(err) if err.is_unauthorized() => {
                tracing::debug!("Token rejected, renewing session");
                let renewed = self.renew(&session).await?;
                Ok(op(renewed).await?)
            }
            other => Ok(other?),
        }
    }

    /// The failure of an attempt that completed after the caller arrived.
    fn failed_since(&self, state: &SessionState, seen: u64) -> Option<AuthError> {
        if self.attempts.load(Ordering::SeqCst) == seen {
            return None;
        }
        state.last_failure.clone()
    }

    fn record(&self, state: &mut SessionState, result: &Result<Session, AuthError>) {
        match result {
            Ok(session) => {
                state.session = Some(session.clone());
                state.last_failure = None;
            }
            Err(err) => {
                state.session = None;
                state.last_failure = Some(err.clone());
            }
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    async fn request_login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let tokens = self.platform.login(credentials).await.map_err(|err| {
            tracing::error!("Login failed for {}: {}", credentials.username, err);
            AuthError::from(err)
        })?;
        let session = Self::session_from(tokens)?;
        tracing::info!("Authenticated as {}", credentials.username);
        Ok(session)
    }

    async fn request_refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let tokens = self.platform.refresh(session).await.map_err(|err| {
            tracing::error!("Token refresh failed: {}", err);
            AuthError::from(err)
        })?;
        let session = Self::session_from(tokens)?;
        tracing::info!("Tokens refreshed");
        Ok(session)
    }

    fn session_from(tokens: TokenPair) -> Result<Session, AuthError> {
        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(AuthError {
                status: None,
                message: "platform returned an empty token".to_string(),
            });
        }
        Ok(Session::from_tokens(tokens))
    }
}
