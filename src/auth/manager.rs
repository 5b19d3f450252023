use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::clock::{Clock, SystemClock};
use super::credentials::Credentials;
use super::refresh::{self, RefreshHandle, RefreshPolicy};
use super::types::TokenState;
use crate::error::{Result, SireneError};

/// Token manager
/// Owns the credential pair and the current token, renews it on demand or from a background task
pub struct TokenManager {
    /// Consumer key and secret
    credentials: Credentials,

    /// Token endpoint URL
    token_url: String,

    /// Current token record, replaced wholesale on every acquisition
    state: RwLock<TokenState>,

    /// Serializes acquisitions so only one token request is in flight
    acquire_lock: Mutex<()>,

    /// HTTP client for token requests
    client: Client,

    /// Time source for validity checks
    clock: Arc<dyn Clock>,

    /// Renewal timings
    policy: RefreshPolicy,
}

impl TokenManager {
    /// Create an unauthenticated manager, no network call is made
    pub fn new(
        credentials: Credentials,
        token_url: impl Into<String>,
        policy: RefreshPolicy,
        client: Client,
    ) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            state: RwLock::new(TokenState::unauthenticated()),
            acquire_lock: Mutex::new(()),
            client,
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create a manager already holding `token`, issued at the clock's current time
    /// Available in test builds and integration tests
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(
        token: super::types::TokenResponse,
        policy: RefreshPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = TokenState::issued(token, clock.now());
        Self {
            credentials: Credentials::new("test-key", "test-secret"),
            token_url: "http://127.0.0.1:9/token".to_string(),
            state: RwLock::new(state),
            acquire_lock: Mutex::new(()),
            client: Client::new(),
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Held token still has more than the renew margin left
    fn is_fresh(&self, state: &TokenState) -> bool {
        let now = self.clock.now();
        if !state.is_valid_at(now) {
            return false;
        }
        let margin = self.policy.renew_margin.as_secs() as i64;
        state
            .remaining(now)
            .is_some_and(|left| left.num_seconds() > margin)
    }

    /// Acquire a token unless the current one is still fresh
    pub async fn acquire(&self) -> Result<()> {
        if self.is_fresh(&*self.state.read().await) {
            return Ok(());
        }

        let _guard = self.acquire_lock.lock().await;

        // Another caller may have renewed while we waited
        if self.is_fresh(&*self.state.read().await) {
            return Ok(());
        }

        self.credentials.validate()?;

        let issued_at = self.clock.now();
        match refresh::request_token(&self.client, &self.token_url, &self.credentials).await {
            Ok(token) => {
                let mut state = self.state.write().await;
                *state = TokenState::issued(token, issued_at);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Token acquisition failed");
                let mut state = self.state.write().await;
                *state = TokenState::unauthenticated();
                Err(e)
            }
        }
    }

    /// Acquire with bounded retries, returning the delay until the next refresh
    ///
    /// Every failure gets `1 + retry_attempts` tries except a `Config` error
    /// (empty key or secret), which is returned at once: retrying cannot fix it.
    pub async fn refresh(&self) -> Result<Duration> {
        let attempts = self.policy.retry_attempts + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.acquire().await {
                Ok(()) => {
                    let expires_in = self
                        .state
                        .read()
                        .await
                        .token
                        .as_ref()
                        .map(|t| t.expires_in)
                        .unwrap_or_default();
                    return Ok(self.policy.next_interval(expires_in));
                }
                Err(e @ SireneError::Config(_)) => return Err(e),
                Err(e) if attempt >= attempts => {
                    tracing::error!(
                        error = %e,
                        total_attempts = attempt,
                        "Token refresh failed after all retries"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "Token refresh failed: {}, retrying after {:?} (attempt {}/{})",
                        e,
                        self.policy.retry_delay,
                        attempt,
                        attempts
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }

    /// Authenticated and not expired
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_valid_at(self.clock.now())
    }

    /// `Authorization` header value for API calls
    pub async fn authorization_header(&self) -> Result<String> {
        let state = self.state.read().await;
        if !state.is_valid_at(self.clock.now()) {
            return Err(SireneError::NotAuthenticated);
        }
        state.authorization().ok_or(SireneError::NotAuthenticated)
    }

    /// Copy of the whole token record
    pub async fn snapshot(&self) -> TokenState {
        self.state.read().await.clone()
    }

    /// Drop the held token so the next `acquire()` goes to the network
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        *state = TokenState::unauthenticated();
        tracing::debug!("Token invalidated");
    }

    /// Start the background refresher for this manager
    pub fn start_refresher(self: &Arc<Self>) -> RefreshHandle {
        refresh::spawn_refresher(Arc::clone(self))
    }

    #[cfg(test)]
    async fn install(&self, state: TokenState) {
        *self.state.write().await = state;
    }
}
