// Token acquisition request and background refresh task

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::credentials::Credentials;
use super::manager::TokenManager;
use super::types::TokenResponse;
use crate::error::{Result, SireneError};

/// Timing knobs for token renewal
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    /// `acquire()` is a no-op while more than this much validity remains
    pub renew_margin: Duration,
    /// Extra attempts after a failed acquisition inside `refresh()`
    pub retry_attempts: u32,
    /// Pause between attempts, also used after a failed cycle
    pub retry_delay: Duration,
    /// Next refresh runs after `expires_in / refresh_divisor`
    pub refresh_divisor: u32,
    /// Tokens valid for less than this use `short_validity_interval`
    pub short_validity_threshold: Duration,
    pub short_validity_interval: Duration,
    /// Wait before the first background cycle
    pub initial_delay: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            renew_margin: Duration::from_secs(12 * 3600),
            retry_attempts: 2,
            retry_delay: Duration::from_secs(60),
            refresh_divisor: 14,
            short_validity_threshold: Duration::from_secs(600_000),
            short_validity_interval: Duration::from_secs(12 * 3600),
            initial_delay: Duration::from_secs(60),
        }
    }
}

impl RefreshPolicy {
    /// Delay until the next refresh for a token valid `expires_in` seconds
    pub fn next_interval(&self, expires_in: i64) -> Duration {
        let validity = Duration::from_secs(expires_in.max(0) as u64);

        if validity < self.short_validity_threshold {
            // Never wait past the token's own lifetime
            return self
                .short_validity_interval
                .min(validity / 2)
                .max(Duration::from_secs(1));
        }

        (validity / self.refresh_divisor.max(1)).max(Duration::from_secs(1))
    }
}

/// POST a client-credentials grant to the token endpoint
pub async fn request_token(
    client: &Client,
    token_url: &str,
    creds: &Credentials,
) -> Result<TokenResponse> {
    tracing::debug!(url = %token_url, key = %creds.key(), "Requesting Sirene token...");

    let response = client
        .post(token_url)
        .header(AUTHORIZATION, creds.basic_authorization())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!(
            status = status.as_u16(),
            body = %body,
            "Token request rejected"
        );
        return Err(SireneError::Auth {
            status: status.as_u16(),
            message: format!("Server answered: {} - {}", status, body),
        });
    }

    let data: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        tracing::error!(error = %e, body = %body, "Token response is not valid JSON");
        SireneError::Auth {
            status: status.as_u16(),
            message: format!("invalid token response: {} (body was: {})", e, body),
        }
    })?;

    if data.access_token.is_empty() {
        tracing::error!(body = %body, "Token response does not contain access_token");
        return Err(SireneError::Auth {
            status: status.as_u16(),
            message: "returned token is empty".to_string(),
        });
    }

    tracing::info!(
        token_type = %data.token_type,
        expires_in = data.expires_in,
        "Sirene token acquired"
    );

    Ok(data)
}

/// Progress of the background refresher
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshStatus {
    /// Completed refresh cycles, successful or not
    pub cycles: u64,
    /// Delay before the next cycle
    pub next_delay: Option<Duration>,
    /// Error of the last cycle, cleared on success
    pub last_error: Option<String>,
}

/// Handle on a running refresher task
///
/// Dropping the handle cancels the task.
pub struct RefreshHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    status: watch::Receiver<RefreshStatus>,
}

impl RefreshHandle {
    /// Subscribe to refresh progress
    pub fn status(&self) -> watch::Receiver<RefreshStatus> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the task and wait for it to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Token refresher exited abnormally");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the recurring refresh task for `manager`
pub(super) fn spawn_refresher(manager: Arc<TokenManager>) -> RefreshHandle {
    let cancel = CancellationToken::new();
    let (tx, rx) = watch::channel(RefreshStatus::default());

    let task = tokio::spawn(refresh_loop(manager, tx, cancel.clone()));

    RefreshHandle {
        cancel,
        task: Some(task),
        status: rx,
    }
}

async fn refresh_loop(
    manager: Arc<TokenManager>,
    status: watch::Sender<RefreshStatus>,
    cancel: CancellationToken,
) {
    let policy = manager.policy().clone();
    let mut delay = policy.initial_delay;

    tracing::info!(
        first_run_in = ?delay,
        "Token refresher started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = manager.refresh() => outcome,
        };

        delay = match outcome {
            Ok(next) => {
                tracing::info!(next_refresh_in = ?next, "Token refresh cycle complete");
                status.send_modify(|s| {
                    s.cycles += 1;
                    s.next_delay = Some(next);
                    s.last_error = None;
                });
                next
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    retry_in = ?policy.retry_delay,
                    "Token refresh cycle failed"
                );
                status.send_modify(|s| {
                    s.cycles += 1;
                    s.next_delay = Some(policy.retry_delay);
                    s.last_error = Some(e.to_string());
                });
                policy.retry_delay
            }
        };
    }

    tracing::info!("Token refresher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use chrono::Utc;

    fn token(expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: "seeded".to_string(),
            token_type: "Bearer".to_string(),
            scope: "am_application_scope default".to_string(),
            expires_in,
        }
    }

    #[test]
    fn test_weekly_token_refreshes_twice_a_day() {
        let policy = RefreshPolicy::default();
        assert_eq!(policy.next_interval(604_800), Duration::from_secs(43_200));
        assert_eq!(policy.next_interval(1_209_600), Duration::from_secs(86_400));
    }

    #[test]
    fn test_short_token_uses_fallback_interval() {
        let policy = RefreshPolicy::default();
        // Below the threshold but long enough for the full fallback
        assert_eq!(policy.next_interval(599_999), Duration::from_secs(43_200));
        // Fallback clamped to half the validity
        assert_eq!(policy.next_interval(3_600), Duration::from_secs(1_800));
    }

    #[test]
    fn test_degenerate_validity_never_spins() {
        let policy = RefreshPolicy::default();
        assert_eq!(policy.next_interval(0), Duration::from_secs(1));
        assert_eq!(policy.next_interval(-5), Duration::from_secs(1));
    }

    #[test]
    fn test_custom_divisor() {
        let policy = RefreshPolicy {
            refresh_divisor: 7,
            short_validity_threshold: Duration::from_secs(60),
            ..RefreshPolicy::default()
        };
        assert_eq!(policy.next_interval(7_000), Duration::from_secs(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_schedules_from_token_validity() {
        let policy = RefreshPolicy {
            initial_delay: Duration::from_secs(60),
            ..RefreshPolicy::default()
        };
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = Arc::new(TokenManager::new_for_testing(
            token(604_800),
            policy,
            clock,
        ));

        let handle = manager.start_refresher();
        let mut status = handle.status();
        let started = tokio::time::Instant::now();

        status.changed().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
        {
            let s = status.borrow();
            assert_eq!(s.cycles, 1);
            assert_eq!(s.next_delay, Some(Duration::from_secs(43_200)));
            assert!(s.last_error.is_none());
        }

        status.changed().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(43_260) && elapsed < Duration::from_secs(43_261));
        assert_eq!(status.borrow().cycles, 2);

        assert!(manager.is_authenticated().await);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_record_error_and_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(503)
            .with_body("maintenance")
            .expect(6)
            .create_async()
            .await;

        let policy = RefreshPolicy {
            initial_delay: Duration::ZERO,
            ..RefreshPolicy::default()
        };
        let retry_delay = policy.retry_delay;
        // No pooled connections, so no idle timers move the paused clock
        let client = Client::builder().pool_max_idle_per_host(0).build().unwrap();
        let manager = Arc::new(TokenManager::new(
            Credentials::new("key", "secret"),
            format!("{}/token", server.url()),
            policy,
            client,
        ));

        let handle = manager.start_refresher();
        let mut status = handle.status();
        let started = tokio::time::Instant::now();

        // First cycle: three attempts, two retry pauses
        status.changed().await.unwrap();
        {
            let s = status.borrow_and_update();
            assert_eq!(s.cycles, 1);
            assert_eq!(s.next_delay, Some(retry_delay));
            assert!(s.last_error.as_deref().is_some_and(|e| e.contains("503")));
        }
        assert!(started.elapsed() >= retry_delay * 2);

        // Second cycle starts after one more retry pause
        status.changed().await.unwrap();
        {
            let s = status.borrow_and_update();
            assert_eq!(s.cycles, 2);
            assert!(s.last_error.is_some());
        }
        assert!(started.elapsed() >= retry_delay * 5);
        assert!(!manager.is_authenticated().await);

        assert!(handle.is_running());
        handle.stop().await;
        mock.assert_async().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_sleep() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = Arc::new(TokenManager::new_for_testing(
            token(604_800),
            RefreshPolicy::default(),
            clock,
        ));

        let handle = manager.start_refresher();
        let status = handle.status();
        assert!(handle.is_running());

        handle.stop().await;
        assert_eq!(status.borrow().cycles, 0);
    }
}
