use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Credentials, RefreshHandle, TokenManager};
use crate::config::Config;
use crate::error::{Result, SireneError};
use crate::models::{SirenResponse, SirenSearchResponse};

/// HTTP client for the Sirene registry API
pub struct SireneClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Token manager providing the Authorization header
    auth_manager: Arc<TokenManager>,

    /// Base URL of the `siren` resource, without trailing slash
    api_url: String,
}

/// Build the pooled reqwest client shared by token and API calls
pub fn build_http_client(
    max_connections: usize,
    connect_timeout: u64,
    request_timeout: u64,
) -> Result<Client> {
    let client = Client::builder()
        .pool_max_idle_per_host(max_connections)
        .connect_timeout(Duration::from_secs(connect_timeout))
        .timeout(Duration::from_secs(request_timeout))
        .build()?;
    Ok(client)
}

impl SireneClient {
    /// Create a client over an existing token manager
    pub fn new(client: Client, auth_manager: Arc<TokenManager>, api_url: &str) -> Self {
        Self {
            client,
            auth_manager,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an unauthenticated client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(
            config.http_max_connections,
            config.http_connect_timeout,
            config.http_request_timeout,
        )?;

        let auth_manager = Arc::new(TokenManager::new(
            Credentials::new(config.sirene_key.clone(), config.sirene_secret.clone()),
            config.token_url.clone(),
            config.refresh_policy(),
            client.clone(),
        ));

        Ok(Self::new(client, auth_manager, &config.api_url))
    }

    /// Create a client and acquire its first token
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = Self::from_config(config)?;
        client.auth_manager.acquire().await?;
        Ok(client)
    }

    /// Create a client, acquire a token and keep it refreshed in the background
    pub async fn connect_refreshed(config: &Config) -> Result<(Self, RefreshHandle)> {
        let client = Self::connect(config).await?;
        let handle = client.auth_manager.start_refresher();
        Ok((client, handle))
    }

    pub fn auth_manager(&self) -> &Arc<TokenManager> {
        &self.auth_manager
    }

    /// Whether the registry knows `siren`
    ///
    /// 404 maps to `Ok(false)`, any other failure is an error.
    pub async fn siren_exists(&self, siren: &str) -> Result<bool> {
        let url = format!("{}/{}", self.api_url, siren);
        let response = self.send_get(&url).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(siren = %siren, "SIREN not found");
            return Ok(false);
        }

        Err(Self::api_error(response, "siren_exists", siren).await)
    }

    /// Fetch one legal unit by SIREN
    pub async fn get_siren(&self, siren: &str) -> Result<SirenResponse> {
        let url = format!("{}/{}", self.api_url, siren);
        let response = self.send_get(&url).await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response, "get_siren", siren).await);
        }

        Self::decode(response, "get_siren", siren).await
    }

    /// Multi-criteria search
    ///
    /// Terms are joined with `&` after `q=`: the first is the query, later
    /// ones may carry extra parameters such as `nombre=20`.
    pub async fn search<S: AsRef<str>>(&self, terms: &[S]) -> Result<SirenSearchResponse> {
        if terms.is_empty() {
            return Err(SireneError::Config("search query is empty".to_string()));
        }

        let query = terms
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?q={}", self.api_url, query);
        let response = self.send_get(&url).await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response, "search", &query).await);
        }

        Self::decode(response, "search", &query).await
    }

    /// Send an authenticated GET, without retry
    async fn send_get(&self, url: &str) -> Result<Response> {
        if !self.auth_manager.is_authenticated().await {
            tracing::warn!(url = %url, "Request refused: not authenticated");
            return Err(SireneError::NotAuthenticated);
        }
        let authorization = self.auth_manager.authorization_header().await?;

        tracing::debug!(method = "GET", url = %url, "Sending HTTP request");

        let result = self
            .client
            .get(url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .send()
            .await;

        match result {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Received HTTP response");
                Ok(response)
            }
            Err(e) => {
                // Categorize the error for better debugging
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else if e.is_body() {
                    "body_error"
                } else {
                    "unknown"
                };

                tracing::error!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    "HTTP request failed"
                );
                Err(SireneError::Transport(e))
            }
        }
    }

    async fn api_error(response: Response, operation: &str, subject: &str) -> SireneError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        tracing::error!(
            operation = operation,
            subject = %subject,
            status = status.as_u16(),
            response_body = %body,
            "Sirene API returned an error"
        );

        SireneError::Api {
            status: status.as_u16(),
            message: format!("server status: {} body was: {}", status, body),
        }
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        operation: &str,
        subject: &str,
    ) -> Result<T> {
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                operation = operation,
                subject = %subject,
                error = %e,
                response_body = %body,
                "Sirene API returned invalid JSON"
            );
            SireneError::Decode {
                message: e.to_string(),
                body,
            }
        })
    }
}
