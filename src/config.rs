use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::auth::RefreshPolicy;

pub const DEFAULT_TOKEN_URL: &str = "https://api.insee.fr/token";
pub const DEFAULT_API_URL: &str = "https://api.insee.fr/entreprises/sirene/V3/siren";

/// Sirene Client - INSEE registry lookups with managed OAuth tokens
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Consumer key of the INSEE API application
    #[arg(short = 'k', long, env = "SIRENE_KEY")]
    pub key: Option<String>,

    /// Consumer secret of the INSEE API application
    #[arg(short = 's', long, env = "SIRENE_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// OAuth token endpoint
    #[arg(long, env = "SIRENE_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: String,

    /// Base URL of the siren resource
    #[arg(long, env = "SIRENE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Extra token attempts after a failed refresh
    #[arg(long, env = "TOKEN_RETRY_ATTEMPTS", default_value = "2")]
    pub retry_attempts: u32,

    /// Seconds between token attempts
    #[arg(long, env = "TOKEN_RETRY_DELAY", default_value = "60")]
    pub retry_delay: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check whether a SIREN is known to the registry
    Exists { siren: String },

    /// Print the legal unit registered under a SIREN
    Get {
        siren: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Multi-criteria search, e.g. `periode(denominationUniteLegale:Google*)`
    Search {
        /// Query, followed by optional raw parameters such as `nombre=20`
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Keep a token refreshed until interrupted
    Watch,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub sirene_key: String,
    pub sirene_secret: String,

    // Endpoints
    pub token_url: String,
    pub api_url: String,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Token lifecycle (seconds)
    pub token_renew_margin: u64,
    pub token_retry_attempts: u32,
    pub token_retry_delay: u64,
    pub token_refresh_divisor: u32,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let policy = RefreshPolicy::default();
        Self {
            sirene_key: String::new(),
            sirene_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            http_max_connections: 20,
            http_connect_timeout: 30,
            http_request_timeout: 30,
            token_renew_margin: policy.renew_margin.as_secs(),
            token_retry_attempts: policy.retry_attempts,
            token_retry_delay: policy.retry_delay.as_secs(),
            token_refresh_divisor: policy.refresh_divisor,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > .env > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    /// Build configuration from parsed arguments, filling the rest from the environment
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let defaults = Config::default();

        let config = Config {
            sirene_key: args
                .key
                .context("SIRENE_KEY is required (use -k or set SIRENE_KEY env var)")?,
            sirene_secret: args
                .secret
                .context("SIRENE_SECRET is required (use -s or set SIRENE_SECRET env var)")?,

            token_url: args.token_url,
            api_url: args.api_url,

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", defaults.http_max_connections),
            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", defaults.http_connect_timeout),
            http_request_timeout: args.http_timeout,

            token_renew_margin: env_or("TOKEN_RENEW_MARGIN", defaults.token_renew_margin),
            token_retry_attempts: args.retry_attempts,
            token_retry_delay: args.retry_delay,
            token_refresh_divisor: env_or("TOKEN_REFRESH_DIVISOR", defaults.token_refresh_divisor),

            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sirene_key.trim().is_empty() || self.sirene_secret.trim().is_empty() {
            anyhow::bail!("SIRENE_KEY and SIRENE_SECRET must not be empty");
        }

        for (name, url) in [
            ("SIRENE_TOKEN_URL", &self.token_url),
            ("SIRENE_API_URL", &self.api_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!("{} must be an http(s) URL: {}", name, url);
            }
        }

        if self.token_refresh_divisor == 0 {
            anyhow::bail!("TOKEN_REFRESH_DIVISOR must be greater than zero");
        }

        Ok(())
    }

    /// Token renewal timings derived from this configuration
    pub fn refresh_policy(&self) -> RefreshPolicy {
        let retry_delay = Duration::from_secs(self.token_retry_delay);
        RefreshPolicy {
            renew_margin: Duration::from_secs(self.token_renew_margin),
            retry_attempts: self.token_retry_attempts,
            retry_delay,
            refresh_divisor: self.token_refresh_divisor,
            initial_delay: retry_delay,
            ..RefreshPolicy::default()
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
