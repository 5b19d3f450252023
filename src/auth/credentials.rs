// Client credentials for the token endpoint

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Result, SireneError};

/// Consumer key and secret pair, immutable once built
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reject empty key or secret before any network call
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() || self.secret.trim().is_empty() {
            return Err(SireneError::Config("invalid auth key or secret".to_string()));
        }
        Ok(())
    }

    /// `Basic base64(key:secret)` header value
    pub fn basic_authorization(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.key, self.secret));
        format!("Basic {}", encoded)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
