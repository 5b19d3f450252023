// Error handling module
// Defines the error taxonomy shared by the token manager and the API client

use thiserror::Error;

/// Errors that can occur while authenticating or querying the registry
#[derive(Error, Debug)]
pub enum SireneError {
    /// Missing or unusable configuration (empty credentials, bad URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token endpoint refused the credentials or returned no usable token
    #[error("Authentication failed: {status} - {message}")]
    Auth { status: u16, message: String },

    /// No valid token is held, the call was not sent
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Network level failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Registry answered with a non-2xx status
    #[error("Sirene API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected JSON
    #[error("Invalid JSON: {message} (body was: {body})")]
    Decode { message: String, body: String },
}

impl SireneError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SireneError::Auth { status, .. } | SireneError::Api { status, .. } => Some(*status),
            SireneError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short machine-friendly label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SireneError::Config(_) => "config_error",
            SireneError::Auth { .. } => "auth_error",
            SireneError::NotAuthenticated => "not_authenticated",
            SireneError::Transport(_) => "transport_error",
            SireneError::Api { .. } => "api_error",
            SireneError::Decode { .. } => "decode_error",
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, SireneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SireneError::Config("invalid auth key or secret".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: invalid auth key or secret"
        );

        let err = SireneError::Auth {
            status: 401,
            message: "invalid_client".to_string(),
        };
        assert_eq!(err.to_string(), "Authentication failed: 401 - invalid_client");

        let err = SireneError::Api {
            status: 404,
            message: "Aucun élément trouvé".to_string(),
        };
        assert_eq!(err.to_string(), "Sirene API error: 404 - Aucun élément trouvé");

        assert_eq!(SireneError::NotAuthenticated.to_string(), "Not authenticated");
    }

    #[test]
    fn test_decode_error_keeps_body() {
        let err = SireneError::Decode {
            message: "expected value at line 1 column 1".to_string(),
            body: "<html>maintenance</html>".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("Invalid JSON: expected value"));
        assert!(text.contains("<html>maintenance</html>"));
    }

    #[test]
    fn test_status_and_kind() {
        let err = SireneError::Auth {
            status: 401,
            message: String::new(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.kind(), "auth_error");

        let err = SireneError::Api {
            status: 503,
            message: String::new(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.kind(), "api_error");

        assert_eq!(SireneError::NotAuthenticated.status(), None);
        assert_eq!(SireneError::Config(String::new()).kind(), "config_error");
    }
}
