// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token endpoint response
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    /// Validity in seconds from issuance
    #[serde(default)]
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token state held by the manager
///
/// Always replaced as a whole, never patched field by field.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    pub token: Option<TokenResponse>,
    pub issued_at: Option<DateTime<Utc>>,
    pub authenticated: bool,
}

impl TokenState {
    /// State after a successful acquisition
    pub fn issued(token: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let authenticated = !token.access_token.is_empty();
        Self {
            token: Some(token),
            issued_at: Some(issued_at),
            authenticated,
        }
    }

    /// Empty, not-authenticated state
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Instant after which the token is no longer accepted
    ///
    /// A validity too large for the calendar saturates at the far end, so
    /// an absurd `expires_in` reads as "never expires" rather than failing.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let (token, issued_at) = match (&self.token, self.issued_at) {
            (Some(token), Some(issued_at)) => (token, issued_at),
            _ => return None,
        };
        let expires = Duration::try_seconds(token.expires_in)
            .and_then(|validity| issued_at.checked_add_signed(validity));
        Some(expires.unwrap_or(if token.expires_in < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        }))
    }

    /// Validity left at `now`, negative once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at().map(|exp| exp - now)
    }

    /// Authenticated and not yet expired at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.authenticated
            && self
                .token
                .as_ref()
                .is_some_and(|t| !t.access_token.is_empty())
            && self.remaining(now).is_some_and(|r| r > Duration::zero())
    }

    /// `Authorization` header value: `<type> <token>`
    pub fn authorization(&self) -> Option<String> {
        self.token
            .as_ref()
            .filter(|t| !t.access_token.is_empty())
            .map(|t| format!("{} {}", t.token_type, t.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token(expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: "abc123".to_string(),
            token_type: "Bearer".to_string(),
            scope: "am_application_scope default".to_string(),
            expires_in,
        }
    }

    #[test]
    fn test_token_response_parse() {
        let json = r#"{"access_token":"abc","scope":"am_application_scope default","token_type":"Bearer","expires_in":604800}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.token_type, "Bearer");
        assert_eq!(parsed.expires_in, 604800);
    }

    #[test]
    fn test_debug_redacts_token() {
        let text = format!("{:?}", token(10));
        assert!(!text.contains("abc123"));
        assert!(text.contains("REDACTED"));
    }

    #[test]
    fn test_validity_window() {
        let issued = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let state = TokenState::issued(token(3600), issued);

        assert!(state.is_valid_at(issued + Duration::seconds(3599)));
        assert!(!state.is_valid_at(issued + Duration::seconds(3600)));
        assert_eq!(
            state.remaining(issued + Duration::seconds(600)),
            Some(Duration::seconds(3000))
        );
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let mut empty = token(3600);
        empty.access_token.clear();
        let state = TokenState::issued(empty, Utc::now());
        assert!(!state.authenticated);
        assert!(state.authorization().is_none());
    }

    #[test]
    fn test_unauthenticated_state() {
        let state = TokenState::unauthenticated();
        assert!(!state.is_valid_at(Utc::now()));
        assert!(state.expires_at().is_none());
        assert!(state.authorization().is_none());
    }

    #[test]
    fn test_huge_validity_saturates() {
        let issued = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let state = TokenState::issued(token(10_000_000_000_000_000), issued);

        assert_eq!(state.expires_at(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(state.is_valid_at(issued + Duration::days(365 * 1000)));
        assert!(state.remaining(issued).is_some_and(|r| r > Duration::zero()));

        let state = TokenState::issued(token(i64::MIN), issued);
        assert_eq!(state.expires_at(), Some(DateTime::<Utc>::MIN_UTC));
        assert!(!state.is_valid_at(issued));
    }

    #[test]
    fn test_authorization_header() {
        let state = TokenState::issued(token(3600), Utc::now());
        assert_eq!(state.authorization().as_deref(), Some("Bearer abc123"));
    }
}
