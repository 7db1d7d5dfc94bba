use thiserror::Error;

use super::constant_time;

/// Bearer token failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenAuthError {
    /// No token is configured, so every call is refused.
    #[error("Endpoint is disabled")]
    Disabled,

    /// The request carried no bearer token.
    #[error("Missing bearer token")]
    MissingToken,

    /// The presented token does not match.
    #[error("Invalid token")]
    InvalidToken,
}

/// Checks a shared bearer token in constant time.
///
/// Neither the content nor the length of the configured token leaks through
/// how long a rejection takes.
#[derive(Clone)]
pub struct TokenAuthenticator {
    expected: Option<Vec<u8>>,
}

impl TokenAuthenticator {
    /// Creates an authenticator. A missing or blank token disables it.
    pub fn new(expected: Option<String>) -> Self {
        let expected = expected
            .filter(|token| !token.trim().is_empty())
            .map(String::into_bytes);
        Self { expected }
    }

    /// Returns true if a token is configured.
    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    /// Checks a presented token.
    pub fn authenticate(&self, presented: Option<&str>) -> Result<(), TokenAuthError> {
        let expected = self.expected.as_deref().ok_or(TokenAuthError::Disabled)?;
        let presented = presented.ok_or(TokenAuthError::MissingToken)?;
        if constant_time::eq_padded(expected, presented.as_bytes()) {
            Ok(())
        } else {
            Err(TokenAuthError::InvalidToken)
        }
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
