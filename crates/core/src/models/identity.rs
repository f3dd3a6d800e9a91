//! Identity claims carried inside the bearer credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display data embedded in the credential payload.
///
/// These claims are decoded without verifying the token signature. They are
/// only fit for rendering (greeting, avatar) and must never drive an
/// authorization decision; the backend enforces access on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject, the account email for this backend.
    pub sub: String,
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
    #[serde(rename = "fotoUrl", alias = "foto", alias = "avatar", default)]
    pub avatar_url: Option<String>,
    /// Issued-at (Unix timestamp, seconds).
    #[serde(default)]
    pub iat: Option<i64>,
    /// Expiry (Unix timestamp, seconds).
    #[serde(default)]
    pub exp: Option<i64>,
}

impl IdentityClaims {
    /// Name to greet the user with, falling back to the subject.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.sub)
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|s| DateTime::from_timestamp(s, 0))
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|s| DateTime::from_timestamp(s, 0))
    }

    /// Whether the embedded expiry lies before `now`.
    ///
    /// Tokens without an `exp` claim never count as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let mut claims: IdentityClaims =
            serde_json::from_str(r#"{"sub":"a@b.com","nombre":"Ana"}"#).unwrap();
        assert_eq!(claims.display_name(), "Ana");

        claims.name = Some("   ".to_string());
        assert_eq!(claims.display_name(), "a@b.com");

        claims.name = None;
        assert_eq!(claims.display_name(), "a@b.com");
    }

    #[test]
    fn test_avatar_aliases() {
        let claims: IdentityClaims =
            serde_json::from_str(r#"{"sub":"a@b.com","foto":"/img/a.png"}"#).unwrap();
        assert_eq!(claims.avatar_url.as_deref(), Some("/img/a.png"));
    }

    #[test]
    fn test_expiry() {
        let claims: IdentityClaims =
            serde_json::from_str(r#"{"sub":"x","iat":1700000000,"exp":1700003600}"#).unwrap();
        let before = DateTime::from_timestamp(1_700_000_100, 0).unwrap();
        let after = DateTime::from_timestamp(1_700_003_600, 0).unwrap();

        assert!(!claims.is_expired_at(before));
        assert!(claims.is_expired_at(after));
        assert!(claims.issued_at().unwrap() < claims.expires_at().unwrap());
    }
}
