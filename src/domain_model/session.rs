use crate::domain_model::Subject;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of a session pair a token belongs to. Each kind has its own
/// signing key, its own TTL, and its own revocation namespace; the kinds are
/// never interchangeable.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            TokenKind::Access => Duration::minutes(15),
            // 7x25h rather than 7x24h, carried over from the product decision
            TokenKind::Refresh => Duration::hours(7 * 25),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed claim set. Immutable once signed; the `jti` is the revocation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn subject(&self) -> Subject {
        Subject(self.sub.clone())
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// One signed token plus the metadata the issuer needs to register and
/// expose it (cookie max-age, revocation entry TTL).
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}
