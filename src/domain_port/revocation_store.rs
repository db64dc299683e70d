use crate::domain_model::{Subject, TokenKind};
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum RevocationStoreError {
    #[error("token id not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative liveness state for issued token ids. A signed token is only
/// advisory without a matching entry here: deleting the entry kills the token
/// no matter how valid its signature still is.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    /// Upsert the entry for `jti` with a TTL equal to the token's remaining
    /// validity, so the backing store bounds growth on its own.
    async fn register(
        &self,
        kind: TokenKind,
        jti: &str,
        subject: &Subject,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RevocationStoreError>;

    /// Delete the entry. Idempotent; deleting an absent key is not an error.
    async fn revoke(&self, kind: TokenKind, jti: &str) -> Result<(), RevocationStoreError>;

    /// Resolve the owning subject, or `NotFound` when the entry is absent or
    /// already expired out of the store.
    async fn is_live(&self, kind: TokenKind, jti: &str) -> Result<Subject, RevocationStoreError>;
}
