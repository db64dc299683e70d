use crate::domain_model::{Subject, TokenKind};
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::future::Future;
use std::time::Duration;

/// Matches the deadline on the surrounding record-store calls. A store that
/// cannot answer in time reads as unavailable, never as "authenticated".
const STORE_OP_TIMEOUT: Duration = Duration::from_secs(10);

async fn bounded<T, F>(fut: F) -> Result<T, RevocationStoreError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(STORE_OP_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(RevocationStoreError::Unavailable(e.to_string())),
        Err(_) => Err(RevocationStoreError::Unavailable(
            "operation timed out".to_string(),
        )),
    }
}

pub struct RedisRevocationStore {
    conn: ConnectionManager,
}

impl RedisRevocationStore {
    pub fn new(conn: ConnectionManager) -> Self {
        RedisRevocationStore { conn }
    }

    fn key(kind: TokenKind, jti: &str) -> String {
        format!("{}:{}", kind, jti)
    }

    // SETEX rejects non-positive TTLs; an entry for an already-expired token
    // still gets one second before redis reaps it.
    fn ttl_secs(expires_at: DateTime<Utc>) -> u64 {
        let secs = (expires_at - Utc::now()).num_seconds();
        if secs <= 0 { 1 } else { secs as u64 }
    }
}

#[async_trait::async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn register(
        &self,
        kind: TokenKind,
        jti: &str,
        subject: &Subject,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RevocationStoreError> {
        let key = Self::key(kind, jti);
        let value = subject.0.clone();
        let ttl = Self::ttl_secs(expires_at);
        let mut conn = self.conn.clone();

        bounded(async move {
            let _: () = conn.set_ex(&key, &value, ttl).await?;
            Ok(())
        })
        .await
    }

    async fn revoke(&self, kind: TokenKind, jti: &str) -> Result<(), RevocationStoreError> {
        let key = Self::key(kind, jti);
        let mut conn = self.conn.clone();

        bounded(async move {
            let _: () = conn.del(&key).await?;
            Ok(())
        })
        .await
    }

    async fn is_live(&self, kind: TokenKind, jti: &str) -> Result<Subject, RevocationStoreError> {
        let key = Self::key(kind, jti);
        let mut conn = self.conn.clone();

        let value: Option<String> = bounded(async move { conn.get(&key).await }).await?;
        match value {
            Some(subject) => Ok(Subject(subject)),
            None => Err(RevocationStoreError::NotFound),
        }
    }
}
