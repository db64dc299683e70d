use crate::domain_model::{Subject, TokenKind};
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

struct Entry {
    subject: Subject,
    expires_at: DateTime<Utc>,
}

/// In-process substitute for the redis store. Entries past their expiry are
/// purged lazily on lookup, mirroring redis key expiry.
pub struct MemoryRevocationStore {
    entries: DashMap<String, Entry>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        MemoryRevocationStore {
            entries: DashMap::new(),
        }
    }

    fn key(kind: TokenKind, jti: &str) -> String {
        format!("{}:{}", kind, jti)
    }

    #[cfg(test)]
    pub fn live_entries(&self) -> usize {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().expires_at > now)
            .count()
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn register(
        &self,
        kind: TokenKind,
        jti: &str,
        subject: &Subject,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RevocationStoreError> {
        self.entries.insert(
            Self::key(kind, jti),
            Entry {
                subject: subject.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn revoke(&self, kind: TokenKind, jti: &str) -> Result<(), RevocationStoreError> {
        self.entries.remove(&Self::key(kind, jti));
        Ok(())
    }

    async fn is_live(&self, kind: TokenKind, jti: &str) -> Result<Subject, RevocationStoreError> {
        let key = Self::key(kind, jti);
        let expired = match self.entries.get(&key) {
            None => return Err(RevocationStoreError::NotFound),
            Some(entry) => {
                if entry.value().expires_at > Utc::now() {
                    return Ok(entry.value().subject.clone());
                }
                true
            }
        };
        if expired {
            self.entries.remove(&key);
        }
        Err(RevocationStoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn expired_entries_read_as_not_found() {
        let store = MemoryRevocationStore::new();
        let subject = Subject::from("a@b.com");

        store
            .register(
                TokenKind::Access,
                "fresh",
                &subject,
                Utc::now() + Duration::minutes(15),
            )
            .await
            .unwrap();
        store
            .register(
                TokenKind::Access,
                "stale",
                &subject,
                Utc::now() - Duration::seconds(1),
            )
            .await
            .unwrap();

        assert_eq!(
            store.is_live(TokenKind::Access, "fresh").await.unwrap(),
            subject
        );
        assert!(matches!(
            store.is_live(TokenKind::Access, "stale").await,
            Err(RevocationStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn kinds_are_separate_namespaces() {
        let store = MemoryRevocationStore::new();
        let subject = Subject::from("a@b.com");
        store
            .register(
                TokenKind::Access,
                "jti-1",
                &subject,
                Utc::now() + Duration::minutes(15),
            )
            .await
            .unwrap();

        assert!(store.is_live(TokenKind::Refresh, "jti-1").await.is_err());
        assert!(store.is_live(TokenKind::Access, "jti-1").await.is_ok());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = MemoryRevocationStore::new();
        store.revoke(TokenKind::Refresh, "never-seen").await.unwrap();

        let subject = Subject::from("a@b.com");
        store
            .register(
                TokenKind::Refresh,
                "jti-2",
                &subject,
                Utc::now() + Duration::hours(1),
            )
            .await
            .unwrap();
        store.revoke(TokenKind::Refresh, "jti-2").await.unwrap();
        store.revoke(TokenKind::Refresh, "jti-2").await.unwrap();
        assert!(store.is_live(TokenKind::Refresh, "jti-2").await.is_err());
    }
}
