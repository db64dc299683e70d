use crate::application_port::SessionError;
use crate::domain_model::UserRecord;

/// Seam to the external record store. The session subsystem only needs a
/// find-one to look up a stored credential hash at login, plus an insert-one
/// for registration; it does not own the wider record-store contract.
#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, SessionError>;
    /// Fails with `UserExists` when the e-mail is already taken.
    async fn insert(&self, record: UserRecord) -> Result<(), SessionError>;
}
