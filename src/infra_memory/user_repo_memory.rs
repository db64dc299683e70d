use crate::application_port::SessionError;
use crate::domain_model::UserRecord;
use crate::domain_port::UserRepo;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// DashMap-backed stand-in for the external record store, keyed by e-mail.
pub struct MemoryUserRepo {
    users: DashMap<String, UserRecord>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        MemoryUserRepo {
            users: DashMap::new(),
        }
    }
}

impl Default for MemoryUserRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, SessionError> {
        Ok(self.users.get(email).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, record: UserRecord) -> Result<(), SessionError> {
        match self.users.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(SessionError::UserExists),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }
}
