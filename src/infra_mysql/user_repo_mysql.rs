use crate::application_port::SessionError;
use crate::domain_model::UserRecord;
use crate::domain_port::UserRepo;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, SessionError> {
        let email: String = row
            .try_get("email")
            .map_err(|e| SessionError::Store(e.to_string()))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| SessionError::Store(e.to_string()))?;
        let is_active: bool = row
            .try_get("is_active")
            .map_err(|e| SessionError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| SessionError::Store(e.to_string()))?;

        Ok(UserRecord {
            email,
            password_hash,
            is_active,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, SessionError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT email, password_hash, is_active, created_at
FROM user_account
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn insert(&self, record: UserRecord) -> Result<(), SessionError> {
        sqlx::query(
            r#"
INSERT INTO user_account (email, password_hash, is_active, created_at)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                SessionError::UserExists
            } else {
                SessionError::Store(e.to_string())
            }
        })?;

        Ok(())
    }
}
