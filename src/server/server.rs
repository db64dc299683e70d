use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::settings::Settings;
use anyhow::Context;
use sqlx::MySqlPool;
use std::sync::Arc;

pub struct Server {
    pub session_service: Arc<dyn SessionService>,
    pub cookie_secure: bool,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        // Signing secrets are a startup invariant: refuse to boot without
        // them rather than fail per-request later.
        let access_secret = required_env("ACCESS_SECRET")?;
        let refresh_secret = required_env("REFRESH_SECRET")?;
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(
            access_secret.as_bytes(),
            refresh_secret.as_bytes(),
        )?);

        let revocation_store: Arc<dyn RevocationStore> = match settings.session.store.as_str() {
            "memory" => Arc::new(MemoryRevocationStore::new()),
            "redis" => {
                let url = required_env("REDIS_URL")?;
                let client = redis::Client::open(url)?;
                let conn = client.get_connection_manager().await?;
                Arc::new(RedisRevocationStore::new(conn))
            }
            other => anyhow::bail!("Unknown session store backend: {}", other),
        };

        let user_repo: Arc<dyn UserRepo> = match settings.users.backend.as_str() {
            "memory" => Arc::new(MemoryUserRepo::new()),
            "mysql" => {
                let dsn = required_env("MYSQL_DSN")?;
                let pool = MySqlPool::connect(&dsn).await?;
                Arc::new(MySqlUserRepo::new(pool))
            }
            other => anyhow::bail!("Unknown user backend: {}", other),
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let session_service: Arc<dyn SessionService> = Arc::new(RealSessionService::new(
            user_repo,
            credential_hasher,
            token_codec,
            revocation_store,
        ));

        Ok(Server {
            session_service,
            cookie_secure: settings.http.secure_cookies,
        })
    }
}

fn required_env(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("environment variable not set: {}", name))?;
    if value.is_empty() {
        anyhow::bail!("environment variable is empty: {}", name);
    }
    Ok(value)
}
