use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, SessionError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SessionError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, SessionError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| SessionError::Internal(format!("invalid PHC hash: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(SessionError::Internal(format!("verify error: {}", e))),
        }
    }
}

struct KindKeys {
    enc: EncodingKey,
    dec: DecodingKey,
}

impl KindKeys {
    fn from_secret(kind: TokenKind, secret: &[u8]) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::KeyMissing(kind.as_str()));
        }
        Ok(KindKeys {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        })
    }
}

fn encode_claims(keys: &KindKeys, kind: TokenKind, subject: &Subject) -> Result<SignedToken, SessionError> {
    let iat = Utc::now();
    let exp = iat + kind.ttl();
    let claims = SessionClaims {
        sub: subject.0.clone(),
        jti: Uuid::new_v4().to_string(),
        iat: iat.timestamp(),
        exp: exp.timestamp(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.enc)
        .map_err(|e| SessionError::Signing(e.to_string()))?;
    Ok(SignedToken {
        token,
        jti: claims.jti,
        expires_at: exp,
    })
}

fn decode_claims(keys: &KindKeys, token: &str) -> Result<SessionClaims, SessionError> {
    // HS256 only; a structurally valid JWT carrying any other algorithm is a
    // signature failure, not a parse failure.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<SessionClaims>(token, &keys.dec, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => SessionError::TokenExpired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName => SessionError::TokenSignatureInvalid,
        _ => SessionError::TokenMalformed,
    })?;

    // The library already validated `exp`; re-check against the clock anyway.
    if data.claims.expires_at() <= Utc::now() {
        return Err(SessionError::TokenExpired);
    }

    Ok(data.claims)
}

/// HMAC-SHA-256 claims codec with a distinct key per token kind, so access
/// and refresh tokens are never interchangeable.
pub struct JwtHs256Codec {
    access: KindKeys,
    refresh: KindKeys,
}

impl JwtHs256Codec {
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Result<Self, SessionError> {
        Ok(JwtHs256Codec {
            access: KindKeys::from_secret(TokenKind::Access, access_secret)?,
            refresh: KindKeys::from_secret(TokenKind::Refresh, refresh_secret)?,
        })
    }

    #[inline]
    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn sign(&self, kind: TokenKind, subject: &Subject) -> Result<SignedToken, SessionError> {
        encode_claims(self.keys(kind), kind, subject)
    }

    async fn verify(&self, kind: TokenKind, token: &str) -> Result<SessionClaims, SessionError> {
        decode_claims(self.keys(kind), token)
    }
}

pub struct RealSessionService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    revocation_store: Arc<dyn RevocationStore>,
}

impl RealSessionService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        revocation_store: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            revocation_store,
        }
    }

    /// Create and register a matched pair for `subject`. Nothing stays live
    /// unless both halves were signed and registered.
    pub async fn issue(&self, subject: &Subject) -> Result<TokenPair, SessionError> {
        let access = self.token_codec.sign(TokenKind::Access, subject).await?;
        let refresh = self.token_codec.sign(TokenKind::Refresh, subject).await?;

        self.revocation_store
            .register(TokenKind::Access, &access.jti, subject, access.expires_at)
            .await
            .map_err(SessionError::from)?;

        if let Err(err) = self
            .revocation_store
            .register(TokenKind::Refresh, &refresh.jti, subject, refresh.expires_at)
            .await
        {
            // Half-registered pair: take the access entry back down before
            // reporting failure.
            if let Err(rollback) = self
                .revocation_store
                .revoke(TokenKind::Access, &access.jti)
                .await
            {
                warn!(jti = %access.jti, error = %rollback, "rollback of access registration failed");
            }
            return Err(err.into());
        }

        Ok(TokenPair {
            subject: subject.clone(),
            access,
            refresh,
        })
    }

    async fn revoke_if_parseable(&self, kind: TokenKind, token: &str) {
        // Revoke only on successful parse; an unparseable or expired token
        // has nothing live to take down.
        if let Ok(claims) = self.token_codec.verify(kind, token).await {
            if let Err(err) = self.revocation_store.revoke(kind, &claims.jti).await {
                warn!(%kind, jti = %claims.jti, error = %err, "logout revocation failed");
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionService for RealSessionService {
    async fn signup(&self, request: SignupInput) -> Result<(), SessionError> {
        let password_hash = self
            .credential_hasher
            .hash_password(&request.password)
            .await?;

        self.user_repo
            .insert(UserRecord {
                email: request.email,
                password_hash,
                is_active: true,
                created_at: Utc::now(),
            })
            .await
    }

    async fn login(&self, request: LoginInput) -> Result<TokenPair, SessionError> {
        let user = self
            .user_repo
            .find_by_email(&request.email)
            .await?
            .ok_or(SessionError::UserNotFound)?;

        if !user.is_active {
            return Err(SessionError::InvalidCredentials);
        }

        let ok = self
            .credential_hasher
            .verify_password(&request.password, &user.password_hash)
            .await?;
        if !ok {
            return Err(SessionError::InvalidCredentials);
        }

        self.issue(&Subject(user.email)).await
    }

    async fn validate_access(&self, token: &str) -> Result<Subject, SessionError> {
        let claims = self.token_codec.verify(TokenKind::Access, token).await?;

        let owner = self
            .revocation_store
            .is_live(TokenKind::Access, &claims.jti)
            .await
            .map_err(SessionError::from)?;

        // The store entry is the liveness authority; an entry that no longer
        // belongs to the claimed subject counts as revoked.
        if owner != claims.subject() {
            return Err(SessionError::TokenRevoked);
        }

        Ok(claims.subject())
    }

    async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, SessionError> {
        let claims = self
            .token_codec
            .verify(TokenKind::Refresh, refresh_token)
            .await?;

        let owner = self
            .revocation_store
            .is_live(TokenKind::Refresh, &claims.jti)
            .await
            .map_err(SessionError::from)?;
        if owner != claims.subject() {
            return Err(SessionError::TokenRevoked);
        }

        // Invalidate before issuing; a crash between the two steps must
        // leave the old token unusable. At most one concurrent rotation of
        // the same id gets past the liveness check above.
        self.revocation_store
            .revoke(TokenKind::Refresh, &claims.jti)
            .await
            .map_err(SessionError::from)?;

        self.issue(&claims.subject()).await
    }

    async fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        if let Some(token) = access_token {
            self.revoke_if_parseable(TokenKind::Access, token).await;
        }
        if let Some(token) = refresh_token {
            self.revoke_if_parseable(TokenKind::Refresh, token).await;
        }
    }
}
