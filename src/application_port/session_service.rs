use crate::domain_model::{SessionClaims, SignedToken, Subject, TokenKind};
use crate::domain_port::RevocationStoreError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("user already exists")]
    UserExists,
    /// Missing/empty signing key. A startup invariant: this is only ever
    /// produced while constructing the codec, never per-request.
    #[error("signing key not configured for {0} tokens")]
    KeyMissing(&'static str),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("token malformed")]
    TokenMalformed,
    #[error("token signature invalid")]
    TokenSignatureInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("token revoked")]
    TokenRevoked,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RevocationStoreError> for SessionError {
    fn from(err: RevocationStoreError) -> Self {
        match err {
            // An absent liveness entry means the token was revoked, rotated,
            // or never issued by us; all the same to the caller.
            RevocationStoreError::NotFound => SessionError::TokenRevoked,
            RevocationStoreError::Unavailable(e) => SessionError::Store(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// A matched access/refresh pair. Constructed atomically by the issuer:
/// either both halves are signed and registered, or the caller gets an error
/// and nothing is live.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub subject: Subject,
    pub access: SignedToken,
    pub refresh: SignedToken,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn sign(&self, kind: TokenKind, subject: &Subject) -> Result<SignedToken, SessionError>;
    async fn verify(&self, kind: TokenKind, token: &str) -> Result<SessionClaims, SessionError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, SessionError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, SessionError>;
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    async fn signup(&self, request: SignupInput) -> Result<(), SessionError>;
    async fn login(&self, request: LoginInput) -> Result<TokenPair, SessionError>;
    /// Validate an access token string against signature, expiry, and the
    /// revocation store, and return the subject it belongs to. Consulted on
    /// every protected request; never cached.
    async fn validate_access(&self, token: &str) -> Result<Subject, SessionError>;
    /// Single-use rotation: the presented refresh token is invalidated
    /// before a fresh pair is issued.
    async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, SessionError>;
    /// Best-effort revocation of whichever tokens the client still holds.
    /// Never fails from the caller's point of view.
    async fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>);
}
