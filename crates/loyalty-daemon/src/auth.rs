//! Registration, login, and bearer-token verification.
//!
//! Passwords are stored as salted sha-256 digests; tokens are
//! `user_id.expiry.signature` with a sha-256 signature over the server
//! secret and a 12 h TTL. Handlers receive the authenticated user through
//! the [`AuthUser`] extractor.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use loyalty_core::{Store, StoreError};

use crate::api_types::ErrorResponse;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_TTL_HOURS: i64 = 12;

// ---------------------------------------------------------------------------
// AuthError
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthError {
    LoginIsEmpty,
    PasswordTooShort,
    LoginAlreadyExists,
    InvalidLoginOrPassword,
    Store(StoreError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoginIsEmpty => write!(f, "login is empty"),
            Self::PasswordTooShort => {
                write!(f, "password must be at least {MIN_PASSWORD_LEN} characters")
            }
            Self::LoginAlreadyExists => write!(f, "login already exists"),
            Self::InvalidLoginOrPassword => write!(f, "invalid login or password"),
            Self::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

// ---------------------------------------------------------------------------
// TokenSigner
// ---------------------------------------------------------------------------

/// Issues and verifies `user_id.expiry.signature` bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> String {
        self.issue_expiring_at(user_id, Utc::now().timestamp() + TOKEN_TTL_HOURS * 3600)
    }

    fn issue_expiring_at(&self, user_id: Uuid, expires_at: i64) -> String {
        let payload = format!("{user_id}.{expires_at}");
        let signature = self.sign(&payload);
        format!("{payload}.{signature}")
    }

    /// Returns the user id for a well-formed, correctly signed,
    /// unexpired token.
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let mut parts = token.splitn(3, '.');
        let user = parts.next()?;
        let expiry = parts.next()?;
        let signature = parts.next()?;

        let payload = format!("{user}.{expiry}");
        if self.sign(&payload) != signature {
            return None;
        }
        let expires_at: i64 = expiry.parse().ok()?;
        if expires_at < Utc::now().timestamp() {
            return None;
        }
        Uuid::parse_str(user).ok()
    }

    fn sign(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b".");
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// AuthService
// ---------------------------------------------------------------------------

/// User registration and credential checks on top of the store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, token_secret: &str) -> Self {
        Self {
            store,
            signer: TokenSigner::new(token_secret),
        }
    }

    /// Create an account and issue a token for it.
    pub async fn register(&self, login: &str, password: &str) -> Result<String, AuthError> {
        if login.is_empty() {
            return Err(AuthError::LoginIsEmpty);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }

        let salt = Uuid::new_v4().simple().to_string();
        let hash = hash_password(&salt, password);
        match self.store.create_user(login, &hash, &salt).await {
            Ok(user_id) => Ok(self.signer.issue(user_id)),
            Err(StoreError::LoginTaken) => Err(AuthError::LoginAlreadyExists),
            Err(e) => Err(AuthError::Store(e)),
        }
    }

    /// Check credentials and issue a token. An unknown login and a wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, login: &str, password: &str) -> Result<String, AuthError> {
        match self.store.user_by_login(login).await {
            Ok(user) => {
                if hash_password(&user.password_salt, password) == user.password_hash {
                    Ok(self.signer.issue(user.id))
                } else {
                    Err(AuthError::InvalidLoginOrPassword)
                }
            }
            Err(StoreError::UserNotFound) => Err(AuthError::InvalidLoginOrPassword),
            Err(e) => Err(AuthError::Store(e)),
        }
    }

    pub fn verify_token(&self, token: &str) -> Option<Uuid> {
        self.signer.verify(token)
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// AuthUser extractor
// ---------------------------------------------------------------------------

/// The authenticated user, pulled from the `Authorization` header
/// (with or without a `Bearer ` prefix).
pub struct AuthUser(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("auth header is empty"))?;

        let token = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
        state
            .auth
            .verify_token(token)
            .map(AuthUser)
            .ok_or_else(|| unauthorized("invalid token"))
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
