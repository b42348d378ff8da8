//! User accounts and cookie tokens.
//!
//! Passwords are stored as salted PBKDF2-HMAC-SHA256 digests. Login hands out
//! an opaque access token and refresh token, both random UUIDs persisted with
//! an expiry in the `auth_tokens` table.

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::store::Store;

const HASH_SCHEME: &str = "pbkdf2_sha256";
const HASH_LEN: usize = 32;

/// Registered account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

/// Token purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Tokens handed out at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Registration form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirmed_password: Option<String>,
}

/// Account and token operations over the store
#[derive(Clone)]
pub struct Authenticator {
    store: Store,
    config: AuthConfig,
    /// Verified against when the username is unknown, so both paths hash
    decoy_hash: String,
}

impl Authenticator {
    pub fn new(store: Store, config: AuthConfig) -> Self {
        let decoy_hash = hash_password(&Uuid::new_v4().to_string(), config.password_iterations);
        Self {
            store,
            config,
            decoy_hash,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Validate a registration form and create the account
    pub fn register(&self, form: &Registration) -> Result<User, AuthError> {
        let username = required(&form.username, "username")?;
        let email = required(&form.email, "email")?;
        let password = required(&form.password, "password")?;
        let confirmed = required(&form.confirmed_password, "confirmed_password")?;

        if !email.contains('@') {
            return Err(AuthError::Validation("Enter a valid email address".to_string()));
        }

        if password != confirmed {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }

        if self.store.email_exists(email)? {
            return Err(AuthError::Validation("Email already exists".to_string()));
        }

        if self.store.username_exists(username)? {
            return Err(AuthError::Validation(
                "A user with that username already exists".to_string(),
            ));
        }

        let user = self.store.create_user(username, email, &hash_password(password, self.config.password_iterations))?;
        info!("👤 Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check credentials and issue a fresh token pair
    pub fn login(&self, username: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let user = match self.store.find_user_by_username(username)? {
            Some(user) if verify_password(password, &user.password_hash) => user,
            Some(_) => return Err(AuthError::InvalidCredentials),
            None => {
                verify_password(password, &self.decoy_hash);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let tokens = TokenPair {
            access: self.issue(user.id, TokenKind::Access)?,
            refresh: self.issue(user.id, TokenKind::Refresh)?,
        };

        info!("🔑 User {} logged in", user.username);
        Ok((user, tokens))
    }

    /// Resolve an access token to its user
    pub fn authenticate(&self, access_token: &str) -> anyhow::Result<Option<User>> {
        self.store.find_token_user(access_token, TokenKind::Access)
    }

    /// Exchange a valid refresh token for a new access token
    pub fn refresh(&self, refresh_token: &str) -> anyhow::Result<Option<String>> {
        match self.store.find_token_user(refresh_token, TokenKind::Refresh)? {
            Some(user) => {
                let access = self.issue(user.id, TokenKind::Access)?;
                debug!("Refreshed access token for user {}", user.id);
                Ok(Some(access))
            }
            None => Ok(None),
        }
    }

    /// Revoke every token of the user
    pub fn logout(&self, user: &User) -> anyhow::Result<()> {
        let revoked = self.store.delete_user_tokens(user.id)?;
        info!("👋 User {} logged out ({} tokens revoked)", user.username, revoked);
        Ok(())
    }

    fn issue(&self, user_id: i64, kind: TokenKind) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.config.access_token_ttl_seconds,
            TokenKind::Refresh => self.config.refresh_token_ttl_seconds,
        };
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now()
            .checked_add_signed(Duration::seconds(ttl))
            .ok_or_else(|| anyhow!("token lifetime out of range"))?;
        self.store.insert_token(&token, user_id, kind, expires_at)?;
        Ok(token)
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AuthError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::Validation(format!("{}: This field is required.", field)))
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}

/// Hash a password as `pbkdf2_sha256$<iterations>$<salt>$<hex digest>`
pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = derive(password, &salt, iterations);
    format!("{}${}${}${}", HASH_SCHEME, iterations, salt, hex::encode(digest))
}

/// Check `password` against a stored hash; the iteration count comes from the hash
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if scheme != HASH_SCHEME || iterations == 0 {
        return false;
    }

    let actual = hex::encode(derive(password, salt, iterations));
    actual.len() == expected.len()
        && actual
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
