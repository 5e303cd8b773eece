//! Login, refresh-token rotation, access-token authorization, and logout.
//!
//! Refresh credentials are single-use: a successful [`AuthService::rotate`]
//! revokes the presented entry in the same store operation that creates its
//! successor. Access tokens are stateless; they are invalidated early only by
//! bumping the owner's token version.

use std::sync::Arc;

use base64::Engine;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::jwt::{AccessClaims, AccessTokenResult, JwtConfig, JwtError, REFRESH_TOKEN_DURATION_SECS};
use crate::store::{Backend, RefreshEntry, RefreshStore, StoreError, User, UserStore};

/// Size of the random refresh secret before encoding.
const REFRESH_SECRET_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthOptions {
    /// When a rotated refresh entry is replayed (or its secret is wrong),
    /// also revoke every successor reachable through `replaced_by`.
    /// Off by default: only the presented entry is revoked.
    pub revoke_chain_on_reuse: bool,
}

/// Authentication failures.
///
/// The display strings double as the short reason sent to clients.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no refresh cookie")]
    MissingRefresh,
    #[error("invalid refresh")]
    InvalidRefresh,
    #[error("revoked")]
    RevokedRefresh,
    #[error("refresh expired")]
    ExpiredRefresh,
    #[error("token mismatch")]
    SecretMismatch,
    #[error("no access token")]
    MissingToken,
    #[error("invalid or expired access token")]
    InvalidToken,
    #[error("token version mismatch")]
    StaleTokenVersion,
    #[error("user not found")]
    NoUser,
    #[error("cannot revoke another user's session")]
    Forbidden,
    #[error("invalid request body")]
    InvalidBody,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("token error: {0}")]
    Token(#[from] JwtError),
}

/// A freshly issued refresh credential.
#[derive(Debug, Clone)]
pub struct IssuedRefresh {
    pub refresh_id: String,
    pub secret: String,
    pub expires_at: u64,
    /// Lifetime in seconds
    pub duration: u64,
}

impl IssuedRefresh {
    /// The single opaque value handed to the client: `{refresh_id}.{secret}`.
    pub fn cookie_value(&self) -> String {
        format!("{}.{}", self.refresh_id, self.secret)
    }
}

/// Access token plus refresh credential, returned by login and rotation.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub user_id: i64,
    pub access: AccessTokenResult,
    pub refresh: IssuedRefresh,
}

/// Outcome of a successful authorization.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub user_id: i64,
    pub claims: AccessClaims,
}

#[derive(Clone)]
pub struct AuthService<B> {
    backend: B,
    jwt: Arc<JwtConfig>,
    clock: Arc<dyn Clock>,
    options: AuthOptions,
}

impl<B: Backend> AuthService<B> {
    pub fn new(backend: B, jwt: Arc<JwtConfig>, clock: Arc<dyn Clock>, options: AuthOptions) -> Self {
        Self {
            backend,
            jwt,
            clock,
            options,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Check a username/password pair and open a new session.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionTokens, AuthError> {
        let user = self
            .backend
            .users()
            .get_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Plaintext comparison, matching how the credentials are stored
        if user.password != password {
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        let access = self.jwt.generate_access_token(&user, now)?;
        let refresh = self.issue(user.id).await?;

        info!(user_id = user.id, refresh_id = %refresh.refresh_id, "User logged in");

        Ok(SessionTokens {
            user_id: user.id,
            access,
            refresh,
        })
    }

    /// Create and store a new refresh entry for `user_id`.
    pub async fn issue(&self, user_id: i64) -> Result<IssuedRefresh, AuthError> {
        let entry = self.new_entry(user_id, self.clock.now());
        self.backend.tokens().insert(&entry).await?;
        Ok(IssuedRefresh::from(entry))
    }

    /// Redeem a refresh credential for a new access token and a new refresh
    /// credential. The presented credential can never be redeemed again.
    pub async fn rotate(&self, refresh_id: &str, secret: &str) -> Result<SessionTokens, AuthError> {
        let now = self.clock.now();
        let tokens = self.backend.tokens();

        let stored = tokens
            .get(refresh_id)
            .await?
            .ok_or(AuthError::InvalidRefresh)?;

        if stored.revoked {
            if stored.replaced_by.is_some() {
                warn!(
                    refresh_id,
                    user_id = stored.user_id,
                    "Rotated refresh token presented again"
                );
                if self.options.revoke_chain_on_reuse {
                    self.revoke_descendants(&stored).await?;
                }
            }
            return Err(AuthError::RevokedRefresh);
        }

        if stored.is_expired(now) {
            tokens.revoke(refresh_id).await?;
            return Err(AuthError::ExpiredRefresh);
        }

        if !secrets_match(&stored.secret, secret) {
            warn!(
                refresh_id,
                user_id = stored.user_id,
                "Refresh secret mismatch, revoking entry"
            );
            tokens.revoke(refresh_id).await?;
            if self.options.revoke_chain_on_reuse {
                self.revoke_descendants(&stored).await?;
            }
            return Err(AuthError::SecretMismatch);
        }

        let Some(user) = self.backend.users().get(stored.user_id).await? else {
            tokens.revoke(refresh_id).await?;
            return Err(AuthError::NoUser);
        };

        let successor = self.new_entry(user.id, now);
        if !tokens.rotate(refresh_id, &successor).await? {
            // Another request rotated or revoked it first
            return Err(AuthError::RevokedRefresh);
        }

        let access = self.jwt.generate_access_token(&user, now)?;

        debug!(
            user_id = user.id,
            from = refresh_id,
            to = %successor.refresh_id,
            "Rotated refresh token"
        );

        Ok(SessionTokens {
            user_id: user.id,
            access,
            refresh: IssuedRefresh::from(successor),
        })
    }

    /// Validate an access token against its signature, its expiry, and the
    /// owner's current token version.
    pub async fn authorize(&self, token: &str) -> Result<Authorized, AuthError> {
        let claims = self
            .jwt
            .validate_access_token(token, self.clock.now())
            .map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .backend
            .users()
            .get(claims.user_id)
            .await?
            .ok_or(AuthError::NoUser)?;

        if claims.token_version != user.token_version {
            return Err(AuthError::StaleTokenVersion);
        }

        Ok(Authorized {
            user_id: user.id,
            claims,
        })
    }

    /// Revoke the presented refresh entry and, when a user id is given,
    /// bump that user's token version so every outstanding access token
    /// (on every device) stops working.
    pub async fn logout(
        &self,
        refresh_id: Option<&str>,
        user_id: Option<i64>,
    ) -> Result<(), AuthError> {
        if let Some(refresh_id) = refresh_id {
            self.backend.tokens().revoke(refresh_id).await?;
        }

        if let Some(user_id) = user_id {
            if let Some(version) = self.backend.users().bump_token_version(user_id).await? {
                info!(user_id, token_version = version, "Token version bumped on logout");
            }
        }

        Ok(())
    }

    /// Live refresh entries of a user, newest first.
    pub async fn sessions(&self, user_id: i64) -> Result<Vec<RefreshEntry>, AuthError> {
        Ok(self
            .backend
            .tokens()
            .list_by_user(user_id, self.clock.now())
            .await?)
    }

    /// Revoke one of the caller's own refresh entries.
    /// Returns `false` if the entry does not exist.
    pub async fn revoke_session(&self, user_id: i64, refresh_id: &str) -> Result<bool, AuthError> {
        let tokens = self.backend.tokens();
        let Some(entry) = tokens.get(refresh_id).await? else {
            return Ok(false);
        };

        if entry.user_id != user_id {
            return Err(AuthError::Forbidden);
        }

        Ok(tokens.revoke(refresh_id).await?)
    }

    /// Create a user. Used for seeding.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User, AuthError> {
        Ok(self.backend.users().create(username, password).await?)
    }

    /// Revoke every entry that descends from `entry` via `replaced_by`.
    async fn revoke_descendants(&self, entry: &RefreshEntry) -> Result<usize, AuthError> {
        let tokens = self.backend.tokens();
        let mut next = entry.replaced_by.clone();
        let mut revoked = 0;

        while let Some(id) = next {
            // Revoke before reading the successor link: once revoked, the
            // entry can no longer be rotated, so the link cannot change.
            tokens.revoke(&id).await?;
            revoked += 1;
            next = tokens.get(&id).await?.and_then(|e| e.replaced_by);
        }

        if revoked > 0 {
            warn!(
                user_id = entry.user_id,
                revoked, "Revoked refresh chain after reuse"
            );
        }
        Ok(revoked)
    }

    fn new_entry(&self, user_id: i64, now: u64) -> RefreshEntry {
        RefreshEntry {
            refresh_id: uuid::Uuid::new_v4().simple().to_string(),
            secret: generate_secret(),
            user_id,
            issued_at: now,
            expires_at: now + REFRESH_TOKEN_DURATION_SECS,
            revoked: false,
            replaced_by: None,
        }
    }
}

impl From<RefreshEntry> for IssuedRefresh {
    fn from(entry: RefreshEntry) -> Self {
        Self {
            duration: entry.expires_at.saturating_sub(entry.issued_at),
            refresh_id: entry.refresh_id,
            secret: entry.secret,
            expires_at: entry.expires_at,
        }
    }
}

/// Compare secrets without exiting early on the first differing byte.
fn secrets_match(expected: &str, given: &str) -> bool {
    let (expected, given) = (expected.as_bytes(), given.as_bytes());
    if expected.len() != given.len() {
        return false;
    }
    expected
        .iter()
        .zip(given)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn generate_secret() -> String {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
