//! Signed bearer tokens (HS256).
//!
//! [`KeyStore`] holds the secret and lifetimes loaded once at boot;
//! [`TokenCodec`] mints and verifies tokens against it. Verification is pure:
//! no I/O, and any failure collapses to [`AuthError::InvalidToken`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{Role, TokenClaims, TokenKind};

/// Minimum accepted HMAC secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default access token lifetime: 1 hour.
pub const DEFAULT_ACCESS_TTL_MS: i64 = 60 * 60 * 1000;

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

// =============================================================================
// Key store
// =============================================================================

/// Signing secret plus token lifetimes. Immutable after construction.
#[derive(Clone)]
pub struct KeyStore {
    secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl KeyStore {
    /// Validate and freeze the signing parameters.
    pub fn new(
        secret: impl Into<Vec<u8>>,
        access_ttl_ms: i64,
        refresh_ttl_ms: i64,
    ) -> Result<Self, AuthError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::KeyConfig(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes (got {})",
                secret.len()
            )));
        }
        if access_ttl_ms <= 0 || refresh_ttl_ms <= 0 {
            return Err(AuthError::KeyConfig(
                "token lifetimes must be positive".into(),
            ));
        }
        Ok(Self {
            secret,
            access_ttl: Duration::milliseconds(access_ttl_ms),
            refresh_ttl: Duration::milliseconds(refresh_ttl_ms),
        })
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

// =============================================================================
// Codec
// =============================================================================

/// A freshly minted token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Mints and verifies HS256 bearer tokens.
pub struct TokenCodec {
    keys: KeyStore,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(keys: KeyStore) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(&keys.secret),
            decoding: DecodingKey::from_secret(&keys.secret),
            keys,
            validation,
        }
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Mint a token of `kind` for the subject.
    ///
    /// `role` may be given with or without the `ROLE_` prefix; it is stored
    /// canonically. Unknown roles are rejected.
    pub fn mint(
        &self,
        subject: &str,
        email: &str,
        role: &str,
        kind: TokenKind,
        extra_claims: BTreeMap<String, serde_json::Value>,
    ) -> Result<IssuedToken, AuthError> {
        let role: Role = role
            .parse()
            .map_err(|_| AuthError::UnknownRole(role.to_string()))?;
        let now = Utc::now();
        let claims = TokenClaims {
            sub: subject.to_string(),
            email: email.to_string(),
            role: role.authority().to_string(),
            iat: now.timestamp(),
            exp: (now + self.keys.ttl(kind)).timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: Some(kind.as_str().to_string()),
            extra: extra_claims,
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Shorthand for [`mint`](Self::mint) with a typed role and no extra claims.
    pub fn mint_for(
        &self,
        subject: &str,
        email: &str,
        role: Role,
        kind: TokenKind,
    ) -> Result<IssuedToken, AuthError> {
        self.mint(subject, email, role.authority(), kind, BTreeMap::new())
    }

    /// Sign pre-built claims as-is.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token, returning its claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify against an explicit clock.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, AuthError> {
        let claims = decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!(token = %fingerprint(token), error = %e, "token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.exp <= now.timestamp() {
            debug!(token = %fingerprint(token), "token expired");
            return Err(AuthError::InvalidToken);
        }
        if claims.sub.is_empty() || claims.email.is_empty() || claims.parsed_role().is_err() {
            debug!(token = %fingerprint(token), "token missing required claims");
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

/// Time left before `claims` expire, or `None` once expired.
pub fn remaining_ttl(claims: &TokenClaims, now: DateTime<Utc>) -> Option<std::time::Duration> {
    let secs = claims.exp - now.timestamp();
    (secs > 0).then(|| std::time::Duration::from_secs(secs as u64))
}

/// Short SHA-256 fingerprint of a token, safe to log.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}
