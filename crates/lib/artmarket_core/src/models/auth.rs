//! Roles, token claims and the request principal.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::user::UserRecord;

/// Prefix carried by every role inside a token.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Marketplace role. Exactly one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Artist,
    Admin,
}

/// A role string that names none of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::Customer, Role::Artist, Role::Admin];

    /// Bare name as stored in the user table (`ARTIST`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Artist => "ARTIST",
            Role::Admin => "ADMIN",
        }
    }

    /// Canonical authority as carried in tokens (`ROLE_ARTIST`).
    pub fn authority(&self) -> &'static str {
        match self {
            Role::Customer => "ROLE_CUSTOMER",
            Role::Artist => "ROLE_ARTIST",
            Role::Admin => "ROLE_ADMIN",
        }
    }

    /// Landing page handed back after login or registration.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Customer => "/dashboard/customer",
            Role::Artist => "/dashboard/artist",
            Role::Admin => "/dashboard/admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts both `ARTIST` and `ROLE_ARTIST`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let bare = upper.strip_prefix(ROLE_PREFIX).unwrap_or(&upper);
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == bare)
            .ok_or_else(|| UnknownRole(trimmed.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which TTL a token was minted with.
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

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user ID.
    pub sub: String,
    /// User email.
    pub email: String,
    /// Canonical role (`ROLE_` prefixed).
    pub role: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
    /// `access` or `refresh`. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Caller-supplied extra claims.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Parse the role claim (either prefixed or bare).
    pub fn parsed_role(&self) -> Result<Role, UnknownRole> {
        self.role.parse()
    }
}

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

impl Principal {
    /// Build from verified claims and the directory record. The role comes
    /// from the token, never from the stored user.
    pub fn from_claims(claims: &TokenClaims, user: &UserRecord) -> Result<Self, UnknownRole> {
        Ok(Self {
            subject: claims.sub.clone(),
            email: claims.email.clone(),
            role: claims.parsed_role()?,
            active: user.is_enabled(),
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}
