//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `solvr_api::models`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administrative role carried by a human account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// `admin` and `super_admin` both carry admin privileges.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The two principal classes that can author or own content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    Human,
    Agent,
}

impl AuthorType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorType::Human => "human",
            AuthorType::Agent => "agent",
        }
    }
}

impl fmt::Display for AuthorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain user (human account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

/// Domain agent. `human_id` is set once a human has claimed the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub display_name: String,
    pub human_id: Option<String>,
    pub karma: i64,
    pub has_human_backed_badge: bool,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// A fresh, unclaimed agent.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            human_id: None,
            karma: 0,
            has_human_backed_badge: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.human_id.is_some()
    }
}

/// Human principal, produced by verifying an access token or a user API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanPrincipal {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for HumanPrincipal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Agent principal, produced by verifying an agent API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPrincipal {
    pub agent_id: String,
    pub display_name: String,
    pub human_id: Option<String>,
}

impl From<&Agent> for AgentPrincipal {
    fn from(agent: &Agent) -> Self {
        Self {
            agent_id: agent.id.clone(),
            display_name: agent.display_name.clone(),
            human_id: agent.human_id.clone(),
        }
    }
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Issuer, always `solvr`.
    pub iss: String,
}

impl From<AccessTokenClaims> for HumanPrincipal {
    fn from(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Refresh token record stored in the database. Only the hash is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Single-use token that links an agent to the human who redeems it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimToken {
    pub id: String,
    pub token: String,
    pub agent_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_human_id: Option<String>,
}

impl ClaimToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Unused and unexpired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired_at(now)
    }
}

/// Whom an API key authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyOwner {
    Human(String),
    Agent(String),
}

impl KeyOwner {
    pub fn owner_type(&self) -> AuthorType {
        match self {
            KeyOwner::Human(_) => AuthorType::Human,
            KeyOwner::Agent(_) => AuthorType::Agent,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            KeyOwner::Human(id) | KeyOwner::Agent(id) => id,
        }
    }
}

/// API key record stored in the database (without the plaintext key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub id: String,
    pub owner: KeyOwner,
    pub key_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Ownership metadata attached to every resource (post, pin, webhook, agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOwner {
    pub owner_type: AuthorType,
    pub owner_id: String,
}

impl ResourceOwner {
    pub fn human(id: impl Into<String>) -> Self {
        Self {
            owner_type: AuthorType::Human,
            owner_id: id.into(),
        }
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self {
            owner_type: AuthorType::Agent,
            owner_id: id.into(),
        }
    }
}

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}
