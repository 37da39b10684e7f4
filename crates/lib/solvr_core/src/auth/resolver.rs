//! Resolve a request's principals into exactly one identity.

use serde::Serialize;

use super::verifier::BearerPrincipal;
use crate::models::auth::{AgentPrincipal, AuthorType, HumanPrincipal};

/// Principals attached to one request. Either, both or neither may be set.
#[derive(Debug, Clone, Default)]
pub struct PrincipalContext {
    pub agent: Option<AgentPrincipal>,
    pub human: Option<HumanPrincipal>,
}

impl PrincipalContext {
    pub fn attach(&mut self, principal: BearerPrincipal) {
        match principal {
            BearerPrincipal::Human(human) => self.human = Some(human),
            BearerPrincipal::Agent(agent) => self.agent = Some(agent),
        }
    }
}

/// The one canonical identity of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthInfo {
    Human(HumanPrincipal),
    Agent(AgentPrincipal),
}

impl AuthInfo {
    pub fn author_type(&self) -> AuthorType {
        match self {
            AuthInfo::Human(_) => AuthorType::Human,
            AuthInfo::Agent(_) => AuthorType::Agent,
        }
    }

    pub fn author_id(&self) -> &str {
        match self {
            AuthInfo::Human(h) => &h.user_id,
            AuthInfo::Agent(a) => &a.agent_id,
        }
    }

    /// The human's role; empty for agents.
    pub fn role(&self) -> &'static str {
        match self {
            AuthInfo::Human(h) => h.role.as_str(),
            AuthInfo::Agent(_) => "",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AuthInfo::Human(HumanPrincipal { role, .. }) if role.is_admin())
    }

    pub fn as_human(&self) -> Option<&HumanPrincipal> {
        match self {
            AuthInfo::Human(h) => Some(h),
            AuthInfo::Agent(_) => None,
        }
    }

    pub fn as_agent(&self) -> Option<&AgentPrincipal> {
        match self {
            AuthInfo::Agent(a) => Some(a),
            AuthInfo::Human(_) => None,
        }
    }

    /// Flat `{author_type, author_id, role}` view for responses and logs.
    pub fn summary(&self) -> AuthSummary {
        AuthSummary {
            author_type: self.author_type(),
            author_id: self.author_id().to_string(),
            role: self.role().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSummary {
    pub author_type: AuthorType,
    pub author_id: String,
    pub role: String,
}

/// Agent wins over human; neither means unauthenticated.
pub fn resolve(ctx: &PrincipalContext) -> Option<AuthInfo> {
    if let Some(agent) = &ctx.agent {
        return Some(AuthInfo::Agent(agent.clone()));
    }
    ctx.human.clone().map(AuthInfo::Human)
}
