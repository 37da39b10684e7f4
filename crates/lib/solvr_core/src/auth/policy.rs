//! Authorization policy: ownership, admin override, the agent family check
//! and the self-vote exclusion.
//!
//! [`can_access`] and [`can_access_agent_scoped`] are pure; they decide from
//! their arguments alone. [`authorize_agent_scoped`] is the thin I/O wrapper
//! that loads the target agent first.

use serde::Serialize;
use tracing::debug;

use super::AuthError;
use super::resolver::AuthInfo;
use crate::models::auth::{Agent, ResourceOwner};
use crate::store::AgentStore;

/// What the caller wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Read,
    Update,
    Delete,
    Vote,
}

/// Why a resource access was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    Owner,
    Admin,
    /// Anyone may vote on content they did not author.
    Voter,
}

/// Depth of an agent-scoped access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentAccess {
    Read,
    Write,
}

/// How the caller relates to the target agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRelation {
    #[serde(rename = "self")]
    SelfAgent,
    Owner,
    Sibling,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthorized(String),
    Forbidden(String),
}

impl From<Denial> for AuthError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthorized(msg) => AuthError::Unauthorized(msg),
            Denial::Forbidden(msg) => AuthError::Forbidden(msg),
        }
    }
}

fn deny_forbidden(auth: &AuthInfo, reason: &str) -> Denial {
    debug!(
        author_type = %auth.author_type(),
        author_id = auth.author_id(),
        reason,
        "access denied"
    );
    Denial::Forbidden(reason.to_string())
}

fn deny_unauthenticated() -> Denial {
    debug!("access denied: unauthenticated");
    Denial::Unauthorized("authentication required".into())
}

fn owns(auth: &AuthInfo, owner: &ResourceOwner) -> bool {
    auth.author_type() == owner.owner_type && auth.author_id() == owner.owner_id
}

/// Decide an action on a resource owned by `owner`.
pub fn can_access(
    auth: Option<&AuthInfo>,
    owner: &ResourceOwner,
    action: ResourceAction,
) -> Result<AccessGrant, Denial> {
    let auth = auth.ok_or_else(deny_unauthenticated)?;
    let is_owner = owns(auth, owner);

    if action == ResourceAction::Vote {
        if is_owner {
            return Err(deny_forbidden(auth, "cannot vote on your own content"));
        }
        return Ok(AccessGrant::Voter);
    }
    if auth.is_admin() {
        return Ok(AccessGrant::Admin);
    }
    if is_owner {
        return Ok(AccessGrant::Owner);
    }
    Err(deny_forbidden(auth, "you do not own this resource"))
}

/// Decide an access scoped to `target`: the agent itself, its human, a
/// sibling agent (same human) or an admin.
pub fn can_access_agent_scoped(
    auth: Option<&AuthInfo>,
    target: &Agent,
    access: AgentAccess,
) -> Result<AgentRelation, Denial> {
    let auth = auth.ok_or_else(deny_unauthenticated)?;

    if auth.is_admin() {
        return Ok(AgentRelation::Admin);
    }
    match auth {
        AuthInfo::Agent(agent) if agent.agent_id == target.id => Ok(AgentRelation::SelfAgent),
        AuthInfo::Human(human) if target.human_id.as_deref() == Some(human.user_id.as_str()) => {
            Ok(AgentRelation::Owner)
        }
        AuthInfo::Agent(agent) if is_family(agent.human_id.as_deref(), target.human_id.as_deref()) => {
            match access {
                AgentAccess::Read => Ok(AgentRelation::Sibling),
                AgentAccess::Write => Err(deny_forbidden(auth, "sibling agents have read-only access")),
            }
        }
        _ => Err(deny_forbidden(auth, "not related to this agent")),
    }
}

/// Both agents are linked, and to the same human.
pub fn is_family(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if !a.is_empty() && a == b)
}

/// Load `agent_id` and decide an agent-scoped access.
///
/// Unauthenticated callers are rejected before any lookup, and an agent
/// acting on itself needs none.
pub async fn authorize_agent_scoped(
    agents: &dyn AgentStore,
    auth: Option<&AuthInfo>,
    agent_id: &str,
    access: AgentAccess,
) -> Result<AgentRelation, AuthError> {
    let auth = auth.ok_or_else(deny_unauthenticated)?;
    if let AuthInfo::Agent(agent) = auth
        && agent.agent_id == agent_id
    {
        return Ok(AgentRelation::SelfAgent);
    }

    let target = agents
        .find_agent_by_id(agent_id)
        .await?
        .ok_or_else(|| AuthError::NotFound(format!("agent {agent_id} not found")))?;
    Ok(can_access_agent_scoped(Some(auth), &target, access)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::{AgentPrincipal, HumanPrincipal, Role};
    use crate::store::MemoryStore;

    fn human(id: &str, role: Role) -> AuthInfo {
        AuthInfo::Human(HumanPrincipal {
            user_id: id.into(),
            email: format!("{id}@example.com"),
            role,
        })
    }

    fn agent_info(id: &str, human_id: Option<&str>) -> AuthInfo {
        AuthInfo::Agent(AgentPrincipal {
            agent_id: id.into(),
            display_name: id.into(),
            human_id: human_id.map(str::to_string),
        })
    }

    fn agent(id: &str, human_id: Option<&str>) -> Agent {
        let mut agent = Agent::new(id, id);
        agent.human_id = human_id.map(str::to_string);
        agent
    }

    #[test]
    fn unauthenticated_is_unauthorized() {
        let owner = ResourceOwner::human("h1");
        assert!(matches!(
            can_access(None, &owner, ResourceAction::Read),
            Err(Denial::Unauthorized(_))
        ));
        assert!(matches!(
            can_access_agent_scoped(None, &agent("a", None), AgentAccess::Read),
            Err(Denial::Unauthorized(_))
        ));
    }

    #[test]
    fn owner_may_mutate_but_not_self_vote() {
        let author = agent_info("agent_a", None);
        let post = ResourceOwner::agent("agent_a");

        assert_eq!(
            can_access(Some(&author), &post, ResourceAction::Update),
            Ok(AccessGrant::Owner)
        );
        assert_eq!(
            can_access(Some(&author), &post, ResourceAction::Delete),
            Ok(AccessGrant::Owner)
        );
        assert_eq!(
            can_access(Some(&author), &post, ResourceAction::Vote),
            Err(Denial::Forbidden("cannot vote on your own content".into()))
        );
    }

    #[test]
    fn owner_type_must_match_as_well_as_id() {
        let caller = human("same-id", Role::User);
        let post = ResourceOwner::agent("same-id");
        assert!(matches!(
            can_access(Some(&caller), &post, ResourceAction::Update),
            Err(Denial::Forbidden(_))
        ));
    }

    #[test]
    fn admin_overrides_ownership_except_self_vote() {
        let admin = human("root", Role::SuperAdmin);
        let someone_elses = ResourceOwner::human("h1");
        for action in [ResourceAction::Read, ResourceAction::Update, ResourceAction::Delete] {
            assert_eq!(
                can_access(Some(&admin), &someone_elses, action),
                Ok(AccessGrant::Admin)
            );
        }

        let own = ResourceOwner::human("root");
        assert!(matches!(
            can_access(Some(&admin), &own, ResourceAction::Vote),
            Err(Denial::Forbidden(_))
        ));
    }

    #[test]
    fn voting_on_others_content_is_allowed() {
        let voter = human("h2", Role::User);
        assert_eq!(
            can_access(Some(&voter), &ResourceOwner::agent("agent_a"), ResourceAction::Vote),
            Ok(AccessGrant::Voter)
        );
    }

    #[test]
    fn non_owner_is_forbidden() {
        let stranger = human("h2", Role::User);
        assert!(matches!(
            can_access(Some(&stranger), &ResourceOwner::human("h1"), ResourceAction::Delete),
            Err(Denial::Forbidden(_))
        ));
    }

    #[test]
    fn family_relations() {
        let a = agent("agent_a", Some("H"));
        let b = agent("agent_b", Some("H"));

        let as_a = agent_info("agent_a", Some("H"));
        let as_h = human("H", Role::User);
        let as_c = agent_info("agent_c", Some("other"));
        let as_orphan = agent_info("agent_x", None);

        assert_eq!(
            can_access_agent_scoped(Some(&as_a), &a, AgentAccess::Write),
            Ok(AgentRelation::SelfAgent)
        );
        assert_eq!(
            can_access_agent_scoped(Some(&as_a), &b, AgentAccess::Read),
            Ok(AgentRelation::Sibling)
        );
        assert!(matches!(
            can_access_agent_scoped(Some(&as_a), &b, AgentAccess::Write),
            Err(Denial::Forbidden(_))
        ));
        for target in [&a, &b] {
            assert_eq!(
                can_access_agent_scoped(Some(&as_h), target, AgentAccess::Write),
                Ok(AgentRelation::Owner)
            );
        }
        assert!(matches!(
            can_access_agent_scoped(Some(&as_c), &b, AgentAccess::Read),
            Err(Denial::Forbidden(_))
        ));
        assert!(matches!(
            can_access_agent_scoped(Some(&as_orphan), &agent("agent_y", None), AgentAccess::Read),
            Err(Denial::Forbidden(_))
        ));
    }

    #[test]
    fn admin_reaches_any_agent() {
        let admin = human("root", Role::Admin);
        assert_eq!(
            can_access_agent_scoped(Some(&admin), &agent("agent_z", None), AgentAccess::Write),
            Ok(AgentRelation::Admin)
        );
    }

    #[test]
    fn unlinked_agents_are_not_family() {
        assert!(is_family(Some("H"), Some("H")));
        assert!(!is_family(None, None));
        assert!(!is_family(Some("H"), None));
        assert!(!is_family(Some(""), Some("")));
        assert!(!is_family(Some("H"), Some("J")));
    }

    #[tokio::test]
    async fn authorize_loads_target_and_maps_errors() {
        let store = MemoryStore::new();
        store.insert_agent(agent("agent_b", Some("H")));

        let sibling = agent_info("agent_a", Some("H"));
        assert_eq!(
            authorize_agent_scoped(&store, Some(&sibling), "agent_b", AgentAccess::Read)
                .await
                .unwrap(),
            AgentRelation::Sibling
        );

        // Self access needs no lookup, so a missing record does not matter.
        assert_eq!(
            authorize_agent_scoped(&store, Some(&sibling), "agent_a", AgentAccess::Write)
                .await
                .unwrap(),
            AgentRelation::SelfAgent
        );

        let err = authorize_agent_scoped(&store, Some(&sibling), "agent_missing", AgentAccess::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));

        let err = authorize_agent_scoped(&store, None, "agent_missing", AgentAccess::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }
}
