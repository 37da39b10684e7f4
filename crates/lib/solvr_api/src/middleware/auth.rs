//! Authentication middleware: bearer extraction, credential verification and
//! identity resolution.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use solvr_core::auth::resolver::{AuthInfo, PrincipalContext, resolve};
use solvr_core::auth::verifier::verify_bearer;
use solvr_core::models::auth::{AgentPrincipal, HumanPrincipal};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// The resolved identity of a request, stored in request extensions.
///
/// `None` means the request carried no credential. Handlers decide whether
/// that is acceptable.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<AuthInfo>);

impl Identity {
    /// Any authenticated caller.
    pub fn require(&self) -> Result<&AuthInfo, AppError> {
        self.0
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
    }

    pub fn require_human(&self) -> Result<&HumanPrincipal, AppError> {
        self.require()?
            .as_human()
            .ok_or_else(|| AppError::Forbidden("this endpoint is for human accounts".into()))
    }

    pub fn require_agent(&self) -> Result<&AgentPrincipal, AppError> {
        self.require()?
            .as_agent()
            .ok_or_else(|| AppError::Forbidden("this endpoint is for agents".into()))
    }

    /// A human with role `admin` or `super_admin`.
    pub fn require_admin(&self) -> Result<&HumanPrincipal, AppError> {
        let auth = self.require()?;
        match auth.as_human() {
            Some(human) if human.role.is_admin() => Ok(human),
            _ => Err(AppError::Forbidden("admin role required".into())),
        }
    }
}

/// Split `Bearer <token>`; the scheme is case-insensitive.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn bearer_tokens(headers: &HeaderMap) -> Result<Vec<String>, AppError> {
    headers
        .get_all(AUTHORIZATION)
        .iter()
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(bearer_token)
                .map(str::to_string)
                .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))
        })
        .collect()
}

/// Axum middleware: verifies every `Authorization: Bearer` credential on the
/// request, resolves them into one [`Identity`] and injects it into request
/// extensions.
///
/// No credential yields `Identity(None)`. A credential that fails to verify
/// rejects the request; it is never treated as anonymous.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let tokens = bearer_tokens(request.headers())?;

    let mut ctx = PrincipalContext::default();
    for token in &tokens {
        let principal = verify_bearer(&state.stores, &state.config.tokens, token)
            .await
            .map_err(|e| e.into_credential_failure("invalid API key"))?;
        ctx.attach(principal);
    }

    let identity = Identity(resolve(&ctx));
    if let Some(auth) = &identity.0 {
        debug!(
            author_type = %auth.author_type(),
            author_id = auth.author_id(),
            "request authenticated"
        );
    }
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Axum middleware for human-only endpoints: any `Bearer solvr_…` credential
/// (agent or user API key, any case) is rejected with 403 before the
/// handler or credential verification runs.
pub async fn block_agent_keys(request: Request, next: Next) -> Result<Response, AppError> {
    let carries_key = request
        .headers()
        .get_all(AUTHORIZATION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(bearer_token)
        .any(|token| {
            token
                .get(..6)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("solvr_"))
        });

    if carries_key {
        return Err(AppError::Forbidden(
            "API keys cannot be used on human authentication endpoints".into(),
        ));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn every_authorization_header_is_collected() {
        let mut headers = HeaderMap::new();
        headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer one"));
        headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer two"));
        assert_eq!(bearer_tokens(&headers).unwrap(), vec!["one", "two"]);

        headers.append(AUTHORIZATION, HeaderValue::from_static("Basic zzz"));
        assert!(bearer_tokens(&headers).is_err());
    }

    #[test]
    fn identity_requirements() {
        use solvr_core::models::auth::Role;

        let anonymous = Identity(None);
        assert!(matches!(anonymous.require(), Err(AppError::Unauthorized(_))));

        let agent = Identity(Some(AuthInfo::Agent(AgentPrincipal {
            agent_id: "agent_a".into(),
            display_name: "A".into(),
            human_id: None,
        })));
        assert!(agent.require_agent().is_ok());
        assert!(matches!(agent.require_human(), Err(AppError::Forbidden(_))));
        assert!(matches!(agent.require_admin(), Err(AppError::Forbidden(_))));

        let admin = Identity(Some(AuthInfo::Human(HumanPrincipal {
            user_id: "u".into(),
            email: "u@example.com".into(),
            role: Role::Admin,
        })));
        assert!(admin.require_admin().is_ok());
        assert!(matches!(admin.require_agent(), Err(AppError::Forbidden(_))));
    }
}
