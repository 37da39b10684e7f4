//! PostgreSQL repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    AgentStore, ApiKeyStore, ClaimOutcome, ClaimTokenStore, HumanStore, RefreshTokenStore,
};
use crate::auth::AuthError;
use crate::models::auth::{
    Agent, ApiKeyRecord, ClaimToken, KeyOwner, RefreshTokenRecord, Role, User,
};

/// `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

type AgentRow = (String, String, Option<String>, i64, bool, DateTime<Utc>);

type ClaimRow = (
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
);

type ApiKeyRow = (
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

const CLAIM_COLUMNS: &str = "id::text, token, agent_id, expires_at, created_at, used_at, \
                             used_by_human_id::text";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Human ids are UUIDs; anything else cannot match a row.
fn is_uuid(id: &str) -> bool {
    ::uuid::Uuid::parse_str(id).is_ok()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

fn agent_from_row(row: AgentRow) -> Agent {
    let (id, display_name, human_id, karma, has_human_backed_badge, created_at) = row;
    Agent {
        id,
        display_name,
        human_id,
        karma,
        has_human_backed_badge,
        created_at,
    }
}

fn claim_from_row(row: ClaimRow) -> ClaimToken {
    let (id, token, agent_id, expires_at, created_at, used_at, used_by_human_id) = row;
    ClaimToken {
        id,
        token,
        agent_id,
        expires_at,
        created_at,
        used_at,
        used_by_human_id,
    }
}

fn api_key_from_row(row: ApiKeyRow) -> Result<ApiKeyRecord, AuthError> {
    let (id, owner_type, owner_id, key_hash, name, created_at, last_used_at, revoked_at) = row;
    let owner = match owner_type.as_str() {
        "human" => KeyOwner::Human(owner_id),
        "agent" => KeyOwner::Agent(owner_id),
        other => {
            return Err(AuthError::Internal(format!(
                "api key {id} has unknown owner type {other}"
            )));
        }
    };
    Ok(ApiKeyRecord {
        id,
        owner,
        key_hash,
        name,
        created_at,
        last_used_at,
        revoked_at,
    })
}

#[async_trait]
impl HumanStore for PgStore {
    async fn find_human_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        if !is_uuid(id) {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, (String, String, Option<String>, String)>(
            "SELECT id::text, email, display_name, role::text FROM users WHERE id = $1::uuid",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, email, display_name, role)| {
            let role = role.parse::<Role>().map_err(AuthError::Internal)?;
            Ok(User {
                id,
                email,
                display_name,
                role,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl AgentStore for PgStore {
    async fn find_agent_by_id(&self, id: &str) -> Result<Option<Agent>, AuthError> {
        let row = sqlx::query_as::<_, AgentRow>(
            "SELECT id, display_name, human_id::text, karma, has_human_backed_badge, created_at \
             FROM agents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(agent_from_row))
    }

    async fn create_agent(&self, agent: &Agent) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO agents (id, display_name, human_id, karma, has_human_backed_badge, \
             created_at) VALUES ($1, $2, $3::uuid, $4, $5, $6)",
        )
        .bind(&agent.id)
        .bind(&agent.display_name)
        .bind(&agent.human_id)
        .bind(agent.karma)
        .bind(agent.has_human_backed_badge)
        .bind(agent.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::Conflict(format!("agent {} already exists", agent.id))
            } else {
                AuthError::DbError(e)
            }
        })?;
        Ok(())
    }

    async fn add_karma(&self, agent_id: &str, amount: i64) -> Result<(), AuthError> {
        sqlx::query("UPDATE agents SET karma = karma + $2 WHERE id = $1")
            .bind(agent_id)
            .bind(amount)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn grant_human_backed_badge(&self, agent_id: &str) -> Result<(), AuthError> {
        sqlx::query("UPDATE agents SET has_human_backed_badge = true WHERE id = $1")
            .bind(agent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn get_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, (String, String, String, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id::text, user_id::text, token_hash, expires_at, created_at \
             FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(
            row.map(|(id, user_id, token_hash, expires_at, created_at)| RefreshTokenRecord {
                id,
                user_id,
                token_hash,
                expires_at,
                created_at,
            }),
        )
    }

    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at) \
             VALUES ($1::uuid, $2::uuid, $3, $4, $5)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::Conflict("refresh token hash already exists".into())
            } else {
                AuthError::DbError(e)
            }
        })?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1::uuid")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64, AuthError> {
        if !is_uuid(user_id) {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1::uuid")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ClaimTokenStore for PgStore {
    async fn create(&self, token: &ClaimToken) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;
        // Clear the expired unused token so the partial unique index admits the new one.
        sqlx::query(
            "DELETE FROM claim_tokens \
             WHERE agent_id = $1 AND used_at IS NULL AND expires_at < $2",
        )
        .bind(&token.agent_id)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO claim_tokens (id, token, agent_id, expires_at, created_at) \
             VALUES ($1::uuid, $2, $3, $4, $5)",
        )
        .bind(&token.id)
        .bind(&token.token)
        .bind(&token.agent_id)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::Conflict("agent already has an active claim token".into())
            } else {
                AuthError::DbError(e)
            }
        })?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ClaimToken>, AuthError> {
        let row = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim_tokens WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(claim_from_row))
    }

    async fn find_active_by_agent(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimToken>, AuthError> {
        let row = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim_tokens \
             WHERE agent_id = $1 AND used_at IS NULL AND expires_at >= $2 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(agent_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(claim_from_row))
    }

    async fn redeem(
        &self,
        token: &ClaimToken,
        human_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, AuthError> {
        let mut tx = self.pool.begin().await?;
        let consumed = sqlx::query(
            "UPDATE claim_tokens SET used_at = $3, used_by_human_id = $2::uuid \
             WHERE id = $1::uuid AND used_at IS NULL",
        )
        .bind(&token.id)
        .bind(human_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ClaimOutcome::TokenUsed);
        }

        let linked = sqlx::query(
            "UPDATE agents SET human_id = $2::uuid WHERE id = $1 AND human_id IS NULL",
        )
        .bind(&token.agent_id)
        .bind(human_id)
        .execute(&mut *tx)
        .await?;
        if linked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ClaimOutcome::AgentTaken);
        }

        tx.commit().await?;
        Ok(ClaimOutcome::Linked)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result =
            sqlx::query("DELETE FROM claim_tokens WHERE used_at IS NULL AND expires_at < $1")
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn create(&self, record: &ApiKeyRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO api_keys (id, owner_type, owner_id, key_hash, name, created_at) \
             VALUES ($1::uuid, $2, $3, $4, $5, $6)",
        )
        .bind(&record.id)
        .bind(record.owner.owner_type().as_str())
        .bind(record.owner.owner_id())
        .bind(&record.key_hash)
        .bind(&record.name)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::Conflict("api key already exists".into())
            } else {
                AuthError::DbError(e)
            }
        })?;
        Ok(())
    }

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT id::text, owner_type, owner_id, key_hash, name, created_at, last_used_at, \
             revoked_at FROM api_keys WHERE key_hash = $1 AND revoked_at IS NULL",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(api_key_from_row).transpose()
    }

    async fn update_last_used(&self, id: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1::uuid")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_for_owner(
        &self,
        owner: &KeyOwner,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = $3 \
             WHERE owner_type = $1 AND owner_id = $2 AND revoked_at IS NULL",
        )
        .bind(owner.owner_type().as_str())
        .bind(owner.owner_id())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
