//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentId, AgentUpdate, NewAgent};
use crate::domain::ports::AgentRepository;

use super::{now_timestamp, parse_datetime};

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_write_error(err: sqlx::Error, name: &str) -> DomainError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::DuplicateAgentName(name.to_string()),
        _ => err.into(),
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &NewAgent) -> DomainResult<Agent> {
        agent.validate().map_err(DomainError::ValidationFailed)?;

        let row: AgentRow = sqlx::query_as(
            r#"INSERT INTO agents (owner_name, name, credential, personality, objective,
               behavior_rules, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, 1, ?)
               RETURNING *"#
        )
        .bind(&agent.owner_name)
        .bind(&agent.name)
        .bind(&agent.credential)
        .bind(&agent.personality)
        .bind(&agent.objective)
        .bind(&agent.behavior_rules)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &agent.name))?;

        row.try_into()
    }

    async fn get(&self, id: AgentId) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_active(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE is_active = 1 ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: AgentId, update: &AgentUpdate) -> DomainResult<Option<Agent>> {
        let Some(mut agent) = self.get(id).await? else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(agent));
        }
        update.apply_to(&mut agent);

        sqlx::query(
            r#"UPDATE agents SET owner_name = ?, name = ?, credential = ?, personality = ?,
               objective = ?, behavior_rules = ?, is_active = ?
               WHERE id = ?"#
        )
        .bind(&agent.owner_name)
        .bind(&agent.name)
        .bind(&agent.credential)
        .bind(&agent.personality)
        .bind(&agent.objective)
        .bind(&agent.behavior_rules)
        .bind(i32::from(agent.is_active))
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &agent.name))?;

        Ok(Some(agent))
    }

    async fn delete(&self, id: AgentId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(id));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: i64,
    owner_name: String,
    name: String,
    credential: String,
    personality: String,
    objective: String,
    behavior_rules: String,
    is_active: i64,
    created_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(Agent {
            id: AgentId(row.id),
            owner_name: row.owner_name,
            name: row.name,
            credential: row.credential,
            personality: row.personality,
            objective: row.objective,
            behavior_rules: row.behavior_rules,
            is_active: row.is_active != 0,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
