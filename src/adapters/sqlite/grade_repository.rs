//! SQLite implementation of the GradeRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentId, Grade, NewGrade};
use crate::domain::ports::GradeRepository;

use super::{now_timestamp, parse_datetime};

#[derive(Clone)]
pub struct SqliteGradeRepository {
    pool: SqlitePool,
}

impl SqliteGradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradeRepository for SqliteGradeRepository {
    async fn create(&self, grade: &NewGrade) -> DomainResult<Grade> {
        let row: GradeRow = sqlx::query_as(
            r#"INSERT INTO grades (agent_id, run_id, objective_score, quality_score, human_score,
               volume_score, overall_score, reasoning, total_messages, total_conversations,
               human_interactions, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#
        )
        .bind(grade.agent_id.0)
        .bind(&grade.run_id)
        .bind(grade.scores.objective)
        .bind(grade.scores.quality)
        .bind(grade.scores.human)
        .bind(grade.scores.volume)
        .bind(grade.scores.overall())
        .bind(&grade.reasoning)
        .bind(grade.total_messages)
        .bind(grade.total_conversations)
        .bind(grade.human_interactions)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_for_agent(&self, agent_id: AgentId) -> DomainResult<Vec<Grade>> {
        let rows: Vec<GradeRow> = sqlx::query_as("SELECT * FROM grades WHERE agent_id = ? ORDER BY id DESC")
            .bind(agent_id.0)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn latest_per_agent(&self) -> DomainResult<Vec<Grade>> {
        // Ids are monotonic, so the highest id per agent is its latest grade.
        let rows: Vec<GradeRow> = sqlx::query_as(
            r#"SELECT g.* FROM grades g
               INNER JOIN (SELECT agent_id, MAX(id) AS latest_id FROM grades GROUP BY agent_id) latest
               ON g.id = latest.latest_id
               ORDER BY g.overall_score DESC"#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_run(&self, run_id: &str) -> DomainResult<Vec<Grade>> {
        let rows: Vec<GradeRow> = sqlx::query_as("SELECT * FROM grades WHERE run_id = ? ORDER BY overall_score DESC")
            .bind(run_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct GradeRow {
    id: i64,
    agent_id: i64,
    run_id: String,
    objective_score: f64,
    quality_score: f64,
    human_score: f64,
    volume_score: f64,
    overall_score: f64,
    reasoning: String,
    total_messages: i64,
    total_conversations: i64,
    human_interactions: i64,
    created_at: String,
}

impl TryFrom<GradeRow> for Grade {
    type Error = DomainError;

    fn try_from(row: GradeRow) -> Result<Self, Self::Error> {
        Ok(Grade {
            id: row.id,
            agent_id: AgentId(row.agent_id),
            run_id: row.run_id,
            objective_score: row.objective_score,
            quality_score: row.quality_score,
            human_score: row.human_score,
            volume_score: row.volume_score,
            overall_score: row.overall_score,
            reasoning: row.reasoning,
            total_messages: row.total_messages,
            total_conversations: row.total_conversations,
            human_interactions: row.human_interactions,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAgentRepository};
    use crate::domain::models::{NewAgent, RubricScores};
    use crate::domain::ports::AgentRepository;

    fn grade(agent_id: AgentId, run_id: &str, objective: f64) -> NewGrade {
        NewGrade {
            agent_id,
            run_id: run_id.to_string(),
            scores: RubricScores { objective, quality: 50.0, human: 50.0, volume: 50.0 },
            reasoning: "ok".to_string(),
            total_messages: 3,
            total_conversations: 1,
            human_interactions: 0,
        }
    }

    #[tokio::test]
    async fn test_latest_per_agent_and_runs() {
        let pool = create_migrated_test_pool().await.unwrap();
        let agents = SqliteAgentRepository::new(pool.clone());
        let a = agents.create(&NewAgent::new("Dana", "Alpha", "t")).await.unwrap().id;
        let b = agents.create(&NewAgent::new("Eli", "Beta", "t")).await.unwrap().id;
        let repo = SqliteGradeRepository::new(pool);

        repo.create(&grade(a, "run-1", 10.0)).await.unwrap();
        repo.create(&grade(b, "run-1", 90.0)).await.unwrap();
        let newest_a = repo.create(&grade(a, "run-2", 100.0)).await.unwrap();

        let expected = RubricScores { objective: 100.0, quality: 50.0, human: 50.0, volume: 50.0 }.overall();
        assert!((newest_a.overall_score - expected).abs() < 1e-9);

        let latest = repo.latest_per_agent().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].id, newest_a.id);
        assert_eq!(latest[1].agent_id, b);

        let run1 = repo.list_by_run("run-1").await.unwrap();
        assert_eq!(run1.len(), 2);
        assert_eq!(run1[0].agent_id, b);

        assert_eq!(repo.list_for_agent(a).await.unwrap().len(), 2);
    }
}
