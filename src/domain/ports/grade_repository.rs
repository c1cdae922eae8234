//! Grade repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentId, Grade, NewGrade};

#[async_trait]
pub trait GradeRepository: Send + Sync {
    async fn create(&self, grade: &NewGrade) -> DomainResult<Grade>;

    /// All grades for an agent, newest first.
    async fn list_for_agent(&self, agent_id: AgentId) -> DomainResult<Vec<Grade>>;

    /// The most recent grade of each agent, best overall score first.
    async fn latest_per_agent(&self) -> DomainResult<Vec<Grade>>;

    /// Grades produced by one run, best overall score first.
    async fn list_by_run(&self, run_id: &str) -> DomainResult<Vec<Grade>>;
}
