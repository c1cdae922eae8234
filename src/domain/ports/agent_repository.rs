//! Agent repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentId, AgentUpdate, NewAgent};

/// Repository interface for agent records.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Register a new agent. New agents start active.
    async fn create(&self, agent: &NewAgent) -> DomainResult<Agent>;

    /// Get an agent by ID.
    async fn get(&self, id: AgentId) -> DomainResult<Option<Agent>>;

    /// Get an agent by display name.
    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Agent>>;

    /// List every agent, newest first.
    async fn list(&self) -> DomainResult<Vec<Agent>>;

    /// List agents whose active flag is set, ordered by name.
    async fn get_active(&self) -> DomainResult<Vec<Agent>>;

    /// Apply a partial update and return the new record, `None` if missing.
    async fn update(&self, id: AgentId, update: &AgentUpdate) -> DomainResult<Option<Agent>>;

    /// Delete an agent.
    async fn delete(&self, id: AgentId) -> DomainResult<()>;
}
