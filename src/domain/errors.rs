//! Domain errors for the Agora agent fleet.

use thiserror::Error;

use crate::domain::models::{AgentId, ConversationId};

/// Domain-level errors that can occur in the Agora system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("Agent name already taken: {0}")]
    DuplicateAgentName(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Text generation failed: {0}")]
    GenerationFailed(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
