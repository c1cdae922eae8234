//! Domain models for the Agora agent fleet.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod event;
pub mod grade;
pub mod pair;
pub mod prompt;

pub use agent::{Agent, AgentId, AgentStats, AgentUpdate, NewAgent};
pub use config::{Config, DatabaseConfig, FleetConfig, LlmConfig, LoggingConfig, SchedulerConfig};
pub use conversation::{
    AuthorKind, Conversation, ConversationId, ConversationKind, Message, MessageId,
    NewConversation, NewMessage,
};
pub use event::LiveEvent;
pub use grade::{Grade, NewGrade, RubricScores};
pub use pair::{PairCounts, PairKey, PairTally};
pub use prompt::{CompletionRequest, PromptMessage, PromptRole};
