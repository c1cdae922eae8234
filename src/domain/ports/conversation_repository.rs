//! Conversation history port: conversations, messages and pair tallies.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentId, AgentStats, Conversation, ConversationId, Message, NewConversation, NewMessage,
    PairCounts, PairTally,
};

/// Filter for message listings.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Only messages produced by this agent.
    pub agent_id: Option<AgentId>,
    /// Maximum rows, newest first.
    pub limit: u32,
}

/// Persistence contract used by the conversation driver and scheduler.
///
/// All mutating operations are single atomic statements; callers never cache
/// their results across scheduler iterations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Open a new conversation record.
    async fn create_conversation(&self, conversation: &NewConversation) -> DomainResult<Conversation>;

    /// Finalize a conversation: set the end timestamp and turn count.
    async fn end_conversation(&self, id: ConversationId, turn_count: u32) -> DomainResult<()>;

    async fn get_conversation(&self, id: ConversationId) -> DomainResult<Option<Conversation>>;

    /// Most recently started conversations.
    async fn list_conversations(&self, limit: u32) -> DomainResult<Vec<Conversation>>;

    /// Most recent conversations the agent took part in.
    async fn list_agent_conversations(&self, agent_id: AgentId, limit: u32) -> DomainResult<Vec<Conversation>>;

    /// Append a message.
    async fn create_message(&self, message: &NewMessage) -> DomainResult<Message>;

    /// Messages of one conversation in creation order.
    async fn get_conversation_messages(&self, id: ConversationId) -> DomainResult<Vec<Message>>;

    /// Newest messages first.
    async fn list_messages(&self, filter: MessageFilter) -> DomainResult<Vec<Message>>;

    async fn agent_stats(&self, agent_id: AgentId) -> DomainResult<AgentStats>;

    /// Conversation count for every stored pair.
    async fn get_pair_counts(&self) -> DomainResult<PairCounts>;

    async fn list_pair_tallies(&self) -> DomainResult<Vec<PairTally>>;

    /// Atomically increment-or-insert the tally for the unordered pair.
    async fn increment_pair(&self, a: AgentId, b: AgentId) -> DomainResult<()>;
}
