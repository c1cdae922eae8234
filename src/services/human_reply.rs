//! Replies to humans posting in the shared channel.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Conversation, ConversationKind, LiveEvent, NewConversation, NewMessage,
};
use crate::domain::ports::{
    AgentRuntime, ConversationRepository, LiveUpdateSink, MessageFilter, GENERATION_FAILED_REPLY,
};
use crate::services::prompt::build_reply_messages;

/// How many of the agent's own recent messages go into a reply prompt.
pub const REPLY_HISTORY_LIMIT: u32 = 10;

/// A human post as received from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanPost {
    pub author: String,
    pub content: String,
    pub external_id: Option<String>,
}

/// Records a single-turn `agent-human` exchange for one agent.
pub struct HumanReplyService {
    conversations: Arc<dyn ConversationRepository>,
    live: Arc<dyn LiveUpdateSink>,
    channel_name: String,
}

impl HumanReplyService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        live: Arc<dyn LiveUpdateSink>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self { conversations, live, channel_name: channel_name.into() }
    }

    /// Generate, deliver and record one reply to `post`.
    ///
    /// Returns `None` without recording anything when generation failed.
    pub async fn reply(&self, runtime: &dyn AgentRuntime, post: &HumanPost) -> DomainResult<Option<Conversation>> {
        let agent = runtime.agent();

        let mut recent = self
            .conversations
            .list_messages(MessageFilter { agent_id: Some(agent.id), limit: REPLY_HISTORY_LIMIT })
            .await?;
        recent.reverse();

        let prompt = build_reply_messages(agent, &self.channel_name, &post.author, &post.content, &recent);
        let reply = runtime.generate_reply(prompt).await;
        if reply == GENERATION_FAILED_REPLY {
            tracing::warn!(agent_id = %agent.id, agent = %agent.name, human = %post.author, "skipping human reply after generation failure");
            return Ok(None);
        }

        let conversation = self
            .conversations
            .create_conversation(&NewConversation::with_human(runtime.channel_id(), agent.id))
            .await?;
        self.conversations
            .create_message(&NewMessage::from_human(
                conversation.id,
                post.author.clone(),
                post.content.clone(),
                post.external_id.clone(),
            ))
            .await?;

        let external_id = runtime.deliver(&reply).await;
        if external_id.is_none() {
            tracing::warn!(agent_id = %agent.id, conversation_id = %conversation.id, "human reply was not delivered");
        }
        self.conversations
            .create_message(&NewMessage::from_bot(conversation.id, agent.id, agent.name.clone(), reply.clone(), external_id))
            .await?;
        self.conversations.end_conversation(conversation.id, 1).await?;

        self.live.notify(LiveEvent::Message {
            conversation_id: Some(conversation.id),
            bot: agent.name.clone(),
            content: reply,
            conversation_type: ConversationKind::AgentHuman,
        });

        tracing::info!(agent_id = %agent.id, conversation_id = %conversation.id, human = %post.author, "replied to human");

        Ok(self.conversations.get_conversation(conversation.id).await?.or(Some(conversation)))
    }
}
