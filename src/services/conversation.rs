//! Drives one scheduled conversation between two running agents.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Conversation, ConversationId, ConversationKind, LiveEvent, Message, NewConversation, NewMessage,
    SchedulerConfig,
};
use crate::domain::ports::{AgentRuntime, ConversationRepository, LiveUpdateSink};
use crate::services::prompt::build_conversation_messages;

/// Per-conversation knobs.
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    /// Each turn is one initiator message followed by one responder message.
    pub turns: u32,
    /// Pause after every delivered message.
    pub message_pace: Duration,
    /// Name of the shared channel, used in prompts.
    pub channel_name: String,
}

impl ConversationSettings {
    /// Turns and pacing from the scheduler section of the configuration.
    pub fn from_config(scheduler: &SchedulerConfig, channel_name: impl Into<String>) -> Self {
        Self {
            turns: scheduler.turns,
            message_pace: scheduler.message_pace(),
            channel_name: channel_name.into(),
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default(), "the-marketplace")
    }
}

/// Runs agent-to-agent conversations and records them.
pub struct ConversationDriver {
    conversations: Arc<dyn ConversationRepository>,
    live: Arc<dyn LiveUpdateSink>,
    settings: ConversationSettings,
}

impl ConversationDriver {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        live: Arc<dyn LiveUpdateSink>,
        settings: ConversationSettings,
    ) -> Self {
        Self { conversations, live, settings }
    }

    /// Settings every conversation runs with.
    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    /// Run a full conversation and return the finalized record.
    ///
    /// Generation and delivery problems never abort the conversation: they
    /// show up as sentinel text and a missing external id. A speaker that
    /// loses its channel mid-conversation (stopped or reloaded) and storage
    /// errors do abort it. An aborted conversation is still finalized with
    /// the turns completed so far before the error is returned.
    pub async fn run_conversation(
        &self,
        initiator: &dyn AgentRuntime,
        responder: &dyn AgentRuntime,
    ) -> DomainResult<Conversation> {
        let init_agent = initiator.agent();
        let resp_agent = responder.agent();

        let conversation = self
            .conversations
            .create_conversation(&NewConversation::between_agents(
                initiator.channel_id(),
                init_agent.id,
                resp_agent.id,
            ))
            .await?;

        tracing::info!(
            conversation_id = %conversation.id,
            initiator = %init_agent.name,
            responder = %resp_agent.name,
            turns = self.settings.turns,
            "conversation started"
        );
        self.live.notify(LiveEvent::ConversationStart {
            conversation_id: conversation.id,
            initiator: init_agent.name.clone(),
            responder: resp_agent.name.clone(),
        });

        let mut completed_turns = 0;
        if let Err(e) = self.exchange(conversation.id, initiator, responder, &mut completed_turns).await {
            self.finalize_aborted(conversation.id, completed_turns, &e).await;
            return Err(e);
        }

        self.conversations.end_conversation(conversation.id, self.settings.turns).await?;
        self.live.notify(LiveEvent::ConversationEnd {
            conversation_id: conversation.id,
            turns: self.settings.turns,
        });
        tracing::info!(conversation_id = %conversation.id, turns = self.settings.turns, "conversation complete");

        Ok(self.conversations.get_conversation(conversation.id).await?.unwrap_or(conversation))
    }

    async fn exchange(
        &self,
        conversation_id: ConversationId,
        initiator: &dyn AgentRuntime,
        responder: &dyn AgentRuntime,
        completed_turns: &mut u32,
    ) -> DomainResult<()> {
        self.conversations.increment_pair(initiator.agent().id, responder.agent().id).await?;

        let mut history: Vec<Message> = Vec::with_capacity(self.settings.turns as usize * 2);
        for turn in 0..self.settings.turns {
            let opener = (turn == 0).then_some(responder.agent().name.as_str());
            self.speak(conversation_id, initiator, &mut history, opener).await?;
            self.speak(conversation_id, responder, &mut history, None).await?;
            *completed_turns = turn + 1;
        }
        Ok(())
    }

    /// Best-effort finalization; a failure here is logged and never replaces
    /// the error that aborted the conversation.
    async fn finalize_aborted(&self, conversation_id: ConversationId, completed_turns: u32, cause: &DomainError) {
        tracing::warn!(
            conversation_id = %conversation_id,
            completed_turns,
            error = %cause,
            "conversation aborted"
        );
        match self.conversations.end_conversation(conversation_id, completed_turns).await {
            Ok(()) => self.live.notify(LiveEvent::ConversationEnd { conversation_id, turns: completed_turns }),
            Err(e) => tracing::error!(
                conversation_id = %conversation_id,
                error = %e,
                "could not finalize aborted conversation"
            ),
        }
    }

    async fn speak(
        &self,
        conversation_id: ConversationId,
        speaker: &dyn AgentRuntime,
        history: &mut Vec<Message>,
        opener_partner: Option<&str>,
    ) -> DomainResult<()> {
        let agent = speaker.agent();
        let prompt = build_conversation_messages(agent, &self.settings.channel_name, history, opener_partner);
        let text = speaker.generate_reply(prompt).await;

        // A stopped handle forgets its channel.
        if !speaker.has_resolved_channel() {
            return Err(DomainError::ChannelError(format!("{} stopped mid-conversation", agent.name)));
        }

        let external_id = speaker.deliver(&text).await;
        if external_id.is_none() {
            tracing::warn!(conversation_id = %conversation_id, agent_id = %agent.id, agent = %agent.name, "message was not delivered");
        }

        let message = self
            .conversations
            .create_message(&NewMessage::from_bot(
                conversation_id,
                agent.id,
                agent.name.clone(),
                text.clone(),
                external_id,
            ))
            .await?;
        tracing::debug!(conversation_id = %conversation_id, agent_id = %agent.id, message_id = %message.id, "message recorded");
        history.push(message);

        self.live.notify(LiveEvent::Message {
            conversation_id: Some(conversation_id),
            bot: agent.name.clone(),
            content: text,
            conversation_type: ConversationKind::AgentAgent,
        });

        if !self.settings.message_pace.is_zero() {
            tokio::time::sleep(self.settings.message_pace).await;
        }
        Ok(())
    }
}
