//! Conversation and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who took part in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationKind {
    /// Scheduled exchange between two agents.
    #[serde(rename = "agent-agent")]
    AgentAgent,
    /// A human posted and one agent replied.
    #[serde(rename = "agent-human")]
    AgentHuman,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentAgent => "agent-agent",
            Self::AgentHuman => "agent-human",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "agent-agent" => Some(Self::AgentAgent),
            "agent-human" => Some(Self::AgentHuman),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded conversation.
///
/// `turn_count` stays 0 and `ended_at` stays `None` until the conversation is
/// finalized; after that the record is never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub channel_id: Option<String>,
    pub kind: ConversationKind,
    pub initiator_id: Option<AgentId>,
    pub responder_id: Option<AgentId>,
    pub turn_count: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Parameters for opening a conversation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub channel_id: Option<String>,
    pub kind: ConversationKind,
    pub initiator_id: Option<AgentId>,
    pub responder_id: Option<AgentId>,
}

impl NewConversation {
    pub fn between_agents(channel_id: Option<String>, initiator: AgentId, responder: AgentId) -> Self {
        Self {
            channel_id,
            kind: ConversationKind::AgentAgent,
            initiator_id: Some(initiator),
            responder_id: Some(responder),
        }
    }

    pub fn with_human(channel_id: Option<String>, responder: AgentId) -> Self {
        Self {
            channel_id,
            kind: ConversationKind::AgentHuman,
            initiator_id: None,
            responder_id: Some(responder),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorKind {
    Human,
    Bot,
}

impl AuthorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Bot => "bot",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "human" => Some(Self::Human),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

impl fmt::Display for AuthorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted chat message. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: Option<ConversationId>,
    /// Producing agent; `None` for human-authored messages.
    pub agent_id: Option<AgentId>,
    pub author_kind: AuthorKind,
    pub author_name: String,
    pub content: String,
    /// Id assigned by the delivery transport, if delivery succeeded.
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: Option<ConversationId>,
    pub agent_id: Option<AgentId>,
    pub author_kind: AuthorKind,
    pub author_name: String,
    pub content: String,
    pub external_id: Option<String>,
}

impl NewMessage {
    pub fn from_bot(
        conversation_id: ConversationId,
        agent_id: AgentId,
        author_name: impl Into<String>,
        content: impl Into<String>,
        external_id: Option<String>,
    ) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            agent_id: Some(agent_id),
            author_kind: AuthorKind::Bot,
            author_name: author_name.into(),
            content: content.into(),
            external_id,
        }
    }

    pub fn from_human(
        conversation_id: ConversationId,
        author_name: impl Into<String>,
        content: impl Into<String>,
        external_id: Option<String>,
    ) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            agent_id: None,
            author_kind: AuthorKind::Human,
            author_name: author_name.into(),
            content: content.into(),
            external_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_strings() {
        for kind in [ConversationKind::AgentAgent, ConversationKind::AgentHuman] {
            assert_eq!(ConversationKind::parse_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversationKind::parse_str("bot-bot"), None);
    }

    #[test]
    fn test_kind_serializes_with_dash() {
        let json = serde_json::to_string(&ConversationKind::AgentHuman).unwrap();
        assert_eq!(json, "\"agent-human\"");
    }

    #[test]
    fn test_human_conversation_has_no_initiator() {
        let conv = NewConversation::with_human(Some("c1".into()), AgentId(4));
        assert_eq!(conv.kind, ConversationKind::AgentHuman);
        assert!(conv.initiator_id.is_none());
        assert_eq!(conv.responder_id, Some(AgentId(4)));
    }
}
