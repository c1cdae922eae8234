//! Live-update events pushed to dashboard subscribers.

use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::conversation::{ConversationId, ConversationKind};

/// An event describing something observers may want to see as it happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    ConversationStart {
        conversation_id: ConversationId,
        initiator: String,
        responder: String,
    },
    Message {
        conversation_id: Option<ConversationId>,
        bot: String,
        content: String,
        conversation_type: ConversationKind,
    },
    ConversationEnd {
        conversation_id: ConversationId,
        turns: u32,
    },
    BotAdded {
        bot: Agent,
    },
    GradingComplete {
        run_id: String,
        graded: usize,
    },
}

impl LiveEvent {
    /// Wire name of the event, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConversationStart { .. } => "conversation_start",
            Self::Message { .. } => "message",
            Self::ConversationEnd { .. } => "conversation_end",
            Self::BotAdded { .. } => "bot_added",
            Self::GradingComplete { .. } => "grading_complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_matches_kind() {
        let event = LiveEvent::ConversationEnd { conversation_id: ConversationId(9), turns: 4 };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.kind());
        assert_eq!(value["conversation_id"], 9);
    }
}
