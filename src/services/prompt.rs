//! Prompt construction from an agent's persona and chat history.

use crate::domain::models::{Agent, Message, PromptMessage};

/// System prompt describing who the agent is and how to behave.
pub fn build_system_prompt(agent: &Agent, channel_name: &str) -> String {
    let mut parts = vec![format!("You are {}, a bot in the #{channel_name} channel.", agent.name)];
    if !agent.personality.is_empty() {
        parts.push(format!("Your personality: {}", agent.personality));
    }
    if !agent.objective.is_empty() {
        parts.push(format!("Your marketing objective: {}", agent.objective));
    }
    if !agent.behavior_rules.is_empty() {
        parts.push(format!("Behavior rules: {}", agent.behavior_rules));
    }
    parts.push("Keep responses concise (1-3 sentences). Stay in character at all times.".to_string());
    parts.push("You are chatting with other bots and humans in a shared marketplace channel.".to_string());
    parts.join("\n")
}

fn push_history(messages: &mut Vec<PromptMessage>, agent: &Agent, history: &[Message]) {
    for msg in history {
        if msg.agent_id == Some(agent.id) {
            messages.push(PromptMessage::assistant(msg.content.clone()));
        } else {
            messages.push(PromptMessage::user(format!("{}: {}", msg.author_name, msg.content)));
        }
    }
}

/// Prompt for one turn of an agent-to-agent conversation.
///
/// `opener_partner` is set only for the very first message; it adds an
/// instruction to open the conversation with the named partner.
pub fn build_conversation_messages(
    agent: &Agent,
    channel_name: &str,
    history: &[Message],
    opener_partner: Option<&str>,
) -> Vec<PromptMessage> {
    let mut messages = vec![PromptMessage::system(build_system_prompt(agent, channel_name))];

    if let Some(partner) = opener_partner {
        messages.push(PromptMessage::system(format!(
            "Start a conversation with {partner}. Introduce yourself or bring up a topic related to your marketing objective."
        )));
    }

    push_history(&mut messages, agent, history);
    messages
}

/// Prompt for replying to a human post, given the agent's recent messages
/// oldest first.
pub fn build_reply_messages(
    agent: &Agent,
    channel_name: &str,
    human_name: &str,
    human_message: &str,
    recent_history: &[Message],
) -> Vec<PromptMessage> {
    let mut messages = vec![PromptMessage::system(build_system_prompt(agent, channel_name))];
    push_history(&mut messages, agent, recent_history);
    messages.push(PromptMessage::user(format!("{human_name}: {human_message}")));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentId, AuthorKind, ConversationId, MessageId, PromptRole};
    use chrono::Utc;

    fn agent(id: i64, name: &str) -> Agent {
        Agent {
            id: AgentId(id),
            owner_name: "Dana".to_string(),
            name: name.to_string(),
            credential: String::new(),
            personality: "cheerful".to_string(),
            objective: String::new(),
            behavior_rules: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn message(agent_id: i64, author: &str, content: &str) -> Message {
        Message {
            id: MessageId(1),
            conversation_id: Some(ConversationId(1)),
            agent_id: Some(AgentId(agent_id)),
            author_kind: AuthorKind::Bot,
            author_name: author.to_string(),
            content: content.to_string(),
            external_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_system_prompt_skips_empty_persona_fields() {
        let prompt = build_system_prompt(&agent(1, "LatteBot"), "the-marketplace");
        assert!(prompt.starts_with("You are LatteBot, a bot in the #the-marketplace channel."));
        assert!(prompt.contains("Your personality: cheerful"));
        assert!(!prompt.contains("objective"));
    }

    #[test]
    fn test_opener_only_when_requested() {
        let me = agent(1, "Alpha");
        let with_opener = build_conversation_messages(&me, "c", &[], Some("Beta"));
        assert_eq!(with_opener.len(), 2);
        assert!(with_opener[1].content.contains("Start a conversation with Beta"));

        let without = build_conversation_messages(&me, "c", &[], None);
        assert_eq!(without.len(), 1);
    }

    #[test]
    fn test_history_roles() {
        let me = agent(1, "Alpha");
        let history = vec![message(1, "Alpha", "hi"), message(2, "Beta", "hello")];
        let prompt = build_conversation_messages(&me, "c", &history, None);

        assert_eq!(prompt[1].role, PromptRole::Assistant);
        assert_eq!(prompt[1].content, "hi");
        assert_eq!(prompt[2].role, PromptRole::User);
        assert_eq!(prompt[2].content, "Beta: hello");
    }

    #[test]
    fn test_reply_ends_with_human_line() {
        let me = agent(1, "Alpha");
        let prompt = build_reply_messages(&me, "c", "visitor", "what do you sell?", &[message(1, "Alpha", "earlier")]);
        let last = prompt.last().unwrap();
        assert_eq!(last.role, PromptRole::User);
        assert_eq!(last.content, "visitor: what do you sell?");
        assert_eq!(prompt.len(), 3);
    }
}
