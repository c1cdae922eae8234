//! Conversation CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::commands::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::cli::table::table_with_header;
use crate::domain::models::{Config, Conversation, ConversationId, Message};
use crate::domain::ports::ConversationRepository;

#[derive(Args, Debug)]
pub struct ConversationArgs {
    #[command(subcommand)]
    pub command: ConversationCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommands {
    /// List recent conversations
    List {
        /// Only conversations this agent (id or name) took part in
        #[arg(short, long)]
        agent: Option<String>,
        /// Maximum number of conversations to display
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Show a conversation transcript
    Show {
        /// Conversation id
        id: i64,
    },
}

#[derive(Debug, Serialize)]
pub struct ConversationListOutput {
    pub conversations: Vec<Conversation>,
    pub total: usize,
}

fn participant(id: Option<crate::domain::models::AgentId>) -> String {
    id.map_or_else(|| "human".to_string(), |id| id.to_string())
}

impl CommandOutput for ConversationListOutput {
    fn to_human(&self) -> String {
        if self.conversations.is_empty() {
            return "No conversations found.".to_string();
        }

        let mut table = table_with_header(&["ID", "Type", "Initiator", "Responder", "Turns", "Started", "Status"]);
        for c in &self.conversations {
            table.add_row(vec![
                Cell::new(c.id),
                Cell::new(c.kind),
                Cell::new(participant(c.initiator_id)),
                Cell::new(participant(c.responder_id)),
                Cell::new(c.turn_count),
                Cell::new(c.started_at.format("%Y-%m-%d %H:%M:%S")),
                Cell::new(if c.is_finished() { "ended" } else { "in progress" }),
            ]);
        }
        format!("Found {} conversation(s):\n{table}", self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptOutput {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

impl CommandOutput for TranscriptOutput {
    fn to_human(&self) -> String {
        let c = &self.conversation;
        let mut lines = vec![
            format!("Conversation #{} ({})", c.id, c.kind),
            format!("Started: {}", c.started_at.to_rfc3339()),
        ];
        match c.ended_at {
            Some(ended) => lines.push(format!("Ended: {} after {} turn(s)", ended.to_rfc3339(), c.turn_count)),
            None => lines.push("Still in progress".to_string()),
        }
        lines.push(String::new());
        for m in &self.messages {
            let marker = if m.external_id.is_some() { "" } else { " (undelivered)" };
            lines.push(format!("[{}] {}{marker}: {}", m.created_at.format("%H:%M:%S"), m.author_name, m.content));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ConversationArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        ConversationCommands::List { agent, limit } => {
            let conversations = match agent {
                Some(key) => {
                    let agent = ctx.resolve_agent(&key).await?;
                    ctx.conversations.list_agent_conversations(agent.id, limit).await?
                }
                None => ctx.conversations.list_conversations(limit).await?,
            };
            let out = ConversationListOutput { total: conversations.len(), conversations };
            output(&out, json_mode);
        }

        ConversationCommands::Show { id } => {
            let id = ConversationId(id);
            let conversation = ctx
                .conversations
                .get_conversation(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Conversation not found: {id}"))?;
            let messages = ctx.conversations.get_conversation_messages(id).await?;
            output(&TranscriptOutput { conversation, messages }, json_mode);
        }
    }

    Ok(())
}
