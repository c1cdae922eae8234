//! Message feed command.

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::commands::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::table_with_header;
use crate::domain::models::{Config, Message};
use crate::domain::ports::{ConversationRepository, MessageFilter};

#[derive(Args, Debug)]
pub struct MessagesArgs {
    /// Only messages produced by this agent (id or name)
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Maximum number of messages to display
    #[arg(short, long, default_value = "50")]
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct MessageListOutput {
    pub messages: Vec<Message>,
    pub total: usize,
}

impl CommandOutput for MessageListOutput {
    fn to_human(&self) -> String {
        if self.messages.is_empty() {
            return "No messages found.".to_string();
        }

        let mut table = table_with_header(&["ID", "Conv", "Author", "Kind", "Content", "Sent"]);
        for m in &self.messages {
            table.add_row(vec![
                Cell::new(m.id),
                Cell::new(m.conversation_id.map_or_else(|| "-".to_string(), |c| c.to_string())),
                Cell::new(&m.author_name),
                Cell::new(m.author_kind),
                Cell::new(truncate(&m.content, 60)),
                Cell::new(m.created_at.format("%Y-%m-%d %H:%M:%S")),
            ]);
        }
        table.to_string()
    }
}

pub async fn execute(args: MessagesArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    let agent_id = match &args.agent {
        Some(key) => Some(ctx.resolve_agent(key).await?.id),
        None => None,
    };
    let messages = ctx.conversations.list_messages(MessageFilter { agent_id, limit: args.limit }).await?;

    output(&MessageListOutput { total: messages.len(), messages }, json_mode);
    Ok(())
}
