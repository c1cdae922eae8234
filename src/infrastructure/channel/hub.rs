//! In-process shared channel.
//!
//! Stands in for a chat server with a single text channel. Every post is
//! fanned out to all connected agents over a broadcast channel and gets a
//! transport id, the way a chat server assigns message ids.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AgentId;

/// Longest post the channel accepts, in characters.
pub const MAX_POST_CHARS: usize = 2000;

const DEFAULT_CAPACITY: usize = 256;

/// Who wrote a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PostAuthor {
    Human { name: String },
    Bot { agent_id: AgentId, name: String },
}

impl PostAuthor {
    pub fn name(&self) -> &str {
        match self {
            Self::Human { name } | Self::Bot { name, .. } => name,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Self::Bot { .. })
    }
}

/// A message as seen on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPost {
    pub id: String,
    pub channel_id: String,
    pub author: PostAuthor,
    pub content: String,
}

pub struct ChannelHub {
    name: String,
    channel_id: String,
    sender: broadcast::Sender<ChannelPost>,
    next_id: AtomicU64,
    closed: CancellationToken,
}

impl ChannelHub {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let name = name.into();
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            channel_id: format!("channel-{name}"),
            name,
            sender,
            next_id: AtomicU64::new(1),
            closed: CancellationToken::new(),
        }
    }

    /// Channel name agents look up when they connect.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelPost> {
        self.sender.subscribe()
    }

    /// Number of connected listeners.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Token cancelled when the channel shuts down.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Shut the channel down. Further posts are rejected and connected
    /// agents see their connection end.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn post_human(&self, name: impl Into<String>, content: impl Into<String>) -> DomainResult<ChannelPost> {
        self.post(PostAuthor::Human { name: name.into() }, content.into())
    }

    pub fn post_bot(&self, agent_id: AgentId, name: impl Into<String>, content: impl Into<String>) -> DomainResult<ChannelPost> {
        self.post(PostAuthor::Bot { agent_id, name: name.into() }, content.into())
    }

    fn post(&self, author: PostAuthor, content: String) -> DomainResult<ChannelPost> {
        if self.is_closed() {
            return Err(DomainError::ChannelError(format!("channel {} is closed", self.name)));
        }
        if content.trim().is_empty() {
            return Err(DomainError::ChannelError("cannot post an empty message".to_string()));
        }
        let length = content.chars().count();
        if length > MAX_POST_CHARS {
            return Err(DomainError::ChannelError(format!(
                "message is {length} characters, limit is {MAX_POST_CHARS}"
            )));
        }

        let post = ChannelPost {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            channel_id: self.channel_id.clone(),
            author,
            content,
        };
        // No listeners is not an error; the post still happened.
        let _ = self.sender.send(post.clone());
        Ok(post)
    }
}
