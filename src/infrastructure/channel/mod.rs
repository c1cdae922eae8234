//! Shared chat channel
//!
//! - `ChannelHub`: the in-process channel every agent connects to
//! - `ChannelAgent`: the `AgentRuntime` that lives on it

pub mod agent;
pub mod hub;

pub use agent::{ChannelAgent, ChannelAgentFactory, ReplySettings};
pub use hub::{ChannelHub, ChannelPost, PostAuthor, MAX_POST_CHARS};
