//! Agent runtime port - the live session of one agent.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, PromptMessage};

/// Reply text recorded when the text generator fails.
pub const GENERATION_FAILED_REPLY: &str = "(error generating response)";

/// Reply text recorded when the text generator returns nothing.
pub const EMPTY_REPLY: &str = "(no response)";

/// Live connection for one agent.
///
/// Owns the capability to generate a reply in the agent's voice and to deliver
/// text into the shared channel. `generate_reply` and `deliver` never fail:
/// generation problems come back as [`GENERATION_FAILED_REPLY`] and delivery
/// problems as `None`.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// The agent record this handle was built from.
    fn agent(&self) -> &Agent;

    /// Identifier of the shared channel once located.
    fn channel_id(&self) -> Option<String>;

    /// Whether the handle has located the shared channel yet.
    fn has_resolved_channel(&self) -> bool {
        self.channel_id().is_some()
    }

    /// Generate a reply for an ordered prompt.
    async fn generate_reply(&self, prompt: Vec<PromptMessage>) -> String;

    /// Deliver text into the shared channel, returning the transport's id.
    async fn deliver(&self, text: &str) -> Option<String>;

    /// Connection and event-processing lifecycle. Returns when the connection
    /// ends, either after [`AgentRuntime::shutdown`] or on its own.
    async fn run(&self) -> DomainResult<()>;

    /// Request a graceful end of [`AgentRuntime::run`].
    async fn shutdown(&self) -> DomainResult<()>;
}

/// Builds runtime handles for agent records.
pub trait HandleFactory: Send + Sync {
    fn build(&self, agent: &Agent) -> Arc<dyn AgentRuntime>;
}
