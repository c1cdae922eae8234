//! Channel-backed agent runtime.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, CompletionRequest, LlmConfig, PromptMessage};
use crate::domain::ports::{AgentRuntime, HandleFactory, TextGenerator, EMPTY_REPLY, GENERATION_FAILED_REPLY};
use crate::services::human_reply::{HumanPost, HumanReplyService};

use super::hub::{ChannelHub, ChannelPost, PostAuthor};

/// Generation parameters used for every reply an agent produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplySettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self { max_tokens: 256, temperature: 0.8 }
    }
}

impl From<&LlmConfig> for ReplySettings {
    fn from(config: &LlmConfig) -> Self {
        Self { max_tokens: config.max_tokens, temperature: config.temperature }
    }
}

/// One agent's live connection to the shared channel.
pub struct ChannelAgent {
    agent: Agent,
    hub: Arc<ChannelHub>,
    channel_name: String,
    generator: Arc<dyn TextGenerator>,
    settings: ReplySettings,
    human_replies: Option<Arc<HumanReplyService>>,
    channel: RwLock<Option<String>>,
    cancel: CancellationToken,
}

impl ChannelAgent {
    pub fn new(
        agent: Agent,
        hub: Arc<ChannelHub>,
        channel_name: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
        settings: ReplySettings,
    ) -> Self {
        Self {
            agent,
            hub,
            channel_name: channel_name.into(),
            generator,
            settings,
            human_replies: None,
            channel: RwLock::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Answer human posts through `service`.
    pub fn with_human_replies(mut self, service: Arc<HumanReplyService>) -> Self {
        self.human_replies = Some(service);
        self
    }

    fn resolve_channel(&self) -> bool {
        if self.hub.name() != self.channel_name {
            tracing::warn!(
                agent_id = %self.agent.id,
                wanted = %self.channel_name,
                available = %self.hub.name(),
                "shared channel not found"
            );
            return false;
        }
        if let Ok(mut channel) = self.channel.write() {
            *channel = Some(self.hub.channel_id().to_string());
        }
        true
    }

    async fn handle_post(&self, post: ChannelPost) {
        let PostAuthor::Human { name } = post.author else {
            return;
        };
        let Some(service) = &self.human_replies else {
            return;
        };

        let human_post = HumanPost { author: name, content: post.content, external_id: Some(post.id) };
        if let Err(e) = service.reply(self, &human_post).await {
            tracing::error!(agent_id = %self.agent.id, agent = %self.agent.name, error = %e, "failed to record human reply");
        }
    }
}

#[async_trait]
impl AgentRuntime for ChannelAgent {
    fn agent(&self) -> &Agent {
        &self.agent
    }

    fn channel_id(&self) -> Option<String> {
        self.channel.read().ok().and_then(|c| c.clone())
    }

    async fn generate_reply(&self, prompt: Vec<PromptMessage>) -> String {
        let request = CompletionRequest::new(prompt, self.settings.max_tokens, self.settings.temperature);
        match self.generator.complete(request).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(agent_id = %self.agent.id, agent = %self.agent.name, generator = self.generator.name(), error = %e, "reply generation failed");
                GENERATION_FAILED_REPLY.to_string()
            }
        }
    }

    async fn deliver(&self, text: &str) -> Option<String> {
        if !self.has_resolved_channel() {
            return None;
        }
        match self.hub.post_bot(self.agent.id, self.agent.name.clone(), text) {
            Ok(post) => Some(post.id),
            Err(e) => {
                tracing::warn!(agent_id = %self.agent.id, error = %e, "delivery to shared channel failed");
                None
            }
        }
    }

    async fn run(&self) -> DomainResult<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let mut posts = self.hub.subscribe();
        let hub_closed = self.hub.closed();
        let resolved = self.resolve_channel();
        tracing::info!(agent_id = %self.agent.id, agent = %self.agent.name, resolved, "agent connected");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = hub_closed.cancelled() => {
                    tracing::info!(agent_id = %self.agent.id, "shared channel closed");
                    break;
                }
                received = posts.recv() => match received {
                    Ok(post) if resolved => self.handle_post(post).await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(agent_id = %self.agent.id, skipped, "agent fell behind the channel");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        if let Ok(mut channel) = self.channel.write() {
            *channel = None;
        }
        tracing::info!(agent_id = %self.agent.id, agent = %self.agent.name, "agent disconnected");
        Ok(())
    }

    async fn shutdown(&self) -> DomainResult<()> {
        self.cancel.cancel();
        if let Ok(mut channel) = self.channel.write() {
            *channel = None;
        }
        Ok(())
    }
}

/// Builds [`ChannelAgent`] handles sharing one hub and generator.
pub struct ChannelAgentFactory {
    hub: Arc<ChannelHub>,
    channel_name: String,
    generator: Arc<dyn TextGenerator>,
    settings: ReplySettings,
    human_replies: Option<Arc<HumanReplyService>>,
}

impl ChannelAgentFactory {
    pub fn new(
        hub: Arc<ChannelHub>,
        channel_name: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
        settings: ReplySettings,
    ) -> Self {
        Self { hub, channel_name: channel_name.into(), generator, settings, human_replies: None }
    }

    pub fn with_human_replies(mut self, service: Arc<HumanReplyService>) -> Self {
        self.human_replies = Some(service);
        self
    }
}

impl HandleFactory for ChannelAgentFactory {
    fn build(&self, agent: &Agent) -> Arc<dyn AgentRuntime> {
        let mut runtime = ChannelAgent::new(
            agent.clone(),
            Arc::clone(&self.hub),
            self.channel_name.clone(),
            Arc::clone(&self.generator),
            self.settings,
        );
        if let Some(service) = &self.human_replies {
            runtime = runtime.with_human_replies(Arc::clone(service));
        }
        Arc::new(runtime)
    }
}
