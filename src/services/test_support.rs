//! In-memory runtimes and fixtures for service tests.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, AgentId, AgentStats, Conversation, ConversationId, Message, NewAgent, NewConversation, NewMessage,
    PairCounts, PairTally, PromptMessage,
};
use crate::domain::ports::{AgentRepository, AgentRuntime, ConversationRepository, HandleFactory, MessageFilter};

pub fn agent(id: i64, name: &str) -> Agent {
    Agent {
        id: AgentId(id),
        owner_name: format!("owner of {name}"),
        name: name.to_string(),
        credential: String::new(),
        personality: String::new(),
        objective: String::new(),
        behavior_rules: String::new(),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub async fn create_agent(repo: &dyn AgentRepository, name: &str) -> Agent {
    repo.create(&NewAgent::new("owner", name, "token")).await.unwrap()
}

/// How a [`FakeRuntime`]'s `run` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBehavior {
    /// Run until shut down.
    UntilShutdown,
    /// Ignore shutdown requests entirely.
    IgnoreShutdown,
    /// Return immediately.
    ExitImmediately,
    /// Return an error immediately.
    Fail,
    /// Panic immediately.
    Panic,
}

/// Scripted runtime: replies come from a queue, delivery ids count up.
/// Shutting down forgets the channel, like a closed connection.
pub struct FakeRuntime {
    agent: Agent,
    channel: Mutex<Option<String>>,
    behavior: RunBehavior,
    replies: Mutex<VecDeque<String>>,
    deliver_ok: bool,
    delivered: Mutex<Vec<String>>,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
    cancel: CancellationToken,
    shutdowns: AtomicUsize,
}

impl FakeRuntime {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            channel: Mutex::new(Some("chan-1".to_string())),
            behavior: RunBehavior::UntilShutdown,
            replies: Mutex::new(VecDeque::new()),
            deliver_ok: true,
            delivered: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn with_behavior(mut self, behavior: RunBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn without_channel(self) -> Self {
        *self.channel.lock().unwrap() = None;
        self
    }

    pub fn failing_delivery(mut self) -> Self {
        self.deliver_ok = false;
        self
    }

    pub fn with_replies<I: IntoIterator<Item = S>, S: Into<String>>(self, replies: I) -> Self {
        self.replies.lock().unwrap().extend(replies.into_iter().map(Into::into));
        self
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentRuntime for FakeRuntime {
    fn agent(&self) -> &Agent {
        &self.agent
    }

    fn channel_id(&self) -> Option<String> {
        self.channel.lock().unwrap().clone()
    }

    async fn generate_reply(&self, prompt: Vec<PromptMessage>) -> String {
        self.prompts.lock().unwrap().push(prompt);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("{} says hi", self.agent.name))
    }

    async fn deliver(&self, text: &str) -> Option<String> {
        if !self.deliver_ok {
            return None;
        }
        let mut delivered = self.delivered.lock().unwrap();
        delivered.push(text.to_string());
        Some(format!("{}-{}", self.agent.id, delivered.len()))
    }

    async fn run(&self) -> DomainResult<()> {
        match self.behavior {
            RunBehavior::UntilShutdown => {
                self.cancel.cancelled().await;
                Ok(())
            }
            RunBehavior::IgnoreShutdown => {
                std::future::pending::<()>().await;
                Ok(())
            }
            RunBehavior::ExitImmediately => Ok(()),
            RunBehavior::Fail => Err(DomainError::ChannelError("connection refused".to_string())),
            RunBehavior::Panic => panic!("runtime blew up"),
        }
    }

    async fn shutdown(&self) -> DomainResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        *self.channel.lock().unwrap() = None;
        self.cancel.cancel();
        Ok(())
    }
}

/// Factory building [`FakeRuntime`]s, remembering every handle it built.
pub struct FakeFactory {
    behavior: RunBehavior,
    resolves_channel: bool,
    built: Mutex<Vec<Arc<FakeRuntime>>>,
}

impl FakeFactory {
    pub fn new(behavior: RunBehavior) -> Self {
        Self { behavior, resolves_channel: true, built: Mutex::new(Vec::new()) }
    }

    /// Build handles that never locate the shared channel.
    pub fn without_channel(mut self) -> Self {
        self.resolves_channel = false;
        self
    }

    pub fn built(&self) -> Vec<Arc<FakeRuntime>> {
        self.built.lock().unwrap().clone()
    }

    pub fn build_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }
}

impl HandleFactory for FakeFactory {
    fn build(&self, agent: &Agent) -> Arc<dyn AgentRuntime> {
        let mut runtime = FakeRuntime::new(agent.clone()).with_behavior(self.behavior);
        if !self.resolves_channel {
            runtime = runtime.without_channel();
        }
        let runtime = Arc::new(runtime);
        self.built.lock().unwrap().push(Arc::clone(&runtime));
        runtime
    }
}

/// Conversation storage wrapper that can fail message writes after a quota
/// and run a one-shot hook before pair tallies are read.
pub struct InterceptedConversations {
    inner: Arc<dyn ConversationRepository>,
    message_quota: Option<usize>,
    messages_written: AtomicUsize,
    pair_count_reads: AtomicUsize,
    before_pair_counts: Mutex<Option<BoxFuture<'static, ()>>>,
}

impl InterceptedConversations {
    pub fn new(inner: Arc<dyn ConversationRepository>) -> Self {
        Self {
            inner,
            message_quota: None,
            messages_written: AtomicUsize::new(0),
            pair_count_reads: AtomicUsize::new(0),
            before_pair_counts: Mutex::new(None),
        }
    }

    /// Accept `quota` message writes, then fail every later one.
    pub fn failing_messages_after(mut self, quota: usize) -> Self {
        self.message_quota = Some(quota);
        self
    }

    /// Run `hook` once, before the next pair tally read.
    pub fn before_pair_counts(self, hook: BoxFuture<'static, ()>) -> Self {
        *self.before_pair_counts.lock().unwrap() = Some(hook);
        self
    }

    pub fn pair_count_reads(&self) -> usize {
        self.pair_count_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationRepository for InterceptedConversations {
    async fn create_conversation(&self, conversation: &NewConversation) -> DomainResult<Conversation> {
        self.inner.create_conversation(conversation).await
    }

    async fn end_conversation(&self, id: ConversationId, turn_count: u32) -> DomainResult<()> {
        self.inner.end_conversation(id, turn_count).await
    }

    async fn get_conversation(&self, id: ConversationId) -> DomainResult<Option<Conversation>> {
        self.inner.get_conversation(id).await
    }

    async fn list_conversations(&self, limit: u32) -> DomainResult<Vec<Conversation>> {
        self.inner.list_conversations(limit).await
    }

    async fn list_agent_conversations(&self, agent_id: AgentId, limit: u32) -> DomainResult<Vec<Conversation>> {
        self.inner.list_agent_conversations(agent_id, limit).await
    }

    async fn create_message(&self, message: &NewMessage) -> DomainResult<Message> {
        let written = self.messages_written.fetch_add(1, Ordering::SeqCst);
        if self.message_quota.is_some_and(|quota| written >= quota) {
            return Err(DomainError::DatabaseError("disk full".to_string()));
        }
        self.inner.create_message(message).await
    }

    async fn get_conversation_messages(&self, id: ConversationId) -> DomainResult<Vec<Message>> {
        self.inner.get_conversation_messages(id).await
    }

    async fn list_messages(&self, filter: MessageFilter) -> DomainResult<Vec<Message>> {
        self.inner.list_messages(filter).await
    }

    async fn agent_stats(&self, agent_id: AgentId) -> DomainResult<AgentStats> {
        self.inner.agent_stats(agent_id).await
    }

    async fn get_pair_counts(&self) -> DomainResult<PairCounts> {
        self.pair_count_reads.fetch_add(1, Ordering::SeqCst);
        let hook = self.before_pair_counts.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        self.inner.get_pair_counts().await
    }

    async fn list_pair_tallies(&self) -> DomainResult<Vec<PairTally>> {
        self.inner.list_pair_tallies().await
    }

    async fn increment_pair(&self, a: AgentId, b: AgentId) -> DomainResult<()> {
        self.inner.increment_pair(a, b).await
    }
}
