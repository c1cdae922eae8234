//! Autonomous conversation scheduler.
//!
//! Sleeps a random interval, picks a pair among the running agents, and
//! drives one conversation between them, over and over until stopped.
//! Stopping interrupts a sleep immediately but always lets an in-flight
//! conversation finish. A stop requested before the loop starts is kept
//! and makes that start return at once.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, ConversationId, SchedulerConfig};
use crate::domain::ports::ConversationRepository;
use crate::services::conversation::ConversationDriver;
use crate::services::fleet::FleetRegistry;
use crate::services::pairing::PairSelector;

/// Timing of the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Shortest pause between iterations.
    pub min_interval: Duration,
    /// Longest pause between iterations.
    pub max_interval: Duration,
    /// Wait before the first iteration so handles can resolve their channel.
    pub startup_delay: Duration,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            min_interval: config.min_interval(),
            max_interval: config.max_interval(),
            startup_delay: config.startup_delay(),
        }
    }
}

/// Lifecycle of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// No loop is running.
    Stopped,
    /// The loop is sleeping or driving a conversation.
    Running,
    /// A stop was requested; the loop exits after the current conversation.
    Stopping,
}

/// Why an iteration did not produce a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer than two agents are running.
    NotEnoughAgents,
    /// A selected agent stopped between selection and lookup.
    HandleGone,
    /// A selected agent has not located the shared channel yet.
    ChannelUnresolved,
}

/// Result of one [`ConversationScheduler::run_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// A conversation ran to the end.
    Completed(ConversationId),
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// Selection or the conversation failed; the error was logged.
    Failed,
}

/// Counters since the scheduler was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Iterations attempted.
    pub iterations: u64,
    /// Conversations that ran to the end.
    pub conversations_completed: u64,
    /// Iterations that ended in an error.
    pub conversations_failed: u64,
    /// Iterations with nothing to do.
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    iterations: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Background loop that keeps agents talking to each other.
pub struct ConversationScheduler {
    fleet: Arc<FleetRegistry>,
    selector: PairSelector,
    driver: ConversationDriver,
    settings: SchedulerSettings,
    rng: Mutex<StdRng>,
    state: StdMutex<SchedulerState>,
    stop_token: StdMutex<CancellationToken>,
    counters: Counters,
}

impl ConversationScheduler {
    /// `conversations` supplies the pair tallies used for selection.
    pub fn new(
        fleet: Arc<FleetRegistry>,
        conversations: Arc<dyn ConversationRepository>,
        driver: ConversationDriver,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            fleet,
            selector: PairSelector::new(conversations),
            driver,
            settings,
            rng: Mutex::new(StdRng::from_os_rng()),
            state: StdMutex::new(SchedulerState::Stopped),
            stop_token: StdMutex::new(CancellationToken::new()),
            counters: Counters::default(),
        }
    }

    /// Use a deterministic random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the iteration counters.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            iterations: self.counters.iterations.load(Ordering::Relaxed),
            conversations_completed: self.counters.completed.load(Ordering::Relaxed),
            conversations_failed: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Loop until [`ConversationScheduler::stop`]. Returns at once if the
    /// scheduler is already running, or if a stop is already pending.
    pub async fn run(&self) {
        let token = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != SchedulerState::Stopped {
                tracing::warn!(state = ?*state, "scheduler already running");
                return;
            }
            let mut stop_token = self.stop_token.lock().unwrap_or_else(|e| e.into_inner());
            if stop_token.is_cancelled() {
                *stop_token = CancellationToken::new();
                tracing::info!("stop requested before start, scheduler not started");
                return;
            }
            *state = SchedulerState::Running;
            stop_token.clone()
        };

        tracing::info!(
            min_interval_secs = self.settings.min_interval.as_secs_f64(),
            max_interval_secs = self.settings.max_interval.as_secs_f64(),
            "conversation scheduler started"
        );

        if self.sleep_or_stop(self.settings.startup_delay, &token).await {
            loop {
                let delay = self.next_delay().await;
                if !self.sleep_or_stop(delay, &token).await {
                    break;
                }
                self.run_once().await;
            }
        }

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            *self.stop_token.lock().unwrap_or_else(|e| e.into_inner()) = CancellationToken::new();
            *state = SchedulerState::Stopped;
        }
        tracing::info!(stats = ?self.stats(), "conversation scheduler stopped");
    }

    /// Ask the loop to exit. Safe to call any number of times, from any task,
    /// including before the loop has started.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            SchedulerState::Running => {
                *state = SchedulerState::Stopping;
                self.stop_token.lock().unwrap_or_else(|e| e.into_inner()).cancel();
                tracing::info!("conversation scheduler stopping");
            }
            SchedulerState::Stopped => {
                self.stop_token.lock().unwrap_or_else(|e| e.into_inner()).cancel();
                tracing::debug!("stop requested before start");
            }
            SchedulerState::Stopping => {}
        }
    }

    /// Sleep for `delay`. Returns `false` if a stop was requested.
    async fn sleep_or_stop(&self, delay: Duration, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return !token.is_cancelled();
        }
        tokio::select! {
            () = token.cancelled() => false,
            () = tokio::time::sleep(delay) => !token.is_cancelled(),
        }
    }

    async fn next_delay(&self) -> Duration {
        let min = self.settings.min_interval.as_millis() as u64;
        let max = (self.settings.max_interval.as_millis() as u64).max(min);
        Duration::from_millis(self.rng.lock().await.random_range(min..=max))
    }

    /// One scheduling iteration: select, look up, drive.
    pub async fn run_once(&self) -> IterationOutcome {
        self.counters.iterations.fetch_add(1, Ordering::Relaxed);
        let outcome = match self.select_and_drive().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "scheduler iteration failed");
                IterationOutcome::Failed
            }
        };
        match &outcome {
            IterationOutcome::Completed(_) => self.counters.completed.fetch_add(1, Ordering::Relaxed),
            IterationOutcome::Failed => self.counters.failed.fetch_add(1, Ordering::Relaxed),
            IterationOutcome::Skipped(reason) => {
                tracing::debug!(reason = ?reason, "scheduler iteration skipped");
                self.counters.skipped.fetch_add(1, Ordering::Relaxed)
            }
        };
        outcome
    }

    async fn select_and_drive(&self) -> DomainResult<IterationOutcome> {
        let mut agents: Vec<Agent> = self
            .fleet
            .active_handles()
            .await
            .values()
            .map(|handle| handle.agent().clone())
            .collect();
        agents.sort_by_key(|a| a.id);

        let pair = {
            let mut rng = self.rng.lock().await;
            self.selector.select(&agents, &mut *rng).await?
        };
        let Some((initiator, responder)) = pair else {
            return Ok(IterationOutcome::Skipped(SkipReason::NotEnoughAgents));
        };

        let (Some(init_handle), Some(resp_handle)) = (
            self.fleet.get_handle(initiator.id).await,
            self.fleet.get_handle(responder.id).await,
        ) else {
            return Ok(IterationOutcome::Skipped(SkipReason::HandleGone));
        };
        if !init_handle.has_resolved_channel() || !resp_handle.has_resolved_channel() {
            return Ok(IterationOutcome::Skipped(SkipReason::ChannelUnresolved));
        }

        match self.driver.run_conversation(init_handle.as_ref(), resp_handle.as_ref()).await {
            Ok(conversation) => Ok(IterationOutcome::Completed(conversation.id)),
            Err(e) => {
                tracing::error!(
                    initiator = %initiator.name,
                    responder = %responder.name,
                    error = %e,
                    "conversation failed"
                );
                Ok(IterationOutcome::Failed)
            }
        }
    }
}
