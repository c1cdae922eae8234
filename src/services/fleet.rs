//! Fleet registry: the set of running agent handles.
//!
//! At most one handle runs per agent id. Each handle's `run` future lives in
//! its own task, and that task removes its registry entry when it ends for
//! any reason. Entries carry a generation number so a task that outlives a
//! restart never removes the newer handle.

use futures::future::join_all;
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentId, LiveEvent};
use crate::domain::ports::{AgentRepository, AgentRuntime, HandleFactory, LiveUpdateSink, NullSink};

struct FleetEntry {
    handle: Arc<dyn AgentRuntime>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

type FleetTable = Arc<RwLock<HashMap<AgentId, FleetEntry>>>;

fn remove_if_current(entries: &mut HashMap<AgentId, FleetEntry>, id: AgentId, generation: u64) -> bool {
    if entries.get(&id).is_some_and(|e| e.generation == generation) {
        entries.remove(&id);
        return true;
    }
    false
}

/// Removes the entry when the supervising task finishes, panics or is dropped.
struct Deregister {
    table: FleetTable,
    id: AgentId,
    generation: u64,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        let (id, generation) = (self.id, self.generation);
        if let Ok(mut entries) = self.table.try_write() {
            if remove_if_current(&mut entries, id, generation) {
                tracing::debug!(agent_id = %id, generation, "handle deregistered");
            }
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let table = Arc::clone(&self.table);
            runtime.spawn(async move {
                let mut entries = table.write().await;
                if remove_if_current(&mut entries, id, generation) {
                    tracing::debug!(agent_id = %id, generation, "handle deregistered");
                }
            });
        }
    }
}

async fn supervise(handle: Arc<dyn AgentRuntime>, guard: Deregister) {
    let id = guard.id;
    let name = handle.agent().name.clone();
    match AssertUnwindSafe(handle.run()).catch_unwind().await {
        Ok(Ok(())) => tracing::info!(agent_id = %id, agent = %name, "agent handle finished"),
        Ok(Err(e)) => tracing::error!(agent_id = %id, agent = %name, error = %e, "agent handle failed"),
        Err(_) => tracing::error!(agent_id = %id, agent = %name, "agent handle panicked"),
    }
    drop(guard);
}

/// Outcome of [`FleetRegistry::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Newly active agents that got a handle.
    pub started: Vec<AgentId>,
    /// Removed or deactivated agents whose handle was stopped.
    pub stopped: Vec<AgentId>,
    /// Agents restarted because their record changed.
    pub reloaded: Vec<AgentId>,
}

impl ReconcileReport {
    /// Nothing was started, stopped or reloaded.
    pub fn is_noop(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.reloaded.is_empty()
    }
}

/// Registry of running agent handles, keyed by agent id.
pub struct FleetRegistry {
    agents: Arc<dyn AgentRepository>,
    factory: Arc<dyn HandleFactory>,
    live: Arc<dyn LiveUpdateSink>,
    entries: FleetTable,
    next_generation: AtomicU64,
    shutdown_grace: Duration,
}

impl FleetRegistry {
    /// Handles come from `factory`; a stopped handle gets `shutdown_grace`
    /// to end its run before its task is aborted.
    pub fn new(agents: Arc<dyn AgentRepository>, factory: Arc<dyn HandleFactory>, shutdown_grace: Duration) -> Self {
        Self {
            agents,
            factory,
            live: Arc::new(NullSink),
            entries: Arc::new(RwLock::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            shutdown_grace,
        }
    }

    /// Announce agents that join during [`FleetRegistry::reconcile`].
    pub fn with_live_updates(mut self, live: Arc<dyn LiveUpdateSink>) -> Self {
        self.live = live;
        self
    }

    /// Start a handle for `agent`. Returns `false` if one is already running.
    pub async fn start_agent(&self, agent: &Agent) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&agent.id) {
            tracing::warn!(agent_id = %agent.id, agent = %agent.name, "agent already running");
            return false;
        }

        let handle = self.factory.build(agent);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = Deregister { table: Arc::clone(&self.entries), id: agent.id, generation };
        // The task cannot deregister before we release the write lock.
        let task = tokio::spawn(supervise(Arc::clone(&handle), guard));
        entries.insert(agent.id, FleetEntry { handle, task: Some(task), generation });

        tracing::info!(agent_id = %agent.id, agent = %agent.name, generation, "agent started");
        true
    }

    /// Stop the handle for `id`. Returns `false` if none was running.
    pub async fn stop_agent(&self, id: AgentId) -> bool {
        let entry = self.entries.write().await.remove(&id);
        let Some(entry) = entry else {
            tracing::debug!(agent_id = %id, "stop requested for agent that is not running");
            return false;
        };

        if let Err(e) = entry.handle.shutdown().await {
            tracing::warn!(agent_id = %id, error = %e, "agent shutdown request failed");
        }

        if let Some(mut task) = entry.task {
            if tokio::time::timeout(self.shutdown_grace, &mut task).await.is_err() {
                tracing::warn!(agent_id = %id, grace_ms = self.shutdown_grace.as_millis(), "agent did not stop in time, aborting");
                task.abort();
            }
        }

        tracing::info!(agent_id = %id, "agent stopped");
        true
    }

    /// Start every active agent in storage. Returns how many were started.
    pub async fn start_all(&self) -> DomainResult<usize> {
        let agents = self.agents.get_active().await?;
        let mut started = 0;
        for agent in &agents {
            if self.start_agent(agent).await {
                started += 1;
            }
        }
        tracing::info!(started, active = agents.len(), "fleet started");
        Ok(started)
    }

    /// Stop every running handle.
    pub async fn stop_all(&self) {
        let ids: Vec<AgentId> = self.entries.read().await.keys().copied().collect();
        let count = ids.len();
        join_all(ids.into_iter().map(|id| self.stop_agent(id))).await;
        tracing::info!(stopped = count, "fleet stopped");
    }

    /// Stop the agent, re-read its record, and start it again if it is still
    /// present and active. Returns whether a new handle was started.
    pub async fn reload_agent(&self, id: AgentId) -> DomainResult<bool> {
        self.stop_agent(id).await;
        match self.agents.get(id).await? {
            Some(agent) if agent.is_active => Ok(self.start_agent(&agent).await),
            Some(_) => {
                tracing::info!(agent_id = %id, "agent inactive, not restarting");
                Ok(false)
            }
            None => {
                tracing::info!(agent_id = %id, "agent removed, not restarting");
                Ok(false)
            }
        }
    }

    /// Bring running handles in line with storage: stop handles for agents
    /// that were removed or deactivated, reload handles whose record changed,
    /// and start newly active agents.
    pub async fn reconcile(&self) -> DomainResult<ReconcileReport> {
        let active = self.agents.get_active().await?;
        let running = self.active_handles().await;
        let active_ids: HashSet<AgentId> = active.iter().map(|a| a.id).collect();
        let mut report = ReconcileReport::default();

        for id in running.keys().filter(|id| !active_ids.contains(id)) {
            if self.stop_agent(*id).await {
                report.stopped.push(*id);
            }
        }

        for agent in &active {
            match running.get(&agent.id) {
                Some(handle) if handle.agent() == agent => {}
                Some(_) => {
                    self.stop_agent(agent.id).await;
                    if self.start_agent(agent).await {
                        report.reloaded.push(agent.id);
                    }
                }
                None => {
                    if self.start_agent(agent).await {
                        report.started.push(agent.id);
                        self.live.notify(LiveEvent::BotAdded { bot: agent.clone() });
                    }
                }
            }
        }

        if !report.is_noop() {
            tracing::info!(
                started = report.started.len(),
                stopped = report.stopped.len(),
                reloaded = report.reloaded.len(),
                "fleet reconciled"
            );
        }
        Ok(report)
    }

    /// The running handle for `id`, if any.
    pub async fn get_handle(&self, id: AgentId) -> Option<Arc<dyn AgentRuntime>> {
        self.entries.read().await.get(&id).map(|e| Arc::clone(&e.handle))
    }

    /// Owned snapshot of the running handles.
    pub async fn active_handles(&self) -> HashMap<AgentId, Arc<dyn AgentRuntime>> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, e)| (*id, Arc::clone(&e.handle)))
            .collect()
    }

    /// Whether a handle is registered for `id`.
    pub async fn is_running(&self, id: AgentId) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    /// Number of running handles.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no handle is running.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAgentRepository};
    use crate::domain::models::AgentUpdate;
    use crate::services::test_support::{create_agent, FakeFactory, RunBehavior};

    async fn setup(behavior: RunBehavior) -> (FleetRegistry, Arc<SqliteAgentRepository>, Arc<FakeFactory>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = Arc::new(SqliteAgentRepository::new(pool));
        let factory = Arc::new(FakeFactory::new(behavior));
        let registry = FleetRegistry::new(repo.clone(), factory.clone(), Duration::from_millis(200));
        (registry, repo, factory)
    }

    async fn wait_until_not_running(registry: &FleetRegistry, id: AgentId) {
        for _ in 0..200 {
            if !registry.is_running(id).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("agent {id} still registered");
    }

    #[tokio::test]
    async fn test_second_start_is_noop() {
        let (registry, repo, factory) = setup(RunBehavior::UntilShutdown).await;
        let agent = create_agent(repo.as_ref(), "Alpha").await;

        assert!(registry.start_agent(&agent).await);
        assert!(!registry.start_agent(&agent).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(factory.build_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_removes_and_shuts_down() {
        let (registry, repo, factory) = setup(RunBehavior::UntilShutdown).await;
        let agent = create_agent(repo.as_ref(), "Alpha").await;
        registry.start_agent(&agent).await;

        assert!(registry.stop_agent(agent.id).await);
        assert!(!registry.is_running(agent.id).await);
        assert_eq!(factory.built()[0].shutdown_calls(), 1);
        assert!(!registry.stop_agent(agent.id).await);
    }

    #[tokio::test]
    async fn test_stop_aborts_unresponsive_handle() {
        let (registry, repo, _factory) = setup(RunBehavior::IgnoreShutdown).await;
        let agent = create_agent(repo.as_ref(), "Stubborn").await;
        registry.start_agent(&agent).await;

        let started = std::time::Instant::now();
        assert!(registry.stop_agent(agent.id).await);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_handles_deregister_when_run_ends() {
        for behavior in [RunBehavior::ExitImmediately, RunBehavior::Fail, RunBehavior::Panic] {
            let (registry, repo, _factory) = setup(behavior).await;
            let agent = create_agent(repo.as_ref(), "Flaky").await;
            registry.start_agent(&agent).await;
            wait_until_not_running(&registry, agent.id).await;
        }
    }

    #[tokio::test]
    async fn test_stale_task_never_removes_newer_handle() {
        let (registry, repo, factory) = setup(RunBehavior::UntilShutdown).await;
        let agent = create_agent(repo.as_ref(), "Alpha").await;

        registry.start_agent(&agent).await;
        registry.stop_agent(agent.id).await;
        registry.start_agent(&agent).await;

        // Let the first task's cleanup run.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(registry.is_running(agent.id).await);
        assert_eq!(factory.build_count(), 2);
    }

    #[tokio::test]
    async fn test_start_all_and_stop_all() {
        let (registry, repo, _factory) = setup(RunBehavior::UntilShutdown).await;
        let a = create_agent(repo.as_ref(), "Alpha").await;
        create_agent(repo.as_ref(), "Beta").await;
        let c = create_agent(repo.as_ref(), "Gamma").await;
        repo.update(c.id, &AgentUpdate { is_active: Some(false), ..Default::default() }).await.unwrap();

        assert_eq!(registry.start_all().await.unwrap(), 2);
        assert!(registry.is_running(a.id).await);
        assert!(!registry.is_running(c.id).await);
        assert_eq!(registry.active_handles().await.len(), 2);

        registry.stop_all().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_reload_respects_storage() {
        let (registry, repo, factory) = setup(RunBehavior::UntilShutdown).await;
        let agent = create_agent(repo.as_ref(), "Alpha").await;
        registry.start_agent(&agent).await;

        repo.update(agent.id, &AgentUpdate { objective: Some("Sell tea".into()), ..Default::default() })
            .await
            .unwrap();
        assert!(registry.reload_agent(agent.id).await.unwrap());
        let handle = registry.get_handle(agent.id).await.unwrap();
        assert_eq!(handle.agent().objective, "Sell tea");
        assert_eq!(factory.build_count(), 2);

        repo.update(agent.id, &AgentUpdate { is_active: Some(false), ..Default::default() }).await.unwrap();
        assert!(!registry.reload_agent(agent.id).await.unwrap());
        assert!(!registry.is_running(agent.id).await);

        repo.delete(agent.id).await.unwrap();
        assert!(!registry.reload_agent(agent.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reconcile_follows_storage() {
        let (registry, repo, _factory) = setup(RunBehavior::UntilShutdown).await;
        let a = create_agent(repo.as_ref(), "Alpha").await;
        let b = create_agent(repo.as_ref(), "Beta").await;
        registry.start_agent(&a).await;
        registry.start_agent(&b).await;

        let c = create_agent(repo.as_ref(), "Gamma").await;
        repo.delete(a.id).await.unwrap();
        repo.update(b.id, &AgentUpdate { personality: Some("grumpy".into()), ..Default::default() })
            .await
            .unwrap();

        let report = registry.reconcile().await.unwrap();
        assert_eq!(report.started, vec![c.id]);
        assert_eq!(report.stopped, vec![a.id]);
        assert_eq!(report.reloaded, vec![b.id]);

        let again = registry.reconcile().await.unwrap();
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_concurrent_starts_register_once() {
        let (registry, repo, factory) = setup(RunBehavior::UntilShutdown).await;
        let agent = create_agent(repo.as_ref(), "Alpha").await;
        let registry = Arc::new(registry);

        let attempts = (0..8).map(|_| {
            let registry = Arc::clone(&registry);
            let agent = agent.clone();
            tokio::spawn(async move { registry.start_agent(&agent).await })
        });
        let started = join_all(attempts).await.into_iter().filter(|r| *r.as_ref().unwrap()).count();

        assert_eq!(started, 1);
        assert_eq!(factory.build_count(), 1);
    }
}
