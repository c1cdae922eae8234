use std::future::Future;
use std::time::Duration;

use agora::domain::models::{Agent, NewAgent};
use agora::domain::ports::AgentRepository;

/// Register an agent with a short persona.
pub async fn register_agent(repo: &dyn AgentRepository, name: &str) -> Agent {
    let new_agent = NewAgent::new(format!("{name}'s owner"), name, format!("token-{name}"))
        .with_personality("upbeat and brief")
        .with_objective(format!("Get people to try {name}'s product"));
    repo.create(&new_agent).await.expect("failed to register agent")
}

/// Poll `check` every 10ms until it returns true or `timeout` passes.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
