//! Scripted text generator for tests and dry runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CompletionRequest, PromptRole};
use crate::domain::ports::TextGenerator;

/// How a [`ScriptedGenerator`] answers once its queued replies run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedMode {
    /// Always answer with the same text.
    Canned(String),
    /// Repeat the last user line of the prompt, prefixed.
    Echo,
    /// Fail every call.
    Fail,
}

/// Text generator with predictable output.
///
/// Queued replies are served first, in order; after that the fallback
/// [`ScriptedMode`] applies. Every request is recorded for inspection.
pub struct ScriptedGenerator {
    mode: ScriptedMode,
    queued: Mutex<VecDeque<DomainResult<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGenerator {
    pub fn new(mode: ScriptedMode) -> Self {
        Self {
            mode,
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn canned(text: impl Into<String>) -> Self {
        Self::new(ScriptedMode::Canned(text.into()))
    }

    pub fn echo() -> Self {
        Self::new(ScriptedMode::Echo)
    }

    pub fn failing() -> Self {
        Self::new(ScriptedMode::Fail)
    }

    /// Queue one successful reply ahead of the fallback mode.
    pub fn push_reply(&self, text: impl Into<String>) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(Ok(text.into()));
        }
    }

    /// Queue one failure ahead of the fallback mode.
    pub fn push_failure(&self, message: impl Into<String>) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(Err(DomainError::GenerationFailed(message.into())));
        }
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn fallback(&self, request: &CompletionRequest) -> DomainResult<String> {
        match &self.mode {
            ScriptedMode::Canned(text) => Ok(text.clone()),
            ScriptedMode::Echo => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == PromptRole::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                Ok(format!("echo: {last_user}"))
            }
            ScriptedMode::Fail => Err(DomainError::GenerationFailed("scripted failure".to_string())),
        }
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> DomainResult<String> {
        let queued = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        let result = match queued {
            Some(result) => result,
            None => self.fallback(&request),
        };
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PromptMessage;

    fn request(user: &str) -> CompletionRequest {
        CompletionRequest::new(vec![PromptMessage::system("sys"), PromptMessage::user(user)], 64, 0.8)
    }

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let generator = ScriptedGenerator::canned("default");
        generator.push_reply("first");
        generator.push_failure("boom");

        assert_eq!(generator.complete(request("a")).await.unwrap(), "first");
        assert!(generator.complete(request("b")).await.is_err());
        assert_eq!(generator.complete(request("c")).await.unwrap(), "default");
        assert_eq!(generator.call_count(), 3);
        assert_eq!(generator.requests()[2].messages[1].content, "c");
    }

    #[tokio::test]
    async fn test_echo_and_fail_modes() {
        assert_eq!(ScriptedGenerator::echo().complete(request("hello")).await.unwrap(), "echo: hello");
        assert!(matches!(
            ScriptedGenerator::failing().complete(request("x")).await,
            Err(DomainError::GenerationFailed(_))
        ));
    }
}
