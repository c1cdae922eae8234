//! Text generator port - interface for chat-completion backends.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::CompletionRequest;

/// A chat-completion backend.
///
/// Implementations are responsible for bounding their own latency; callers
/// apply no timeout.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Complete the prompt, returning the generated text (possibly empty).
    async fn complete(&self, request: CompletionRequest) -> DomainResult<String>;
}
