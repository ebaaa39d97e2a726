//! The LLM Client collaborator contract.

use crate::types::{CompletionResult, LlmTool};
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("cancelled")]
    Cancelled,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// Non-streaming completion boundary: the implementation returns structured
/// tool calls already parsed — no free-text tool-call parsing happens here
/// or above it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete_with_system(
        &self,
        system: &str,
        user: &str,
        cancel: CancellationToken,
    ) -> LlmResult<CompletionResult>;

    async fn complete_with_tools(
        &self,
        system: &str,
        user: &str,
        tools: &[LlmTool],
        cancel: CancellationToken,
    ) -> LlmResult<CompletionResult>;
}
