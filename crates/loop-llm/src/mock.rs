//! Scriptable LLM client stand-in used by `loop-agent`'s and `loop-spawner`'s
//! test suites. A hand-written struct implementing the real trait, not a
//! mocking-framework macro.

use crate::client::{LlmClient, LlmResult};
use crate::types::{CompletionResult, LlmTool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct MockLlmClient {
    responses: Mutex<Vec<CompletionResult>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResult>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> CompletionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            CompletionResult::default()
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete_with_system(
        &self,
        _system: &str,
        _user: &str,
        _cancel: CancellationToken,
    ) -> LlmResult<CompletionResult> {
        Ok(self.next())
    }

    async fn complete_with_tools(
        &self,
        _system: &str,
        _user: &str,
        _tools: &[LlmTool],
        _cancel: CancellationToken,
    ) -> LlmResult<CompletionResult> {
        Ok(self.next())
    }
}
