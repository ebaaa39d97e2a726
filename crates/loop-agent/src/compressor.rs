//! Compressor — bounded conversational memory.
//!
//! Replaces a prefix of conversation turns with one synthetic `assistant`
//! turn prefixed `[MEMORY SUMMARY]`. Pure with respect to its inputs: the
//! caller owns the turns slice and substitutes the result.

use loop_core::{ConversationTurn, Role};
use loop_llm::LlmClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the following conversation turns concisely. \
Retain concrete decisions, facts established, and outstanding task state. \
Do not editorialize; write only the summary.";
const SUMMARY_PREFIX: &str = "[MEMORY SUMMARY]";

pub struct Compressor {
    llm: Arc<dyn LlmClient>,
}

impl Compressor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// `len(turns) <= threshold` is a no-op. Otherwise the head is
    /// summarized (or, on LLM failure, the whole thing is truncated to the
    /// most recent `threshold` turns with no summary inserted).
    pub async fn compress(
        &self,
        turns: &[ConversationTurn],
        threshold: usize,
    ) -> Vec<ConversationTurn> {
        if turns.len() <= threshold {
            return turns.to_vec();
        }

        let tail_len = (threshold / 2).max(1);
        let split = turns.len().saturating_sub(tail_len);
        let head = &turns[..split];
        let tail = &turns[split..];

        match self.summarize(head).await {
            Ok(summary) => {
                let mut result = Vec::with_capacity(tail.len() + 1);
                result.push(ConversationTurn::assistant(format!("{SUMMARY_PREFIX} {summary}")));
                result.extend_from_slice(tail);
                result
            }
            Err(e) => {
                warn!(error = %e, "compressor degrading to truncation");
                let start = turns.len().saturating_sub(threshold);
                turns[start..].to_vec()
            }
        }
    }

    async fn summarize(&self, head: &[ConversationTurn]) -> Result<String, loop_llm::LlmError> {
        let transcript = head
            .iter()
            .map(|t| {
                let role = match t.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{role}: {}", t.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let result = self
            .llm
            .complete_with_system(SUMMARY_SYSTEM_PROMPT, &transcript, CancellationToken::new())
            .await?;
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loop_llm::{CompletionResult, LlmTool, MockLlmClient};

    fn turn(i: usize) -> ConversationTurn {
        if i % 2 == 0 {
            ConversationTurn::user(format!("turn {i}"))
        } else {
            ConversationTurn::assistant(format!("turn {i}"))
        }
    }

    #[tokio::test]
    async fn no_op_under_threshold() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let compressor = Compressor::new(llm);
        let turns: Vec<_> = (0..5).map(turn).collect();
        let result = compressor.compress(&turns, 10).await;
        assert_eq!(result.len(), turns.len());
    }

    #[tokio::test]
    async fn summarizes_head_and_preserves_tail() {
        let llm = Arc::new(MockLlmClient::new(vec![CompletionResult {
            text: "decided to use tokio".to_string(),
            ..Default::default()
        }]));
        let compressor = Compressor::new(llm);
        let turns: Vec<_> = (0..10).map(turn).collect();

        let result = compressor.compress(&turns, 4).await;

        // tail_len = max(1, 4/2) = 2
        assert!(result.len() <= (4_f64 / 2.0).ceil() as usize + 1);
        assert_eq!(result[0].content, "[MEMORY SUMMARY] decided to use tokio");
        assert_eq!(result[result.len() - 1].content, turns[turns.len() - 1].content);
        assert_eq!(result[result.len() - 2].content, turns[turns.len() - 2].content);
    }

    #[tokio::test]
    async fn degrades_to_truncation_on_llm_failure() {
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl LlmClient for AlwaysFails {
            fn name(&self) -> &str {
                "fails"
            }
            async fn complete_with_system(
                &self,
                _s: &str,
                _u: &str,
                _c: CancellationToken,
            ) -> Result<CompletionResult, loop_llm::LlmError> {
                Err(loop_llm::LlmError::RequestFailed("boom".into()))
            }
            async fn complete_with_tools(
                &self,
                _s: &str,
                _u: &str,
                _t: &[LlmTool],
                _c: CancellationToken,
            ) -> Result<CompletionResult, loop_llm::LlmError> {
                Err(loop_llm::LlmError::RequestFailed("boom".into()))
            }
        }

        let compressor = Compressor::new(Arc::new(AlwaysFails));
        let turns: Vec<_> = (0..10).map(turn).collect();
        let result = compressor.compress(&turns, 4).await;

        assert_eq!(result.len(), 4);
        assert_eq!(result, turns[6..]);
    }
}
