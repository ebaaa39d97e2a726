//! Request/response shapes for the LLM Client collaborator.

use loop_core::ToolCall;
use serde::{Deserialize, Serialize};

/// Result of `complete_with_system` / `complete_with_tools`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}
