//! LLM Client collaborator: trait contract, Anthropic implementation, and a
//! scriptable mock for tests.

pub mod anthropic;
pub mod client;
pub mod mock;
pub mod types;

pub use anthropic::AnthropicClient;
pub use client::{LlmClient, LlmError, LlmResult};
pub use mock::MockLlmClient;
pub use types::{CompletionResult, LlmTool};
