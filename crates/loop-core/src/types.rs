//! Data model shared across the execution loop: Intent, CompilationContext,
//! AgentConfig, ConversationTurn, ToolCall/ToolDefinition, SubAgent types,
//! ExecutionResult, and Kernel facts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed user request. Ephemeral per turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    pub category: String,
    /// Leading-slash convention, e.g. `/fix`, `/test`.
    pub verb: String,
    pub target: String,
    pub constraint: String,
}

impl Intent {
    pub fn general(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: "general".to_string(),
            verb: "/general".to_string(),
            target: String::new(),
            constraint: String::new(),
        }
    }
}

/// Operational mode biasing prompt compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalMode {
    #[serde(rename = "/active")]
    Active,
    #[serde(rename = "/dream")]
    Dream,
}

impl Default for OperationalMode {
    fn default() -> Self {
        OperationalMode::Active
    }
}

/// Read-only session context attached by the caller; propagated into the
/// CompilationContext and consulted by SubAgent capability hinting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub dream_mode: bool,
    /// Model-capability preference, e.g. "high-reasoning", "high-speed", "balanced".
    /// Hints already present here are never overwritten by the SubAgent.
    pub model_capability_hint: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Snapshot passed to the Prompt Compiler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompilationContext {
    pub intent_verb: String,
    pub intent_target: String,
    pub operational_mode: OperationalMode,
    pub token_budget: u32,
    pub failing_test_count: u32,
    pub diagnostic_count: u32,
    pub session_context: Option<SessionContext>,
}

impl CompilationContext {
    pub fn new(intent_verb: impl Into<String>, intent_target: impl Into<String>) -> Self {
        Self {
            intent_verb: intent_verb.into(),
            intent_target: intent_target.into(),
            operational_mode: OperationalMode::Active,
            token_budget: 200_000,
            failing_test_count: 0,
            diagnostic_count: 0,
            session_context: None,
        }
    }
}

/// The authoritative capability envelope for one turn. Produced by the
/// Config Factory; never mutated after creation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub identity_prompt: String,
    /// Ordered set of allowed tool names.
    pub allowed_tools: Vec<String>,
    /// Policy-file references.
    pub policies: Vec<String>,
    pub mode: String,
}

impl AgentConfig {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Emitted by the LLM, consumed by the Safety Gate and Tool Registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: BTreeMap<String, Value>,
}

/// JSON-Schema-shaped projection of a registered Tool's schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result of running a single tool call through the Safety Gate + Registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub call: ToolCall,
    pub admitted: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Final product of one `Executor::process` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub response: String,
    pub intent: Intent,
    pub tool_calls_executed: Vec<ToolCallOutcome>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Lifecycle class of a SubAgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubAgentType {
    Ephemeral,
    Persistent,
    System,
}

/// Identity and bounds of one SubAgent, fixed at creation time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubAgentConfig {
    /// `<name>-<monotonic-nanos>`.
    pub id: String,
    pub name: String,
    pub agent_type: SubAgentType,
    pub agent_config: AgentConfig,
    pub timeout_ms: u64,
    pub max_turns: u32,
    pub session_context: Option<SessionContext>,
}

/// A Kernel fact: `{predicate, args[]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<String>,
}

impl Fact {
    pub fn new(predicate: impl Into<String>, args: Vec<String>) -> Self {
        Self { predicate: predicate.into(), args }
    }
}
