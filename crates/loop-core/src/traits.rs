//! Contracts for the execution loop's external collaborators: Transducer,
//! Kernel, Prompt Compiler, Config Factory. The LLM Client and Tool Registry
//! contracts live in `loop-llm` and `loop-tools` respectively, next to their
//! concrete implementations.

use crate::error::Result;
use crate::types::{AgentConfig, CompilationContext, ConversationTurn, Fact, Intent};
use async_trait::async_trait;

/// Natural-language-to-structured-intent mapper. Deterministic on inputs;
/// expected to be non-blocking or short.
#[async_trait]
pub trait Transducer: Send + Sync {
    async fn parse_intent_with_context(
        &self,
        input: &str,
        history: &[ConversationTurn],
    ) -> Result<Intent>;
}

/// Logic-programming policy store: a fact base with forward-chaining
/// inference over a Datalog-style rule base. `Query` returns every fact
/// whose predicate matches; callers filter on args themselves.
#[async_trait]
pub trait Kernel: Send + Sync {
    async fn assert(&self, fact: Fact) -> Result<()>;
    async fn query(&self, predicate: &str) -> Result<Vec<Fact>>;
    async fn retract_fact(&self, fact: &Fact) -> Result<()>;
}

/// Result of a Prompt Compiler invocation.
#[derive(Clone, Debug)]
pub struct CompileResult {
    pub prompt: String,
}

/// Assembles a system prompt from tagged atoms given a CompilationContext.
/// May fail; must not mutate caller state.
#[async_trait]
pub trait PromptCompiler: Send + Sync {
    async fn compile(&self, ctx: &CompilationContext) -> Result<CompileResult>;
}

/// Resolves an intent to an allowed-tool set plus policy references.
#[async_trait]
pub trait ConfigFactory: Send + Sync {
    async fn generate(&self, compiled: &CompileResult, intent_verb: &str) -> Result<AgentConfig>;
}
