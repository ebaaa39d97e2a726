//! Minimal reference implementations of the Transducer, Prompt Compiler,
//! and Config Factory collaborators — enough to make the Executor runnable
//! and testable without those collaborators being the focus of this crate.
//! A real deployment swaps these for NL-understanding and policy-backed
//! implementations; the Executor only ever depends on the trait contracts.

use async_trait::async_trait;
use loop_core::{
    AgentConfig, CompilationContext, CompileResult, ConfigFactory, ConversationTurn, Intent,
    Kernel, PromptCompiler, Result, Transducer,
};
use std::sync::Arc;

/// Splits `input` on the first whitespace run into a verb (leading-slash
/// normalized) and a target, ignoring history. Good enough to drive the
/// Executor's control flow in tests and as a CLI default; a deployment
/// would replace this with a real NL-to-intent mapper.
#[derive(Default)]
pub struct WhitespaceTransducer;

#[async_trait]
impl Transducer for WhitespaceTransducer {
    async fn parse_intent_with_context(
        &self,
        input: &str,
        _history: &[ConversationTurn],
    ) -> Result<Intent> {
        let id = uuid::Uuid::new_v4().to_string();
        let id = &id[..8];
        let mut parts = input.trim().splitn(2, char::is_whitespace);
        let first = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim().to_string();

        let (verb, target) = if let Some(stripped) = first.strip_prefix('/') {
            (format!("/{stripped}"), rest)
        } else {
            ("/general".to_string(), input.trim().to_string())
        };

        Ok(Intent {
            id: format!("intent-{id}"),
            category: "general".to_string(),
            verb,
            target,
            constraint: String::new(),
        })
    }
}

/// Renders a fixed identity prompt plus the diagnostic counts from the
/// CompilationContext. Never fails on its own — the Executor's "degrade on
/// compiler failure" path exists for collaborators that can genuinely fail
/// (e.g. a templating engine reading from disk), not for this baseline.
pub struct BaselinePromptCompiler;

#[async_trait]
impl PromptCompiler for BaselinePromptCompiler {
    async fn compile(&self, ctx: &CompilationContext) -> Result<CompileResult> {
        let mode = match ctx.operational_mode {
            loop_core::OperationalMode::Active => "/active",
            loop_core::OperationalMode::Dream => "/dream",
        };
        Ok(CompileResult {
            prompt: format!(
                "You are a coding agent. Intent: {} {} (mode {}). \
                 {} failing tests, {} active diagnostics.",
                ctx.intent_verb, ctx.intent_target, mode, ctx.failing_test_count, ctx.diagnostic_count
            ),
        })
    }
}

/// Grants every registered tool name for any intent — a deployment would
/// consult the Kernel's policy facts here to scope `allowedTools` per verb.
pub struct AllowAllConfigFactory {
    tool_names: Vec<String>,
}

impl AllowAllConfigFactory {
    pub fn new(tool_names: Vec<String>) -> Self {
        Self { tool_names }
    }
}

#[async_trait]
impl ConfigFactory for AllowAllConfigFactory {
    async fn generate(&self, compiled: &CompileResult, intent_verb: &str) -> Result<AgentConfig> {
        Ok(AgentConfig {
            identity_prompt: compiled.prompt.clone(),
            allowed_tools: self.tool_names.clone(),
            policies: Vec::new(),
            mode: intent_verb.to_string(),
        })
    }
}

/// Queries the Kernel for `test_failed` / `diagnostic_active` fact counts —
/// a small helper shared by the Executor and the Spawner's Orient step.
pub async fn count_facts(kernel: &Arc<dyn Kernel>, predicate: &str) -> u32 {
    kernel.query(predicate).await.map(|facts| facts.len() as u32).unwrap_or(0)
}
