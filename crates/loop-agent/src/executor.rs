//! Executor — the per-turn OODA loop.
//!
//! Converts one natural-language input into a final assistant response plus
//! zero or more executed tool calls. `Process` is the single entry point;
//! concurrent calls on the *same* Executor are not supported (session
//! mutability), concurrent calls on distinct Executors are fine.

use crate::baseline::count_facts;
use crate::safety_gate::SafetyGate;
use loop_core::{
    tokens, AgentConfig, CompilationContext, ConfigFactory, ConversationTurn, Error,
    ExecutionResult, Kernel, OperationalMode, PromptCompiler, Result, SessionContext, ToolCall,
    ToolCallOutcome, ToolDefinition, Transducer,
};
use loop_llm::{LlmClient, LlmTool};
use loop_tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Ceiling `CompilationContext.token_budget` is computed against — the
/// Orient step reports `ceiling - estimate(history)` as the remaining
/// budget rather than always handing the Prompt Compiler a flat constant.
const MAX_CONTEXT_TOKENS: u32 = 200_000;

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub max_tool_calls: usize,
    pub tool_timeout: Duration,
    pub enable_safety_gate: bool,
    /// Conversation history cap, in turns.
    pub history_cap: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: 50,
            tool_timeout: Duration::from_secs(5 * 60),
            enable_safety_gate: true,
            history_cap: 50,
        }
    }
}

pub struct Executor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    kernel: Arc<dyn Kernel>,
    transducer: Arc<dyn Transducer>,
    prompt_compiler: Arc<dyn PromptCompiler>,
    config_factory: Arc<dyn ConfigFactory>,
    safety_gate: SafetyGate,

    history: RwLock<Vec<ConversationTurn>>,
    session_context: RwLock<Option<SessionContext>>,
    config: RwLock<ExecutorConfig>,
}

fn to_llm_tool(def: ToolDefinition) -> LlmTool {
    LlmTool { name: def.name, description: def.description, input_schema: def.input_schema }
}

fn args_to_value(call: &ToolCall) -> Value {
    Value::Object(call.args.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

impl Executor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        kernel: Arc<dyn Kernel>,
        transducer: Arc<dyn Transducer>,
        prompt_compiler: Arc<dyn PromptCompiler>,
        config_factory: Arc<dyn ConfigFactory>,
    ) -> Self {
        Self {
            safety_gate: SafetyGate::new(kernel.clone()),
            llm,
            tools,
            kernel,
            transducer,
            prompt_compiler,
            config_factory,
            history: RwLock::new(Vec::new()),
            session_context: RwLock::new(None),
            config: RwLock::new(ExecutorConfig::default()),
        }
    }

    pub async fn set_session_context(&self, ctx: SessionContext) {
        *self.session_context.write().await = Some(ctx);
    }

    pub async fn set_config(&self, cfg: ExecutorConfig) {
        *self.config.write().await = cfg;
    }

    pub async fn get_history(&self) -> Vec<ConversationTurn> {
        self.history.read().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    /// Replace conversation history wholesale — the hook the Compressor's
    /// caller uses to substitute its compressed result back in.
    pub async fn set_history(&self, turns: Vec<ConversationTurn>) {
        *self.history.write().await = turns;
    }

    pub async fn process(&self, input: &str, cancel: CancellationToken) -> Result<ExecutionResult> {
        let started = Instant::now();
        let cfg = self.config.read().await.clone();

        // 1. Observe
        let history_snapshot = self.history.read().await.clone();
        let intent = self
            .transducer
            .parse_intent_with_context(input, &history_snapshot)
            .await
            .map_err(|e| Error::TransducerFailed(e.to_string()))?;

        // 2. Publish — non-fatal: the Kernel is an external service and a
        // failed assert here does not invalidate the rest of the turn.
        let publish = loop_core::Fact::new(
            "user_intent",
            vec![
                "/current_intent".to_string(),
                intent.category.clone(),
                intent.verb.clone(),
                intent.target.clone(),
                intent.constraint.clone(),
            ],
        );
        if let Err(e) = self.kernel.assert(publish).await {
            warn!(error = %e, "failed to publish user_intent to kernel");
        }

        // 3. Orient
        let session_context = self.session_context.read().await.clone();
        let mut compilation_ctx = CompilationContext::new(intent.verb.clone(), intent.target.clone());
        compilation_ctx.token_budget =
            MAX_CONTEXT_TOKENS.saturating_sub(tokens::total_tokens(&history_snapshot));
        compilation_ctx.failing_test_count = count_facts(&self.kernel, "test_failed").await;
        compilation_ctx.diagnostic_count = count_facts(&self.kernel, "diagnostic_active").await;
        if let Some(sc) = &session_context {
            if sc.dream_mode {
                compilation_ctx.operational_mode = OperationalMode::Dream;
            }
            compilation_ctx.session_context = Some(sc.clone());
        }

        // 4. JIT-compile prompt — degrade to a baseline prompt on failure.
        let compiled = match self.prompt_compiler.compile(&compilation_ctx).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "prompt compiler failed, degrading to baseline prompt");
                loop_core::CompileResult {
                    prompt: format!("You are a coding agent handling intent {}.", intent.verb),
                }
            }
        };

        // 5. JIT-compile config — degrade to an empty config on failure.
        let agent_config: AgentConfig = match self.config_factory.generate(&compiled, &intent.verb).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "config factory failed, degrading to empty config");
                AgentConfig::empty()
            }
        };

        // 6. Generate
        let completion = if agent_config.allowed_tools.is_empty() {
            self.llm
                .complete_with_system(&agent_config.identity_prompt, input, cancel.clone())
                .await
                .map_err(|e| Error::GenerationFailed(e.to_string()))?
        } else {
            let defs: Vec<LlmTool> =
                self.tools.definitions_for(&agent_config.allowed_tools).into_iter().map(to_llm_tool).collect();
            self.llm
                .complete_with_tools(&agent_config.identity_prompt, input, &defs, cancel.clone())
                .await
                .map_err(|e| Error::GenerationFailed(e.to_string()))?
        };

        // 7. Execute tools
        let mut outcomes = Vec::new();
        let total_calls = completion.tool_calls.len();
        for (i, call) in completion.tool_calls.into_iter().enumerate() {
            if i >= cfg.max_tool_calls {
                warn!(
                    dropped = total_calls - cfg.max_tool_calls,
                    max_tool_calls = cfg.max_tool_calls,
                    "max tool calls reached, discarding remaining calls"
                );
                break;
            }

            if !agent_config.allowed_tools.iter().any(|t| t == &call.name) {
                warn!(tool = %call.name, "tool not in allowed set, skipping");
                outcomes.push(ToolCallOutcome {
                    call,
                    admitted: false,
                    result: None,
                    error: Some("tool not allowed".to_string()),
                });
                continue;
            }

            let admitted = self.safety_gate.check(&call, cfg.enable_safety_gate).await;
            if !admitted {
                warn!(tool = %call.name, "safety gate denied tool call");
                outcomes.push(ToolCallOutcome {
                    call,
                    admitted: false,
                    result: None,
                    error: Some("denied by safety gate".to_string()),
                });
                continue;
            }

            let args = args_to_value(&call);
            let exec = tokio::time::timeout(
                cfg.tool_timeout,
                self.tools.execute_cancellable(&call.name, args, cancel.clone()),
            )
            .await;

            match exec {
                Ok(result) if result.is_error() => {
                    warn!(tool = %call.name, "tool execution failed");
                    outcomes.push(ToolCallOutcome {
                        call,
                        admitted: true,
                        result: None,
                        error: Some(result.to_content_string()),
                    });
                }
                Ok(result) => {
                    outcomes.push(ToolCallOutcome {
                        call,
                        admitted: true,
                        result: Some(result.to_content_string()),
                        error: None,
                    });
                }
                Err(_) => {
                    warn!(tool = %call.name, "tool execution timed out");
                    outcomes.push(ToolCallOutcome {
                        call,
                        admitted: true,
                        result: None,
                        error: Some("tool execution timed out".to_string()),
                    });
                }
            }
        }

        // 8. Articulate
        {
            let mut history = self.history.write().await;
            history.push(ConversationTurn::user(input));
            history.push(ConversationTurn::assistant(completion.text.clone()));
            if history.len() > cfg.history_cap {
                let excess = history.len() - cfg.history_cap;
                history.drain(0..excess);
            }
        }

        info!(intent = %intent.verb, tool_calls = outcomes.len(), "turn complete");

        Ok(ExecutionResult {
            response: completion.text,
            intent,
            tool_calls_executed: outcomes,
            duration_ms: started.elapsed().as_millis() as u64,
            error: None,
        })
    }
}
