//! Cross-crate Spawner scenarios — the concurrent-admission ceiling race
//! and persona routing exercised end to end.

use async_trait::async_trait;
use loop_agent::AllowAllConfigFactory;
use loop_core::{
    AgentConfig, CompilationContext, CompileResult, ConfigFactory, Intent, PromptCompiler, Result,
    SessionContext,
};
use loop_kernel::InMemoryKernel;
use loop_llm::{CompletionResult, MockLlmClient};
use loop_spawner::{Spawner, SpawnerConfig};
use loop_tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Prompt compiler that sleeps before returning, so config generation
/// genuinely overlaps across concurrent `spawn` calls.
struct SleepyPromptCompiler;

#[async_trait]
impl PromptCompiler for SleepyPromptCompiler {
    async fn compile(&self, ctx: &CompilationContext) -> Result<CompileResult> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(CompileResult { prompt: format!("prompt for {}", ctx.intent_verb) })
    }
}

fn spawner(ceiling: usize) -> Spawner {
    Spawner::new(
        SpawnerConfig { max_active_subagents: ceiling, ..Default::default() },
        Arc::new(MockLlmClient::new(vec![CompletionResult::default(); 16])),
        Arc::new(ToolRegistry::new()),
        Arc::new(InMemoryKernel::new()),
        Arc::new(loop_agent::WhitespaceTransducer::default()),
        Arc::new(SleepyPromptCompiler),
        Arc::new(AllowAllConfigFactory::new(Vec::new())),
    )
}

fn intent(verb: &str) -> Intent {
    Intent { id: "i1".into(), category: "general".into(), verb: verb.into(), target: String::new(), constraint: String::new() }
}

/// Ceiling = 1, three concurrent `Spawn` calls: exactly one succeeds.
#[tokio::test]
async fn spawn_ceiling_race_admits_exactly_one() {
    let spawner = Arc::new(spawner(1));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let s = spawner.clone();
        handles.push(tokio::spawn(async move { s.spawn(&intent("/fix"), "do it", None).await }));
    }

    let mut successes = 0;
    let mut ceiling_errors = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => successes += 1,
            Err(loop_core::Error::SpawnCeilingExceeded { .. }) => ceiling_errors += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(ceiling_errors, 2);
    // No trace of the two failed attempts should ever have been registered.
    assert_eq!(spawner.get_metrics().len(), 1);
}

/// Persona routing: `/fix` dispatches to a `coder`-named SubAgent.
#[tokio::test]
async fn spawn_routes_to_persona_by_verb() {
    let spawner = spawner(10);
    let sub = spawner.spawn(&intent("/fix"), "fix the thing", None).await.unwrap();
    assert_eq!(sub.name(), "coder");
    assert!(sub.id().starts_with("coder-"));

    let sub2 = spawner.spawn(&intent("/research"), "look into it", None).await.unwrap();
    assert_eq!(sub2.name(), "researcher");
}

#[tokio::test]
async fn spawned_subagent_reaches_a_terminal_state() {
    let spawner = spawner(10);
    let sub = spawner.spawn(&intent("/test"), "run the tests", None).await.unwrap();
    let (result, error) = sub.wait().await;
    assert!(error.is_none());
    assert!(result.is_some());
}

#[tokio::test]
async fn cleanup_reaps_terminal_entries_but_not_running_ones() {
    let spawner = spawner(10);
    let sub = spawner.spawn(&intent("/fix"), "task", None).await.unwrap();
    sub.wait().await;

    spawner.cleanup();
    assert!(spawner.get(sub.id()).is_none());
}

#[tokio::test]
async fn stop_all_cancels_every_registered_subagent() {
    struct Blocks;
    #[async_trait]
    impl loop_llm::LlmClient for Blocks {
        fn name(&self) -> &str {
            "blocks"
        }
        async fn complete_with_system(
            &self,
            _s: &str,
            _u: &str,
            cancel: tokio_util::sync::CancellationToken,
        ) -> loop_llm::LlmResult<CompletionResult> {
            cancel.cancelled().await;
            Err(loop_llm::LlmError::Cancelled)
        }
        async fn complete_with_tools(
            &self,
            _s: &str,
            _u: &str,
            _t: &[loop_llm::LlmTool],
            cancel: tokio_util::sync::CancellationToken,
        ) -> loop_llm::LlmResult<CompletionResult> {
            cancel.cancelled().await;
            Err(loop_llm::LlmError::Cancelled)
        }
    }

    let spawner = Spawner::new(
        SpawnerConfig { max_active_subagents: 10, ..Default::default() },
        Arc::new(Blocks),
        Arc::new(ToolRegistry::new()),
        Arc::new(InMemoryKernel::new()),
        Arc::new(loop_agent::WhitespaceTransducer::default()),
        Arc::new(loop_agent::BaselinePromptCompiler),
        Arc::new(AllowAllConfigFactory::new(Vec::new())),
    );

    let sub = spawner.spawn(&intent("/fix"), "long task", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    spawner.stop_all();

    let (_, error) = sub.wait().await;
    assert!(error.is_some());
}

/// Echoes `CompilationContext.operational_mode` into the compiled prompt as
/// its name-atom form (`/dream` or `/active`) so a downstream ConfigFactory
/// — and this test — can observe whether the spawn-time Orient step actually
/// overrode to dream mode.
struct ModeEchoingPromptCompiler;

#[async_trait]
impl PromptCompiler for ModeEchoingPromptCompiler {
    async fn compile(&self, ctx: &CompilationContext) -> Result<CompileResult> {
        let atom = serde_json::to_value(ctx.operational_mode).unwrap();
        Ok(CompileResult { prompt: atom.as_str().unwrap().to_string() })
    }
}

struct ModeEchoingConfigFactory;

#[async_trait]
impl ConfigFactory for ModeEchoingConfigFactory {
    async fn generate(&self, compiled: &CompileResult, _intent_verb: &str) -> Result<AgentConfig> {
        Ok(AgentConfig { mode: compiled.prompt.clone(), ..Default::default() })
    }
}

/// A `dream_mode` session context passed to `spawn` must override the
/// spawn-time `CompilationContext` to `/dream` (spec.md §4.5) and flow
/// through to the produced `AgentConfig.mode`.
#[tokio::test]
async fn dream_mode_session_context_produces_a_dream_mode_agent_config() {
    let spawner = Spawner::new(
        SpawnerConfig { max_active_subagents: 10, ..Default::default() },
        Arc::new(MockLlmClient::new(vec![CompletionResult::default(); 4])),
        Arc::new(ToolRegistry::new()),
        Arc::new(InMemoryKernel::new()),
        Arc::new(loop_agent::WhitespaceTransducer::default()),
        Arc::new(ModeEchoingPromptCompiler),
        Arc::new(ModeEchoingConfigFactory),
    );

    let dreaming = Some(SessionContext { dream_mode: true, ..Default::default() });
    let sub = spawner.spawn(&intent("/fix"), "task", dreaming).await.unwrap();
    assert_eq!(sub.config().agent_config.mode, "/dream");

    let awake = spawner.spawn(&intent("/fix"), "task", None).await.unwrap();
    assert_eq!(awake.config().agent_config.mode, "/active");
}

/// A `model_capability_hint` already present on the caller's session context
/// must not be overwritten by the SubAgent's persona-derived default
/// (`crates/loop-spawner/src/subagent.rs`'s `capability_hint_for`).
#[tokio::test]
async fn preset_capability_hint_survives_subagent_construction() {
    struct RecordingPromptCompiler {
        hints: Arc<std::sync::Mutex<Vec<Option<String>>>>,
    }

    #[async_trait]
    impl PromptCompiler for RecordingPromptCompiler {
        async fn compile(&self, ctx: &CompilationContext) -> Result<CompileResult> {
            let hint = ctx.session_context.as_ref().and_then(|sc| sc.model_capability_hint.clone());
            self.hints.lock().unwrap().push(hint);
            Ok(CompileResult { prompt: "p".into() })
        }
    }

    let hints = Arc::new(std::sync::Mutex::new(Vec::new()));
    let spawner = Spawner::new(
        SpawnerConfig { max_active_subagents: 10, ..Default::default() },
        Arc::new(MockLlmClient::new(vec![CompletionResult::default(); 4])),
        Arc::new(ToolRegistry::new()),
        Arc::new(InMemoryKernel::new()),
        Arc::new(loop_agent::WhitespaceTransducer::default()),
        Arc::new(RecordingPromptCompiler { hints: hints.clone() }),
        Arc::new(AllowAllConfigFactory::new(Vec::new())),
    );

    // `/fix` routes to the `coder` persona, whose default hint would be
    // "high-reasoning" — but this caller supplies its own.
    let preset = Some(SessionContext {
        model_capability_hint: Some("custom-hint".to_string()),
        ..Default::default()
    });
    let sub = spawner.spawn(&intent("/fix"), "task", preset).await.unwrap();
    sub.wait().await;

    // The turn the SubAgent's own Executor ran records the session context
    // it actually carried, which must preserve the caller's hint.
    let recorded = hints.lock().unwrap().clone();
    assert!(recorded.iter().any(|h| h.as_deref() == Some("custom-hint")));
}
