//! Spawner — bounded, concurrent registry of SubAgents.
//!
//! The load-bearing invariant: long, failure-prone config
//! generation happens *outside* any lock; admission (the ceiling check) and
//! registration happen *under* a dedicated lock with a post-generation
//! re-check of the ceiling. Concurrent spawns can generate configs in
//! parallel; only the brief admit-and-register section is serialized.

use crate::naming::{make_id, purpose_hash_name};
use crate::persona::{determine_agent_type, resolve_persona};
use crate::specialist;
use crate::subagent::{SubAgent, SubAgentState};
use dashmap::DashMap;
use loop_agent::{BaselinePromptCompiler, WhitespaceTransducer};
use loop_core::{
    AgentConfig, CompilationContext, ConfigFactory, Error, Intent, Kernel, OperationalMode,
    PromptCompiler, Result, SessionContext, SubAgentConfig, SubAgentType, Transducer,
};
use loop_llm::LlmClient;
use loop_tools::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

/// Reduced token budget used for the single retry-with-baseline-context
/// attempt when the real compilation context fails to compile.
const BASELINE_TOKEN_BUDGET: u32 = 4096;

#[derive(Clone, Debug)]
pub struct SpawnerConfig {
    pub max_active_subagents: usize,
    pub default_timeout_ms: u64,
    pub default_max_turns: u32,
    /// Base directory specialist configs are resolved relative to
    /// (`<base>/.nerd/agents/<name>/config.yaml`).
    pub specialist_base_dir: PathBuf,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            max_active_subagents: 10,
            default_timeout_ms: 30 * 60 * 1000,
            default_max_turns: 100,
            specialist_base_dir: PathBuf::from("."),
        }
    }
}

pub struct Spawner {
    registry: DashMap<String, Arc<SubAgent>>,
    config: SpawnerConfig,
    admission_lock: AsyncMutex<()>,

    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    kernel: Arc<dyn Kernel>,
    transducer: Arc<dyn Transducer>,
    prompt_compiler: Arc<dyn PromptCompiler>,
    config_factory: Arc<dyn ConfigFactory>,
}

impl Spawner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SpawnerConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        kernel: Arc<dyn Kernel>,
        transducer: Arc<dyn Transducer>,
        prompt_compiler: Arc<dyn PromptCompiler>,
        config_factory: Arc<dyn ConfigFactory>,
    ) -> Self {
        Self {
            registry: DashMap::new(),
            config,
            admission_lock: AsyncMutex::new(()),
            llm,
            tools,
            kernel,
            transducer,
            prompt_compiler,
            config_factory,
        }
    }

    /// A Spawner wired with the baseline reference collaborators — good
    /// enough to drive tests and a CLI demo turn without a real LLM/Kernel.
    pub fn with_baseline_collaborators(
        config: SpawnerConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        kernel: Arc<dyn Kernel>,
    ) -> Self {
        Self::new(
            config,
            llm,
            tools,
            kernel,
            Arc::new(WhitespaceTransducer::default()),
            Arc::new(BaselinePromptCompiler),
            Arc::new(loop_agent::AllowAllConfigFactory::new(Vec::new())),
        )
    }

    fn count_active(&self) -> usize {
        self.registry.iter().filter(|e| e.value().get_state() == SubAgentState::Running).count()
    }

    /// Step 1 (lock-free): compile the prompt, retrying once with a baseline
    /// context on failure; step 2 (lock-free): finalize the AgentConfig.
    /// Neither step ever errors out of `spawn` — the worst case on
    /// repeated failure is an empty `AgentConfig`, logged.
    async fn generate_agent_config(
        &self,
        intent_verb: &str,
        intent_target: &str,
        session_context: Option<&SessionContext>,
    ) -> AgentConfig {
        let mut ctx = CompilationContext::new(intent_verb, intent_target);
        if let Some(sc) = session_context {
            if sc.dream_mode {
                ctx.operational_mode = OperationalMode::Dream;
            }
            ctx.session_context = Some(sc.clone());
        }

        let compiled = match self.prompt_compiler.compile(&ctx).await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "prompt compiler failed during spawn, retrying with baseline context");
                let mut baseline = CompilationContext::new("/general", "");
                baseline.token_budget = BASELINE_TOKEN_BUDGET;
                match self.prompt_compiler.compile(&baseline).await {
                    Ok(c) => Some(c),
                    Err(e2) => {
                        warn!(error = %e2, "baseline prompt compilation also failed during spawn");
                        None
                    }
                }
            }
        };

        let Some(compiled) = compiled else {
            return AgentConfig::empty();
        };

        match self.config_factory.generate(&compiled, intent_verb).await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "config factory failed during spawn, degrading to empty config");
                AgentConfig::empty()
            }
        }
    }

    /// Builds a SubAgent, then admits and registers it under the lock, then
    /// launches its background execution. Shared by `spawn` and
    /// `spawn_specialist`.
    async fn admit_and_launch(
        &self,
        name: String,
        agent_type: SubAgentType,
        agent_config: AgentConfig,
        task: String,
        session_context: Option<SessionContext>,
    ) -> Result<Arc<SubAgent>> {
        let sub_config = SubAgentConfig {
            id: make_id(&name),
            name,
            agent_type,
            agent_config,
            timeout_ms: self.config.default_timeout_ms,
            max_turns: self.config.default_max_turns,
            session_context,
        };

        let subagent = Arc::new(
            SubAgent::new(
                sub_config,
                self.llm.clone(),
                self.tools.clone(),
                self.kernel.clone(),
                self.transducer.clone(),
                self.prompt_compiler.clone(),
                self.config_factory.clone(),
            )
            .await,
        );

        {
            let _guard = self.admission_lock.lock().await;
            let active = self.count_active();
            if active >= self.config.max_active_subagents {
                return Err(Error::SpawnCeilingExceeded { active, ceiling: self.config.max_active_subagents });
            }
            subagent.mark_admitted();
            self.registry.insert(subagent.id().to_string(), subagent.clone());
        }

        info!(id = %subagent.id(), name = %subagent.name(), "subagent spawned");

        let runner = subagent.clone();
        tokio::spawn(async move { runner.run(&task).await });

        Ok(subagent)
    }

    /// Resolves `intent` to a persona via the routing table, generates its
    /// AgentConfig, and spawns it against `task`. `session_context`, when
    /// present, is forwarded to config generation — a `dream_mode` session
    /// context overrides the compiled `CompilationContext` to `/dream` per
    /// spec.md §4.5 — and to the spawned SubAgent itself.
    pub async fn spawn(
        &self,
        intent: &Intent,
        task: &str,
        session_context: Option<SessionContext>,
    ) -> Result<Arc<SubAgent>> {
        let persona = resolve_persona(&intent.verb);
        let agent_type = determine_agent_type(&intent.category);
        let agent_config = self
            .generate_agent_config(&intent.verb, &intent.target, session_context.as_ref())
            .await;

        self.admit_and_launch(persona.to_string(), agent_type, agent_config, task.to_string(), session_context)
            .await
    }

    /// Like `spawn`, but for a caller that has no parsed Intent and wants a
    /// purpose-hash-named ephemeral SubAgent instead of persona routing —
    /// e.g. an ad hoc one-off delegated from a tool call.
    pub async fn spawn_ad_hoc(
        &self,
        purpose: &str,
        task: &str,
        session_context: Option<SessionContext>,
    ) -> Result<Arc<SubAgent>> {
        let name = purpose_hash_name(purpose);
        let agent_config =
            self.generate_agent_config("/general", purpose, session_context.as_ref()).await;
        self.admit_and_launch(name, SubAgentType::Ephemeral, agent_config, task.to_string(), session_context)
            .await
    }

    /// Attempts `./.nerd/agents/<name>/config.yaml` first; falls back to
    /// Config Factory generation using intent `/<name>`; falls back to an
    /// empty config if neither works.
    pub async fn spawn_specialist(
        &self,
        name: &str,
        task: &str,
        session_context: Option<SessionContext>,
    ) -> Result<Arc<SubAgent>> {
        let loaded = specialist::load_specialist(&self.config.specialist_base_dir, name).await;

        let (agent_config, agent_type) = match loaded {
            Ok(Some(cfg)) => (cfg, SubAgentType::Persistent),
            Ok(None) => {
                let verb = format!("/{name}");
                (
                    self.generate_agent_config(&verb, "", session_context.as_ref()).await,
                    SubAgentType::Ephemeral,
                )
            }
            Err(e) => {
                warn!(name = %name, error = %e, "specialist config invalid, falling back to generation");
                let verb = format!("/{name}");
                (
                    self.generate_agent_config(&verb, "", session_context.as_ref()).await,
                    SubAgentType::Ephemeral,
                )
            }
        };

        self.admit_and_launch(name.to_string(), agent_type, agent_config, task.to_string(), session_context)
            .await
    }

    pub fn get(&self, id: &str) -> Option<Arc<SubAgent>> {
        self.registry.get(id).map(|e| e.value().clone())
    }

    /// First SubAgent with this name currently in the `running` state.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<SubAgent>> {
        self.registry
            .iter()
            .find(|e| e.value().name() == name && e.value().get_state() == SubAgentState::Running)
            .map(|e| e.value().clone())
    }

    pub fn stop(&self, id: &str) -> Result<()> {
        let entry = self.registry.get(id).ok_or_else(|| Error::SubAgentNotFound(id.to_string()))?;
        entry.value().stop();
        Ok(())
    }

    pub fn stop_all(&self) {
        for entry in self.registry.iter() {
            entry.value().stop();
        }
    }

    /// Reaps terminal (completed/failed) entries from the registry.
    pub fn cleanup(&self) {
        let dead: Vec<String> = self
            .registry
            .iter()
            .filter(|e| e.value().get_state().is_terminal())
            .map(|e| e.key().clone())
            .collect();
        for id in dead {
            self.registry.remove(&id);
        }
    }

    pub fn list_active(&self) -> Vec<Arc<SubAgent>> {
        self.registry
            .iter()
            .filter(|e| e.value().get_state() == SubAgentState::Running)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn get_metrics(&self) -> Vec<(String, crate::subagent::SubAgentMetrics)> {
        self.registry.iter().map(|e| (e.key().clone(), e.value().get_metrics())).collect()
    }

    pub async fn wait_for(&self, id: &str, timeout: Duration) -> Result<()> {
        let Some(sub) = self.get(id) else {
            return Err(Error::SubAgentNotFound(id.to_string()));
        };
        tokio::time::timeout(timeout, sub.wait())
            .await
            .map_err(|_| Error::internal(format!("timed out waiting for subagent {id}")))?;
        Ok(())
    }
}
