//! SubAgent — a context-isolated wrapper around its own Executor with its
//! own history, lifecycle state machine, cancellation handle, and metrics.

use chrono::{DateTime, Utc};
use loop_agent::{Compressor, Executor, ExecutorConfig};
use loop_core::{
    ConfigFactory, Error, ExecutionResult, Kernel, PromptCompiler, Result, SessionContext,
    SubAgentConfig, Transducer,
};
use loop_llm::LlmClient;
use loop_tools::ToolRegistry;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// `idle -> running -> {completed | failed}`. Terminal states are sticky.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubAgentState {
    Idle,
    Running,
    Completed,
    Failed,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;

impl SubAgentState {
    fn from_u8(v: u8) -> Self {
        match v {
            RUNNING => Self::Running,
            COMPLETED => Self::Completed,
            FAILED => Self::Failed,
            _ => Self::Idle,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => IDLE,
            Self::Running => RUNNING,
            Self::Completed => COMPLETED,
            Self::Failed => FAILED,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Clone, Debug)]
pub struct SubAgentMetrics {
    pub turn_count: u32,
    pub state: SubAgentState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

#[derive(Default)]
struct Timing {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    result: Option<ExecutionResult>,
    error: Option<String>,
}

/// Derives a model-capability preference from a SubAgent's persona name.
/// Hints already present on an incoming session context are never
/// overwritten — callers only reach this when there's nothing to preserve.
fn capability_hint_for(name: &str) -> &'static str {
    match name {
        "coder" | "reviewer" => "high-reasoning",
        "tester" => "high-speed",
        "researcher" => "balanced",
        _ => "high-reasoning",
    }
}

pub struct SubAgent {
    config: SubAgentConfig,
    executor: Arc<Executor>,
    compressor: RwLock<Option<Arc<Compressor>>>,
    state: AtomicU8,
    cancel: CancellationToken,
    turn_count: AtomicU32,
    timing: Mutex<Timing>,
}

impl SubAgent {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        config: SubAgentConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        kernel: Arc<dyn Kernel>,
        transducer: Arc<dyn Transducer>,
        prompt_compiler: Arc<dyn PromptCompiler>,
        config_factory: Arc<dyn ConfigFactory>,
    ) -> Self {
        let executor =
            Executor::new(llm, tools, kernel, transducer, prompt_compiler, config_factory);

        let mut session_context = config.session_context.clone().unwrap_or_default();
        if session_context.model_capability_hint.is_none() {
            session_context.model_capability_hint =
                Some(capability_hint_for(&config.name).to_string());
        }
        executor.set_session_context(session_context).await;
        executor.set_config(ExecutorConfig::default()).await;

        Self {
            config,
            executor: Arc::new(executor),
            compressor: RwLock::new(None),
            state: AtomicU8::new(IDLE),
            cancel: CancellationToken::new(),
            turn_count: AtomicU32::new(0),
            timing: Mutex::new(Timing::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SubAgentConfig {
        &self.config
    }

    pub fn get_state(&self) -> SubAgentState {
        SubAgentState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Atomically transitions `idle -> running` and stamps `start_time`.
    /// Called by the Spawner under its admission lock so the ceiling
    /// invariant holds the instant `Spawn` returns success, not only
    /// once the background task gets scheduled. Returns `false` if the
    /// SubAgent was not idle (already admitted, or a caller error).
    pub fn mark_admitted(&self) -> bool {
        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.timing.lock().unwrap().start_time = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Cancels the SubAgent's private context. If running, execution
    /// observes cancellation at the next LLM or tool boundary and
    /// transitions to `failed`. A no-op once terminal.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the task to completion as a single bounded turn.
    /// The caller (the Spawner) must have already admitted this SubAgent via
    /// `mark_admitted`; `run` itself only executes and terminates.
    pub async fn run(&self, task: &str) {
        if self.get_state() != SubAgentState::Running {
            warn!(id = %self.config.id, "run() called on a SubAgent that was never admitted");
            return;
        }

        if self.config.max_turns == 0 {
            self.finish_failed("max_turns is zero".to_string());
            return;
        }

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let outcome =
            tokio::time::timeout(timeout, self.executor.process(task, self.cancel.clone())).await;

        self.turn_count.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(Ok(result)) => self.finish_completed(result),
            Ok(Err(e)) => self.finish_failed(e.to_string()),
            Err(_) => {
                self.cancel.cancel();
                self.finish_failed(format!("subagent timed out after {}ms", self.config.timeout_ms))
            }
        }
    }

    fn finish_completed(&self, result: ExecutionResult) {
        let mut timing = self.timing.lock().unwrap();
        timing.end_time = Some(Utc::now());
        timing.result = Some(result);
        drop(timing);
        self.state.store(COMPLETED, Ordering::SeqCst);
        info!(id = %self.config.id, "subagent completed");
    }

    fn finish_failed(&self, error: String) {
        let mut timing = self.timing.lock().unwrap();
        timing.end_time = Some(Utc::now());
        timing.error = Some(error.clone());
        drop(timing);
        self.state.store(FAILED, Ordering::SeqCst);
        warn!(id = %self.config.id, error = %error, "subagent failed");
    }

    /// Polls until terminal and returns `(result, error)`.
    pub async fn wait(&self) -> (Option<ExecutionResult>, Option<String>) {
        loop {
            if self.get_state().is_terminal() {
                return self.get_result();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// A SubAgent that failed with no stored error synthesizes a generic
    /// failure for callers that consult state first.
    pub fn get_result(&self) -> (Option<ExecutionResult>, Option<String>) {
        let timing = self.timing.lock().unwrap();
        let mut error = timing.error.clone();
        if self.get_state() == SubAgentState::Failed && error.is_none() {
            error = Some("execution failed".to_string());
        }
        (timing.result.clone(), error)
    }

    pub fn get_metrics(&self) -> SubAgentMetrics {
        let timing = self.timing.lock().unwrap();
        let duration_ms = match (timing.start_time, timing.end_time) {
            (Some(s), Some(e)) => Some((e - s).num_milliseconds().max(0) as u64),
            _ => None,
        };
        SubAgentMetrics {
            turn_count: self.turn_count.load(Ordering::SeqCst),
            state: self.get_state(),
            start_time: timing.start_time,
            end_time: timing.end_time,
            duration_ms,
        }
    }

    pub async fn set_compressor(&self, compressor: Arc<Compressor>) {
        *self.compressor.write().await = Some(compressor);
    }

    /// Compresses this SubAgent's own conversation history in place.
    pub async fn compress_memory(&self, threshold: usize) -> Result<()> {
        let compressor = self.compressor.read().await.clone();
        let Some(compressor) = compressor else {
            return Err(Error::internal("no compressor configured for this subagent"));
        };
        let history = self.executor.get_history().await;
        let compressed = compressor.compress(&history, threshold).await;
        self.executor.set_history(compressed).await;
        Ok(())
    }
}
