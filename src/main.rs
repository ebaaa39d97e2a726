//! universal-loop — thin CLI that wires the execution-loop crates together
//! for a single demo turn. Not a chat UI, not a server: just enough ambient
//! plumbing (config loading, `tracing` init, one real invocation) to prove
//! the workspace actually links end to end.

use clap::{Parser, Subcommand};
use loop_agent::{AllowAllConfigFactory, BaselinePromptCompiler, Executor, WhitespaceTransducer};
use loop_core::{Intent, SessionContext};
use loop_kernel::InMemoryKernel;
use loop_llm::{AnthropicClient, CompletionResult, LlmClient, MockLlmClient};
use loop_spawner::{Spawner, SpawnerConfig};
use loop_tools::create_default_registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "universal-loop",
    about = "Universal execution loop — OODA turn + bounded sub-agent spawning",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root the built-in tools (read/write/edit/bash/glob/grep) operate against.
    #[arg(long, default_value = ".")]
    workspace: String,

    /// Bias prompt compilation toward speculative/offline reasoning.
    #[arg(long, default_value_t = false)]
    dream: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single turn inline through the shared Executor.
    Run {
        input: String,
    },
    /// Dispatch a task through the Spawner, routed by intent verb to a persona.
    Spawn {
        verb: String,
        task: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    let llm = build_llm_client();
    let tools = Arc::new(create_default_registry(&cli.workspace));
    let kernel = Arc::new(InMemoryKernel::new());

    match cli.command {
        Commands::Run { input } => {
            let executor = Executor::new(
                llm,
                tools,
                kernel,
                Arc::new(WhitespaceTransducer::default()),
                Arc::new(BaselinePromptCompiler),
                Arc::new(AllowAllConfigFactory::new(builtin_tool_names())),
            );
            if cli.dream {
                executor.set_session_context(SessionContext { dream_mode: true, ..Default::default() }).await;
            }

            let result = executor.process(&input, CancellationToken::new()).await?;
            println!("{}", result.response);
            for outcome in &result.tool_calls_executed {
                println!(
                    "  tool {}: admitted={} error={:?}",
                    outcome.call.name, outcome.admitted, outcome.error
                );
            }
        }
        Commands::Spawn { verb, task } => {
            let spawner = Spawner::with_baseline_collaborators(SpawnerConfig::default(), llm, tools, kernel);
            let intent = Intent {
                id: "cli-spawn".to_string(),
                category: "general".to_string(),
                verb,
                target: task.clone(),
                constraint: String::new(),
            };

            let session_context = cli
                .dream
                .then(|| SessionContext { dream_mode: true, ..Default::default() });
            let subagent = spawner.spawn(&intent, &task, session_context).await?;
            println!("spawned {} ({})", subagent.id(), subagent.name());

            let (result, error) = subagent.wait().await;
            if let Some(e) = error {
                eprintln!("subagent failed: {e}");
            } else if let Some(r) = result {
                println!("{}", r.response);
            }
        }
    }

    Ok(())
}

fn builtin_tool_names() -> Vec<String> {
    vec!["read", "write", "edit", "bash", "glob", "grep"].into_iter().map(String::from).collect()
}

fn build_llm_client() -> Arc<dyn LlmClient> {
    match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) => Arc::new(AnthropicClient::new(key)),
        Err(_) => {
            tracing::warn!("ANTHROPIC_API_KEY not set, falling back to a scripted mock LLM client");
            Arc::new(MockLlmClient::new(vec![CompletionResult {
                text: "(no ANTHROPIC_API_KEY set — this is a scripted demo response)".to_string(),
                ..Default::default()
            }]))
        }
    }
}

/// Installs the `tracing` subscriber. Stderr always gets the formatted feed;
/// if `UNIVERSAL_LOOP_LOG_DIR` is set, a daily-rolling plain-text copy is
/// also teed there via `tracing-appender`. The returned guard must be held
/// for the file writer to flush on drop.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "universal_loop=info".into());

    match std::env::var("UNIVERSAL_LOOP_LOG_DIR") {
        Ok(dir) => {
            let file_appender = tracing_appender::rolling::daily(&dir, "universal-loop.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer()).init();
            None
        }
    }
}
