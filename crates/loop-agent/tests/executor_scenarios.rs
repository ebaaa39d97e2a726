use loop_agent::baseline::{AllowAllConfigFactory, BaselinePromptCompiler, WhitespaceTransducer};
use loop_agent::{Executor, ExecutorConfig};
use loop_core::{Fact, Kernel, ToolCall};
use loop_kernel::InMemoryKernel;
use loop_llm::{CompletionResult, MockLlmClient};
use loop_tools::create_default_registry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn read_secret_call() -> ToolCall {
    let mut args = BTreeMap::new();
    args.insert("path".to_string(), serde_json::json!("secret.txt"));
    ToolCall { id: "call-1".to_string(), name: "read".to_string(), args }
}

fn make_executor(kernel: Arc<InMemoryKernel>) -> Executor {
    Executor::new(
        Arc::new(MockLlmClient::new(vec![CompletionResult {
            text: "done".into(),
            tool_calls: vec![read_secret_call()],
            stop_reason: "tool_use".into(),
        }])),
        Arc::new(create_default_registry(std::env::temp_dir())),
        kernel,
        Arc::new(WhitespaceTransducer::default()),
        Arc::new(BaselinePromptCompiler),
        Arc::new(AllowAllConfigFactory::new(vec!["read".to_string()])),
    )
}

/// Deny by default: gate enabled, kernel empty.
#[tokio::test]
async fn deny_by_default() {
    let kernel = Arc::new(InMemoryKernel::new());
    let executor = make_executor(kernel.clone());

    let result = executor.process("/query secret.txt", CancellationToken::new()).await.unwrap();

    assert_eq!(result.tool_calls_executed.len(), 1);
    let outcome = &result.tool_calls_executed[0];
    assert!(!outcome.admitted);
    assert!(outcome.result.is_none());
    assert!(kernel.is_empty(), "pending_action must have been retracted");
}

/// Target mismatch: permitted fact exists but for a different target.
#[tokio::test]
async fn target_mismatch_denies() {
    let kernel = Arc::new(InMemoryKernel::new());
    let payload = serde_json::to_string(&read_secret_call().args).unwrap();
    kernel
        .assert(Fact::new("permitted", vec!["/read".to_string(), "other.txt".to_string(), payload]))
        .await
        .unwrap();

    let executor = make_executor(kernel.clone());
    let result = executor.process("/query secret.txt", CancellationToken::new()).await.unwrap();

    assert_eq!(result.tool_calls_executed.len(), 1);
    assert!(!result.tool_calls_executed[0].admitted);
}

/// 60 tool calls offered, MaxToolCalls=50: exactly 50 dispatched.
#[tokio::test]
async fn max_tool_calls_cap() {
    let calls: Vec<ToolCall> = (0..60)
        .map(|i| {
            let mut args = BTreeMap::new();
            args.insert("path".to_string(), serde_json::json!(format!("f{i}.txt")));
            ToolCall { id: format!("call-{i}"), name: "read".to_string(), args }
        })
        .collect();

    let llm = MockLlmClient::new(vec![CompletionResult {
        text: "done".into(),
        tool_calls: calls,
        stop_reason: "tool_use".into(),
    }]);

    let kernel = Arc::new(InMemoryKernel::new());
    let executor = Executor::new(
        Arc::new(llm),
        Arc::new(create_default_registry(std::env::temp_dir())),
        kernel,
        Arc::new(WhitespaceTransducer::default()),
        Arc::new(BaselinePromptCompiler),
        Arc::new(AllowAllConfigFactory::new(vec!["read".to_string()])),
    );
    executor.set_config(ExecutorConfig { enable_safety_gate: false, ..Default::default() }).await;

    let result = executor.process("/query all the files", CancellationToken::new()).await.unwrap();

    assert_eq!(result.tool_calls_executed.len(), 50);
}

/// History never exceeds its configured cap.
#[tokio::test]
async fn history_cap_is_enforced_across_many_turns() {
    let llm = MockLlmClient::new((0..10).map(|i| CompletionResult { text: format!("reply {i}"), ..Default::default() }).collect());
    let executor = Executor::new(
        Arc::new(llm),
        Arc::new(create_default_registry(std::env::temp_dir())),
        Arc::new(InMemoryKernel::new()),
        Arc::new(WhitespaceTransducer::default()),
        Arc::new(BaselinePromptCompiler),
        Arc::new(AllowAllConfigFactory::new(vec![])),
    );
    executor.set_config(ExecutorConfig { history_cap: 4, ..Default::default() }).await;

    for i in 0..10 {
        executor.process(&format!("/general turn {i}"), CancellationToken::new()).await.unwrap();
    }

    assert_eq!(executor.get_history().await.len(), 4);
}
