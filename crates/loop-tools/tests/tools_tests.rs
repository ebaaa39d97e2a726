use loop_tools::create_default_registry;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(&dir);

    let write_result = registry
        .execute("write", json!({"file_path": "note.txt", "content": "hello universe"}))
        .await;
    assert!(!write_result.is_error(), "{write_result:?}");

    let read_result = registry.execute("read", json!({"file_path": "note.txt"})).await;
    assert!(read_result.to_content_string().contains("hello universe"));
}

#[tokio::test]
async fn edit_requires_unique_match() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(&dir);
    registry
        .execute("write", json!({"file_path": "dup.txt", "content": "a\na\n"}))
        .await;

    let result = registry
        .execute("edit", json!({"file_path": "dup.txt", "old_string": "a", "new_string": "b"}))
        .await;
    assert!(result.is_error());
}

#[tokio::test]
async fn unknown_tool_is_reported_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(&dir);
    let result = registry.execute("does-not-exist", json!({})).await;
    assert!(result.is_error());
}

#[tokio::test]
async fn bash_cancellation_kills_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(&dir);
    let cancel = CancellationToken::new();
    let inner = cancel.clone();

    let handle = tokio::spawn(async move {
        registry
            .execute_cancellable("bash", json!({"command": "sleep 10"}), inner)
            .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("cancellation should complete quickly")
        .unwrap();
    assert!(result.to_content_string().contains("killed"));
}
