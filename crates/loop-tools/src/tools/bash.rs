//! Bash tool — execute shell commands with timeout and cancellation.

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct BashTool {
    workspace_root: PathBuf,
    default_timeout_secs: u64,
}

impl BashTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self { workspace_root: workspace_root.as_ref().to_path_buf(), default_timeout_secs: 120 }
    }
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command. Use for git, npm, docker, system commands. \
         Captures stdout and stderr. Set timeout in seconds (default 120)."
    }

    fn prompt(&self) -> &str {
        "Use the bash tool for terminal operations. Quote paths with spaces. \
         Prefer dedicated tools (read, write, edit, glob, grep) over bash equivalents."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The bash command to execute" },
                "timeout": { "type": "integer", "description": "Timeout in seconds (default 120, max 600)" },
                "description": { "type": "string", "description": "Short description of what this command does" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let command = match args["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: command"),
        };
        let timeout_secs = args["timeout"].as_u64().unwrap_or(self.default_timeout_secs).min(600);
        debug!(command = &command[..command.len().min(80)], "bash");

        let output = match tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            Command::new("bash").arg("-c").arg(command).current_dir(&self.workspace_root).output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::error(format!("Failed to execute: {e}")),
            Err(_) => return ToolResult::error(format!("Command timed out after {timeout_secs}s")),
        };

        format_output(&output)
    }

    /// On cancellation the child process is killed immediately rather than
    /// left to run to completion in the background.
    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolResult {
        let command = match args["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: command"),
        };
        let timeout_secs = args["timeout"].as_u64().unwrap_or(self.default_timeout_secs).min(600);

        let mut child = match Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolResult::error(format!("Failed to spawn: {e}")),
        };

        let timeout_duration = std::time::Duration::from_secs(timeout_secs);

        tokio::select! {
            result = async { tokio::time::timeout(timeout_duration, child.wait()).await } => {
                match result {
                    Ok(Ok(status)) => {
                        let stdout = read_pipe(child.stdout.take()).await;
                        let stderr = read_pipe(child.stderr.take()).await;
                        let output = std::process::Output {
                            status,
                            stdout: stdout.into_bytes(),
                            stderr: stderr.into_bytes(),
                        };
                        format_output(&output)
                    }
                    Ok(Err(e)) => ToolResult::error(format!("Failed to wait: {e}")),
                    Err(_) => {
                        let _ = child.kill().await;
                        ToolResult::error(format!("Command timed out after {timeout_secs}s"))
                    }
                }
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                ToolResult::text("[process killed by interrupt]")
            }
        }
    }
}

async fn read_pipe(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    use tokio::io::AsyncReadExt;
    match pipe {
        Some(mut p) => {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

fn format_output(output: &std::process::Output) -> ToolResult {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let result = if output.status.success() {
        if stderr.is_empty() {
            stdout.trim().to_string()
        } else {
            format!("{}\n{}", stdout.trim(), stderr.trim())
        }
    } else {
        format!("Exit code: {}\n{}\n{}", output.status.code().unwrap_or(-1), stdout.trim(), stderr.trim())
    };

    if result.is_empty() {
        ToolResult::text("(no output)")
    } else if result.len() > 30000 {
        ToolResult::text(format!("{}\n... [truncated, {} total chars]", &result[..30000], result.len()))
    } else {
        ToolResult::text(result)
    }
}
