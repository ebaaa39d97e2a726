//! Specialist-config loading — `./.nerd/agents/<name>/config.yaml`.
//!
//! Nested structs with `#[serde(default)]` throughout, so a config file can
//! specify only the fields it cares about and inherit sane defaults for
//! the rest, parsed with `serde_yaml`.

use loop_core::{AgentConfig, Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpecialistFile {
    pub identity_prompt: String,
    pub tools: SpecialistTools,
    pub policies: SpecialistPolicies,
    pub mode: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpecialistTools {
    pub allowed_tools: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpecialistPolicies {
    pub files: Vec<String>,
}

impl From<SpecialistFile> for AgentConfig {
    fn from(f: SpecialistFile) -> Self {
        AgentConfig {
            identity_prompt: f.identity_prompt,
            allowed_tools: f.tools.allowed_tools,
            policies: f.policies.files,
            mode: f.mode,
        }
    }
}

/// Reads and parses `<base_dir>/.nerd/agents/<name>/config.yaml`.
/// `Ok(None)` means the file is simply absent — that's the expected,
/// non-error "no specialist configured" case. A malformed file that exists
/// is an error, not a silent fallback.
pub async fn load_specialist(base_dir: &Path, name: &str) -> Result<Option<AgentConfig>> {
    let path = base_dir.join(".nerd").join("agents").join(name).join("config.yaml");
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };

    let parsed: SpecialistFile = serde_yaml::from_str(&contents)
        .map_err(|e| Error::SpecialistConfigInvalid(format!("{name}: {e}")))?;
    Ok(Some(parsed.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn absent_file_is_ok_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_specialist(dir.path(), "ghost").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn parses_valid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let agent_dir = dir.path().join(".nerd/agents/coder");
        std::fs::create_dir_all(&agent_dir).unwrap();
        let mut f = std::fs::File::create(agent_dir.join("config.yaml")).unwrap();
        writeln!(
            f,
            "identity_prompt: \"You are a coder.\"\ntools:\n  allowed_tools: [read, write]\npolicies:\n  files: [base.policy]\nmode: /active\n"
        )
        .unwrap();

        let config = load_specialist(dir.path(), "coder").await.unwrap().unwrap();
        assert_eq!(config.identity_prompt, "You are a coder.");
        assert_eq!(config.allowed_tools, vec!["read".to_string(), "write".to_string()]);
        assert_eq!(config.policies, vec!["base.policy".to_string()]);
    }

    #[tokio::test]
    async fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let agent_dir = dir.path().join(".nerd/agents/broken");
        std::fs::create_dir_all(&agent_dir).unwrap();
        std::fs::write(agent_dir.join("config.yaml"), "not: [valid: yaml: at all").unwrap();

        let result = load_specialist(dir.path(), "broken").await;
        assert!(result.is_err());
    }
}
