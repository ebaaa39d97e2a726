//! Core error type shared by every layer of the execution loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transducer failed to parse intent: {0}")]
    TransducerFailed(String),

    #[error("LLM generation failed: {0}")]
    GenerationFailed(String),

    #[error("spawn ceiling exceeded: {active}/{ceiling} active subagents")]
    SpawnCeilingExceeded { active: usize, ceiling: usize },

    #[error("subagent not found: {0}")]
    SubAgentNotFound(String),

    #[error("specialist config invalid: {0}")]
    SpecialistConfigInvalid(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
