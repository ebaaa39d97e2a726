//! Core types, errors, and collaborator contracts for the universal
//! execution loop. Every other crate in the workspace depends on this one;
//! it depends on nothing in the workspace.

pub mod atom;
pub mod error;
pub mod tokens;
pub mod traits;
pub mod types;

pub use atom::NameAtom;
pub use error::{Error, Result};
pub use traits::{CompileResult, ConfigFactory, Kernel, PromptCompiler, Transducer};
pub use types::{
    AgentConfig, CompilationContext, ConversationTurn, ExecutionResult, Fact, Intent,
    OperationalMode, Role, SessionContext, SubAgentConfig, SubAgentType, ToolCall,
    ToolCallOutcome, ToolDefinition,
};
