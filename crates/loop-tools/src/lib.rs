//! Tool Registry collaborator: `Tool` trait, `ToolRegistry`, and a default
//! catalog of workspace-I/O tools.

pub mod registry;
pub mod tools;

pub use registry::{Tool, ToolRegistry, ToolResult};

use std::path::Path;

/// Build the default tool registry with every builtin tool registered.
pub fn create_default_registry(workspace_root: impl AsRef<Path>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = workspace_root.as_ref();

    registry.register(tools::read::ReadTool::new(root));
    registry.register(tools::glob::GlobTool::new(root));
    registry.register(tools::grep::GrepTool::new(root));
    registry.register(tools::write::WriteTool::new(root));
    registry.register(tools::edit::EditTool::new(root));
    registry.register(tools::bash::BashTool::new(root));

    registry
}
