//! Typed tool-call vocabulary.
//!
//! Tool parameters are a statically validated tagged union ([`ToolRequest`])
//! rather than runtime-checked generic maps: the LLM's raw `(name, arguments)`
//! pair is parsed once at the boundary and every layer below works with
//! concrete types. Parse failures are data — the agent sees them as tool
//! results and can correct itself.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Tool name: run a shell command inside the sandbox.
pub const TOOL_RUN_TERMINAL_COMMAND: &str = "run_terminal_command";
/// Tool name: create or overwrite a batch of files inside the sandbox.
pub const TOOL_CREATE_OR_UPDATE_FILES: &str = "create_or_update_files";
/// Tool name: read a batch of files from the sandbox.
pub const TOOL_READ_FILES: &str = "read_files";

/// One file to write: path plus full content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Path relative to the sandbox project root.
    pub path: String,
    /// Full file content (overwrites any existing file).
    pub content: String,
}

/// A parsed, statically typed tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolRequest {
    /// Execute a shell command.
    TerminalCommand {
        /// The command line to run.
        command: String,
    },
    /// Write one or more files (last write per path wins within the batch).
    CreateOrUpdateFiles {
        /// The files to write, applied in order.
        files: Vec<FileSpec>,
    },
    /// Read one or more files.
    ReadFiles {
        /// The paths to read.
        paths: Vec<String>,
    },
}

/// Failure to turn a raw `(name, arguments)` pair into a [`ToolRequest`].
#[derive(Debug, Error)]
pub enum ToolParseError {
    /// The model asked for a tool this orchestrator does not expose.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// The arguments did not match the tool's parameter schema.
    #[error("invalid parameters for {tool}: {source}")]
    InvalidParameters {
        /// The tool whose parameters failed validation.
        tool: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct TerminalParams {
    command: String,
}

#[derive(Deserialize)]
struct WriteFilesParams {
    files: Vec<FileSpec>,
}

#[derive(Deserialize)]
struct ReadFilesParams {
    paths: Vec<String>,
}

impl ToolRequest {
    /// Parse a raw tool call into a typed request.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolParseError> {
        let invalid = |source| ToolParseError::InvalidParameters {
            tool: name.to_owned(),
            source,
        };
        match name {
            TOOL_RUN_TERMINAL_COMMAND => {
                let params: TerminalParams =
                    serde_json::from_value(arguments.clone()).map_err(invalid)?;
                Ok(Self::TerminalCommand {
                    command: params.command,
                })
            }
            TOOL_CREATE_OR_UPDATE_FILES => {
                let params: WriteFilesParams =
                    serde_json::from_value(arguments.clone()).map_err(invalid)?;
                Ok(Self::CreateOrUpdateFiles {
                    files: params.files,
                })
            }
            TOOL_READ_FILES => {
                let params: ReadFilesParams =
                    serde_json::from_value(arguments.clone()).map_err(invalid)?;
                Ok(Self::ReadFiles {
                    paths: params.paths,
                })
            }
            other => Err(ToolParseError::UnknownTool {
                name: other.to_owned(),
            }),
        }
    }

    /// The wire name of this tool.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TerminalCommand { .. } => TOOL_RUN_TERMINAL_COMMAND,
            Self::CreateOrUpdateFiles { .. } => TOOL_CREATE_OR_UPDATE_FILES,
            Self::ReadFiles { .. } => TOOL_READ_FILES,
        }
    }
}

/// JSON-schema descriptor for one tool, as sent to the LLM.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name the model calls it by.
    pub name: String,
    /// Natural-language description of what the tool does.
    pub description: String,
    /// JSON schema of the parameters object.
    pub parameters: Value,
}

/// Definitions of the three sandbox tools exposed to the agent.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: TOOL_RUN_TERMINAL_COMMAND.to_owned(),
            description: "Run a shell command inside the sandbox and return its output."
                .to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The command line to execute"
                    }
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: TOOL_CREATE_OR_UPDATE_FILES.to_owned(),
            description: "Create or overwrite files in the sandbox. Each entry replaces the full file content.".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": {"type": "string"},
                                "content": {"type": "string"}
                            },
                            "required": ["path", "content"]
                        }
                    }
                },
                "required": ["files"]
            }),
        },
        ToolDefinition {
            name: TOOL_READ_FILES.to_owned(),
            description: "Read files from the sandbox and return their contents.".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "paths": {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                },
                "required": ["paths"]
            }),
        },
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
