//! Error types for docsage.
//!
//! This module defines a unified error enum that covers every error category
//! in the workspace: configuration, I/O, document loading, index persistence,
//! query arguments, agent setup and tool routing.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for docsage.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Errors that concern a specific index or tool always carry its name.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base errors not covered by a more specific variant
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Source documents could not be materialized
    #[error("Load error ({}): {message}", path.display())]
    Load { path: PathBuf, message: String },

    /// Caller contract violation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Agent setup violation (duplicate tool names, reconfiguration)
    #[error("Agent configuration error: {0}")]
    AgentConfiguration(String),

    /// The router asked for a tool that was never registered
    #[error("Unknown tool: {tool}")]
    UnknownTool { tool: String },

    /// A registered tool failed while being invoked
    #[error("Tool '{tool}' failed: {message}")]
    ToolInvocation { tool: String, message: String },

    /// The routing capability failed or was unreachable
    #[error("Agent error: {0}")]
    Agent(String),

    /// Writing a persisted index failed; prior content is untouched
    #[error("Persistence error for index '{index_id}': {message}")]
    Persistence { index_id: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a `Load` error for a path.
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AppError::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build a `Persistence` error for an index.
    pub fn persistence(index_id: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Persistence {
            index_id: index_id.into(),
            message: message.into(),
        }
    }

    /// Build a `ToolInvocation` error for a tool.
    pub fn tool_invocation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ToolInvocation {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let err = AppError::persistence("papers", "disk full");
        assert_eq!(
            err.to_string(),
            "Persistence error for index 'papers': disk full"
        );

        let err = AppError::UnknownTool {
            tool: "lyft_10k".to_string(),
        };
        assert!(err.to_string().contains("lyft_10k"));

        let err = AppError::load("/tmp/missing.pdf", "path does not exist");
        assert!(err.to_string().contains("/tmp/missing.pdf"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
