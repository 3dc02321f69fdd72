//! Error types for the MCP crate.

use sqlgen_core::ExecutorError;
use thiserror::Error;

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Tool not found.
    #[error("unknown tool: {name}")]
    ToolNotFound { name: String },

    /// A required argument is missing.
    #[error("missing argument '{argument}' for tool {tool}")]
    MissingArgument { tool: String, argument: String },

    /// Table not present in the schema documents or the live catalog.
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// Table name that cannot be stored as a document file.
    #[error("table name '{0}' cannot be stored as a document")]
    InvalidTableName(String),

    /// Session not registered (never opened, or already closed).
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Catalog introspection is not available for the dialect.
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// SQL execution failed.
    #[error("{0}")]
    Database(#[from] ExecutorError),

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    /// Short label prefixed to tool error text.
    pub fn category(&self) -> &'static str {
        match self {
            McpError::ToolNotFound { .. } => "UnknownTool",
            McpError::MissingArgument { .. }
            | McpError::InvalidRequest(_)
            | McpError::InvalidTableName(_) => "InvalidArguments",
            McpError::TableNotFound(_) | McpError::SessionNotFound(_) => "NotFound",
            McpError::UnsupportedDialect(_) => "UnsupportedDialect",
            McpError::Database(ExecutorError::Connection(_)) => "ConnectionError",
            McpError::Database(ExecutorError::Statement(_)) => "SqlError",
            McpError::SerializationError(_) => "SerializationError",
            McpError::IoError(_) => "IoError",
            McpError::StartupFailed(_) | McpError::TransportError(_) | McpError::Internal(_) => {
                "InternalError"
            }
        }
    }

    /// Text shown to the agent for a failed tool call.
    pub fn tool_text(&self) -> String {
        format!("{}: {}", self.category(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_text() {
        let err = McpError::Database(ExecutorError::Statement(
            "relation \"nope\" does not exist".to_string(),
        ));
        assert_eq!(err.tool_text(), "SqlError: relation \"nope\" does not exist");

        let err = McpError::MissingArgument {
            tool: "read_query".to_string(),
            argument: "sql".to_string(),
        };
        assert_eq!(
            err.tool_text(),
            "InvalidArguments: missing argument 'sql' for tool read_query"
        );
    }
}
