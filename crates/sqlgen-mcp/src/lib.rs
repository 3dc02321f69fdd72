//! # sqlgen-mcp
//!
//! MCP (Model Context Protocol) server that lets an AI agent explore and
//! query a relational database.
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!   │  GET /sse                      ◄── endpoint event, then message events
//!   │  POST /messages?sessionId=...  ──► 200 Accepted
//!   ▼
//! ┌──────────────────────┐
//! │ SessionRegistry      │  one ProtocolDispatcher per session
//! │ ToolRegistry         │  get_table_list, search_tables, get_table_schema,
//! │                      │  read_query, write_query, explain_query
//! ├──────────┬───────────┤
//! │ Catalog  │ Gateway   │
//! │ (docs)   │ (SQL)     │
//! └────┬─────┴─────┬─────┘
//!      │           │
//!  docs/schema   upstream database
//!  (Extractor)
//! ```
//!
//! Schema documents are produced by [`SchemaExtractor`] and served by
//! [`SchemaCatalog`]; SQL goes through [`QueryGateway`].
//!
//! ## Example Usage
//!
//! ```ignore
//! use sqlgen_core::SqlgenConfig;
//! use sqlgen_mcp::McpServer;
//!
//! let config = SqlgenConfig::from_file("sqlgen.yaml")?;
//! let executor = PostgresExecutor::connect(&config.upstream).await?;
//! McpServer::new(config, Arc::new(executor)).run().await?;
//! ```

pub mod catalog;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod tools;

pub use catalog::SchemaCatalog;
pub use dispatcher::{DispatcherState, ProtocolDispatcher, ServerIdentity};
pub use error::McpError;
pub use extractor::{ExtractionReport, SchemaExtractor};
pub use gateway::QueryGateway;
pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    ToolAnnotations, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use session::{PushChannel, PushEvent, Session, SessionRegistry, SseChannel};
pub use store::SchemaStore;
pub use tools::{Tool, ToolContext, ToolRegistry};
