//! MCP server implementation.
//!
//! Wires one upstream executor into the query gateway, schema extractor,
//! catalog, tool registry and session registry, and serves them over HTTP.

use crate::catalog::SchemaCatalog;
use crate::dispatcher::ServerIdentity;
use crate::error::McpError;
use crate::extractor::SchemaExtractor;
use crate::gateway::QueryGateway;
use crate::http_transport::{HttpServer, HttpTransportState, create_router};
use crate::session::SessionRegistry;
use crate::tools::{ToolContext, ToolRegistry};
use axum::Router;
use sqlgen_core::{QueryExecutor, SqlgenConfig};
use std::sync::Arc;

/// The MCP server.
pub struct McpServer {
    config: SqlgenConfig,
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionRegistry>,
}

impl McpServer {
    pub fn new(config: SqlgenConfig, executor: Arc<dyn QueryExecutor>) -> Self {
        let extractor = SchemaExtractor::new(executor.clone(), &config.schema.output_dir);
        let context = Arc::new(ToolContext {
            gateway: QueryGateway::new(executor, &config.query),
            catalog: SchemaCatalog::new(&config.schema, extractor.clone()),
            extractor,
        });
        let tools = Arc::new(ToolRegistry::new(context, config.mcp.explain_enabled));
        let sessions = Arc::new(SessionRegistry::new(
            tools.clone(),
            ServerIdentity::from_config(&config.mcp),
        ));

        tracing::info!(
            tools = tools.len(),
            schema_dir = %config.schema.output_dir.display(),
            "MCP server configured"
        );

        Self {
            config,
            tools,
            sessions,
        }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    fn state(&self) -> Arc<HttpTransportState> {
        Arc::new(HttpTransportState::new(
            self.sessions.clone(),
            self.tools.clone(),
            self.config.mcp.clone(),
        ))
    }

    /// The HTTP application, for embedding or testing.
    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    /// Start the MCP server.
    pub async fn run(&self) -> Result<(), McpError> {
        let dialect = self.tools.context().gateway.dialect();
        tracing::info!(
            dialect = %dialect,
            port = self.config.mcp.port,
            "Starting MCP server with HTTP transport"
        );
        if !dialect.supports_introspection() {
            tracing::warn!("Schema extraction is unavailable for this database");
        }
        // Warm the index so a broken file shows up in the startup log.
        self.tools.context().catalog.index().await;

        HttpServer::new(self.config.mcp.clone(), self.state())
            .run()
            .await
    }
}
