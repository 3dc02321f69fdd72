//! Tool registry for MCP tools.
//!
//! Every tool is a variant of [`Tool`]; its definition and its handler are
//! both matched on the variant, so a registered tool always has a handler.

use crate::catalog::{NO_INDEX_MESSAGE, SchemaCatalog};
use crate::error::McpError;
use crate::extractor::{ExtractionReport, SchemaExtractor};
use crate::gateway::QueryGateway;
use crate::protocol::{CallToolResult, InputSchema, ToolAnnotations, ToolDefinition};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// The tools this server offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    GetTableList,
    SearchTables,
    GetTableSchema,
    ReadQuery,
    WriteQuery,
    ExplainQuery,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::GetTableList,
        Tool::SearchTables,
        Tool::GetTableSchema,
        Tool::ReadQuery,
        Tool::WriteQuery,
        Tool::ExplainQuery,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::GetTableList => "get_table_list",
            Tool::SearchTables => "search_tables",
            Tool::GetTableSchema => "get_table_schema",
            Tool::ReadQuery => "read_query",
            Tool::WriteQuery => "write_query",
            Tool::ExplainQuery => "explain_query",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn definition(&self) -> ToolDefinition {
        let (description, input_schema, read_only) = match self {
            Tool::GetTableList => (
                "List every table in the database with its comment and module.",
                InputSchema::empty(),
                true,
            ),
            Tool::SearchTables => (
                "Find tables whose name or comment contains the query text (case-insensitive).",
                InputSchema::empty().required_string("query", "Text to look for"),
                true,
            ),
            Tool::GetTableSchema => (
                "Describe one table: its comment, module and columns with type, length, \
                 primary key and nullability.",
                InputSchema::empty().required_string("tableName", "Name of the table"),
                true,
            ),
            Tool::ReadQuery => (
                "Run a SELECT statement and return the rows as JSON. A row limit is added \
                 when the statement has none.",
                InputSchema::empty().required_string("sql", "SELECT statement to run"),
                true,
            ),
            Tool::WriteQuery => (
                "Run an INSERT, UPDATE or DELETE statement and return the affected row count.",
                InputSchema::empty().required_string("sql", "Statement to run"),
                false,
            ),
            Tool::ExplainQuery => (
                "Show the database's execution plan for a statement without running it.",
                InputSchema::empty().required_string("sql", "Statement to explain"),
                true,
            ),
        };

        ToolDefinition {
            name: self.name().to_string(),
            description: description.to_string(),
            input_schema,
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(read_only),
                destructive_hint: Some(!read_only),
            }),
        }
    }
}

/// Services the tool handlers run against.
pub struct ToolContext {
    pub gateway: QueryGateway,
    pub catalog: SchemaCatalog,
    pub extractor: SchemaExtractor,
}

impl ToolContext {
    /// Extract the schema and, when it landed where the catalog reads from,
    /// reload the catalog.
    pub async fn extract_schema(
        &self,
        output_dir: Option<&Path>,
    ) -> Result<ExtractionReport, McpError> {
        let report = self.extractor.extract_and_save(output_dir).await?;
        if report.output_dir == self.catalog.store().root() {
            self.catalog.reload().await;
        }
        Ok(report)
    }
}

/// Registry of available MCP tools.
pub struct ToolRegistry {
    order: Vec<Tool>,
    tools: HashMap<String, (Tool, ToolDefinition)>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    /// Register every tool; `explain_query` only when `explain_enabled`.
    pub fn new(context: Arc<ToolContext>, explain_enabled: bool) -> Self {
        let mut registry = Self {
            order: Vec::new(),
            tools: HashMap::new(),
            context,
        };
        for tool in Tool::ALL {
            if tool == Tool::ExplainQuery && !explain_enabled {
                continue;
            }
            registry.register(tool);
        }
        registry
    }

    fn register(&mut self, tool: Tool) {
        self.order.push(tool);
        self.tools
            .insert(tool.name().to_string(), (tool, tool.definition()));
    }

    pub fn context(&self) -> &Arc<ToolContext> {
        &self.context
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|(_, def)| def)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tools in registration order.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.order
            .iter()
            .filter_map(|tool| self.get(tool.name()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|t| t.name()).collect()
    }

    /// Invoke a tool. Failures come back as an error result, never as `Err`.
    pub async fn call(&self, name: &str, arguments: &Value) -> CallToolResult {
        let outcome = match self.tools.get(name) {
            Some((tool, _)) => self.invoke(*tool, arguments).await,
            None => Err(McpError::ToolNotFound {
                name: name.to_string(),
            }),
        };

        match outcome {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Tool call failed");
                CallToolResult::error(e.tool_text())
            }
        }
    }

    async fn invoke(&self, tool: Tool, args: &Value) -> Result<String, McpError> {
        let ctx = &self.context;
        let text = match tool {
            Tool::GetTableList => match ctx.catalog.list().await? {
                Some(entries) => serde_json::to_string(&entries)?,
                None => serde_json::to_string(NO_INDEX_MESSAGE)?,
            },
            Tool::SearchTables => {
                let query = required_arg(tool, args, "query")?;
                serde_json::to_string(&ctx.catalog.search(&query).await?)?
            }
            Tool::GetTableSchema => {
                let table_name = required_arg(tool, args, "tableName")?;
                serde_json::to_string(&ctx.catalog.get_table_schema(&table_name).await?)?
            }
            Tool::ReadQuery => {
                let sql = required_arg(tool, args, "sql")?;
                serde_json::to_string(&ctx.gateway.read(&sql).await?)?
            }
            Tool::WriteQuery => {
                let sql = required_arg(tool, args, "sql")?;
                let affected = ctx.gateway.write(&sql).await?;
                json!({ "affectedRows": affected }).to_string()
            }
            Tool::ExplainQuery => {
                let sql = required_arg(tool, args, "sql")?;
                ctx.gateway.explain(&sql).await.to_string()
            }
        };
        Ok(text)
    }
}

/// Presence check only: non-string values are passed on as their JSON text.
fn required_arg(tool: Tool, args: &Value, key: &str) -> Result<String, McpError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(McpError::MissingArgument {
            tool: tool.name().to_string(),
            argument: key.to_string(),
        }),
        Some(other) => Ok(other.to_string()),
    }
}
