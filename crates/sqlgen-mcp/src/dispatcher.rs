//! Per-session JSON-RPC method dispatch.

use crate::protocol::*;
use crate::tools::ToolRegistry;
use serde_json::{Value, json};
use sqlgen_core::McpConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the server reports about itself in `initialize`.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

impl ServerIdentity {
    pub fn from_config(config: &McpConfig) -> Self {
        Self {
            name: config.server_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: config.protocol_version.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Unhandshaked,
    Active,
}

/// Routes one session's inbound messages to handlers.
///
/// Only requests produce a response. Notifications, responses, unknown
/// methods and unparseable input are logged and dropped. `tools/*` is
/// served before `initialize` as well.
pub struct ProtocolDispatcher {
    tools: Arc<ToolRegistry>,
    identity: ServerIdentity,
    initialized: AtomicBool,
}

impl ProtocolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>, identity: ServerIdentity) -> Self {
        Self {
            tools,
            identity,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> DispatcherState {
        if self.initialized.load(Ordering::Acquire) {
            DispatcherState::Active
        } else {
            DispatcherState::Unhandshaked
        }
    }

    /// Handle raw message text.
    pub async fn handle(&self, raw: &str) -> Option<JsonRpcResponse> {
        match JsonRpcMessage::parse(raw) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed MCP message");
                None
            }
        }
    }

    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        match message {
            JsonRpcMessage::Request(request) => self.handle_request(request).await,
            JsonRpcMessage::Notification(notification) => {
                tracing::debug!(method = %notification.method, "Received notification");
                None
            }
            JsonRpcMessage::Response(response) => {
                tracing::debug!(id = ?response.id, "Ignoring client response");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id)),
            "tools/list" => Some(self.handle_list_tools(id)),
            "tools/call" => Some(self.handle_call_tool(id, request.params).await),
            other => {
                tracing::warn!(method = %other, "Unknown MCP method");
                None
            }
        }
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        self.initialized.store(true, Ordering::Release);
        let result = InitializeResult {
            protocol_version: self.identity.protocol_version.clone(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: true },
                logging: Some(json!({})),
            },
            server_info: ServerInfo {
                name: self.identity.name.clone(),
                version: self.identity.version.clone(),
            },
        };
        tracing::info!(protocol_version = %result.protocol_version, "MCP session initialized");
        JsonRpcResponse::success(id, to_value(&result))
    }

    fn handle_list_tools(&self, id: Value) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: self.tools.list().into_iter().cloned().collect(),
        };
        JsonRpcResponse::success(id, to_value(&result))
    }

    async fn handle_call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let result = match params.map(serde_json::from_value::<CallToolParams>) {
            Some(Ok(params)) => {
                tracing::info!(tool = %params.name, "Calling tool");
                self.tools.call(&params.name, &params.arguments).await
            }
            Some(Err(e)) => CallToolResult::error(format!("InvalidArguments: {}", e)),
            None => CallToolResult::error("InvalidArguments: missing params"),
        };
        JsonRpcResponse::success(id, to_value(&result))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
