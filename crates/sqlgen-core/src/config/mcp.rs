//! MCP server configuration.
//!
//! Controls the HTTP listener, the identity reported during the protocol
//! handshake, and push-channel delivery.

use serde::{Deserialize, Serialize};

/// Configuration for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// HTTP bind host.
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP port.
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Prefix used when advertising the command endpoint to a new session.
    /// When unset the advertised URL is a relative path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Server name reported in `initialize`.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Protocol version reported in `initialize`.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Whether the `explain_query` tool is registered.
    #[serde(default = "default_true")]
    pub explain_enabled: bool,

    /// Upper bound on how long a push-channel send may wait for buffer space.
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            public_url: None,
            server_name: default_server_name(),
            protocol_version: default_protocol_version(),
            explain_enabled: true,
            push_timeout_ms: default_push_timeout_ms(),
        }
    }
}

impl McpConfig {
    /// Socket address string to bind the HTTP listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The command-endpoint URL advertised to a freshly opened session.
    pub fn command_endpoint(&self, session_id: &str) -> String {
        let base = self
            .public_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or("");
        format!("{}/messages?sessionId={}", base, session_id)
    }
}

fn default_true() -> bool {
    true
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    7070
}

fn default_server_name() -> String {
    "sqlgen-mcp".to_string()
}

fn default_protocol_version() -> String {
    "2024-11-05".to_string()
}

fn default_push_timeout_ms() -> u64 {
    5000
}
