//! HTTP transport for MCP server.
//!
//! - `GET /sse` opens a session. The first event (`endpoint`) carries the
//!   URL commands must be POSTed to; responses follow as `message` events.
//! - `POST /messages?sessionId=<id>` (or `/messages/<id>`) delivers one
//!   JSON-RPC message. The reply is always an immediate `200 Accepted`;
//!   the outcome arrives on the event stream.
//! - The REST routes call the same catalog, query and extraction services
//!   the tools use.

use crate::error::McpError;
use crate::session::{ENDPOINT_EVENT, SessionGuard, SessionRegistry, SseChannel};
use crate::tools::ToolRegistry;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use sqlgen_core::McpConfig;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const SSE_BUFFER: usize = 100;
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// HTTP transport handler state.
pub struct HttpTransportState {
    pub sessions: Arc<SessionRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub config: McpConfig,
}

impl HttpTransportState {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        tools: Arc<ToolRegistry>,
        config: McpConfig,
    ) -> Self {
        Self {
            sessions,
            tools,
            config,
        }
    }
}

/// Query parameters of the command endpoint.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractQuery {
    #[serde(rename = "outputDir")]
    output_dir: Option<String>,
}

/// Create the HTTP router for MCP and the REST surface.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/sse", get(handle_sse))
        .route("/messages", post(handle_message_query))
        .route("/messages/{session_id}", post(handle_message_path))
        .route("/tables", get(handle_list_tables))
        .route("/tables/search", get(handle_search_tables))
        .route("/tables/{name}/schema", get(handle_table_schema))
        .route("/query/read", post(handle_read_query))
        .route("/query/write", post(handle_write_query))
        .route("/query/explain", post(handle_explain_query))
        .route("/schema/extract", post(handle_extract_schema))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for McpError {
    fn into_response(self) -> Response {
        let status = match &self {
            McpError::TableNotFound(_) | McpError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            McpError::MissingArgument { .. }
            | McpError::InvalidRequest(_)
            | McpError::InvalidTableName(_) => StatusCode::BAD_REQUEST,
            McpError::UnsupportedDialect(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}

/// Handle GET /sse: open a session and stream its events.
async fn handle_sse(State(state): State<Arc<HttpTransportState>>) -> impl IntoResponse {
    let (channel, mut rx) = SseChannel::new(
        SSE_BUFFER,
        Duration::from_millis(state.config.push_timeout_ms),
    );
    let session_id = state.sessions.create(Arc::new(channel));
    let endpoint = state.config.command_endpoint(&session_id);
    tracing::info!(session_id = %session_id, "New MCP client connected");

    let guard = SessionGuard::new(state.sessions.clone(), session_id);
    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().event(ENDPOINT_EVENT).data(endpoint));
        while let Some(event) = rx.recv().await {
            yield Ok(Event::default().event(event.event).data(event.data));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

async fn handle_message_query(
    State(state): State<Arc<HttpTransportState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    accept_command(&state, query.session_id.as_deref(), body)
}

async fn handle_message_path(
    State(state): State<Arc<HttpTransportState>>,
    Path(session_id): Path<String>,
    body: String,
) -> Response {
    accept_command(&state, Some(&session_id), body)
}

/// Hand the message to its session's dispatcher on a separate task.
fn accept_command(state: &HttpTransportState, session_id: Option<&str>, body: String) -> Response {
    let session = match session_id.map(|id| state.sessions.lookup(id)) {
        Some(Ok(session)) => session,
        _ => {
            tracing::warn!(session_id = ?session_id, "Command for unknown session");
            return (StatusCode::NOT_FOUND, "Session not found").into_response();
        }
    };

    tokio::spawn(async move {
        session.on_message(&body).await;
    });
    (StatusCode::OK, "Accepted").into_response()
}

async fn handle_index(State(state): State<Arc<HttpTransportState>>) -> String {
    format!(
        "{} {}\n\nSSE endpoint: GET /sse\n\
         Message endpoint: POST /messages?sessionId=<id>\n\
         Tools: {}\n",
        state.config.server_name,
        env!("CARGO_PKG_VERSION"),
        state.tools.names().join(", ")
    )
}

/// Handle health check requests.
async fn handle_health(State(state): State<Arc<HttpTransportState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.config.server_name,
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
    }))
}

async fn handle_list_tables(
    State(state): State<Arc<HttpTransportState>>,
) -> Result<Response, McpError> {
    let ctx = state.tools.context();
    Ok(match ctx.catalog.list().await? {
        Some(entries) => Json(entries).into_response(),
        None => (StatusCode::NOT_FOUND, crate::catalog::NO_INDEX_MESSAGE).into_response(),
    })
}

async fn handle_search_tables(
    State(state): State<Arc<HttpTransportState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, McpError> {
    let q = query.q.ok_or_else(|| McpError::MissingArgument {
        tool: "search_tables".to_string(),
        argument: "q".to_string(),
    })?;
    Ok(Json(state.tools.context().catalog.search(&q).await?))
}

async fn handle_table_schema(
    State(state): State<Arc<HttpTransportState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, McpError> {
    Ok(Json(state.tools.context().catalog.get_table_schema(&name).await?))
}

async fn handle_read_query(
    State(state): State<Arc<HttpTransportState>>,
    sql: String,
) -> Result<impl IntoResponse, McpError> {
    Ok(Json(state.tools.context().gateway.read(&sql).await?))
}

async fn handle_write_query(
    State(state): State<Arc<HttpTransportState>>,
    sql: String,
) -> Result<impl IntoResponse, McpError> {
    let affected = state.tools.context().gateway.write(&sql).await?;
    Ok(Json(json!({ "affectedRows": affected })))
}

async fn handle_explain_query(
    State(state): State<Arc<HttpTransportState>>,
    sql: String,
) -> impl IntoResponse {
    Json(state.tools.context().gateway.explain(&sql).await)
}

async fn handle_extract_schema(
    State(state): State<Arc<HttpTransportState>>,
    Query(query): Query<ExtractQuery>,
) -> Result<impl IntoResponse, McpError> {
    let output_dir = query.output_dir.map(PathBuf::from);
    let report = state
        .tools
        .context()
        .extract_schema(output_dir.as_deref())
        .await?;
    Ok(Json(report))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    config: McpConfig,
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    pub fn new(config: McpConfig, state: Arc<HttpTransportState>) -> Self {
        Self { config, state }
    }

    /// Run the HTTP server until Ctrl-C.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);
        let addr = self.config.bind_addr();

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("Failed to bind to {}: {}", addr, e)))?;

        tracing::info!(
            addr = %addr,
            endpoint = %self.config.command_endpoint("<session>"),
            "MCP HTTP server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| McpError::Internal(e.into()))?;

        tracing::info!("MCP HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ServerIdentity;
    use crate::tools::tests::context;
    use axum::body::Body;
    use axum::http::Request;
    use sqlgen_core::executor::testing::ScriptedExecutor;
    use tower::ServiceExt;

    fn app(executor: ScriptedExecutor, dir: &std::path::Path) -> (Router, Arc<HttpTransportState>) {
        let config = McpConfig::default();
        let tools = Arc::new(ToolRegistry::new(context(executor, dir, false), true));
        let sessions = Arc::new(SessionRegistry::new(
            tools.clone(),
            ServerIdentity::from_config(&config),
        ));
        let state = Arc::new(HttpTransportState::new(sessions, tools, config));
        (create_router(state.clone()), state)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(ScriptedExecutor::new("PostgreSQL"), dir.path());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_message_for_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(ScriptedExecutor::new("PostgreSQL"), dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/messages?sessionId=does-not-exist")
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Session not found");
    }

    #[tokio::test]
    async fn test_message_without_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(ScriptedExecutor::new("PostgreSQL"), dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/messages")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_message_is_accepted_and_pushed() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = app(ScriptedExecutor::new("PostgreSQL"), dir.path());
        let (channel, mut rx) = SseChannel::new(4, Duration::from_secs(1));
        let id = state.sessions.create(Arc::new(channel));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/messages/{}", id))
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Accepted");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["id"], json!(7));
        assert!(body["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn test_rest_table_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(ScriptedExecutor::new("PostgreSQL"), dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/tables/NONEXISTENT/schema")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "table 'NONEXISTENT' not found");
    }

    #[tokio::test]
    async fn test_rest_search_requires_query() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(ScriptedExecutor::new("PostgreSQL"), dir.path());

        let response = app
            .oneshot(Request::builder().uri("/tables/search").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rest_write_query() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(ScriptedExecutor::new("PostgreSQL").with_affected_rows(4), dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query/write")
                    .body(Body::from("DELETE FROM sessions"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"affectedRows":4}"#);
    }

    #[tokio::test]
    async fn test_rest_read_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(
            ScriptedExecutor::new("PostgreSQL").fail_on("nope", "relation \"nope\" does not exist"),
            dir.path(),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query/read")
                    .body(Body::from("SELECT * FROM nope"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "relation \"nope\" does not exist");
    }

    #[tokio::test]
    async fn test_rest_extract_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let (app, _) = app(
            ScriptedExecutor::new("PostgreSQL")
                .on_query("FROM pg_class", vec![json!({"table_name": "users", "remark": ""})]),
            dir.path(),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/schema/extract?outputDir={}", out.path().display()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(out.path().join("schema_index.json").exists());
        assert!(out.path().join("tables/users.json").exists());
    }
}
