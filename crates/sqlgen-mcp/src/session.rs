//! Sessions and their push channels.
//!
//! A session is created when a client opens the event stream and removed
//! when that stream goes away. Responses are delivered on the stream as
//! `message` events; commands arrive separately over HTTP POST.

use crate::dispatcher::{ProtocolDispatcher, ServerIdentity};
use crate::error::McpError;
use crate::protocol::JsonRpcResponse;
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

/// Event name for the first event of a stream, carrying the command URL.
pub const ENDPOINT_EVENT: &str = "endpoint";
/// Event name for JSON-RPC responses.
pub const MESSAGE_EVENT: &str = "message";

/// One event queued for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub event: String,
    pub data: String,
}

/// Server-to-client delivery for one session.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(&self, event: &str, payload: String) -> Result<(), McpError>;

    /// Whether the client side has gone away.
    fn is_closed(&self) -> bool;
}

/// Push channel backed by the queue an SSE stream drains.
pub struct SseChannel {
    tx: mpsc::Sender<PushEvent>,
    send_timeout: Duration,
}

impl SseChannel {
    pub fn new(capacity: usize, send_timeout: Duration) -> (Self, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, send_timeout }, rx)
    }
}

#[async_trait]
impl PushChannel for SseChannel {
    async fn send(&self, event: &str, payload: String) -> Result<(), McpError> {
        let event = PushEvent {
            event: event.to_string(),
            data: payload,
        };
        self.tx
            .send_timeout(event, self.send_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    McpError::TransportError("push timed out".to_string())
                }
                SendTimeoutError::Closed(_) => {
                    McpError::TransportError("push channel closed".to_string())
                }
            })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct Session {
    id: String,
    channel: Arc<dyn PushChannel>,
    dispatcher: ProtocolDispatcher,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn dispatcher(&self) -> &ProtocolDispatcher {
        &self.dispatcher
    }

    /// Dispatch one inbound message and push the response, if any.
    pub async fn on_message(&self, raw: &str) {
        if let Some(response) = self.dispatcher.handle(raw).await {
            self.deliver(&response).await;
        }
    }

    async fn deliver(&self, response: &JsonRpcResponse) {
        if self.channel.is_closed() {
            tracing::debug!(session_id = %self.id, "Client gone; dropping response");
            return;
        }
        let payload = match serde_json::to_string(response) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "Failed to serialize response");
                return;
            }
        };
        if let Err(e) = self.channel.send(MESSAGE_EVENT, payload).await {
            tracing::warn!(session_id = %self.id, error = %e, "Failed to push response");
        }
    }
}

/// All live sessions, keyed by id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    tools: Arc<ToolRegistry>,
    identity: ServerIdentity,
}

impl SessionRegistry {
    pub fn new(tools: Arc<ToolRegistry>, identity: ServerIdentity) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            tools,
            identity,
        }
    }

    /// Register a session bound to `channel` and return its fresh id.
    pub fn create(&self, channel: Arc<dyn PushChannel>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session {
            id: id.clone(),
            channel,
            dispatcher: ProtocolDispatcher::new(self.tools.clone(), self.identity.clone()),
            created_at: Utc::now(),
        });
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), session);
        id
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<Session>, McpError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| McpError::SessionNotFound(id.to_string()))
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its session from the registry when dropped.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: String,
}

impl SessionGuard {
    pub fn new(registry: Arc<SessionRegistry>, id: String) -> Self {
        Self { registry, id }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            tracing::info!(session_id = %self.id, "MCP client disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::context;
    use serde_json::{Value, json};
    use sqlgen_core::McpConfig;
    use sqlgen_core::executor::testing::ScriptedExecutor;

    fn registry(dir: &std::path::Path) -> Arc<SessionRegistry> {
        let tools = Arc::new(ToolRegistry::new(
            context(ScriptedExecutor::new("PostgreSQL"), dir, false),
            true,
        ));
        Arc::new(SessionRegistry::new(
            tools,
            ServerIdentity::from_config(&McpConfig::default()),
        ))
    }

    #[tokio::test]
    async fn test_create_lookup_remove() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = registry(dir.path());
        let (channel, _rx) = SseChannel::new(4, Duration::from_millis(100));

        let id = sessions.create(Arc::new(channel));
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions.lookup(&id).unwrap().id(), id);

        assert!(sessions.remove(&id));
        assert!(!sessions.remove(&id));
        assert!(matches!(sessions.lookup(&id), Err(McpError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = registry(dir.path());
        let (a, _ra) = SseChannel::new(1, Duration::from_millis(100));
        let (b, _rb) = SseChannel::new(1, Duration::from_millis(100));
        assert_ne!(sessions.create(Arc::new(a)), sessions.create(Arc::new(b)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_lookup_remove() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = registry(dir.path());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move {
                    let (channel, _rx) = SseChannel::new(1, Duration::from_millis(100));
                    let id = sessions.create(Arc::new(channel));
                    tokio::task::yield_now().await;
                    assert_eq!(sessions.lookup(&id).unwrap().id(), id);
                    assert!(sessions.remove(&id));
                    assert!(!sessions.remove(&id));
                    id
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 64);
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_response_goes_to_own_channel() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = registry(dir.path());
        let (a, mut rx_a) = SseChannel::new(4, Duration::from_millis(100));
        let (b, mut rx_b) = SseChannel::new(4, Duration::from_millis(100));
        let id_a = sessions.create(Arc::new(a));
        sessions.create(Arc::new(b));

        sessions
            .lookup(&id_a)
            .unwrap()
            .on_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#)
            .await;

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.event, MESSAGE_EVENT);
        let body: Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["id"], json!(1));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_pushes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = registry(dir.path());
        let (channel, mut rx) = SseChannel::new(4, Duration::from_millis(100));
        let id = sessions.create(Arc::new(channel));

        sessions
            .lookup(&id)
            .unwrap()
            .on_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = registry(dir.path());
        let (channel, rx) = SseChannel::new(4, Duration::from_millis(100));
        let id = sessions.create(Arc::new(channel));
        let session = sessions.lookup(&id).unwrap();
        drop(rx);

        session
            .on_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .await;
        assert!(session.channel.is_closed());
    }

    #[tokio::test]
    async fn test_full_channel_times_out() {
        let (channel, _rx) = SseChannel::new(1, Duration::from_millis(20));
        channel.send(MESSAGE_EVENT, "first".to_string()).await.unwrap();
        let err = channel.send(MESSAGE_EVENT, "second".to_string()).await.unwrap_err();
        assert!(matches!(err, McpError::TransportError(_)));
    }

    #[tokio::test]
    async fn test_guard_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = registry(dir.path());
        let (channel, _rx) = SseChannel::new(1, Duration::from_millis(100));
        let id = sessions.create(Arc::new(channel));

        drop(SessionGuard::new(sessions.clone(), id.clone()));
        assert!(sessions.is_empty());
    }
}
