//! WebSocket remote store client
//!
//! Each call is one short exchange: connect, send a request, wait for the
//! reply carrying the same request ID, close. The whole exchange is bounded
//! by a timeout so a hung server delays only the key being fetched.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::message::{ClientMessage, ServerMessage};
use super::{RemoteError, RemoteResult, RemoteStore};
use crate::registry::Partition;

/// Remote store reached over WebSocket
#[derive(Debug, Clone)]
pub struct WsRemote {
    url: String,
    timeout: Duration,
}

impl WsRemote {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request and wait for its reply
    async fn call(&self, request: ClientMessage) -> RemoteResult<ServerMessage> {
        match tokio::time::timeout(self.timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.timeout)),
        }
    }

    async fn exchange(&self, request: ClientMessage) -> RemoteResult<ServerMessage> {
        debug!("Connecting to {}", self.url);
        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RemoteError::Unreachable(format!("{}: {}", self.url, e)))?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Binary(request.encode()?))
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Binary(data)) => {
                    let reply = ServerMessage::decode(&data)?;
                    if reply.request_id() == request.request_id() {
                        write.close().await.ok();
                        return Ok(reply);
                    }
                    debug!(
                        "Ignoring reply for unknown request {}",
                        reply.request_id()
                    );
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return Err(RemoteError::Unreachable(e.to_string())),
            }
        }

        Err(RemoteError::Unreachable(format!(
            "{} closed the connection before replying",
            self.url
        )))
    }
}

impl RemoteStore for WsRemote {
    fn get<'a>(
        &'a self,
        key: &'a str,
        partition: &'a Partition,
    ) -> BoxFuture<'a, RemoteResult<Option<Value>>> {
        Box::pin(async move {
            match self.call(ClientMessage::get(partition.qualify(key))).await? {
                ServerMessage::Value { value, .. } => Ok(value),
                ServerMessage::Error { message, .. } => Err(RemoteError::Server(message)),
                ServerMessage::Ack { .. } => Err(RemoteError::Protocol(
                    "expected value, got ack".to_string(),
                )),
            }
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        partition: &'a Partition,
        value: Value,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            match self
                .call(ClientMessage::set(partition.qualify(key), value))
                .await?
            {
                ServerMessage::Ack { .. } => Ok(()),
                ServerMessage::Error { message, .. } => Err(RemoteError::Server(message)),
                ServerMessage::Value { .. } => Err(RemoteError::Protocol(
                    "expected ack, got value".to_string(),
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// Minimal remote store server backed by a map
    async fn spawn_server(store: Arc<Mutex<HashMap<String, Value>>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(Message::Binary(data))) = ws.next().await {
                        let reply = match ClientMessage::decode(&data).unwrap() {
                            ClientMessage::Get { request_id, key } => {
                                if key.contains("forbidden") {
                                    ServerMessage::Error {
                                        request_id,
                                        message: "permission denied".to_string(),
                                    }
                                } else {
                                    let value = store.lock().unwrap().get(&key).cloned();
                                    ServerMessage::Value { request_id, value }
                                }
                            }
                            ClientMessage::Set {
                                request_id,
                                key,
                                value,
                            } => {
                                store.lock().unwrap().insert(key, value);
                                ServerMessage::Ack { request_id }
                            }
                        };
                        ws.send(Message::Binary(reply.encode().unwrap()))
                            .await
                            .unwrap();
                    }
                });
            }
        });

        format!("ws://{}", addr)
    }

    /// Server that accepts connections and never answers
    async fn spawn_silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while ws.next().await.is_some() {}
                });
            }
        });

        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_set_then_get_over_websocket() {
        let store = Arc::new(Mutex::new(HashMap::new()));
        let url = spawn_server(store.clone()).await;
        let remote = WsRemote::new(&url, Duration::from_secs(5));
        let partition = Partition::Private("u1".to_string());

        assert_eq!(remote.get("results", &partition).await, Ok(None));

        remote
            .set("results", &partition, json!([{"score": 91}]))
            .await
            .unwrap();

        assert_eq!(
            remote.get("results", &partition).await,
            Ok(Some(json!([{"score": 91}])))
        );
        assert!(store.lock().unwrap().contains_key("private:u1:results"));
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let url = spawn_server(Arc::new(Mutex::new(HashMap::new()))).await;
        let remote = WsRemote::new(&url, Duration::from_secs(5));

        let result = remote.get("forbidden", &Partition::Shared).await;
        assert_eq!(
            result,
            Err(RemoteError::Server("permission denied".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = WsRemote::new(&format!("ws://{}", addr), Duration::from_secs(5));
        let result = remote.get("classes", &Partition::Shared).await;
        assert!(matches!(result, Err(RemoteError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let url = spawn_silent_server().await;
        let remote = WsRemote::new(&url, Duration::from_millis(200));

        let result = remote.get("classes", &Partition::Shared).await;
        assert_eq!(result, Err(RemoteError::Timeout(Duration::from_millis(200))));
    }

    #[test]
    fn test_memory_and_ws_share_the_trait() {
        fn assert_remote<T: RemoteStore>(_: &T) {}
        assert_remote(&MemoryRemote::new());
        assert_remote(&WsRemote::new("ws://localhost:1", Duration::from_secs(1)));
    }
}
