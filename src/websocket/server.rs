use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One connected WebSocket client.
///
/// Frames sent here are queued and written to the socket by the connection
/// task; sending to a closed connection is a no-op that returns `false`.
#[derive(Debug)]
pub struct WsClient {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

impl WsClient {
    /// A client plus the receiving end of its outbound queue.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self { id: Uuid::new_v4(), tx };
        (Arc::new(client), rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }

    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::error!("Failed to serialize frame for client {}: {}", self.id, e);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Registry of connected clients with topic-based broadcast.
#[derive(Debug, Default)]
pub struct WsServer {
    clients: DashMap<Uuid, Arc<WsClient>>,
    topics: DashMap<String, HashSet<Uuid>>,
}

impl WsServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: Arc<WsClient>) {
        self.clients.insert(client.id(), client);
    }

    /// Removes the client and all of its subscriptions.
    pub fn unregister(&self, id: Uuid) {
        self.clients.remove(&id);
        self.topics.iter_mut().for_each(|mut members| {
            members.remove(&id);
        });
        self.topics.retain(|_, members| !members.is_empty());
    }

    pub fn client(&self, id: Uuid) -> Option<Arc<WsClient>> {
        self.clients.get(&id).map(|client| Arc::clone(client.value()))
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn subscribe(&self, id: Uuid, topic: impl Into<String>) {
        self.topics.entry(topic.into()).or_default().insert(id);
    }

    pub fn unsubscribe(&self, id: Uuid, topic: &str) {
        if let Some(mut members) = self.topics.get_mut(topic) {
            members.remove(&id);
        }
        self.topics.remove_if(topic, |_, members| members.is_empty());
    }

    pub fn subscribers(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |members| members.len())
    }

    /// Sends `text` to every subscriber of `topic`. Returns how many
    /// clients it was queued for.
    pub fn publish(&self, topic: &str, text: &str) -> usize {
        let members: Vec<Uuid> = match self.topics.get(topic) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };
        members
            .into_iter()
            .filter_map(|id| self.client(id))
            .filter(|client| client.send_text(text))
            .count()
    }

    /// Sends `text` to every connected client.
    pub fn broadcast(&self, text: &str) -> usize {
        let clients: Vec<Arc<WsClient>> = self.clients.iter().map(|c| Arc::clone(c.value())).collect();
        clients.into_iter().filter(|client| client.send_text(text)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribers_only() {
        let server = WsServer::new();
        let (alice, mut alice_rx) = WsClient::new();
        let (bob, mut bob_rx) = WsClient::new();
        server.register(Arc::clone(&alice));
        server.register(Arc::clone(&bob));

        server.subscribe(alice.id(), "news");
        assert_eq!(server.publish("news", "hello"), 1);
        assert_eq!(alice_rx.recv().await.as_deref(), Some("hello"));
        assert!(bob_rx.try_recv().is_err());

        assert_eq!(server.broadcast("all"), 2);
        assert_eq!(bob_rx.recv().await.as_deref(), Some("all"));
    }

    #[test]
    fn unregister_drops_subscriptions() {
        let server = WsServer::new();
        let (client, _rx) = WsClient::new();
        server.register(Arc::clone(&client));
        server.subscribe(client.id(), "news");
        assert_eq!(server.subscribers("news"), 1);

        server.unregister(client.id());
        assert_eq!(server.client_count(), 0);
        assert_eq!(server.subscribers("news"), 0);
        assert_eq!(server.publish("news", "hello"), 0);
    }

    #[test]
    fn sending_to_a_closed_client_fails() {
        let (client, rx) = WsClient::new();
        drop(rx);
        assert!(client.is_closed());
        assert!(!client.send_text("lost"));
    }
}
