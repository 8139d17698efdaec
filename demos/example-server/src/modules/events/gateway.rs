use crate::modules::items::ItemService;
use keel::prelude::*;

/// Streams item lookups and room chat over `/ws`.
#[gateway(on_init, on_connection, on_disconnect)]
pub struct EventsGateway {
    items: Arc<ItemService>,
    #[inject(default)]
    server: std::sync::OnceLock<Arc<WsServer>>,
}

#[messages]
impl EventsGateway {
    #[subscribe_message("get-item")]
    async fn get_item(&self, #[message_body] body: Value) -> Result<WsResponse, HttpException> {
        let id = body["id"]
            .as_u64()
            .ok_or_else(|| HttpException::bad_request("id must be a number"))?;
        let item = self.items.get(id)?;
        Ok(WsResponse::new("item", json!(item)))
    }

    #[subscribe_message("join")]
    async fn join(&self, #[connected_socket] client: Arc<WsClient>, #[message_body] room: String) -> WsResponse {
        if let Some(server) = self.server.get() {
            server.subscribe(client.id(), room.clone());
        }
        WsResponse::new("joined", json!({ "room": room }))
    }

    #[subscribe_message("say")]
    async fn say(&self, #[message_body] body: Value) {
        let (Some(room), Some(text)) = (body["room"].as_str(), body["text"].as_str()) else {
            return;
        };
        if let Some(server) = self.server.get() {
            let frame = json!({ "event": "message", "data": { "room": room, "text": text } });
            server.publish(room, &frame.to_string());
        }
    }
}

#[async_trait]
impl OnGatewayInit for EventsGateway {
    async fn after_init(&self, server: Arc<WsServer>) {
        let _ = self.server.set(server);
        tracing::info!("Events gateway initialized");
    }
}

#[async_trait]
impl OnGatewayConnection for EventsGateway {
    async fn handle_connection(&self, client: Arc<WsClient>) {
        tracing::info!("Client connected: {}", client.id());
    }
}

#[async_trait]
impl OnGatewayDisconnect for EventsGateway {
    async fn handle_disconnect(&self, client: Arc<WsClient>) {
        tracing::info!("Client disconnected: {}", client.id());
    }
}
