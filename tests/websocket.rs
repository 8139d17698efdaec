use keel::prelude::*;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, thiserror::Error)]
#[error("room {0} is closed")]
struct RoomClosed(String);

#[derive(Injectable)]
struct RoomFilter;

#[async_trait]
impl WsExceptionFilter for RoomFilter {
    fn catches(&self) -> Vec<CatchType> {
        vec![CatchType::of::<RoomClosed>()]
    }

    async fn catch(&self, exception: &Exception, host: &WsArgumentsHost) {
        host.client().send_json(&json!({
            "event": "room-error",
            "data": { "reason": exception.message(), "event": host.event() },
        }));
    }
}

#[gateway(on_init, on_connection, on_disconnect)]
struct EventsGateway {
    #[inject(default)]
    server: OnceLock<Arc<WsServer>>,
    #[inject(default)]
    connections: AtomicUsize,
}

#[messages]
impl EventsGateway {
    #[subscribe_message("get-data")]
    async fn get_data(&self, #[message_body] data: Value) -> WsResponse {
        let id = &data["id"];
        WsResponse::new("data-reply", json!({ "id": id, "data": format!("Data for {id}") }))
    }

    #[subscribe_message("join")]
    #[use_filters(RoomFilter)]
    async fn join(
        &self,
        #[connected_socket] client: Arc<WsClient>,
        #[message_body] room: String,
    ) -> Result<WsResponse, Exception> {
        if room == "closed" {
            return Err(Exception::new(RoomClosed(room)));
        }
        if let Some(server) = self.server.get() {
            server.subscribe(client.id(), room.clone());
        }
        Ok(WsResponse::new("joined", json!(room)))
    }

    #[subscribe_message("fail")]
    async fn fail(&self) -> Result<(), HttpException> {
        Err(HttpException::bad_request("nope"))
    }
}

#[async_trait]
impl OnGatewayInit for EventsGateway {
    async fn after_init(&self, server: Arc<WsServer>) {
        let _ = self.server.set(server);
    }
}

#[async_trait]
impl OnGatewayConnection for EventsGateway {
    async fn handle_connection(&self, _client: Arc<WsClient>) {
        self.connections.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OnGatewayDisconnect for EventsGateway {
    async fn handle_disconnect(&self, _client: Arc<WsClient>) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[module(gateways = [EventsGateway])]
struct EventsModule;

async fn app() -> Application {
    Application::builder::<EventsModule>().build().await.unwrap()
}

fn next_frame(outbound: &mut UnboundedReceiver<String>) -> Value {
    let frame = outbound.try_recv().unwrap();
    serde_json::from_str(&frame).unwrap()
}

#[tokio::test]
async fn replies_to_subscribed_events() {
    let app = app().await;
    let router = app.ws_router();
    let (client, mut outbound) = WsClient::new();

    router
        .handle_message(&client, r#"{"event":"get-data","data":{"id":123}}"#)
        .await;

    assert_eq!(
        next_frame(&mut outbound),
        json!({ "event": "data-reply", "data": { "id": 123, "data": "Data for 123" } })
    );
}

#[tokio::test]
async fn unknown_events_are_ignored() {
    let app = app().await;
    let (client, mut outbound) = WsClient::new();

    app.ws_router()
        .handle_message(&client, r#"{"event":"nobody-listens","data":1}"#)
        .await;
    app.ws_router().handle_message(&client, r#"{"data":1}"#).await;

    assert!(outbound.try_recv().is_err());
}

#[tokio::test]
async fn failures_go_through_filters() {
    let app = app().await;
    let (client, mut outbound) = WsClient::new();

    app.ws_router()
        .handle_message(&client, r#"{"event":"join","data":"closed"}"#)
        .await;
    assert_eq!(
        next_frame(&mut outbound),
        json!({ "event": "room-error", "data": { "reason": "room closed is closed", "event": "join" } })
    );

    app.ws_router()
        .handle_message(&client, r#"{"event":"fail"}"#)
        .await;
    assert_eq!(
        next_frame(&mut outbound),
        json!({ "event": "error", "data": { "error": "Bad Request", "message": "nope" } })
    );

    app.ws_router().handle_message(&client, "{not json").await;
    assert_eq!(
        next_frame(&mut outbound),
        json!({ "event": "error", "data": { "error": "Bad Request", "message": "Invalid JSON" } })
    );
}

#[tokio::test]
async fn connections_join_rooms_and_receive_publications() {
    let app = app().await;
    let router = app.ws_router();
    let gateway = app.get::<EventsGateway>().unwrap();

    let (alice, mut alice_out) = WsClient::new();
    let (bob, mut bob_out) = WsClient::new();
    router.handle_connection(&alice).await;
    router.handle_connection(&bob).await;
    assert_eq!(gateway.connections.load(Ordering::SeqCst), 2);
    assert_eq!(app.ws_server().client_count(), 2);

    router
        .handle_message(&alice, r#"{"event":"join","data":"lobby"}"#)
        .await;
    assert_eq!(next_frame(&mut alice_out), json!({ "event": "joined", "data": "lobby" }));

    assert_eq!(app.ws_server().publish("lobby", "hi"), 1);
    assert_eq!(alice_out.try_recv().unwrap(), "hi");
    assert!(bob_out.try_recv().is_err());

    router.handle_disconnect(&alice).await;
    assert_eq!(gateway.connections.load(Ordering::SeqCst), 1);
    assert_eq!(app.ws_server().subscribers("lobby"), 0);
}
