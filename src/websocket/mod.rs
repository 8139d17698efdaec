//! WebSocket gateways.
//!
//! Clients send text frames shaped `{"event": "...", "data": ...}`. The
//! [`WsRouter`] looks the event up among the `#[subscribe_message]`
//! handlers of every gateway in the module graph and sends the handler's
//! reply back on the same socket. Failures go through the handler's
//! exception filters, then [`BaseWsExceptionFilter`].
//!
//! ```rust,ignore
//! #[gateway]
//! pub struct EventsGateway;
//!
//! #[messages]
//! impl EventsGateway {
//!     #[subscribe_message("get-data")]
//!     async fn get_data(&self, #[message_body] body: Value) -> WsResponse {
//!         WsResponse::new("data-reply", json!({ "id": body["id"] }))
//!     }
//! }
//! ```

mod filter;
mod gateway;
mod router;
mod server;

pub use filter::{BaseWsExceptionFilter, BoundWsFilter, WsArgumentsHost, WsExceptionFilter};
pub use gateway::{
    Gateway, GatewayDef, GatewayHooks, GatewayMetadata, MessageHandlerMetadata, OnGatewayConnection,
    OnGatewayDisconnect, OnGatewayInit, WsArgument, WsArguments, WsHandlerFn, WsHandlerResult, WsParam, WsReply,
    WsResponse,
};
pub use router::{MessagePlan, WsRouter};
pub use server::{WsClient, WsServer};
