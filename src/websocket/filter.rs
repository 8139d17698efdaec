use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::WsClient;
use crate::di::{Component, Injectable};
use crate::exception::{CatchType, Exception};

/// What a WebSocket filter can see about the failed message.
#[derive(Debug, Clone)]
pub struct WsArgumentsHost {
    client: Arc<WsClient>,
    event: Option<String>,
}

impl WsArgumentsHost {
    pub fn new(client: Arc<WsClient>, event: Option<String>) -> Self {
        Self { client, event }
    }

    pub fn client(&self) -> &Arc<WsClient> {
        &self.client
    }

    /// The event being handled, if the message got far enough to name one.
    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }
}

/// Recovers from a failure raised by a message handler, usually by sending
/// an error frame to the client.
#[async_trait]
pub trait WsExceptionFilter: Send + Sync + 'static {
    /// Failure types handled by this filter. Empty catches everything.
    fn catches(&self) -> Vec<CatchType> {
        Vec::new()
    }

    async fn catch(&self, exception: &Exception, host: &WsArgumentsHost);
}

impl Component<dyn WsExceptionFilter> {
    pub fn of<F: WsExceptionFilter + Injectable>() -> Self {
        Self::from_class::<F>(|filter| filter as Arc<dyn WsExceptionFilter>)
    }

    pub fn instance<F: WsExceptionFilter>(filter: F) -> Self {
        Self::named_instance(std::any::type_name::<F>(), Arc::new(filter))
    }
}

/// A resolved WebSocket filter with its catch list.
#[derive(Clone)]
pub struct BoundWsFilter {
    name: &'static str,
    filter: Arc<dyn WsExceptionFilter>,
    catches: Vec<CatchType>,
}

impl BoundWsFilter {
    pub fn new(name: &'static str, filter: Arc<dyn WsExceptionFilter>) -> Self {
        let catches = filter.catches();
        Self {
            name,
            filter,
            catches,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handles(&self, exception: &Exception) -> bool {
        self.catches.is_empty() || self.catches.iter().any(|catch| catch.matches(exception))
    }

    pub fn filter(&self) -> &Arc<dyn WsExceptionFilter> {
        &self.filter
    }
}

impl fmt::Debug for BoundWsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundWsFilter")
            .field("name", &self.name)
            .field("catches", &self.catches)
            .finish()
    }
}

/// Fallback WebSocket filter: sends `{event: "error", data: {error, message}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseWsExceptionFilter;

impl BaseWsExceptionFilter {
    pub fn frame(exception: &Exception) -> Value {
        let (error, message) = match (exception.status(), exception.response()) {
            (Some(status), Some(Value::Object(payload))) => (
                payload
                    .get("error")
                    .cloned()
                    .unwrap_or_else(|| json!(status.canonical_reason())),
                payload
                    .get("message")
                    .cloned()
                    .unwrap_or_else(|| json!("An internal server error occurred.")),
            ),
            (Some(status), Some(payload)) => (json!(status.canonical_reason()), payload.clone()),
            _ => (
                json!("Internal Server Error"),
                json!("An internal server error occurred."),
            ),
        };
        json!({
            "event": "error",
            "data": { "error": error, "message": message },
        })
    }
}

#[async_trait]
impl WsExceptionFilter for BaseWsExceptionFilter {
    async fn catch(&self, exception: &Exception, host: &WsArgumentsHost) {
        if !exception.is_structured() {
            tracing::error!(
                "Unhandled WebSocket exception on {}: {:?}",
                host.event().unwrap_or("<unknown>"),
                exception
            );
        }
        host.client().send_json(&Self::frame(exception));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::HttpException;

    #[test]
    fn structured_frames_keep_error_and_message() {
        let frame = BaseWsExceptionFilter::frame(&HttpException::bad_request("Invalid JSON").into());
        assert_eq!(
            frame,
            json!({"event": "error", "data": {"error": "Bad Request", "message": "Invalid JSON"}})
        );
    }

    #[tokio::test]
    async fn unstructured_failures_are_generic() {
        let (client, mut rx) = WsClient::new();
        let host = WsArgumentsHost::new(client, Some("get-data".into()));
        BaseWsExceptionFilter.catch(&Exception::msg("db down"), &host).await;

        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["data"]["error"], "Internal Server Error");
        assert_eq!(frame["data"]["message"], "An internal server error occurred.");
    }
}
