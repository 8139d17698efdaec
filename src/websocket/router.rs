use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::Value;

use super::{
    BaseWsExceptionFilter, BoundWsFilter, GatewayHooks, WsArgument, WsArguments, WsArgumentsHost, WsClient,
    WsExceptionFilter, WsHandlerFn, WsParam, WsServer,
};
use crate::di::{Component, Container, Instance, ResolutionContext, Token, Visibility};
use crate::error::Result;
use crate::exception::{Exception, HttpException};
use crate::module::ModuleGraph;

/// A resolved message handler.
pub struct MessagePlan {
    pub event: String,
    pub gateway: Token,
    pub handler_name: &'static str,
    pub instance: Instance,
    pub params: Vec<WsParam>,
    /// Global, then gateway, then handler filters.
    pub filters: Vec<BoundWsFilter>,
    pub handler: WsHandlerFn,
}

impl fmt::Debug for MessagePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePlan")
            .field("event", &self.event)
            .field("gateway", &self.gateway)
            .field("handler", &self.handler_name)
            .field("params", &self.params)
            .field("filters", &self.filters)
            .finish()
    }
}

struct GatewayEntry {
    token: Token,
    instance: Instance,
    hooks: GatewayHooks,
}

/// Routes inbound WebSocket messages `{event, data}` to gateway handlers.
pub struct WsRouter {
    handlers: HashMap<String, Arc<MessagePlan>>,
    gateways: Vec<GatewayEntry>,
    global_filters: Vec<BoundWsFilter>,
    server: Arc<WsServer>,
}

impl WsRouter {
    /// Resolves every gateway in the graph and indexes its handlers by event.
    ///
    /// A later handler for an already registered event replaces it.
    pub fn build(
        graph: &ModuleGraph,
        container: &Container,
        global_filters: &[Component<dyn WsExceptionFilter>],
        server: Arc<WsServer>,
    ) -> Result<Self> {
        let mut router = Self {
            handlers: HashMap::new(),
            gateways: Vec::new(),
            global_filters: Vec::new(),
            server,
        };

        let root = ResolutionContext::new(graph, graph.root().id());
        for component in global_filters {
            let filter = component.resolve(container, &root, Visibility::Bypass)?;
            router.global_filters.push(BoundWsFilter::new(component.name(), filter));
        }

        for record in graph.modules() {
            let ctx = ResolutionContext::new(graph, record.id());
            for gateway in record.gateways() {
                if router.gateways.iter().any(|entry| &entry.token == gateway.token()) {
                    continue;
                }
                let instance = container.resolve(gateway.token(), &ctx)?;
                let metadata = gateway.metadata();

                for handler in &metadata.handlers {
                    let mut filters = router.global_filters.clone();
                    for component in metadata.filters.iter().chain(&handler.filters) {
                        let filter = component.resolve(container, &ctx, Visibility::Bypass)?;
                        filters.push(BoundWsFilter::new(component.name(), filter));
                    }

                    let plan = MessagePlan {
                        event: handler.event.clone(),
                        gateway: gateway.token().clone(),
                        handler_name: handler.handler_name,
                        instance: Arc::clone(&instance),
                        params: handler.params.clone(),
                        filters,
                        handler: handler.handler.clone(),
                    };
                    if let Some(previous) = router.handlers.insert(handler.event.clone(), Arc::new(plan)) {
                        tracing::warn!(
                            "Event {} of {}::{} is overridden by {}::{}",
                            handler.event,
                            previous.gateway,
                            previous.handler_name,
                            gateway.token(),
                            handler.handler_name
                        );
                    } else {
                        tracing::info!("Mapped WebSocket event {}", handler.event);
                    }
                }

                router.gateways.push(GatewayEntry {
                    token: gateway.token().clone(),
                    instance,
                    hooks: metadata.hooks,
                });
            }
        }

        Ok(router)
    }

    pub fn server(&self) -> &Arc<WsServer> {
        &self.server
    }

    pub fn handler(&self, event: &str) -> Option<&Arc<MessagePlan>> {
        self.handlers.get(event)
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn gateway_count(&self) -> usize {
        self.gateways.len()
    }

    /// Runs `after_init` on every gateway that implements it.
    pub async fn init_gateways(&self) {
        for gateway in &self.gateways {
            if let Some(hook) = gateway.hooks.init(Arc::clone(&gateway.instance), Arc::clone(&self.server)) {
                tracing::debug!("Initializing gateway {}", gateway.token);
                hook.await;
            }
        }
    }

    /// Registers `client` and notifies every gateway.
    pub async fn handle_connection(&self, client: &Arc<WsClient>) {
        self.server.register(Arc::clone(client));
        for gateway in &self.gateways {
            if let Some(hook) = gateway.hooks.connection(Arc::clone(&gateway.instance), Arc::clone(client)) {
                hook.await;
            }
        }
    }

    /// Notifies every gateway, then forgets `client`.
    pub async fn handle_disconnect(&self, client: &Arc<WsClient>) {
        for gateway in &self.gateways {
            if let Some(hook) = gateway.hooks.disconnect(Arc::clone(&gateway.instance), Arc::clone(client)) {
                hook.await;
            }
        }
        self.server.unregister(client.id());
    }

    /// Dispatches one text frame from `client`.
    ///
    /// Messages without an `event` are ignored, as are unknown events.
    /// Malformed JSON and handler failures go through the filters.
    pub async fn handle_message(&self, client: &Arc<WsClient>, text: &str) {
        let message: Value = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(_) => {
                let exception: Exception = HttpException::bad_request("Invalid JSON").into();
                let host = WsArgumentsHost::new(Arc::clone(client), None);
                self.recover(&self.global_filters, &exception, &host).await;
                return;
            }
        };

        let Some(event) = message.get("event").and_then(Value::as_str) else {
            return;
        };
        let Some(plan) = self.handlers.get(event) else {
            tracing::warn!("No handler found for event: {}", event);
            return;
        };

        let data = message.get("data").cloned().unwrap_or(Value::Null);
        let args = plan
            .params
            .iter()
            .map(|param| match param {
                WsParam::Body => WsArgument::Body(data.clone()),
                WsParam::Socket => WsArgument::Socket(Arc::clone(client)),
            })
            .collect();

        match plan.handler.call(Arc::clone(&plan.instance), WsArguments::new(args)).await {
            Ok(Some(frame)) => {
                client.send_text(frame);
            }
            Ok(None) => {}
            Err(exception) => {
                let host = WsArgumentsHost::new(Arc::clone(client), Some(event.to_string()));
                self.recover(&plan.filters, &exception, &host).await;
            }
        }
    }

    async fn recover(&self, filters: &[BoundWsFilter], exception: &Exception, host: &WsArgumentsHost) {
        match filters.iter().find(|filter| filter.handles(exception)) {
            Some(filter) => filter.filter().catch(exception, host).await,
            None => BaseWsExceptionFilter.catch(exception, host).await,
        }
    }

    /// Drives an upgraded socket until it closes.
    pub async fn serve(self: Arc<Self>, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();
        let (client, mut outbound) = WsClient::new();

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        });

        self.handle_connection(&client).await;
        tracing::debug!("WebSocket client {} connected", client.id());

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => self.handle_message(&client, text.as_str()).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("WebSocket client {} errored: {}", client.id(), e);
                    break;
                }
            }
        }

        self.handle_disconnect(&client).await;
        writer.abort();
        tracing::debug!("WebSocket client {} disconnected", client.id());
    }
}

impl fmt::Debug for WsRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsRouter")
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .field("gateways", &self.gateways.len())
            .field("global_filters", &self.global_filters)
            .finish()
    }
}
