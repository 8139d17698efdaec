use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{WsClient, WsExceptionFilter, WsServer};
use crate::di::{Component, Injectable, Instance, Provider, Token, short_type_name};
use crate::exception::{Exception, HttpException};

/// Called once the application is built, with the connection registry.
#[async_trait]
pub trait OnGatewayInit: Send + Sync {
    async fn after_init(&self, server: Arc<WsServer>);
}

/// Called for every new connection.
#[async_trait]
pub trait OnGatewayConnection: Send + Sync {
    async fn handle_connection(&self, client: Arc<WsClient>);
}

/// Called when a connection closes.
#[async_trait]
pub trait OnGatewayDisconnect: Send + Sync {
    async fn handle_disconnect(&self, client: Arc<WsClient>);
}

type InitHookFn = fn(Instance, Arc<WsServer>) -> BoxFuture<'static, ()>;
type ClientHookFn = fn(Instance, Arc<WsClient>) -> BoxFuture<'static, ()>;

/// The gateway hooks a class implements, in type-erased form.
#[derive(Clone, Copy, Default)]
pub struct GatewayHooks {
    on_init: Option<InitHookFn>,
    on_connection: Option<ClientHookFn>,
    on_disconnect: Option<ClientHookFn>,
}

impl GatewayHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init<T: OnGatewayInit + 'static>(mut self) -> Self {
        self.on_init = Some(call_init::<T>);
        self
    }

    pub fn on_connection<T: OnGatewayConnection + 'static>(mut self) -> Self {
        self.on_connection = Some(call_connection::<T>);
        self
    }

    pub fn on_disconnect<T: OnGatewayDisconnect + 'static>(mut self) -> Self {
        self.on_disconnect = Some(call_disconnect::<T>);
        self
    }

    pub(crate) fn init(&self, instance: Instance, server: Arc<WsServer>) -> Option<BoxFuture<'static, ()>> {
        self.on_init.map(|hook| hook(instance, server))
    }

    pub(crate) fn connection(&self, instance: Instance, client: Arc<WsClient>) -> Option<BoxFuture<'static, ()>> {
        self.on_connection.map(|hook| hook(instance, client))
    }

    pub(crate) fn disconnect(&self, instance: Instance, client: Arc<WsClient>) -> Option<BoxFuture<'static, ()>> {
        self.on_disconnect.map(|hook| hook(instance, client))
    }
}

impl fmt::Debug for GatewayHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayHooks")
            .field("on_init", &self.on_init.is_some())
            .field("on_connection", &self.on_connection.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}

fn call_init<T: OnGatewayInit + 'static>(instance: Instance, server: Arc<WsServer>) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        if let Ok(gateway) = instance.downcast::<T>() {
            gateway.after_init(server).await;
        }
    })
}

fn call_connection<T: OnGatewayConnection + 'static>(
    instance: Instance,
    client: Arc<WsClient>,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        if let Ok(gateway) = instance.downcast::<T>() {
            gateway.handle_connection(client).await;
        }
    })
}

fn call_disconnect<T: OnGatewayDisconnect + 'static>(
    instance: Instance,
    client: Arc<WsClient>,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        if let Ok(gateway) = instance.downcast::<T>() {
            gateway.handle_disconnect(client).await;
        }
    })
}

/// A class handling WebSocket messages by event name.
pub trait Gateway: Injectable {
    fn metadata() -> GatewayMetadata;
}

/// A gateway entry in a module's `gateways` list.
#[derive(Clone)]
pub struct GatewayDef {
    provider: Provider,
    metadata: fn() -> GatewayMetadata,
}

impl GatewayDef {
    pub fn of<G: Gateway>() -> Self {
        Self {
            provider: Provider::class::<G>(),
            metadata: G::metadata,
        }
    }

    pub fn token(&self) -> &Token {
        self.provider.token()
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn metadata(&self) -> GatewayMetadata {
        (self.metadata)()
    }
}

impl fmt::Debug for GatewayDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GatewayDef({})", self.token())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewayMetadata {
    pub filters: Vec<Component<dyn WsExceptionFilter>>,
    pub handlers: Vec<MessageHandlerMetadata>,
    pub hooks: GatewayHooks,
}

impl GatewayMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Component<dyn WsExceptionFilter>>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn handler(mut self, handler: MessageHandlerMetadata) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(mut self, handlers: impl IntoIterator<Item = MessageHandlerMetadata>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    pub fn hooks(mut self, hooks: GatewayHooks) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Where a message handler parameter takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum WsParam {
    /// The message's `data` field.
    Body,
    /// The sending client.
    Socket,
}

#[derive(Debug, Clone)]
pub enum WsArgument {
    Body(Value),
    Socket(Arc<WsClient>),
}

/// Bound message handler arguments, consumed by position.
#[derive(Debug, Default)]
pub struct WsArguments {
    values: Vec<Option<WsArgument>>,
}

impl WsArguments {
    pub fn new(values: Vec<WsArgument>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    fn take(&mut self, index: usize) -> Result<WsArgument, Exception> {
        self.values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| Exception::msg(format!("Message argument {} is not bound", index)))
    }

    pub fn body<T: DeserializeOwned>(&mut self, index: usize) -> Result<T, Exception> {
        match self.take(index)? {
            WsArgument::Body(value) => serde_json::from_value(value).map_err(|e| {
                HttpException::bad_request(format!("Invalid message body: {}", e)).into()
            }),
            WsArgument::Socket(_) => Err(Exception::msg(format!(
                "Message argument {} is the socket, not the body",
                index
            ))),
        }
    }

    pub fn socket(&mut self, index: usize) -> Result<Arc<WsClient>, Exception> {
        match self.take(index)? {
            WsArgument::Socket(client) => Ok(client),
            WsArgument::Body(_) => Err(Exception::msg(format!(
                "Message argument {} is the body, not the socket",
                index
            ))),
        }
    }
}

/// A reply frame: `{event, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsResponse {
    pub event: String,
    pub data: Value,
}

impl WsResponse {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// The frame a message handler's return value sends back, if any.
pub type WsHandlerResult = Result<Option<String>, Exception>;

/// Converts a message handler's return value into a reply frame.
pub trait WsReply {
    fn into_frame(self) -> WsHandlerResult;
}

impl WsReply for WsResponse {
    fn into_frame(self) -> WsHandlerResult {
        Ok(Some(serde_json::to_string(&self)?))
    }
}

impl WsReply for () {
    fn into_frame(self) -> WsHandlerResult {
        Ok(None)
    }
}

/// Sent as-is; `null` sends nothing.
impl WsReply for Value {
    fn into_frame(self) -> WsHandlerResult {
        match self {
            Value::Null => Ok(None),
            value => Ok(Some(value.to_string())),
        }
    }
}

impl WsReply for String {
    fn into_frame(self) -> WsHandlerResult {
        Ok(Some(self))
    }
}

impl<T: WsReply> WsReply for Option<T> {
    fn into_frame(self) -> WsHandlerResult {
        match self {
            Some(reply) => reply.into_frame(),
            None => Ok(None),
        }
    }
}

impl<T, E> WsReply for Result<T, E>
where
    T: WsReply,
    E: Into<Exception>,
{
    fn into_frame(self) -> WsHandlerResult {
        match self {
            Ok(reply) => reply.into_frame(),
            Err(error) => Err(error.into()),
        }
    }
}

type ErasedWsHandler = Arc<dyn Fn(Instance, WsArguments) -> BoxFuture<'static, WsHandlerResult> + Send + Sync>;

/// A message handler method, callable on a type-erased gateway instance.
#[derive(Clone)]
pub struct WsHandlerFn {
    call: ErasedWsHandler,
}

impl WsHandlerFn {
    pub fn new<G, F, Fut>(handler: F) -> Self
    where
        G: Send + Sync + 'static,
        F: Fn(Arc<G>, WsArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WsHandlerResult> + Send + 'static,
    {
        let call = move |instance: Instance, args: WsArguments| -> BoxFuture<'static, WsHandlerResult> {
            match instance.downcast::<G>() {
                Ok(gateway) => Box::pin(handler(gateway, args)),
                Err(_) => {
                    let class = short_type_name(std::any::type_name::<G>());
                    Box::pin(futures::future::ready(Err(Exception::msg(format!(
                        "Gateway instance is not a {}",
                        class
                    )))))
                }
            }
        };
        Self { call: Arc::new(call) }
    }

    pub fn call(&self, instance: Instance, args: WsArguments) -> BoxFuture<'static, WsHandlerResult> {
        (self.call)(instance, args)
    }
}

impl fmt::Debug for WsHandlerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WsHandlerFn")
    }
}

/// One `#[subscribe_message]` handler.
#[derive(Debug, Clone)]
pub struct MessageHandlerMetadata {
    pub event: String,
    pub handler_name: &'static str,
    pub params: Vec<WsParam>,
    pub filters: Vec<Component<dyn WsExceptionFilter>>,
    pub handler: WsHandlerFn,
}

impl MessageHandlerMetadata {
    pub fn new(event: impl Into<String>, handler_name: &'static str, handler: WsHandlerFn) -> Self {
        Self {
            event: event.into(),
            handler_name,
            params: Vec::new(),
            filters: Vec::new(),
            handler,
        }
    }

    pub fn param(mut self, param: WsParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Component<dyn WsExceptionFilter>>) -> Self {
        self.filters.extend(filters);
        self
    }
}
