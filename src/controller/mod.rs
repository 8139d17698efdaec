//! Controllers and the route metadata the plan builder reads.
//!
//! Controllers are normally declared through macros:
//! - `#[controller(path = "...")]` on the struct derives [`Injectable`] and
//!   records the base path and controller-level components
//! - `#[routes]` on the impl block generates [`Controller::metadata`] from
//!   `#[get]`, `#[post]`, ... handlers and their parameter bindings
//!
//! ```rust,ignore
//! #[controller(path = "/app", guards = [AuthGuard])]
//! pub struct AppController {
//!     items: Arc<ItemService>,
//! }
//!
//! #[routes]
//! impl AppController {
//!     #[get("/item/:id")]
//!     async fn item(&self, #[param("id")] id: u64) -> Value {
//!         self.items.find(id)
//!     }
//! }
//! ```

mod params;
mod responder;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use axum::response::Response;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::di::{Component, Injectable, Instance, Provider, Token, short_type_name};
use crate::exception::{Exception, ExceptionFilter};
use crate::guard::Guard;
use crate::interceptor::Interceptor;
use crate::middleware::Middleware;
use crate::pipe::Pipe;

pub use params::{Arguments, ParamMetadata, ParamSource, ParamType, ValidateFn};
pub use responder::Responder;

/// What every stage of the request pipeline produces.
pub type HandlerResult = Result<Response, Exception>;

/// A class with HTTP routes.
pub trait Controller: Injectable {
    fn metadata() -> ControllerMetadata;
}

/// A controller entry in a module's `controllers` list.
#[derive(Clone)]
pub struct ControllerDef {
    provider: Provider,
    metadata: fn() -> ControllerMetadata,
}

impl ControllerDef {
    pub fn of<C: Controller>() -> Self {
        Self {
            provider: Provider::class::<C>(),
            metadata: C::metadata,
        }
    }

    pub fn token(&self) -> &Token {
        self.provider.token()
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn metadata(&self) -> ControllerMetadata {
        (self.metadata)()
    }
}

impl fmt::Debug for ControllerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControllerDef({})", self.token())
    }
}

/// Controller-level declarations plus the routes.
#[derive(Debug, Clone, Default)]
pub struct ControllerMetadata {
    pub path: String,
    pub middleware: Vec<Component<dyn Middleware>>,
    pub guards: Vec<Component<dyn Guard>>,
    pub interceptors: Vec<Component<dyn Interceptor>>,
    pub filters: Vec<Component<dyn ExceptionFilter>>,
    pub routes: Vec<RouteMetadata>,
}

impl ControllerMetadata {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn middleware(mut self, middleware: impl IntoIterator<Item = Component<dyn Middleware>>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    pub fn guards(mut self, guards: impl IntoIterator<Item = Component<dyn Guard>>) -> Self {
        self.guards.extend(guards);
        self
    }

    pub fn interceptors(mut self, interceptors: impl IntoIterator<Item = Component<dyn Interceptor>>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Component<dyn ExceptionFilter>>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn route(mut self, route: RouteMetadata) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteMetadata>) -> Self {
        self.routes.extend(routes);
        self
    }
}

type ErasedHandler = Arc<dyn Fn(Instance, Arguments) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A handler method, callable on a type-erased controller instance.
#[derive(Clone)]
pub struct HandlerFn {
    call: ErasedHandler,
}

impl HandlerFn {
    pub fn new<C, F, Fut>(handler: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let call = move |instance: Instance, args: Arguments| -> BoxFuture<'static, HandlerResult> {
            match instance.downcast::<C>() {
                Ok(controller) => Box::pin(handler(controller, args)),
                Err(_) => {
                    let class = short_type_name(std::any::type_name::<C>());
                    Box::pin(futures::future::ready(Err(Exception::msg(format!(
                        "Controller instance is not a {}",
                        class
                    )))))
                }
            }
        };
        Self { call: Arc::new(call) }
    }

    pub fn call(&self, instance: Instance, args: Arguments) -> BoxFuture<'static, HandlerResult> {
        (self.call)(instance, args)
    }
}

impl fmt::Debug for HandlerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerFn")
    }
}

/// One handler: method, sub-path, bindings and handler-level declarations.
#[derive(Debug, Clone)]
pub struct RouteMetadata {
    pub method: Method,
    pub path: String,
    pub handler_name: &'static str,
    pub params: Vec<ParamMetadata>,
    pub middleware: Vec<Component<dyn Middleware>>,
    pub guards: Vec<Component<dyn Guard>>,
    pub pipes: Vec<Component<dyn Pipe>>,
    pub interceptors: Vec<Component<dyn Interceptor>>,
    pub filters: Vec<Component<dyn ExceptionFilter>>,
    pub metadata: HashMap<String, Value>,
    pub handler: HandlerFn,
}

impl RouteMetadata {
    pub fn new(method: Method, path: impl Into<String>, handler_name: &'static str, handler: HandlerFn) -> Self {
        Self {
            method,
            path: path.into(),
            handler_name,
            params: Vec::new(),
            middleware: Vec::new(),
            guards: Vec::new(),
            pipes: Vec::new(),
            interceptors: Vec::new(),
            filters: Vec::new(),
            metadata: HashMap::new(),
            handler,
        }
    }

    pub fn param(mut self, param: ParamMetadata) -> Self {
        self.params.push(param);
        self
    }

    pub fn middleware(mut self, middleware: impl IntoIterator<Item = Component<dyn Middleware>>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    pub fn guards(mut self, guards: impl IntoIterator<Item = Component<dyn Guard>>) -> Self {
        self.guards.extend(guards);
        self
    }

    pub fn pipes(mut self, pipes: impl IntoIterator<Item = Component<dyn Pipe>>) -> Self {
        self.pipes.extend(pipes);
        self
    }

    pub fn interceptors(mut self, interceptors: impl IntoIterator<Item = Component<dyn Interceptor>>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Component<dyn ExceptionFilter>>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Custom metadata, readable through `Reflector`.
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
