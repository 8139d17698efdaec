//! # Keel
//!
//! A module-based web framework with dependency injection for Rust, built on axum.
//!
//! Applications are organized into modules that declare providers,
//! controllers and WebSocket gateways. At startup the module graph is
//! compiled, every singleton is instantiated, and each route gets an
//! execution plan: its middleware, guards, pipes, interceptors and
//! exception filters resolved once and reused for every request.
//!
//! ## Features
//!
//! - **Dependency Injection**: class, value and factory providers, trait object bindings, singleton and transient scopes
//! - **Modules**: imports, exports, global and dynamically configured modules
//! - **Controllers**: `#[get]`, `#[post]`, ... handlers with `#[param]`, `#[query]`, `#[body]` bindings
//! - **Request pipeline**: middleware, guards, pipes, interceptors and exception filters
//! - **WebSocket gateways**: event-based message handlers with pub/sub
//! - **Lifecycle hooks**: module init, application bootstrap and shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! // 1. Define your service
//! #[derive(Injectable)]
//! pub struct ItemService;
//!
//! impl ItemService {
//!     pub fn find(&self, id: u64) -> Value {
//!         json!({ "id": id, "name": format!("Item {}", id) })
//!     }
//! }
//!
//! // 2. Define your controller
//! #[controller(path = "/app")]
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
//!
//! // 3. Define your module
//! #[module(controllers = [AppController], providers = [ItemService])]
//! pub struct AppModule;
//!
//! // 4. Bootstrap your application
//! #[tokio::main]
//! async fn main() -> keel::Result<()> {
//!     let app = Application::builder::<AppModule>().build().await?;
//!     app.listen().await
//! }
//! ```

extern crate self as keel;

pub mod config;
pub mod context;
pub mod controller;
pub mod di;
pub mod dispatcher;
pub mod error;
pub mod exception;
pub mod guard;
pub mod interceptor;
pub mod lifecycle;
pub mod middleware;
pub mod module;
pub mod pipe;
pub mod plan;
pub mod request;
pub mod router;
pub mod websocket;

// Re-export core types
pub use di::{Component, Container, Injectable, Provider, Token};
pub use error::{Error, Result};
pub use lifecycle::{Application, ApplicationBuilder};
pub use module::{DynamicModule, Module};

// Re-export macros
pub use keel_macro::{Injectable, controller, gateway, messages, module, routes};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;
pub use axum::http;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Prelude module for convenient imports
///
/// ```
/// use keel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{AppConfig, ConfigModule, ConfigOptions, ConfigService};
    pub use crate::context::{ExecutionContext, Reflector};
    pub use crate::controller::{Arguments, Controller, HandlerResult, Responder};
    pub use crate::di::{Component, Container, Provider, Scope, Token};
    pub use crate::error::Error;
    pub use crate::exception::{
        ArgumentsHost, BaseExceptionFilter, CatchType, Exception, ExceptionFilter, HttpError,
        HttpException,
    };
    pub use crate::guard::Guard;
    pub use crate::interceptor::{CallHandler, FileInterceptor, Interceptor, LoggingInterceptor};
    pub use crate::lifecycle::{
        Application, ApplicationBuilder, LifecycleError, OnApplicationBootstrap,
        OnApplicationShutdown, OnModuleInit,
    };
    pub use crate::middleware::{Middleware, Next};
    pub use crate::module::{DynamicModule, Module, ModuleDef};
    pub use crate::pipe::{Argument, ArgumentMetadata, ParseIntPipe, Pipe, ValidationPipe};
    pub use crate::request::{HttpRequest, UploadedFile};
    pub use crate::websocket::{
        OnGatewayConnection, OnGatewayDisconnect, OnGatewayInit, WsArgumentsHost, WsClient,
        WsExceptionFilter, WsResponse, WsServer,
    };
    pub use crate::{Injectable, controller, gateway, messages, module, routes};
    pub use async_trait::async_trait;
    pub use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
