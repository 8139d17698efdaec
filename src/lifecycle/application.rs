//! Application Bootstrap
//!
//! Compiles the module graph, instantiates every singleton, runs the
//! lifecycle phases and wires the dispatcher.

use super::{LifecycleManager, ShutdownHandler, shutdown_signal};
use crate::config::AppConfig;
use crate::di::{Component, Container, ResolutionContext, Scope, SingletonCache, Token};
use crate::dispatcher::{Dispatcher, StaticAssets};
use crate::error::{DiError, Result};
use crate::exception::ExceptionFilter;
use crate::guard::Guard;
use crate::interceptor::Interceptor;
use crate::middleware::Middleware;
use crate::module::{Module, ModuleCompiler, ModuleDef, ModuleGraph, ModuleId};
use crate::plan::{GlobalEnhancers, PlanBuilder};
use crate::websocket::{WsExceptionFilter, WsRouter, WsServer};
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// A bootstrapped application
///
/// # Example
///
/// ```rust,ignore
/// use keel::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> keel::Result<()> {
///     let app = Application::builder::<AppModule>()
///         .use_global_interceptors([Component::<dyn Interceptor>::of::<LoggingInterceptor>()])
///         .use_static_assets("public", "/static")
///         .build()
///         .await?;
///
///     app.listen().await
/// }
/// ```
pub struct Application {
    graph: Arc<ModuleGraph>,
    container: Container,
    lifecycle_manager: Arc<LifecycleManager>,
    dispatcher: Dispatcher,
    ws_router: Arc<WsRouter>,
    config: AppConfig,
}

impl Application {
    /// Create a builder rooted at module `M`
    pub fn builder<M: Module>() -> ApplicationBuilder {
        ApplicationBuilder::new(ModuleDef::of::<M>())
    }

    /// Resolves `T` from the first module that declares it
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let ctx = self.declaring_context(&Token::of::<T>())?;
        Ok(self.container.get::<T>(&ctx)?)
    }

    /// Resolves a trait object bound with `Provider::bind`
    pub fn get_dyn<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let ctx = self.declaring_context(&Token::of::<T>())?;
        Ok(self.container.get_dyn::<T>(&ctx)?)
    }

    /// Resolves `T` as seen from module `M`, with visibility checks
    pub fn get_in<M: Module, T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let ctx = ResolutionContext::new(&self.graph, ModuleId::of::<M>());
        Ok(self.container.get::<T>(&ctx)?)
    }

    fn declaring_context(&self, token: &Token) -> Result<ResolutionContext<'_>> {
        let record = self
            .graph
            .declaring_module(token)
            .ok_or_else(|| DiError::ProviderNotFound {
                token: token.to_string(),
                module: self.graph.root().name().to_string(),
            })?;
        Ok(ResolutionContext::new(&self.graph, record.id()))
    }

    /// An axum router that hands every request to the dispatcher
    pub fn router(&self) -> Router {
        let dispatcher = self.dispatcher.clone();
        Router::new()
            .fallback(move |request: Request<Body>| {
                let dispatcher = dispatcher.clone();
                async move { dispatcher.dispatch(request).await }
            })
            .layer(TraceLayer::new_for_http())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn ws_router(&self) -> &Arc<WsRouter> {
        &self.ws_router
    }

    pub fn ws_server(&self) -> &Arc<WsServer> {
        self.ws_router.server()
    }

    pub fn graph(&self) -> &Arc<ModuleGraph> {
        &self.graph
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn lifecycle_manager(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle_manager
    }

    /// Create a shutdown handler for graceful shutdown
    pub fn shutdown_handler(&self) -> ShutdownHandler {
        ShutdownHandler::new(Arc::clone(&self.lifecycle_manager), self.config.hook_timeout)
    }

    /// Serve on the configured address until SIGINT or SIGTERM, then run
    /// the shutdown hooks with the signal name.
    pub async fn listen(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.address()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `signal` completes
    pub async fn serve<F>(&self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = &'static str> + Send + 'static,
    {
        tracing::info!("Listening on {}", listener.local_addr()?);

        let (sender, receiver) = tokio::sync::oneshot::channel();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = sender.send(signal.await);
            })
            .await?;

        let signal = receiver.await.ok();
        self.shutdown(signal).await
    }

    /// Run the shutdown hooks in reverse resolution order
    pub async fn shutdown(&self, signal: Option<&str>) -> Result<()> {
        tracing::info!("Shutting down application...");
        self.shutdown_handler().shutdown(signal).await?;
        Ok(())
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    root: ModuleDef,
    config: AppConfig,
    globals: GlobalEnhancers,
    static_assets: Vec<StaticAssets>,
    cache: Option<Arc<SingletonCache>>,
}

impl ApplicationBuilder {
    /// A builder for any root, including a `DynamicModule`
    pub fn new(root: impl Into<ModuleDef>) -> Self {
        Self {
            root: root.into(),
            config: AppConfig::default(),
            globals: GlobalEnhancers::default(),
            static_assets: Vec::new(),
            cache: None,
        }
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a singleton cache instead of starting from an empty one
    pub fn singleton_cache(mut self, cache: Arc<SingletonCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn use_global_middleware(
        mut self,
        middleware: impl IntoIterator<Item = Component<dyn Middleware>>,
    ) -> Self {
        self.globals.middleware.extend(middleware);
        self
    }

    pub fn use_global_guards(mut self, guards: impl IntoIterator<Item = Component<dyn Guard>>) -> Self {
        self.globals.guards.extend(guards);
        self
    }

    pub fn use_global_interceptors(
        mut self,
        interceptors: impl IntoIterator<Item = Component<dyn Interceptor>>,
    ) -> Self {
        self.globals.interceptors.extend(interceptors);
        self
    }

    pub fn use_global_filters(
        mut self,
        filters: impl IntoIterator<Item = Component<dyn ExceptionFilter>>,
    ) -> Self {
        self.globals.filters.extend(filters);
        self
    }

    pub fn use_global_ws_filters(
        mut self,
        filters: impl IntoIterator<Item = Component<dyn WsExceptionFilter>>,
    ) -> Self {
        self.globals.ws_filters.extend(filters);
        self
    }

    /// Serve files under `dir` at `prefix`
    pub fn use_static_assets(mut self, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.static_assets.push(StaticAssets::new(dir, prefix));
        self
    }

    /// Compile, instantiate and initialize the application
    ///
    /// Fails on the first compile, resolution or init/bootstrap error.
    pub async fn build(self) -> Result<Application> {
        let graph = Arc::new(ModuleCompiler::new(self.config.import_policy).compile(self.root)?);
        let container = Container::new(self.cache.unwrap_or_default());

        let mut lifecycle_manager = LifecycleManager::new();
        for record in graph.modules() {
            let ctx = ResolutionContext::new(&graph, record.id());
            for provider in record.providers() {
                if provider.scope() == Scope::Transient {
                    tracing::debug!("Deferring transient provider {}", provider.token());
                    continue;
                }
                let instance = container.resolve(provider.token(), &ctx)?;
                let hooks = provider.hooks().copied().unwrap_or_default();
                lifecycle_manager.register(provider.token().to_string(), instance, hooks);
            }
        }
        tracing::info!("Instantiated {} providers", lifecycle_manager.len());

        match self.config.hook_timeout {
            Some(timeout) => lifecycle_manager.call_module_init_with_timeout(timeout).await?,
            None => lifecycle_manager.call_module_init().await?,
        }

        let ws_server = Arc::new(WsServer::new());
        let ws_router = Arc::new(WsRouter::build(&graph, &container, &self.globals.ws_filters, ws_server)?);
        ws_router.init_gateways().await;

        let plans = PlanBuilder::new(&graph, &container, &self.globals).build()?;

        let dispatcher = Dispatcher::new(
            Arc::clone(&graph),
            container.clone(),
            plans,
            self.static_assets,
            self.config.body_limit,
            self.config.ws_path.clone(),
            Arc::clone(&ws_router),
        );

        match self.config.hook_timeout {
            Some(timeout) => lifecycle_manager.call_application_bootstrap_with_timeout(timeout).await?,
            None => lifecycle_manager.call_application_bootstrap().await?,
        }

        tracing::info!("Application successfully started");
        Ok(Application {
            graph,
            container,
            lifecycle_manager: Arc::new(lifecycle_manager),
            dispatcher,
            ws_router,
            config: self.config,
        })
    }
}
