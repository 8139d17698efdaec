//! Runs execution plans against inbound requests.
//!
//! Per request: static assets, route match, middleware, guards, then the
//! interceptor chain around argument binding, pipes and the handler. Any
//! failure is caught once and handed to the route's filters.

mod static_files;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{Request, header};
use axum::response::{IntoResponse, Response};

use crate::context::ExecutionContext;
use crate::controller::{Arguments, HandlerResult};
use crate::di::{Container, ResolutionContext};
use crate::exception::{ArgumentsHost, BaseExceptionFilter, Exception, HttpException, select_filter};
use crate::guard::check_guards;
use crate::interceptor::{CallHandler, run_interceptors};
use crate::middleware::{Next, run_middleware};
use crate::module::ModuleGraph;
use crate::pipe::{ArgumentMetadata, apply_pipes};
use crate::plan::{ExecutionPlan, RoutePlans};
use crate::request::HttpRequest;
use crate::router::RouteMatcher;
use crate::websocket::WsRouter;

pub use static_files::StaticAssets;

struct Inner {
    graph: Arc<ModuleGraph>,
    container: Container,
    plans: RoutePlans,
    static_assets: Vec<StaticAssets>,
    body_limit: usize,
    ws_path: String,
    ws_router: Arc<WsRouter>,
}

/// The request entry point; cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        graph: Arc<ModuleGraph>,
        container: Container,
        plans: RoutePlans,
        mut static_assets: Vec<StaticAssets>,
        body_limit: usize,
        ws_path: impl Into<String>,
        ws_router: Arc<WsRouter>,
    ) -> Self {
        static_assets.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self {
            inner: Arc::new(Inner {
                graph,
                container,
                plans,
                static_assets,
                body_limit,
                ws_path: ws_path.into(),
                ws_router,
            }),
        }
    }

    pub fn plans(&self) -> &RoutePlans {
        &self.inner.plans
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let inner = &self.inner;

        if is_upgrade(&request) && request.uri().path() == inner.ws_path {
            return self.upgrade(request).await;
        }

        let (parts, body) = request.into_parts();
        if let Some(response) = static_files::serve(&inner.static_assets, &parts).await {
            return response;
        }

        let Some(matched) = inner.plans.router.match_route(&parts.method, parts.uri.path()) else {
            return BaseExceptionFilter::render(&HttpException::not_found("Not Found").into());
        };
        let body = match axum::body::to_bytes(body, inner.body_limit).await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Rejected request body: {}", e);
                return BaseExceptionFilter::render(
                    &HttpException::payload_too_large("Payload Too Large").into(),
                );
            }
        };
        let request = HttpRequest::new(parts, body);

        let Some(plan) = inner.plans.get(matched.route) else {
            tracing::error!("Execution plan not found for route: {}", request.path());
            return BaseExceptionFilter::render(
                &HttpException::internal_server_error(
                    "Internal Server Error: Route handler not configured correctly.",
                )
                .into(),
            );
        };

        let request = Arc::new(request.with_params(matched.params));
        let plan = Arc::clone(plan);
        match self.run(Arc::clone(&plan), Arc::clone(&request)).await {
            Ok(response) => response,
            Err(exception) => self.recover(&plan, exception, request).await,
        }
    }

    fn run(&self, plan: Arc<ExecutionPlan>, request: Arc<HttpRequest>) -> futures::future::BoxFuture<'static, HandlerResult> {
        let dispatcher = self.clone();
        let guarded = {
            let plan = Arc::clone(&plan);
            let request = Arc::clone(&request);
            Next::new(move || Box::pin(async move { dispatcher.guarded(plan, request).await }))
        };
        run_middleware(&plan.middleware, request, guarded)
    }

    /// Guards, then the interceptors around the handler.
    async fn guarded(&self, plan: Arc<ExecutionPlan>, request: Arc<HttpRequest>) -> HandlerResult {
        let ctx = ExecutionContext::new(
            plan.controller.clone(),
            plan.handler_name,
            Arc::clone(&request),
            Arc::clone(&plan.metadata),
        );
        check_guards(&plan.guards, &ctx).await?;

        let dispatcher = self.clone();
        let handler = {
            let plan = Arc::clone(&plan);
            CallHandler::new(move || Box::pin(async move { dispatcher.invoke(plan, request).await }))
        };
        run_interceptors(&plan.interceptors, ctx, handler).await
    }

    /// Binds arguments, runs the pipes and calls the handler.
    async fn invoke(&self, plan: Arc<ExecutionPlan>, request: Arc<HttpRequest>) -> HandlerResult {
        let ctx = ResolutionContext::new(&self.inner.graph, plan.module);
        let controller = self.inner.container.resolve(&plan.controller, &ctx)?;

        let mut args = Vec::with_capacity(plan.params.len());
        for param in &plan.params {
            let value = param.extract(&request)?;
            let metadata = ArgumentMetadata {
                source: param.source,
                param_type: param.param_type,
                key: param.key.clone(),
            };
            args.push(apply_pipes(&plan.pipes, value, &metadata).await?);
        }

        plan.handler.call(controller, Arguments::new(args)).await
    }

    async fn recover(&self, plan: &ExecutionPlan, exception: Exception, request: Arc<HttpRequest>) -> Response {
        let host = ArgumentsHost::new(request);
        match select_filter(&plan.filters, &exception) {
            Some(filter) => {
                tracing::debug!("{} handles {}", filter.name(), exception);
                filter.filter().catch(&exception, &host).await
            }
            None => BaseExceptionFilter::render(&exception),
        }
    }

    async fn upgrade(&self, request: Request<Body>) -> Response {
        let (mut parts, _) = request.into_parts();
        match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => {
                let router = Arc::clone(&self.inner.ws_router);
                upgrade.on_upgrade(move |socket| router.serve(socket))
            }
            Err(rejection) => rejection.into_response(),
        }
    }
}

fn is_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.inner.plans.len())
            .field("static_assets", &self.inner.static_assets)
            .field("body_limit", &self.inner.body_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn require_send<T: Send>(_: T) {}

    #[test]
    fn dispatch_future_is_send() {
        let _ = |dispatcher: Dispatcher, request: Request<Body>| {
            require_send(async move { dispatcher.dispatch(request).await })
        };
    }
}
