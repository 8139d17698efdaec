//! Middleware wraps the whole request chain and may short-circuit it.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::controller::HandlerResult;
use crate::di::{Component, Injectable};
use crate::request::HttpRequest;

/// The rest of the request chain after a middleware.
pub struct Next {
    run: Box<dyn FnOnce() -> BoxFuture<'static, HandlerResult> + Send>,
}

impl Next {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, HandlerResult> + Send + 'static,
    {
        Self { run: Box::new(run) }
    }

    /// Execute the next middleware, or the guarded handler after the last one.
    pub async fn run(self) -> HandlerResult {
        (self.run)().await
    }
}

/// The Middleware trait
///
/// A middleware that returns without calling [`Next::run`] ends the request
/// with its own response; nothing after it runs.
///
/// # Example
/// ```rust,ignore
/// #[derive(Injectable)]
/// pub struct ApiKeyMiddleware;
///
/// #[async_trait]
/// impl Middleware for ApiKeyMiddleware {
///     async fn handle(&self, request: Arc<HttpRequest>, next: Next) -> HandlerResult {
///         if request.header("x-api-key").is_none() {
///             return Ok((StatusCode::UNAUTHORIZED, "missing key").into_response());
///         }
///         next.run().await
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, request: Arc<HttpRequest>, next: Next) -> HandlerResult;
}

impl Component<dyn Middleware> {
    pub fn of<M: Middleware + Injectable>() -> Self {
        Self::from_class::<M>(|middleware| middleware as Arc<dyn Middleware>)
    }

    pub fn instance<M: Middleware>(middleware: M) -> Self {
        Self::named_instance(std::any::type_name::<M>(), Arc::new(middleware))
    }
}

/// Composes `middleware` right to left around `inner`, so the first entry
/// runs first.
pub fn run_middleware(
    middleware: &[Arc<dyn Middleware>],
    request: Arc<HttpRequest>,
    inner: Next,
) -> BoxFuture<'static, HandlerResult> {
    let next = middleware.iter().rev().fold(inner, |next, middleware| {
        let middleware = Arc::clone(middleware);
        let request = Arc::clone(&request);
        Next::new(move || Box::pin(async move { middleware.handle(request, next).await }))
    });
    Box::pin(next.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::test_request;
    use axum::http::Method;
    use axum::response::{IntoResponse, Response};
    use tokio::sync::Mutex;

    type Journal = Arc<Mutex<Vec<&'static str>>>;

    struct Step(&'static str, Journal, bool);

    #[async_trait]
    impl Middleware for Step {
        async fn handle(&self, _: Arc<HttpRequest>, next: Next) -> HandlerResult {
            self.1.lock().await.push(self.0);
            if self.2 {
                return Ok(self.0.into_response());
            }
            next.run().await
        }
    }

    fn handler(journal: &Journal) -> Next {
        let journal = Arc::clone(journal);
        Next::new(move || {
            Box::pin(async move {
                journal.lock().await.push("handler");
                Ok(Response::new("ok".into()))
            })
        })
    }

    fn request() -> Arc<HttpRequest> {
        Arc::new(test_request(Method::GET, "/", None, ""))
    }

    #[tokio::test]
    async fn runs_in_declaration_order() {
        let journal = Journal::default();
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Step("m1", Arc::clone(&journal), false)),
            Arc::new(Step("m2", Arc::clone(&journal), false)),
        ];

        run_middleware(&chain, request(), handler(&journal)).await.unwrap();
        assert_eq!(*journal.lock().await, ["m1", "m2", "handler"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let journal = Journal::default();
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Step("m1", Arc::clone(&journal), true)),
            Arc::new(Step("m2", Arc::clone(&journal), false)),
        ];

        let response = run_middleware(&chain, request(), handler(&journal)).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"m1");
        assert_eq!(*journal.lock().await, ["m1"]);
    }
}
