use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::ExecutionContext;
use crate::controller::HandlerResult;
use crate::di::{Component, Injectable};

mod file;
mod logging;

pub use file::FileInterceptor;
pub use logging::LoggingInterceptor;

/// Represents the rest of the interceptor chain, ending at the handler
pub struct CallHandler {
    run: Box<dyn FnOnce() -> BoxFuture<'static, HandlerResult> + Send>,
}

impl CallHandler {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, HandlerResult> + Send + 'static,
    {
        Self { run: Box::new(run) }
    }

    /// Execute the next interceptor, or the handler after the last one
    pub async fn handle(self) -> HandlerResult {
        (self.run)().await
    }
}

/// The Interceptor trait
///
/// Interceptors wrap the handler call. They can run logic before and after
/// it, replace its response, or skip it entirely.
///
/// # Example
/// ```rust,ignore
/// struct TimingInterceptor;
///
/// #[async_trait]
/// impl Interceptor for TimingInterceptor {
///     async fn intercept(&self, ctx: &ExecutionContext, next: CallHandler) -> HandlerResult {
///         let start = Instant::now();
///         let response = next.handle().await?;
///         tracing::debug!("{} took {:?}", ctx.handler(), start.elapsed());
///         Ok(response)
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, ctx: &ExecutionContext, next: CallHandler) -> HandlerResult;
}

impl Component<dyn Interceptor> {
    pub fn of<I: Interceptor + Injectable>() -> Self {
        Self::from_class::<I>(|interceptor| interceptor as Arc<dyn Interceptor>)
    }

    pub fn instance<I: Interceptor>(interceptor: I) -> Self {
        Self::named_instance(std::any::type_name::<I>(), Arc::new(interceptor))
    }
}

/// Wraps `handler` in `interceptors`, first-declared outermost.
pub fn run_interceptors(
    interceptors: &[Arc<dyn Interceptor>],
    ctx: ExecutionContext,
    handler: CallHandler,
) -> BoxFuture<'static, HandlerResult> {
    let next = interceptors.iter().rev().fold(handler, |next, interceptor| {
        let interceptor = Arc::clone(interceptor);
        let ctx = ctx.clone();
        CallHandler::new(move || Box::pin(async move { interceptor.intercept(&ctx, next).await }))
    });
    Box::pin(next.handle())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::test_request;
    use axum::http::Method;
    use axum::response::{IntoResponse, Response};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Around(&'static str, Journal);

    #[async_trait]
    impl Interceptor for Around {
        async fn intercept(&self, _: &ExecutionContext, next: CallHandler) -> HandlerResult {
            self.1.lock().await.push(format!("before {}", self.0));
            let response = next.handle().await;
            self.1.lock().await.push(format!("after {}", self.0));
            response
        }
    }

    struct Replace;

    #[async_trait]
    impl Interceptor for Replace {
        async fn intercept(&self, _: &ExecutionContext, _: CallHandler) -> HandlerResult {
            Ok("cached".into_response())
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            crate::di::Token::named("Test"),
            "handler",
            Arc::new(test_request(Method::GET, "/", None, "")),
            Arc::new(HashMap::new()),
        )
    }

    fn handler(journal: &Journal) -> CallHandler {
        let journal = Arc::clone(journal);
        CallHandler::new(move || {
            Box::pin(async move {
                journal.lock().await.push("handler".to_string());
                Ok(Response::new("ok".into()))
            })
        })
    }

    #[tokio::test]
    async fn first_interceptor_is_outermost() {
        let journal = Journal::default();
        let chain: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(Around("a", Arc::clone(&journal))),
            Arc::new(Around("b", Arc::clone(&journal))),
        ];

        run_interceptors(&chain, ctx(), handler(&journal)).await.unwrap();
        assert_eq!(
            *journal.lock().await,
            ["before a", "before b", "handler", "after b", "after a"]
        );
    }

    #[tokio::test]
    async fn interceptor_can_skip_the_handler() {
        let journal = Journal::default();
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Replace)];

        let response = run_interceptors(&chain, ctx(), handler(&journal)).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"cached");
        assert!(journal.lock().await.is_empty());
    }
}
