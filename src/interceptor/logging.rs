use crate::context::ExecutionContext;
use crate::controller::HandlerResult;
use crate::di::{Dependencies, Injectable};
use crate::error::DiResult;
use crate::interceptor::{CallHandler, Interceptor};
use async_trait::async_trait;
use std::time::Instant;

/// An interceptor that logs request timing and status
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

impl Injectable for LoggingInterceptor {
    fn inject(_: &mut Dependencies) -> DiResult<Self> {
        Ok(LoggingInterceptor)
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, ctx: &ExecutionContext, next: CallHandler) -> HandlerResult {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_string();
        let start = Instant::now();

        tracing::info!("--> {} {} ({})", method, path, ctx.handler());

        match next.handle().await {
            Ok(response) => {
                tracing::info!("<-- {} {} {} {:?}", method, path, response.status(), start.elapsed());
                Ok(response)
            }
            Err(e) => {
                tracing::info!("<-- {} {} ERROR: {} {:?}", method, path, e, start.elapsed());
                Err(e)
            }
        }
    }
}
