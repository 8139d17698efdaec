//! Guards accept or reject a request before its handler runs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::di::{Component, Injectable};
use crate::exception::{Exception, HttpException};

/// The Guard trait
///
/// Implement this to protect routes. Returning `Ok(false)` rejects the
/// request with `403 Forbidden`; returning an error rejects it with that
/// error instead.
///
/// # Example
/// ```rust,ignore
/// #[derive(Injectable)]
/// pub struct RolesGuard {
///     reflector: Arc<Reflector>,
/// }
///
/// #[async_trait]
/// impl Guard for RolesGuard {
///     async fn can_activate(&self, ctx: &ExecutionContext) -> Result<bool, Exception> {
///         let required: Vec<String> = self.reflector.get("roles", ctx).unwrap_or_default();
///         let role = ctx.request().header("x-role").unwrap_or_default();
///         Ok(required.is_empty() || required.iter().any(|r| r == role))
///     }
/// }
/// ```
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, ctx: &ExecutionContext) -> Result<bool, Exception>;
}

impl Component<dyn Guard> {
    pub fn of<G: Guard + Injectable>() -> Self {
        Self::from_class::<G>(|guard| guard as Arc<dyn Guard>)
    }

    pub fn instance<G: Guard>(guard: G) -> Self {
        Self::named_instance(std::any::type_name::<G>(), Arc::new(guard))
    }
}

/// Runs guards in order. The first one that declines stops the request.
pub async fn check_guards(guards: &[Arc<dyn Guard>], ctx: &ExecutionContext) -> Result<(), Exception> {
    for guard in guards {
        if !guard.can_activate(ctx).await? {
            return Err(HttpException::forbidden("Forbidden resource").into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::test_request;
    use axum::http::{Method, StatusCode};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(bool, Arc<AtomicUsize>);

    #[async_trait]
    impl Guard for Fixed {
        async fn can_activate(&self, _: &ExecutionContext) -> Result<bool, Exception> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0)
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

    #[tokio::test]
    async fn first_declining_guard_is_forbidden() {
        let calls = Arc::new(AtomicUsize::new(0));
        let guards: Vec<Arc<dyn Guard>> = vec![
            Arc::new(Fixed(true, Arc::clone(&calls))),
            Arc::new(Fixed(false, Arc::clone(&calls))),
            Arc::new(Fixed(true, Arc::clone(&calls))),
        ];

        let err = check_guards(&guards, &ctx()).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_accepting_guards_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let guards: Vec<Arc<dyn Guard>> = vec![Arc::new(Fixed(true, Arc::clone(&calls)))];
        assert!(check_guards(&guards, &ctx()).await.is_ok());
    }
}
