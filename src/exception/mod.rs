//! Request-time failures and the filters that turn them into responses.
//!
//! Every failure raised by middleware, guards, pipes, interceptors or a
//! handler funnels into one [`Exception`]. The dispatcher then walks the
//! route's filters and hands the failure to the first one that catches it,
//! falling back to [`BaseExceptionFilter`].

mod filter;
pub mod http;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::di::{Component, Injectable};
use crate::error::DiError;
use crate::request::HttpRequest;

pub use filter::BaseExceptionFilter;
pub use http::HttpException;

/// A failure that carries an HTTP status and a JSON payload.
///
/// Implement this for application error types that should keep their own
/// status code when they reach a filter.
pub trait HttpError: std::error::Error + Send + Sync + 'static {
    fn status(&self) -> StatusCode;

    fn response(&self) -> serde_json::Value;
}

#[derive(Debug, Clone)]
struct Structured {
    status: StatusCode,
    response: Value,
}

/// A failure raised while handling a request.
///
/// Structured failures (anything implementing [`HttpError`]) keep their
/// status and payload; everything else becomes a 500 in the base filter.
pub struct Exception {
    inner: anyhow::Error,
    http: Option<Structured>,
}

impl Exception {
    /// An unstructured failure.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: anyhow::Error::new(error),
            http: None,
        }
    }

    /// An unstructured failure from a message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self {
            inner: anyhow::Error::msg(message),
            http: None,
        }
    }

    pub fn http<E: HttpError>(error: E) -> Self {
        let http = Structured {
            status: error.status(),
            response: error.response(),
        };
        Self {
            inner: anyhow::Error::new(error),
            http: Some(http),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.http.as_ref().map(|http| http.status)
    }

    pub fn response(&self) -> Option<&Value> {
        self.http.as_ref().map(|http| &http.response)
    }

    pub fn is_structured(&self) -> bool {
        self.http.is_some()
    }

    /// Whether the underlying error is a `T`.
    pub fn is<T>(&self) -> bool
    where
        T: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<T>()
    }

    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("status", &self.status())
            .field("error", &self.inner)
            .finish()
    }
}

impl<E: HttpError> From<E> for Exception {
    fn from(error: E) -> Self {
        Self::http(error)
    }
}

impl From<anyhow::Error> for Exception {
    fn from(inner: anyhow::Error) -> Self {
        let http = inner.downcast_ref::<HttpException>().map(|e| Structured {
            status: e.status(),
            response: e.response().clone(),
        });
        Self { inner, http }
    }
}

impl From<DiError> for Exception {
    fn from(error: DiError) -> Self {
        Self::new(error)
    }
}

impl From<crate::Error> for Exception {
    fn from(error: crate::Error) -> Self {
        Self::new(error)
    }
}

impl From<serde_json::Error> for Exception {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error)
    }
}

impl From<std::io::Error> for Exception {
    fn from(error: std::io::Error) -> Self {
        Self::new(error)
    }
}

/// One failure type a filter declares it catches.
#[derive(Clone, Copy)]
pub struct CatchType {
    name: &'static str,
    matches: fn(&Exception) -> bool,
}

impl CatchType {
    /// Failures whose runtime type is `T`.
    pub fn of<T>() -> Self
    where
        T: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<T>(),
            matches: is_type::<T>,
        }
    }

    /// Any structured failure.
    pub fn http() -> Self {
        Self {
            name: "HttpError",
            matches: Exception::is_structured,
        }
    }

    pub fn name(&self) -> &'static str {
        crate::di::short_type_name(self.name)
    }

    pub fn matches(&self, exception: &Exception) -> bool {
        (self.matches)(exception)
    }
}

fn is_type<T>(exception: &Exception) -> bool
where
    T: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    exception.is::<T>()
}

impl fmt::Debug for CatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CatchType({})", self.name())
    }
}

/// What a filter can see about the failed request.
#[derive(Debug, Clone)]
pub struct ArgumentsHost {
    request: Arc<HttpRequest>,
}

impl ArgumentsHost {
    pub fn new(request: Arc<HttpRequest>) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Arc<HttpRequest> {
        &self.request
    }
}

/// Recovers from a failure by producing an error response.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Injectable)]
/// pub struct NotFoundFilter;
///
/// #[async_trait]
/// impl ExceptionFilter for NotFoundFilter {
///     fn catches(&self) -> Vec<CatchType> {
///         vec![CatchType::of::<OrderNotFound>()]
///     }
///
///     async fn catch(&self, exception: &Exception, _host: &ArgumentsHost) -> Response {
///         (StatusCode::NOT_FOUND, exception.message()).into_response()
///     }
/// }
/// ```
#[async_trait]
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Failure types handled by this filter. Empty catches everything.
    fn catches(&self) -> Vec<CatchType> {
        Vec::new()
    }

    async fn catch(&self, exception: &Exception, host: &ArgumentsHost) -> Response;
}

impl Component<dyn ExceptionFilter> {
    pub fn of<F: ExceptionFilter + Injectable>() -> Self {
        Self::from_class::<F>(|filter| filter as Arc<dyn ExceptionFilter>)
    }

    pub fn instance<F: ExceptionFilter>(filter: F) -> Self {
        Self::named_instance(std::any::type_name::<F>(), Arc::new(filter))
    }
}

/// A resolved filter together with the failure types it catches.
#[derive(Clone)]
pub struct BoundFilter {
    name: &'static str,
    filter: Arc<dyn ExceptionFilter>,
    catches: Vec<CatchType>,
}

impl BoundFilter {
    pub fn new(name: &'static str, filter: Arc<dyn ExceptionFilter>) -> Self {
        let catches = filter.catches();
        Self {
            name,
            filter,
            catches,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handles(&self, exception: &Exception) -> bool {
        self.catches.is_empty() || self.catches.iter().any(|catch| catch.matches(exception))
    }

    pub fn filter(&self) -> &Arc<dyn ExceptionFilter> {
        &self.filter
    }
}

impl fmt::Debug for BoundFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFilter")
            .field("name", &self.name)
            .field("catches", &self.catches)
            .finish()
    }
}

/// The first filter in declaration order that handles `exception`.
pub fn select_filter<'a>(filters: &'a [BoundFilter], exception: &Exception) -> Option<&'a BoundFilter> {
    filters.iter().find(|filter| filter.handles(exception))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("order {0} not found")]
    struct OrderNotFound(u32);

    #[derive(Debug, thiserror::Error)]
    #[error("payment declined")]
    struct PaymentDeclined;

    impl HttpError for PaymentDeclined {
        fn status(&self) -> StatusCode {
            StatusCode::PAYMENT_REQUIRED
        }

        fn response(&self) -> Value {
            serde_json::json!({"statusCode": 402, "message": "payment declined"})
        }
    }

    struct Named(&'static str, Vec<CatchType>);

    #[async_trait]
    impl ExceptionFilter for Named {
        fn catches(&self) -> Vec<CatchType> {
            self.1.clone()
        }

        async fn catch(&self, _: &Exception, _: &ArgumentsHost) -> Response {
            Response::new(self.0.into())
        }
    }

    fn bound(name: &'static str, catches: Vec<CatchType>) -> BoundFilter {
        BoundFilter::new(name, Arc::new(Named(name, catches)))
    }

    #[test]
    fn http_errors_are_structured() {
        let exception: Exception = PaymentDeclined.into();
        assert_eq!(exception.status(), Some(StatusCode::PAYMENT_REQUIRED));
        assert!(exception.is::<PaymentDeclined>());
        assert_eq!(exception.message(), "payment declined");

        let exception = Exception::new(OrderNotFound(7));
        assert!(!exception.is_structured());
        assert_eq!(exception.downcast_ref::<OrderNotFound>().map(|e| e.0), Some(7));
    }

    #[test]
    fn anyhow_keeps_http_exceptions_structured() {
        let exception: Exception = anyhow::Error::new(HttpException::forbidden("no")).into();
        assert_eq!(exception.status(), Some(StatusCode::FORBIDDEN));

        let exception: Exception = anyhow::anyhow!("boom").into();
        assert_eq!(exception.status(), None);
    }

    #[test]
    fn first_matching_filter_wins() {
        let filters = vec![
            bound("orders", vec![CatchType::of::<OrderNotFound>()]),
            bound("http", vec![CatchType::http()]),
            bound("all", vec![]),
        ];

        let pick = |exception: Exception| select_filter(&filters, &exception).map(BoundFilter::name);
        assert_eq!(pick(Exception::new(OrderNotFound(1))), Some("orders"));
        assert_eq!(pick(HttpException::not_found("x").into()), Some("http"));
        assert_eq!(pick(Exception::msg("boom")), Some("all"));
        assert_eq!(select_filter(&filters[..1], &Exception::msg("boom")).map(|f| f.name()), None);
    }
}
