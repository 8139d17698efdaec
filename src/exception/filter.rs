use async_trait::async_trait;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use super::{ArgumentsHost, Exception, ExceptionFilter};

/// Fallback filter used when no declared filter catches a failure.
///
/// Structured failures keep their status and payload. Anything else is
/// logged and becomes a 500 whose `error` field carries the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseExceptionFilter;

impl BaseExceptionFilter {
    pub fn render(exception: &Exception) -> Response {
        match (exception.status(), exception.response()) {
            (Some(status), Some(Value::String(message))) => (status, message.clone()).into_response(),
            (Some(status), Some(payload)) => (status, Json(payload.clone())).into_response(),
            _ => {
                tracing::error!("Unhandled exception: {:?}", exception);
                let body = json!({
                    "statusCode": 500,
                    "message": "Internal Server Error",
                    "error": exception.message(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

#[async_trait]
impl ExceptionFilter for BaseExceptionFilter {
    async fn catch(&self, exception: &Exception, _host: &ArgumentsHost) -> Response {
        Self::render(exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::HttpException;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn structured_failure_keeps_status_and_payload() {
        let response = BaseExceptionFilter::render(&HttpException::not_found("Order 3 not found").into());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"statusCode": 404, "message": "Order 3 not found", "error": "Not Found"})
        );
    }

    #[tokio::test]
    async fn unstructured_failure_is_internal_error() {
        let response = BaseExceptionFilter::render(&Exception::msg("database unreachable"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal Server Error");
        assert_eq!(body["error"], "database unreachable");
        assert!(body["timestamp"].is_string());
    }
}
