use std::fmt;

use axum::http::StatusCode;
use serde_json::{Map, Value, json};

use super::HttpError;

/// A structured failure: a status code plus a JSON payload.
///
/// The named constructors build the payload `{statusCode, message, error}`;
/// an object passed as the message is merged into `{statusCode, error}`
/// instead.
///
/// ```rust,ignore
/// return Err(HttpException::not_found(format!("Order {id} not found")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HttpException {
    status: StatusCode,
    response: Value,
}

impl HttpException {
    /// An exception whose payload is sent as-is.
    pub fn new(status: StatusCode, response: impl Into<Value>) -> Self {
        Self {
            status,
            response: response.into(),
        }
    }

    /// An exception with the standard payload for `status`.
    pub fn with_status(status: StatusCode, message: impl Into<Value>) -> Self {
        let reason = status.canonical_reason().unwrap_or("Error");
        let mut payload = Map::new();
        payload.insert("statusCode".into(), json!(status.as_u16()));
        match message.into() {
            Value::Object(fields) => {
                payload.insert("error".into(), json!(reason));
                payload.extend(fields);
            }
            message => {
                payload.insert("message".into(), message);
                payload.insert("error".into(), json!(reason));
            }
        }
        Self::new(status, Value::Object(payload))
    }

    pub fn bad_request(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }

    pub fn not_acceptable(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::NOT_ACCEPTABLE, message)
    }

    pub fn conflict(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::CONFLICT, message)
    }

    pub fn payload_too_large(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn unprocessable_entity(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal_server_error(message: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn response(&self) -> &Value {
        &self.response
    }
}

impl fmt::Display for HttpException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.response {
            Value::String(message) => f.write_str(message),
            Value::Object(fields) => match fields.get("message") {
                Some(Value::String(message)) => f.write_str(message),
                _ => write!(f, "{}", self.response),
            },
            other => write!(f, "{other}"),
        }
    }
}

impl std::error::Error for HttpException {}

impl HttpError for HttpException {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn response(&self) -> Value {
        self.response.clone()
    }
}
