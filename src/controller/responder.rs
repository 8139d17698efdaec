use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use super::HandlerResult;
use crate::exception::Exception;

/// Converts a handler's return value into a response.
///
/// - a [`Response`] passes through untouched
/// - JSON objects and arrays (and [`Json`]) are sent as JSON
/// - `()`, `None` and JSON `null` give `204 No Content`
/// - strings, numbers and booleans are sent as plain text
/// - `Err` values become the request's failure
///
/// Other `Serialize` types are not coerced: return them as `Json(value)`
/// or convert them to a [`Value`] first.
pub trait Responder {
    fn respond(self) -> HandlerResult;
}

fn no_content() -> HandlerResult {
    Ok(StatusCode::NO_CONTENT.into_response())
}

impl Responder for Response {
    fn respond(self) -> HandlerResult {
        Ok(self)
    }
}

impl Responder for Value {
    fn respond(self) -> HandlerResult {
        match self {
            Value::Null => no_content(),
            Value::String(text) => Ok(text.into_response()),
            Value::Object(_) | Value::Array(_) => Ok(Json(self).into_response()),
            scalar => Ok(scalar.to_string().into_response()),
        }
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn respond(self) -> HandlerResult {
        Ok(self.into_response())
    }
}

impl Responder for String {
    fn respond(self) -> HandlerResult {
        Ok(self.into_response())
    }
}

impl Responder for &'static str {
    fn respond(self) -> HandlerResult {
        Ok(self.into_response())
    }
}

impl Responder for () {
    fn respond(self) -> HandlerResult {
        no_content()
    }
}

impl Responder for StatusCode {
    fn respond(self) -> HandlerResult {
        Ok(self.into_response())
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn respond(self) -> HandlerResult {
        let (status, body) = self;
        let mut response = body.respond()?;
        *response.status_mut() = status;
        Ok(response)
    }
}

impl<T: Responder> Responder for Option<T> {
    fn respond(self) -> HandlerResult {
        match self {
            Some(value) => value.respond(),
            None => no_content(),
        }
    }
}

impl<T, E> Responder for Result<T, E>
where
    T: Responder,
    E: Into<Exception>,
{
    fn respond(self) -> HandlerResult {
        match self {
            Ok(value) => value.respond(),
            Err(error) => Err(error.into()),
        }
    }
}

macro_rules! text_responder {
    ($($ty:ty),*) => {
        $(
            impl Responder for $ty {
                fn respond(self) -> HandlerResult {
                    Ok(self.to_string().into_response())
                }
            }
        )*
    };
}

text_responder!(bool, i32, i64, u32, u64, usize, f32, f64);
