use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::di::short_type_name;
use crate::exception::{Exception, HttpException};
use crate::pipe::{Argument, ValidationFailure};
use crate::request::{HttpRequest, UploadedFile};

/// Where a handler parameter takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ParamSource {
    /// The whole request.
    Request,
    Query,
    Param,
    /// The JSON body, or one key of it.
    Body,
    /// The upload attached by a `FileInterceptor`.
    File,
}

pub type ValidateFn = fn(&Value) -> Result<(), ValidationFailure>;

/// The declared type of a handler parameter.
#[derive(Clone, Copy)]
pub struct ParamType {
    pub name: &'static str,
    pub type_id: TypeId,
    /// Set for `#[valid]` parameters; read by `ValidationPipe`.
    pub validator: Option<ValidateFn>,
}

impl ParamType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            validator: None,
        }
    }

    pub fn validated<T: DeserializeOwned + Validate + 'static>() -> Self {
        Self {
            validator: Some(validate_as::<T>),
            ..Self::of::<T>()
        }
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

fn validate_as<T: DeserializeOwned + Validate>(value: &Value) -> Result<(), ValidationFailure> {
    let parsed: T = serde_json::from_value(value.clone())
        .map_err(|e| ValidationFailure::Malformed(e.to_string()))?;
    parsed.validate().map_err(ValidationFailure::Invalid)
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamType")
            .field("name", &short_type_name(self.name))
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Binding of one handler parameter.
#[derive(Debug, Clone)]
pub struct ParamMetadata {
    pub source: ParamSource,
    pub key: Option<String>,
    pub param_type: ParamType,
}

impl ParamMetadata {
    pub fn new(source: ParamSource, key: Option<&str>, param_type: ParamType) -> Self {
        Self {
            source,
            key: key.map(str::to_string),
            param_type,
        }
    }

    /// Extracts the raw value for this parameter.
    pub fn extract(&self, request: &Arc<HttpRequest>) -> Result<Argument, Exception> {
        let lookup = |value: Option<&str>| value.map_or(Value::Null, |v| Value::String(v.to_string()));
        let key = self.key.as_deref();
        let argument = match self.source {
            ParamSource::Request => Argument::Request(Arc::clone(request)),
            ParamSource::File => Argument::File(request.file().map(|file| (*file).clone())),
            ParamSource::Query => Argument::Json(match key {
                Some(key) => lookup(request.query(key)),
                None => serde_json::to_value(request.query_map())?,
            }),
            ParamSource::Param => Argument::Json(match key {
                Some(key) => lookup(request.param(key)),
                None => serde_json::to_value(request.params())?,
            }),
            ParamSource::Body => {
                let body = request.json_body()?;
                Argument::Json(match key {
                    Some(key) => body.get(key).cloned().unwrap_or(Value::Null),
                    None => body,
                })
            }
        };
        Ok(argument)
    }
}

/// Bound handler arguments, consumed by position.
#[derive(Debug, Default)]
pub struct Arguments {
    values: Vec<Option<Argument>>,
}

impl Arguments {
    pub fn new(values: Vec<Argument>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn take(&mut self, index: usize) -> Result<Argument, Exception> {
        self.values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| Exception::msg(format!("Handler argument {} is not bound", index)))
    }

    /// Deserializes a body, query or path argument.
    ///
    /// A string that does not deserialize as `T` directly is parsed as JSON
    /// text, so `"42"` binds to an integer parameter.
    pub fn json<T: DeserializeOwned>(&mut self, index: usize) -> Result<T, Exception> {
        let value = match self.take(index)? {
            Argument::Json(value) => value,
            other => {
                return Err(Exception::msg(format!(
                    "Handler argument {} is {:?}, not a JSON value",
                    index, other
                )));
            }
        };
        match serde_json::from_value::<T>(value.clone()) {
            Ok(parsed) => Ok(parsed),
            Err(error) => {
                if let Value::String(text) = &value {
                    if let Ok(parsed) = serde_json::from_str::<T>(text) {
                        return Ok(parsed);
                    }
                }
                Err(HttpException::bad_request(format!("Invalid argument {}: {}", index, error)).into())
            }
        }
    }

    pub fn request(&mut self, index: usize) -> Result<Arc<HttpRequest>, Exception> {
        match self.take(index)? {
            Argument::Request(request) => Ok(request),
            other => Err(Exception::msg(format!(
                "Handler argument {} is {:?}, not the request",
                index, other
            ))),
        }
    }

    pub fn file(&mut self, index: usize) -> Result<Option<UploadedFile>, Exception> {
        match self.take(index)? {
            Argument::File(file) => Ok(file),
            other => Err(Exception::msg(format!(
                "Handler argument {} is {:?}, not a file",
                index, other
            ))),
        }
    }

    /// Like [`file`](Self::file), but a missing upload is a `400`.
    pub fn file_required(&mut self, index: usize) -> Result<UploadedFile, Exception> {
        self.file(index)?
            .ok_or_else(|| HttpException::bad_request("File is required").into())
    }
}
