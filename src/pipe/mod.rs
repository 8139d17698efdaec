use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::controller::{ParamSource, ParamType};
use crate::di::{Component, Injectable};
use crate::exception::Exception;
use crate::request::{HttpRequest, UploadedFile};

pub mod builtins;

pub use builtins::{ParseIntPipe, ValidationPipe};

/// A handler argument as extracted from the request.
#[derive(Debug, Clone)]
pub enum Argument {
    /// A body, query or path value.
    Json(Value),
    Request(Arc<HttpRequest>),
    File(Option<UploadedFile>),
}

impl Argument {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Argument::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Describes the parameter an argument is bound to.
#[derive(Debug, Clone)]
pub struct ArgumentMetadata {
    pub source: ParamSource,
    pub param_type: ParamType,
    pub key: Option<String>,
}

/// Why a value failed its declared type's validation.
#[derive(Debug)]
pub enum ValidationFailure {
    /// The value does not deserialize into the declared type.
    Malformed(String),
    Invalid(validator::ValidationErrors),
}

/// The Pipe trait for transformation and validation
///
/// Every pipe declared on a handler runs on every bound argument, in order;
/// each receives the previous pipe's output.
#[async_trait]
pub trait Pipe: Send + Sync + 'static {
    async fn transform(&self, value: Argument, metadata: &ArgumentMetadata) -> Result<Argument, Exception>;
}

impl Component<dyn Pipe> {
    pub fn of<P: Pipe + Injectable>() -> Self {
        Self::from_class::<P>(|pipe| pipe as Arc<dyn Pipe>)
    }

    pub fn instance<P: Pipe>(pipe: P) -> Self {
        Self::named_instance(std::any::type_name::<P>(), Arc::new(pipe))
    }
}

/// Threads `value` through `pipes` in order.
pub async fn apply_pipes(
    pipes: &[Arc<dyn Pipe>],
    mut value: Argument,
    metadata: &ArgumentMetadata,
) -> Result<Argument, Exception> {
    for pipe in pipes {
        value = pipe.transform(value, metadata).await?;
    }
    Ok(value)
}
