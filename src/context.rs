use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::di::{Dependencies, Injectable, Token};
use crate::error::DiResult;
use crate::request::HttpRequest;

/// The route a request is about to run, as seen by guards and interceptors.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    class: Token,
    handler: &'static str,
    request: Arc<HttpRequest>,
    metadata: Arc<HashMap<String, Value>>,
}

impl ExecutionContext {
    pub fn new(
        class: Token,
        handler: &'static str,
        request: Arc<HttpRequest>,
        metadata: Arc<HashMap<String, Value>>,
    ) -> Self {
        Self {
            class,
            handler,
            request,
            metadata,
        }
    }

    /// The controller class.
    pub fn class(&self) -> &Token {
        &self.class
    }

    /// The handler method name.
    pub fn handler(&self) -> &'static str {
        self.handler
    }

    pub fn request(&self) -> &Arc<HttpRequest> {
        &self.request
    }

    /// Custom metadata declared on the handler with `#[set_metadata]`.
    pub fn metadata<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.metadata.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Reads custom handler metadata, typically from inside a guard.
///
/// ```rust,ignore
/// let roles: Vec<String> = self.reflector.get("roles", ctx).unwrap_or_default();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Reflector;

impl Reflector {
    pub fn get<T: DeserializeOwned>(&self, key: &str, ctx: &ExecutionContext) -> Option<T> {
        ctx.metadata(key)
    }
}

impl Injectable for Reflector {
    fn inject(_: &mut Dependencies) -> DiResult<Self> {
        Ok(Reflector)
    }
}
