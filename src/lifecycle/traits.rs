//! Lifecycle hook traits
//!
//! These traits define the contract for providers that need to participate
//! in application lifecycle events. Instances are shared, so hooks take
//! `&self`; use interior mutability for state they change.

use super::{LifecycleError, Result};
use crate::di::{Bound, Instance};
use async_trait::async_trait;
use futures::future::BoxFuture;

/// Called once every provider and controller has been instantiated
///
/// Use this hook to:
/// - Initialize database connections
/// - Warm up caches
///
/// # Example
///
/// ```rust,ignore
/// use keel::lifecycle::{OnModuleInit, LifecycleError};
/// use async_trait::async_trait;
///
/// #[derive(Injectable)]
/// #[injectable(on_init)]
/// pub struct DatabaseService {
///     pool: OnceLock<Pool>,
/// }
///
/// #[async_trait]
/// impl OnModuleInit for DatabaseService {
///     async fn on_module_init(&self) -> Result<(), LifecycleError> {
///         let pool = create_pool().await
///             .map_err(|e| LifecycleError::init_failed(e.to_string()))?;
///         let _ = self.pool.set(pool);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait OnModuleInit: Send + Sync {
    async fn on_module_init(&self) -> Result<()>;
}

/// Called after every `OnModuleInit` hook has completed
///
/// This is the last hook before the application starts accepting requests.
#[async_trait]
pub trait OnApplicationBootstrap: Send + Sync {
    async fn on_application_bootstrap(&self) -> Result<()>;
}

/// Called when the application shuts down
///
/// `signal` names the OS signal that triggered the shutdown, if any.
/// Hooks run in reverse instantiation order.
#[async_trait]
pub trait OnApplicationShutdown: Send + Sync {
    async fn on_application_shutdown(&self, signal: Option<&str>) -> Result<()>;
}

type HookFn = fn(Instance) -> BoxFuture<'static, Result<()>>;
type ShutdownHookFn = fn(Instance, Option<String>) -> BoxFuture<'static, Result<()>>;

/// The lifecycle hooks a class implements, in type-erased form.
///
/// Generated by `#[injectable(on_init, on_bootstrap, on_shutdown)]`.
#[derive(Clone, Copy, Default)]
pub struct LifecycleHooks {
    on_init: Option<HookFn>,
    on_bootstrap: Option<HookFn>,
    on_shutdown: Option<ShutdownHookFn>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init<T: OnModuleInit + 'static>(mut self) -> Self {
        self.on_init = Some(call_init::<T>);
        self
    }

    pub fn on_bootstrap<T: OnApplicationBootstrap + 'static>(mut self) -> Self {
        self.on_bootstrap = Some(call_bootstrap::<T>);
        self
    }

    pub fn on_shutdown<T: OnApplicationShutdown + 'static>(mut self) -> Self {
        self.on_shutdown = Some(call_shutdown::<T>);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_init.is_none() && self.on_bootstrap.is_none() && self.on_shutdown.is_none()
    }

    pub(crate) fn init(&self, instance: Instance) -> Option<BoxFuture<'static, Result<()>>> {
        self.on_init.map(|hook| hook(instance))
    }

    pub(crate) fn bootstrap(&self, instance: Instance) -> Option<BoxFuture<'static, Result<()>>> {
        self.on_bootstrap.map(|hook| hook(instance))
    }

    pub(crate) fn shutdown(
        &self,
        instance: Instance,
        signal: Option<String>,
    ) -> Option<BoxFuture<'static, Result<()>>> {
        self.on_shutdown.map(|hook| hook(instance, signal))
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_init", &self.on_init.is_some())
            .field("on_bootstrap", &self.on_bootstrap.is_some())
            .field("on_shutdown", &self.on_shutdown.is_some())
            .finish()
    }
}

fn call_init<T: OnModuleInit + 'static>(instance: Instance) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move { downcast::<T>(instance)?.on_module_init().await })
}

fn call_bootstrap<T: OnApplicationBootstrap + 'static>(
    instance: Instance,
) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move { downcast::<T>(instance)?.on_application_bootstrap().await })
}

fn call_shutdown<T: OnApplicationShutdown + 'static>(
    instance: Instance,
    signal: Option<String>,
) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        downcast::<T>(instance)?
            .on_application_shutdown(signal.as_deref())
            .await
    })
}

/// `T` itself, or the implementation behind a trait object bound to `T`.
fn downcast<T: Send + Sync + 'static>(instance: Instance) -> Result<std::sync::Arc<T>> {
    let instance = Bound::concrete(&instance).cloned().unwrap_or(instance);
    instance.downcast::<T>().map_err(|_| {
        LifecycleError::hook_failed(std::any::type_name::<T>(), "instance has an unexpected type")
    })
}
