//! Lifecycle Manager
//!
//! Runs lifecycle hooks on every instantiated provider.

use super::{LifecycleError, LifecycleHooks, Result};
use crate::di::Instance;
use std::sync::Arc;
use std::time::Duration;

struct LifecycleEntry {
    name: String,
    instance: Instance,
    hooks: LifecycleHooks,
}

/// Runs lifecycle hooks for all instantiated providers
///
/// Instances are kept in resolution order. Init and bootstrap hooks run in
/// that order and stop at the first failure; shutdown hooks run in reverse
/// and every hook runs even if an earlier one failed.
///
/// # Example
///
/// ```rust,ignore
/// use keel::lifecycle::{LifecycleHooks, LifecycleManager};
///
/// let mut manager = LifecycleManager::new();
/// manager.register("DatabaseService", database, LifecycleHooks::new().on_init::<DatabaseService>());
///
/// manager.call_module_init().await?;
/// manager.call_application_bootstrap().await?;
/// // ... application runs ...
/// manager.call_application_shutdown(Some("SIGTERM")).await?;
/// ```
#[derive(Default)]
pub struct LifecycleManager {
    entries: Vec<LifecycleEntry>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance. An instance registered twice (a singleton
    /// reached from several modules) keeps its first position.
    pub fn register(&mut self, name: impl Into<String>, instance: Instance, hooks: LifecycleHooks) {
        let address = Arc::as_ptr(&instance) as *const ();
        if self
            .entries
            .iter()
            .any(|entry| Arc::as_ptr(&entry.instance) as *const () == address)
        {
            return;
        }
        self.entries.push(LifecycleEntry {
            name: name.into(),
            instance,
            hooks,
        });
    }

    /// Execute all OnModuleInit hooks in resolution order
    pub async fn call_module_init(&self) -> Result<()> {
        tracing::info!("Calling OnModuleInit hooks...");

        let mut executed = 0;
        for entry in &self.entries {
            let Some(hook) = entry.hooks.init(Arc::clone(&entry.instance)) else {
                continue;
            };
            tracing::debug!("Initializing: {}", entry.name);
            hook.await.map_err(|e| {
                tracing::error!("OnModuleInit failed for {}: {}", entry.name, e);
                e.in_phase("OnModuleInit", &entry.name)
            })?;
            executed += 1;
        }

        tracing::info!("OnModuleInit complete ({} hooks executed)", executed);
        Ok(())
    }

    /// Execute all OnModuleInit hooks with a timeout
    pub async fn call_module_init_with_timeout(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.call_module_init())
            .await
            .map_err(|_| {
                LifecycleError::timeout("OnModuleInit", format!("Timeout after {:?}", timeout))
            })?
    }

    /// Execute all OnApplicationBootstrap hooks in resolution order
    pub async fn call_application_bootstrap(&self) -> Result<()> {
        tracing::info!("Calling OnApplicationBootstrap hooks...");

        let mut executed = 0;
        for entry in &self.entries {
            let Some(hook) = entry.hooks.bootstrap(Arc::clone(&entry.instance)) else {
                continue;
            };
            tracing::debug!("Bootstrapping: {}", entry.name);
            hook.await.map_err(|e| {
                tracing::error!("OnApplicationBootstrap failed for {}: {}", entry.name, e);
                e.in_phase("OnApplicationBootstrap", &entry.name)
            })?;
            executed += 1;
        }

        tracing::info!("OnApplicationBootstrap complete ({} hooks executed)", executed);
        Ok(())
    }

    /// Execute all OnApplicationBootstrap hooks with a timeout
    pub async fn call_application_bootstrap_with_timeout(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.call_application_bootstrap())
            .await
            .map_err(|_| {
                LifecycleError::timeout(
                    "OnApplicationBootstrap",
                    format!("Timeout after {:?}", timeout),
                )
            })?
    }

    /// Execute all OnApplicationShutdown hooks in **reverse** resolution order
    ///
    /// Each hook is awaited before the next one starts. Failures are logged
    /// and collected; the remaining hooks still run.
    pub async fn call_application_shutdown(&self, signal: Option<&str>) -> Result<()> {
        tracing::info!("Calling OnApplicationShutdown hooks...");

        let mut failures = Vec::new();
        for entry in self.entries.iter().rev() {
            let hook = entry.hooks.shutdown(
                Arc::clone(&entry.instance),
                signal.map(str::to_string),
            );
            let Some(hook) = hook else {
                continue;
            };
            tracing::debug!("Shutting down: {}", entry.name);
            if let Err(e) = hook.await {
                tracing::error!("OnApplicationShutdown failed for {}: {}", entry.name, e);
                failures.push(format!("{}: {}", entry.name, e));
            }
        }

        tracing::info!("OnApplicationShutdown complete");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownFailed { failures })
        }
    }

    /// Execute all OnApplicationShutdown hooks with a timeout
    pub async fn call_application_shutdown_with_timeout(
        &self,
        signal: Option<&str>,
        timeout: Duration,
    ) -> Result<()> {
        tokio::time::timeout(timeout, self.call_application_shutdown(signal))
            .await
            .map_err(|_| {
                LifecycleError::timeout(
                    "OnApplicationShutdown",
                    format!("Timeout after {:?}", timeout),
                )
            })?
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of registered instances, in resolution order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }
}
