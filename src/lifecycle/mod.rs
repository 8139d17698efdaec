//! Lifecycle hooks and application bootstrap.
//!
//! # Phases
//!
//! ```text
//! 1. Module graph compilation
//!    ↓
//! 2. Eager instantiation of every singleton provider
//!    ↓
//! 3. OnModuleInit            (resolution order)
//!    ↓
//! 4. Gateway registration, execution plans
//!    ↓
//! 5. OnApplicationBootstrap  (resolution order)
//!    ↓
//! [Serving...]
//!    ↓
//! 6. SIGTERM / SIGINT
//!    ↓
//! 7. OnApplicationShutdown   (reverse resolution order)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use keel::lifecycle::{LifecycleError, OnApplicationShutdown};
//!
//! #[derive(Injectable)]
//! #[injectable(on_shutdown)]
//! pub struct DatabaseService {
//!     config: Arc<ConfigService>,
//! }
//!
//! #[async_trait]
//! impl OnApplicationShutdown for DatabaseService {
//!     async fn on_application_shutdown(&self, signal: Option<&str>) -> Result<(), LifecycleError> {
//!         tracing::info!("Closing database connections ({:?})", signal);
//!         Ok(())
//!     }
//! }
//! ```

mod application;
mod error;
mod manager;
mod shutdown;
mod traits;

pub use application::{Application, ApplicationBuilder};
pub use error::{LifecycleError, Result};
pub use manager::LifecycleManager;
pub use shutdown::{ShutdownHandler, shutdown_signal};
pub use traits::{LifecycleHooks, OnApplicationBootstrap, OnApplicationShutdown, OnModuleInit};
