use keel::prelude::*;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Connection settings handed to [`Database`] by [`DatabaseModule::for_root`]
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub url: String,
}

/// In-memory key/value store standing in for a real connection pool
#[derive(Injectable)]
#[injectable(on_init, on_shutdown)]
pub struct Database {
    options: Arc<DatabaseOptions>,
    #[inject(default)]
    connected: AtomicBool,
    #[inject(default)]
    rows: RwLock<BTreeMap<u64, Value>>,
}

impl Database {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn insert(&self, id: u64, row: Value) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(id, row);
        }
    }

    pub fn get(&self, id: u64) -> Option<Value> {
        self.rows.read().ok()?.get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Value> {
        self.rows
            .read()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn next_id(&self) -> u64 {
        self.rows
            .read()
            .ok()
            .and_then(|rows| rows.keys().next_back().copied())
            .map_or(1, |id| id + 1)
    }
}

#[async_trait]
impl OnModuleInit for Database {
    async fn on_module_init(&self) -> Result<(), LifecycleError> {
        tracing::info!("Connecting to {}", self.options.url);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OnApplicationShutdown for Database {
    async fn on_application_shutdown(&self, signal: Option<&str>) -> Result<(), LifecycleError> {
        tracing::info!("Closing {} ({})", self.options.url, signal.unwrap_or("no signal"));
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Global module exporting [`Database`]
#[module]
pub struct DatabaseModule;

impl DatabaseModule {
    pub fn for_root(url: &str) -> DynamicModule {
        DynamicModule::new::<DatabaseModule>()
            .provider(Provider::value(
                Token::of::<DatabaseOptions>(),
                DatabaseOptions { url: url.to_string() },
            ))
            .provider(Provider::class::<Database>())
            .export(Token::of::<Database>())
            .global(true)
    }
}
