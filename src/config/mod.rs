//! Application settings and the injectable configuration service.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::di::{Provider, Token};
use crate::error::{Error, Result};
use crate::module::{DynamicModule, ImportPolicy, Module, ModuleMetadata};

/// Server and framework settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
    pub import_policy: ImportPolicy,
    /// Applied to each lifecycle phase when set.
    pub hook_timeout: Option<Duration>,
    /// Path on which WebSocket upgrades are accepted.
    pub ws_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            body_limit: 2 * 1024 * 1024,
            import_policy: ImportPolicy::Lenient,
            hook_timeout: None,
            ws_path: "/ws".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `HOST`, `PORT`, `BODY_LIMIT`, `KEEL_STRICT_IMPORTS`,
    /// `KEEL_HOOK_TIMEOUT_MS` and `KEEL_WS_PATH`, defaulting the rest.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(limit) = lookup("BODY_LIMIT") {
            config.body_limit = parse("BODY_LIMIT", &limit)?;
        }
        if let Some(strict) = lookup("KEEL_STRICT_IMPORTS") {
            config.import_policy = match strict.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => ImportPolicy::Strict,
                "0" | "false" | "no" => ImportPolicy::Lenient,
                other => {
                    return Err(Error::config(format!(
                        "KEEL_STRICT_IMPORTS must be a boolean, got {:?}",
                        other
                    )));
                }
            };
        }
        if let Some(timeout) = lookup("KEEL_HOOK_TIMEOUT_MS") {
            config.hook_timeout = Some(Duration::from_millis(parse("KEEL_HOOK_TIMEOUT_MS", &timeout)?));
        }
        if let Some(path) = lookup("KEEL_WS_PATH") {
            if !path.starts_with('/') {
                return Err(Error::config(format!("KEEL_WS_PATH must start with '/', got {:?}", path)));
            }
            config.ws_path = path;
        }
        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("{} has an invalid value {:?}: {}", key, value, e)))
}

/// Key/value configuration, injectable from any module once
/// [`ConfigModule`] is imported.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service holding the current environment variables.
    pub fn from_env() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// The value parsed as `T`. Missing keys are `Ok(None)`.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        self.get(key).map(|value| parse(key, &value)).transpose()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.config.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.config.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }
}

/// How [`ConfigModule::for_root`] fills the service.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Copy the process environment in first.
    pub load_env: bool,
    /// Explicit values; these win over the environment.
    pub values: HashMap<String, String>,
}

impl ConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_env(mut self, load_env: bool) -> Self {
        self.load_env = load_env;
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// Global module providing [`ConfigService`].
///
/// ```rust,ignore
/// #[module(imports = [ConfigModule::for_root(ConfigOptions::new().value("DB_URL", "memory://"))])]
/// pub struct AppModule;
/// ```
pub struct ConfigModule;

impl ConfigModule {
    pub fn for_root(options: ConfigOptions) -> DynamicModule {
        let service = if options.load_env {
            ConfigService::from_env()
        } else {
            ConfigService::new()
        };
        for (key, value) in &options.values {
            service.set(key, value);
        }

        DynamicModule::new::<ConfigModule>()
            .provider(Provider::value(Token::of::<ConfigService>(), service))
            .export(Token::of::<ConfigService>())
            .global(true)
    }
}

impl Module for ConfigModule {
    fn metadata() -> ModuleMetadata {
        Self::for_root(ConfigOptions::new().load_env(true)).metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    #[test]
    fn reads_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("KEEL_STRICT_IMPORTS", "true"),
            ("KEEL_HOOK_TIMEOUT_MS", "250"),
            ("KEEL_WS_PATH", "/events"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.import_policy, ImportPolicy::Strict);
        assert_eq!(config.hook_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.ws_path, "/events");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(Error::Config { .. })
        ));
        assert!(AppConfig::from_lookup(lookup(&[("KEEL_STRICT_IMPORTS", "maybe")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("KEEL_WS_PATH", "ws")])).is_err());
    }

    #[test]
    fn config_service_parses_values() {
        let service = ConfigService::new();
        service.set("POOL_SIZE", "8");
        assert_eq!(service.get_parsed::<u32>("POOL_SIZE").unwrap(), Some(8));
        assert_eq!(service.get_parsed::<u32>("MISSING").unwrap(), None);
        assert!(service.get_parsed::<u32>("POOL_SIZE").is_ok());
        service.set("POOL_SIZE", "many");
        assert!(service.get_parsed::<u32>("POOL_SIZE").is_err());
        assert_eq!(service.get_or("MISSING", "x"), "x");
    }

    #[test]
    fn for_root_is_a_global_module() {
        let module = ConfigModule::for_root(ConfigOptions::new().value("MODE", "test"));
        assert!(module.metadata.global);
        assert_eq!(module.metadata.exports, vec![Token::of::<ConfigService>()]);
        let Provider::Value { value, .. } = &module.metadata.providers[0] else {
            panic!("expected a value provider");
        };
        let service = value.downcast_ref::<ConfigService>().unwrap();
        assert_eq!(service.get("MODE").as_deref(), Some("test"));
    }
}
