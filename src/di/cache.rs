use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use super::{Instance, Token};

/// Process-wide singleton instances, keyed by token.
///
/// The cache is handed to the [`Container`](super::Container) instead of
/// living in a global, so tests can share or reset it explicitly.
/// Construction of a token is serialized by a per-token lock: concurrent
/// first resolutions construct exactly once.
#[derive(Default)]
pub struct SingletonCache {
    instances: DashMap<Token, Instance>,
    locks: DashMap<Token, Arc<Mutex<()>>>,
}

impl SingletonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &Token) -> Option<Instance> {
        self.instances.get(token).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.instances.contains_key(token)
    }

    /// Returns the cached instance or constructs it under the token's lock.
    pub fn get_or_try_insert_with<E>(
        &self,
        token: &Token,
        construct: impl FnOnce() -> Result<Instance, E>,
    ) -> Result<Instance, E> {
        if let Some(instance) = self.get(token) {
            return Ok(instance);
        }

        let lock = Arc::clone(self.locks.entry(token.clone()).or_default().value());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(instance) = self.get(token) {
            return Ok(instance);
        }

        let instance = construct()?;
        self.instances.insert(token.clone(), Arc::clone(&instance));
        Ok(instance)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Drops every cached instance.
    pub fn clear(&self) {
        self.instances.clear();
        self.locks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn constructs_once_per_token() {
        let cache = SingletonCache::new();
        let token = Token::named("COUNTER");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_try_insert_with::<()>(&token, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(1u8) as Instance)
                })
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_construction_is_not_cached() {
        let cache = SingletonCache::new();
        let token = Token::named("FLAKY");

        let first = cache.get_or_try_insert_with(&token, || Err("boom"));
        assert!(first.is_err());
        assert!(!cache.contains(&token));

        let second = cache.get_or_try_insert_with::<&str>(&token, || Ok(Arc::new(2u8) as Instance));
        assert!(second.is_ok());
    }

    #[test]
    fn concurrent_first_resolutions_share_one_instance() {
        let cache = Arc::new(SingletonCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache
                        .get_or_try_insert_with::<()>(&Token::named("SHARED"), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(Arc::new(()) as Instance)
                        })
                        .unwrap()
                })
            })
            .collect();

        let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn clear_resets_cache() {
        let cache = SingletonCache::new();
        let token = Token::named("RESET");
        cache
            .get_or_try_insert_with::<()>(&token, || Ok(Arc::new(()) as Instance))
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
