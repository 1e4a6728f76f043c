use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::domain::RuleConfig;

use super::loader::{CatalogError, RuleConfigSource};

/// Resolved configurations keyed by request type.
#[derive(Debug, Default)]
pub struct RuleConfigCache {
    entries: RwLock<HashMap<String, Arc<RuleConfig>>>,
}

impl RuleConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_of_request: &str) -> Option<Arc<RuleConfig>> {
        self.entries.read().get(type_of_request).cloned()
    }

    /// Insert or replace an entry.
    pub fn put(&self, type_of_request: impl Into<String>, config: Arc<RuleConfig>) {
        self.entries.write().insert(type_of_request.into(), config);
    }

    /// Remove an entry, returning it if present.
    pub fn invalidate(&self, type_of_request: &str) -> Option<Arc<RuleConfig>> {
        self.entries.write().remove(type_of_request)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Cached access to rule configurations.
///
/// The first caller for a type loads it; concurrent callers for the same type
/// wait for that load and share the result. Loads of different types do not
/// wait on each other.
pub struct RuleCatalog {
    source: Arc<dyn RuleConfigSource>,
    cache: RuleConfigCache,
    /// Per-type populate locks, present only while a load is in flight
    populating: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RuleCatalog {
    pub fn new(source: Arc<dyn RuleConfigSource>) -> Self {
        RuleCatalog {
            source,
            cache: RuleConfigCache::new(),
            populating: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the configuration for a request type.
    ///
    /// Blocks while the source loads; async callers use [`Self::resolve_async`].
    pub fn resolve(&self, type_of_request: &str) -> Result<Arc<RuleConfig>, CatalogError> {
        // Fast path: already cached
        if let Some(config) = self.cache.get(type_of_request) {
            return Ok(config);
        }

        self.populate(type_of_request, || {
            // Double-check after acquiring the type's lock
            if let Some(config) = self.cache.get(type_of_request) {
                return Ok(config);
            }

            let config = Arc::new(self.source.load(type_of_request)?);
            self.cache.put(type_of_request, config.clone());
            Ok(config)
        })
    }

    /// Drop the cached entry and load it again from the source.
    ///
    /// On failure the type is left uncached.
    pub fn reload(&self, type_of_request: &str) -> Result<Arc<RuleConfig>, CatalogError> {
        let config = self.populate(type_of_request, || {
            self.cache.invalidate(type_of_request);
            let config = Arc::new(self.source.load(type_of_request)?);
            self.cache.put(type_of_request, config.clone());
            Ok(config)
        })?;

        info!(type_of_request = %type_of_request, "Reloaded rule configuration");
        Ok(config)
    }

    /// [`Self::resolve`] with the source load moved off the async workers.
    pub async fn resolve_async(
        self: Arc<Self>,
        type_of_request: &str,
    ) -> Result<Arc<RuleConfig>, CatalogError> {
        if let Some(config) = self.cache.get(type_of_request) {
            return Ok(config);
        }

        let type_of_request = type_of_request.to_string();
        tokio::task::spawn_blocking(move || self.resolve(&type_of_request))
            .await
            .map_err(|e| CatalogError::Task(e.to_string()))?
    }

    /// [`Self::reload`] with the source load moved off the async workers.
    pub async fn reload_async(
        self: Arc<Self>,
        type_of_request: &str,
    ) -> Result<Arc<RuleConfig>, CatalogError> {
        let type_of_request = type_of_request.to_string();
        tokio::task::spawn_blocking(move || self.reload(&type_of_request))
            .await
            .map_err(|e| CatalogError::Task(e.to_string()))?
    }

    /// Drop every cached configuration.
    pub fn clear(&self) {
        self.cache.clear();
        info!("Rule configuration cache cleared");
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Number of types with a load in flight.
    pub fn loading(&self) -> usize {
        self.populating.lock().len()
    }

    /// Run `load` holding the populate lock for one type only.
    fn populate<T>(
        &self,
        type_of_request: &str,
        load: impl FnOnce() -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let lock = self
            .populating
            .lock()
            .entry(type_of_request.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock();
            load()
        };

        // Last holder removes the entry
        let mut populating = self.populating.lock();
        drop(lock);
        if populating
            .get(type_of_request)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            populating.remove(type_of_request);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Rule;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Source serving in-memory configs and counting loads.
    #[derive(Default)]
    struct CountingSource {
        configs: Mutex<HashMap<String, RuleConfig>>,
        loads: AtomicUsize,
    }

    impl CountingSource {
        fn set(&self, type_of_request: &str, rule_ids: &[&str]) {
            let mut config = RuleConfig::empty(type_of_request);
            config.rules = rule_ids.iter().map(|id| Rule::new(*id)).collect();
            self.configs.lock().insert(type_of_request.to_string(), config);
        }
    }

    impl RuleConfigSource for CountingSource {
        fn load(&self, type_of_request: &str) -> Result<RuleConfig, CatalogError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.configs
                .lock()
                .get(type_of_request)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(type_of_request.to_string()))
        }
    }

    #[test]
    fn test_resolve_caches() {
        let source = Arc::new(CountingSource::default());
        source.set("quote", &["r1"]);
        let catalog = RuleCatalog::new(source.clone());

        let first = catalog.resolve("quote").unwrap();
        let second = catalog.resolve("quote").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.cached(), 1);
    }

    #[test]
    fn test_not_found_is_not_cached() {
        let source = Arc::new(CountingSource::default());
        let catalog = RuleCatalog::new(source.clone());

        assert!(matches!(
            catalog.resolve("missing"),
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(catalog.cached(), 0);

        source.set("missing", &["r1"]);
        assert!(catalog.resolve("missing").is_ok());
    }

    #[test]
    fn test_reload_replaces_entry() {
        let source = Arc::new(CountingSource::default());
        source.set("quote", &["r1"]);
        let catalog = RuleCatalog::new(source.clone());

        let before = catalog.resolve("quote").unwrap();
        source.set("quote", &["r1", "r2"]);

        // cached value still served until reload
        assert_eq!(catalog.resolve("quote").unwrap().rules.len(), 1);

        let after = catalog.reload("quote").unwrap();
        assert_eq!(after.rules.len(), 2);
        assert_eq!(before.rules.len(), 1);
        assert_eq!(catalog.resolve("quote").unwrap().rules.len(), 2);
    }

    #[test]
    fn test_failed_reload_leaves_type_uncached() {
        let source = Arc::new(CountingSource::default());
        source.set("quote", &["r1"]);
        let catalog = RuleCatalog::new(source.clone());
        catalog.resolve("quote").unwrap();

        source.configs.lock().clear();
        assert!(catalog.reload("quote").is_err());
        assert_eq!(catalog.cached(), 0);
    }

    #[test]
    fn test_clear() {
        let source = Arc::new(CountingSource::default());
        source.set("a", &["r1"]);
        source.set("b", &["r1"]);
        let catalog = RuleCatalog::new(source.clone());
        catalog.resolve("a").unwrap();
        catalog.resolve("b").unwrap();

        catalog.clear();
        assert_eq!(catalog.cached(), 0);

        catalog.resolve("a").unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_resolve_loads_once() {
        let source = Arc::new(CountingSource::default());
        source.set("quote", &["r1"]);
        let catalog = Arc::new(RuleCatalog::new(source.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = catalog.clone();
                std::thread::spawn(move || catalog.resolve("quote").map(|c| c.rules.len()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 1);
        }
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    /// Source whose "slow" type blocks until released.
    struct GatedSource {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl RuleConfigSource for GatedSource {
        fn load(&self, type_of_request: &str) -> Result<RuleConfig, CatalogError> {
            if type_of_request == "slow" {
                self.release
                    .lock()
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(|_| CatalogError::Validation("slow load never released".into()))?;
            }
            Ok(RuleConfig::empty(type_of_request))
        }
    }

    #[test]
    fn test_slow_load_does_not_block_other_types() {
        let (release, gate) = mpsc::channel();
        let catalog = Arc::new(RuleCatalog::new(Arc::new(GatedSource {
            release: Mutex::new(gate),
        })));

        let slow = {
            let catalog = catalog.clone();
            std::thread::spawn(move || catalog.resolve("slow"))
        };
        while catalog.loading() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }

        // Completes while "slow" is still loading
        assert_eq!(catalog.resolve("fast").unwrap().type_of_request, "fast");
        assert_eq!(catalog.loading(), 1);

        release.send(()).unwrap();
        assert_eq!(slow.join().unwrap().unwrap().type_of_request, "slow");
        assert_eq!(catalog.loading(), 0);
        assert_eq!(catalog.cached(), 2);
    }

    #[tokio::test]
    async fn test_async_resolve_and_reload() {
        let source = Arc::new(CountingSource::default());
        source.set("quote", &["r1"]);
        let catalog = Arc::new(RuleCatalog::new(source.clone()));

        let first = catalog.clone().resolve_async("quote").await.unwrap();
        let second = catalog.clone().resolve_async("quote").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        source.set("quote", &["r1", "r2"]);
        let reloaded = catalog.clone().reload_async("quote").await.unwrap();
        assert_eq!(reloaded.rules.len(), 2);

        assert!(matches!(
            catalog.clone().resolve_async("missing").await,
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(catalog.loading(), 0);
    }

    #[test]
    fn test_cache_operations() {
        let cache = RuleConfigCache::new();
        assert!(cache.is_empty());

        cache.put("a", Arc::new(RuleConfig::empty("a")));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_some());

        assert!(cache.invalidate("a").is_some());
        assert!(cache.invalidate("a").is_none());
        assert!(cache.get("a").is_none());
    }
}
