//! Memoizing SQL text cache.
//!
//! # Responsibility
//! - Fetch SQL text once per logical path and serve later lookups from memory.
//! - Offer explicit, whole-cache invalidation.
//!
//! # Invariants
//! - One path maps to one text value between invalidations (first writer wins).
//! - A fetch that started before `invalidate_all` never repopulates the cache.
//! - Failed loads leave existing entries untouched.

use crate::error::{RepoError, RepoResult};
use crate::resource::store::{FetchError, ResourceStore};
use log::{debug, warn};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

#[derive(Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<String, Arc<str>>,
}

/// Process-scoped cache of SQL text keyed by logical path.
pub struct ResourceCache {
    store: Box<dyn ResourceStore>,
    state: RwLock<CacheState>,
}

impl ResourceCache {
    pub fn new(store: impl ResourceStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Returns the SQL text for `path`, fetching it on first use.
    ///
    /// # Errors
    /// - `ResourceNotFound` when the store has nothing at `path`.
    /// - `ResourceRead` when the store fails or the bytes are not UTF-8.
    pub fn load(&self, path: &str) -> RepoResult<Arc<str>> {
        let generation = {
            let state = self.read_state();
            if let Some(text) = state.entries.get(path) {
                debug!("event=sql_load module=resource status=hit path={path}");
                return Ok(Arc::clone(text));
            }
            state.generation
        };

        let started_at = Instant::now();
        let text = match self.fetch_text(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    "event=sql_load module=resource status=error path={} error_code={} error={}",
                    path,
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        let mut state = self.write_state();
        if state.generation != generation {
            debug!("event=sql_load module=resource status=stale path={path}");
            return Ok(text);
        }
        let cached = Arc::clone(state.entries.entry(path.to_string()).or_insert(text));
        debug!(
            "event=sql_load module=resource status=miss path={} duration_ms={}",
            path,
            started_at.elapsed().as_millis()
        );
        Ok(cached)
    }

    /// Drops every cached entry; the next `load` fetches again.
    pub fn invalidate_all(&self) {
        let mut state = self.write_state();
        let dropped = state.entries.len();
        state.entries.clear();
        state.generation = state.generation.wrapping_add(1);
        debug!("event=sql_cache_clear module=resource status=ok dropped={dropped}");
    }

    pub fn contains(&self, path: &str) -> bool {
        self.read_state().entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns sorted cached paths.
    pub fn cached_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.read_state().entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn fetch_text(&self, path: &str) -> RepoResult<Arc<str>> {
        let bytes = self.store.fetch(path).map_err(|err| match err {
            FetchError::NotFound => RepoError::ResourceNotFound {
                path: path.to_string(),
            },
            FetchError::Io(source) => RepoError::ResourceRead {
                path: path.to_string(),
                source,
            },
        })?;

        let text = String::from_utf8(bytes).map_err(|err| RepoError::ResourceRead {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })?;
        Ok(Arc::from(text))
    }

    // Entries are only ever whole `Arc<str>` values, so a poisoned lock still
    // holds a consistent map.
    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceCache;
    use crate::error::RepoErrorKind;
    use crate::resource::store::{FetchError, ResourceStore, StaticResourceStore};
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingStore {
        texts: Mutex<HashMap<String, Vec<u8>>>,
        fetches: AtomicUsize,
    }

    impl CountingStore {
        fn with(self, path: &str, bytes: &[u8]) -> Self {
            self.set(path, bytes);
            self
        }

        fn set(&self, path: &str, bytes: &[u8]) {
            self.texts
                .lock()
                .expect("store lock")
                .insert(path.to_string(), bytes.to_vec());
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ResourceStore for CountingStore {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if path == "sql/broken.sql" {
                return Err(FetchError::Io(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "denied",
                )));
            }
            self.texts
                .lock()
                .expect("store lock")
                .get(path)
                .cloned()
                .ok_or(FetchError::NotFound)
        }
    }

    #[test]
    fn second_load_is_served_from_memory() {
        let store = Arc::new(CountingStore::default().with("sql/a.sql", b"SELECT 1;"));
        let cache = ResourceCache::new(Arc::clone(&store));

        let first = cache.load("sql/a.sql").expect("first load");
        let second = cache.load("sql/a.sql").expect("second load");

        assert_eq!(&*first, "SELECT 1;");
        assert_eq!(first, second);
        assert_eq!(store.fetches(), 1);
        assert!(cache.contains("sql/a.sql"));
    }

    #[test]
    fn invalidate_all_forces_a_fresh_fetch() {
        let store = Arc::new(CountingStore::default().with("sql/a.sql", b"SELECT 1;"));
        let cache = ResourceCache::new(Arc::clone(&store));
        cache.load("sql/a.sql").expect("first load");

        store.set("sql/a.sql", b"SELECT 2;");
        cache.invalidate_all();
        assert!(cache.is_empty());

        let reloaded = cache.load("sql/a.sql").expect("reload");
        assert_eq!(&*reloaded, "SELECT 2;");
        assert_eq!(store.fetches(), 2);
    }

    #[test]
    fn missing_and_unreadable_resources_map_to_distinct_kinds() {
        let cache = ResourceCache::new(CountingStore::default());

        let missing = cache.load("sql/none.sql").expect_err("missing must fail");
        assert_eq!(missing.kind(), RepoErrorKind::ResourceNotFound);

        let broken = cache.load("sql/broken.sql").expect_err("io fault must fail");
        assert_eq!(broken.kind(), RepoErrorKind::ResourceReadError);
    }

    #[test]
    fn invalid_utf8_is_a_read_error() {
        let cache =
            ResourceCache::new(CountingStore::default().with("sql/bin.sql", &[0xff, 0xfe, 0x00]));
        let err = cache.load("sql/bin.sql").expect_err("invalid utf-8 must fail");
        assert_eq!(err.kind(), RepoErrorKind::ResourceReadError);
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_load_keeps_previous_entries() {
        let cache = ResourceCache::new(StaticResourceStore::new().with("sql/a.sql", "SELECT 1;"));
        cache.load("sql/a.sql").expect("load");
        cache.load("sql/missing.sql").expect_err("missing must fail");

        assert_eq!(cache.cached_paths(), vec!["sql/a.sql".to_string()]);
    }

    #[test]
    fn concurrent_first_loads_agree_on_one_value() {
        let store = Arc::new(CountingStore::default().with("sql/a.sql", b"SELECT 42;"));
        let cache = Arc::new(ResourceCache::new(Arc::clone(&store)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.load("sql/a.sql").expect("load"))
            })
            .collect();
        let texts: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread join"))
            .collect();

        let cached = cache.load("sql/a.sql").expect("cached load");
        assert!(texts.iter().all(|text| **text == *cached));
        assert_eq!(&*cached, "SELECT 42;");
        assert_eq!(cache.len(), 1);
    }

    struct InvalidatingStore {
        cache: Mutex<Option<Arc<ResourceCache>>>,
    }

    impl ResourceStore for InvalidatingStore {
        fn fetch(&self, _path: &str) -> Result<Vec<u8>, FetchError> {
            if let Some(cache) = self.cache.lock().expect("store lock").as_ref() {
                cache.invalidate_all();
            }
            Ok(b"SELECT 'old';".to_vec())
        }
    }

    #[test]
    fn load_racing_invalidation_does_not_repopulate_cache() {
        let store = Arc::new(InvalidatingStore {
            cache: Mutex::new(None),
        });
        let cache = Arc::new(ResourceCache::new(Arc::clone(&store)));
        *store.cache.lock().expect("store lock") = Some(Arc::clone(&cache));

        let text = cache.load("sql/a.sql").expect("load");
        assert_eq!(&*text, "SELECT 'old';");
        assert!(!cache.contains("sql/a.sql"));

        *store.cache.lock().expect("store lock") = None;
    }
}
