//! Repository façade: the entry point application code calls.
//!
//! # Responsibility
//! - Run the fixed pipeline: resolve path, load SQL, bind, execute, map.
//! - Offer "implicit" (operation id) and "raw" (explicit path) variants.
//! - Own the SQL cache for its lifetime (`preload`, `clear_cache`).
//!
//! # Invariants
//! - Each call builds its own `ParameterSet`; nothing is shared across calls.
//! - Any failure aborts the call; already cached SQL stays cached.

use crate::config::RepositoryConfig;
use crate::engine::ExecutionEngine;
use crate::error::{RepoError, RepoResult};
use crate::executor::{Record, SqlExecutor};
use crate::mapper::RowTarget;
use crate::params::{bind, ParamSource, ParameterSet, Params};
use crate::registry::SqlPathRegistry;
use crate::resource::{DirectoryResourceStore, ResourceCache, ResourceStore};
use log::{info, warn};
use std::sync::Arc;

/// Typed, parameterized access to externally stored SQL.
pub struct SqlRepository<E: SqlExecutor> {
    cache: ResourceCache,
    registry: SqlPathRegistry,
    engine: ExecutionEngine<E>,
}

impl<E: SqlExecutor> SqlRepository<E> {
    pub fn new(
        store: impl ResourceStore + 'static,
        registry: SqlPathRegistry,
        executor: E,
    ) -> Self {
        Self {
            cache: ResourceCache::new(store),
            registry,
            engine: ExecutionEngine::new(executor),
        }
    }

    /// Builds a repository over `config.sql_root` and preloads `config.preload`.
    pub fn from_config(
        config: &RepositoryConfig,
        registry: SqlPathRegistry,
        executor: E,
    ) -> RepoResult<Self> {
        let store = DirectoryResourceStore::new(config.sql_root.clone());
        let sql_root = store.root().display().to_string();
        let repository = Self::new(store, registry, executor);
        repository.preload(&config.preload)?;
        info!(
            "event=repository_init module=repository status=ok sql_root={} operations={} preloaded={}",
            sql_root,
            repository.registry.len(),
            repository.cache.len()
        );
        Ok(repository)
    }

    pub fn registry(&self) -> &SqlPathRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn executor(&self) -> &E {
        self.engine.executor()
    }

    /// Runs the SQL registered for `operation` and maps every row.
    pub fn query<'p, T: RowTarget>(
        &self,
        operation: &str,
        params: impl Into<Params<'p>>,
    ) -> RepoResult<Vec<T>> {
        let path = self.registry.resolve(operation)?;
        self.raw_query(path, params)
    }

    /// Runs the SQL at `path` and maps every row.
    pub fn raw_query<'p, T: RowTarget>(
        &self,
        path: &str,
        params: impl Into<Params<'p>>,
    ) -> RepoResult<Vec<T>> {
        self.pipeline("query", path, params.into(), |sql, set| {
            self.engine.query(sql, set)
        })
    }

    /// Runs the SQL at `path` and returns unmapped records.
    pub fn raw_query_records<'p>(
        &self,
        path: &str,
        params: impl Into<Params<'p>>,
    ) -> RepoResult<Vec<Record>> {
        self.pipeline("query_records", path, params.into(), |sql, set| {
            self.engine.query_records(sql, set)
        })
    }

    /// Runs the SQL registered for `operation`, expecting exactly one row.
    pub fn query_one<'p, T: RowTarget>(
        &self,
        operation: &str,
        params: impl Into<Params<'p>>,
    ) -> RepoResult<T> {
        let path = self.registry.resolve(operation)?;
        self.raw_query_one(path, params)
    }

    /// Runs the SQL at `path`, expecting exactly one row.
    pub fn raw_query_one<'p, T: RowTarget>(
        &self,
        path: &str,
        params: impl Into<Params<'p>>,
    ) -> RepoResult<T> {
        self.pipeline("query_one", path, params.into(), |sql, set| {
            self.engine.query_one(sql, set)
        })
    }

    /// Runs the statement registered for `operation`; returns affected rows.
    pub fn update<'p>(&self, operation: &str, params: impl Into<Params<'p>>) -> RepoResult<usize> {
        let path = self.registry.resolve(operation)?;
        self.raw_update(path, params)
    }

    /// Runs the statement at `path`; returns affected rows.
    pub fn raw_update<'p>(&self, path: &str, params: impl Into<Params<'p>>) -> RepoResult<usize> {
        self.pipeline("update", path, params.into(), |sql, set| {
            self.engine.update(sql, set)
        })
    }

    /// Runs the statement registered for `operation` once per item.
    pub fn batch_update<P: ParamSource>(
        &self,
        operation: &str,
        items: &[P],
    ) -> RepoResult<Vec<usize>> {
        let path = self.registry.resolve(operation)?;
        self.raw_batch_update(path, items)
    }

    /// Runs the statement at `path` once per item, in order.
    pub fn raw_batch_update<P: ParamSource>(
        &self,
        path: &str,
        items: &[P],
    ) -> RepoResult<Vec<usize>> {
        let result = self
            .cache
            .load(path)
            .and_then(|sql| self.engine.batch_update(&sql, items));
        self.log_failure("batch_update", path, "object", result)
    }

    /// Loads every path into the cache, stopping at the first failure.
    ///
    /// # Errors
    /// - `Preload` naming the failed path and wrapping its cause.
    pub fn preload<S: AsRef<str>>(&self, paths: &[S]) -> RepoResult<()> {
        for path in paths {
            let path = path.as_ref();
            self.cache.load(path).map_err(|err| RepoError::Preload {
                path: path.to_string(),
                source: Box::new(err),
            })?;
        }
        Ok(())
    }

    /// Preloads every path the registry declares.
    pub fn preload_registered(&self) -> RepoResult<()> {
        self.preload(&self.registry.paths())
    }

    /// Drops all cached SQL text.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    fn pipeline<R>(
        &self,
        op: &'static str,
        path: &str,
        params: Params<'_>,
        execute: impl FnOnce(&str, &ParameterSet) -> RepoResult<R>,
    ) -> RepoResult<R> {
        let shape = params.shape();
        let result = self.load_and_bind(path, params).and_then(|(sql, set)| execute(&sql, &set));
        self.log_failure(op, path, shape, result)
    }

    fn load_and_bind(&self, path: &str, params: Params<'_>) -> RepoResult<(Arc<str>, ParameterSet)> {
        let sql = self.cache.load(path)?;
        let set = bind(params)?;
        Ok((sql, set))
    }

    fn log_failure<R>(
        &self,
        op: &'static str,
        path: &str,
        shape: &'static str,
        result: RepoResult<R>,
    ) -> RepoResult<R> {
        if let Err(err) = &result {
            warn!(
                "event=repository_call module=repository op={} status=error path={} params={} error_code={}",
                op,
                path,
                shape,
                err.code()
            );
        }
        result
    }
}
