//! Core of RaveSQL: typed, parameterized access to externally stored SQL.
//! SQL lives in resource files; this crate resolves, caches, binds, runs, and maps it.

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod mapper;
pub mod params;
pub mod registry;
pub mod repository;
pub mod resource;

pub use config::RepositoryConfig;
pub use engine::ExecutionEngine;
pub use error::{RepoError, RepoErrorKind, RepoResult};
pub use executor::{
    open_db, open_db_in_memory, BindError, ExecutorError, Record, SqlExecutor, SqliteExecutor,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingStatus};
pub use mapper::{from_text_column, map_row, FromColumn, MappingError, RowTarget};
pub use params::{bind, bind_object, IntoSqlValue, ParamSource, ParameterSet, Params};
pub use registry::{RegistryError, SqlPathDecl, SqlPathRegistry};
pub use repository::SqlRepository;
pub use resource::{
    is_valid_logical_path, DirectoryResourceStore, FetchError, ResourceCache, ResourceStore,
    StaticResourceStore,
};
pub use rusqlite::types::Value;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
