//! Resource store contract and the built-in stores.
//!
//! # Responsibility
//! - Define the `fetch(path)` capability consumed by the SQL cache.
//! - Resolve logical paths against a directory or an embedded table.
//!
//! # Invariants
//! - Logical paths are relative and `/`-separated; `.`/`..` segments never
//!   reach the filesystem.
//! - A missing resource is `FetchError::NotFound`, every other fault is `Io`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static LOGICAL_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-.]+(/[A-Za-z0-9_\-.]+)*$").expect("valid logical path regex")
});

/// Fault reported by a resource store.
#[derive(Debug)]
pub enum FetchError {
    NotFound,
    Io(io::Error),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "resource not found"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound => None,
            Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for FetchError {
    fn from(value: io::Error) -> Self {
        if value.kind() == io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(value)
        }
    }
}

/// Source of raw SQL bytes addressed by logical path.
pub trait ResourceStore: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

impl<S: ResourceStore + ?Sized> ResourceStore for Arc<S> {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(path)
    }
}

impl<S: ResourceStore + ?Sized> ResourceStore for Box<S> {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(path)
    }
}

/// Returns whether `path` is an acceptable logical resource path.
pub fn is_valid_logical_path(path: &str) -> bool {
    LOGICAL_PATH_RE.is_match(path)
        && path
            .split('/')
            .all(|segment| segment != "." && segment != "..")
}

/// Store resolving logical paths under one root directory.
#[derive(Debug, Clone)]
pub struct DirectoryResourceStore {
    root: PathBuf,
}

impl DirectoryResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }
}

impl ResourceStore for DirectoryResourceStore {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        if !is_valid_logical_path(path) {
            return Err(FetchError::NotFound);
        }

        let full_path = path
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment));
        if full_path.is_dir() {
            return Err(FetchError::NotFound);
        }

        Ok(std::fs::read(full_path)?)
    }
}

/// In-memory store for SQL embedded at compile time.
///
/// Typically filled with `include_str!` so the SQL ships inside the binary.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceStore {
    entries: HashMap<String, &'static str>,
}

impl StaticResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[(&str, &'static str)]) -> Self {
        let mut store = Self::new();
        for (path, text) in entries {
            store.insert(path, text);
        }
        store
    }

    /// Adds or replaces one embedded resource.
    pub fn insert(&mut self, path: &str, text: &'static str) {
        self.entries.insert(path.to_string(), text);
    }

    pub fn with(mut self, path: &str, text: &'static str) -> Self {
        self.insert(path, text);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceStore for StaticResourceStore {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.entries
            .get(path)
            .map(|text| text.as_bytes().to_vec())
            .ok_or(FetchError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_valid_logical_path, DirectoryResourceStore, FetchError, ResourceStore,
        StaticResourceStore,
    };

    #[test]
    fn logical_path_validation() {
        assert!(is_valid_logical_path("sql/select_all.sql"));
        assert!(is_valid_logical_path("users-v2/find.by.id.sql"));

        assert!(!is_valid_logical_path(""));
        assert!(!is_valid_logical_path("/etc/passwd"));
        assert!(!is_valid_logical_path("sql/../secret.sql"));
        assert!(!is_valid_logical_path("sql//double.sql"));
        assert!(!is_valid_logical_path("./sql/x.sql"));
        assert!(!is_valid_logical_path("sql\\windows.sql"));
    }

    #[test]
    fn directory_store_reads_nested_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("sql")).expect("create sql dir");
        std::fs::write(dir.path().join("sql/one.sql"), "SELECT 1;").expect("write sql");

        let store = DirectoryResourceStore::new(dir.path());
        assert_eq!(store.root(), dir.path());
        let bytes = store.fetch("sql/one.sql").expect("file should be readable");
        assert_eq!(bytes, b"SELECT 1;");
    }

    #[test]
    fn directory_store_maps_missing_and_invalid_paths_to_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("sql")).expect("create sql dir");
        let store = DirectoryResourceStore::new(dir.path());

        assert!(matches!(
            store.fetch("sql/missing.sql"),
            Err(FetchError::NotFound)
        ));
        assert!(matches!(store.fetch("../escape.sql"), Err(FetchError::NotFound)));
        assert!(matches!(store.fetch("sql"), Err(FetchError::NotFound)));
    }

    #[test]
    fn static_store_serves_embedded_text() {
        let store = StaticResourceStore::new().with("sql/ping.sql", "SELECT 'pong';");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.fetch("sql/ping.sql").expect("embedded resource"),
            b"SELECT 'pong';"
        );
        assert!(matches!(store.fetch("sql/other.sql"), Err(FetchError::NotFound)));
    }
}
