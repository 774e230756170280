//! Operation-to-SQL-path registry.
//!
//! # Responsibility
//! - Hold the declared association between operation ids and SQL paths.
//! - Resolve the path for "implicit" façade calls.
//!
//! # Invariants
//! - One operation id maps to exactly one path; duplicates are rejected.
//! - A missing declaration is a configuration error, never a fallback.

use crate::error::{RepoError, RepoResult};
use crate::resource::is_valid_logical_path;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Static declaration binding one operation to its SQL path.
///
/// Usually kept in a `const` slice next to the code that issues the calls:
///
/// ```
/// use ravesql_core::SqlPathDecl;
///
/// const USER_QUERIES: &[SqlPathDecl] = &[
///     SqlPathDecl::new("users.find_all", "sql/select_all.sql"),
///     SqlPathDecl::new("users.find_by_id", "sql/select_by_id.sql"),
/// ];
/// # assert_eq!(USER_QUERIES.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlPathDecl {
    pub operation: &'static str,
    pub path: &'static str,
}

impl SqlPathDecl {
    pub const fn new(operation: &'static str, path: &'static str) -> Self {
        Self { operation, path }
    }
}

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidOperationId(String),
    DuplicateOperation(String),
    InvalidPath { operation: String, path: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOperationId(value) => write!(f, "operation id is invalid: `{value}`"),
            Self::DuplicateOperation(value) => {
                write!(f, "operation already has a SQL path: `{value}`")
            }
            Self::InvalidPath { operation, path } => {
                write!(f, "invalid SQL path `{path}` for operation `{operation}`")
            }
        }
    }
}

impl Error for RegistryError {}

/// Registry of operation ids and their SQL paths.
#[derive(Debug, Clone, Default)]
pub struct SqlPathRegistry {
    paths: BTreeMap<String, String>,
}

impl SqlPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a declaration table.
    pub fn from_decls(decls: &[SqlPathDecl]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for decl in decls {
            registry.register(decl.operation, decl.path)?;
        }
        Ok(registry)
    }

    /// Registers one operation id with its SQL path.
    pub fn register(&mut self, operation: &str, path: &str) -> Result<(), RegistryError> {
        let operation = operation.trim();
        if !is_valid_operation_id(operation) {
            return Err(RegistryError::InvalidOperationId(operation.to_string()));
        }
        let path = path.trim();
        if !is_valid_logical_path(path) {
            return Err(RegistryError::InvalidPath {
                operation: operation.to_string(),
                path: path.to_string(),
            });
        }
        if self.paths.contains_key(operation) {
            return Err(RegistryError::DuplicateOperation(operation.to_string()));
        }

        self.paths.insert(operation.to_string(), path.to_string());
        Ok(())
    }

    /// Chaining variant of [`register`](Self::register).
    pub fn with(mut self, operation: &str, path: &str) -> Result<Self, RegistryError> {
        self.register(operation, path)?;
        Ok(self)
    }

    /// Returns the SQL path declared for `operation`.
    ///
    /// # Errors
    /// - `NoDescriptorFound` when nothing is registered for the operation.
    pub fn resolve(&self, operation: &str) -> RepoResult<&str> {
        let normalized = operation.trim();
        self.paths
            .get(normalized)
            .map(String::as_str)
            .ok_or_else(|| RepoError::NoDescriptorFound {
                operation: normalized.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns sorted operation ids.
    pub fn operations(&self) -> Vec<String> {
        self.paths.keys().cloned().collect()
    }

    /// Returns the distinct registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.paths.values().cloned().collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

fn is_valid_operation_id(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
}
