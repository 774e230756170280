//! Repository-level error surface.
//!
//! # Responsibility
//! - Define the single error family returned by every façade operation.
//! - Keep underlying executor faults reachable through `Error::source`.
//!
//! # Invariants
//! - Executor faults are always wrapped, never returned raw.
//! - Every variant maps to exactly one stable `RepoErrorKind`.

use crate::executor::ExecutorError;
use crate::mapper::MappingError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub type RepoResult<T> = Result<T, RepoError>;

/// Stable, comparable classification of a `RepoError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoErrorKind {
    ResourceNotFound,
    ResourceReadError,
    NoDescriptorFound,
    MalformedParameters,
    MappingFailure,
    NoSuchRow,
    MultipleRowsReturned,
    ExecutionFailure,
    PreloadFailure,
}

/// Error returned by resource loading, binding, execution and mapping.
#[derive(Debug)]
pub enum RepoError {
    /// The resource store has nothing at `path`.
    ResourceNotFound { path: String },
    /// Fetching or decoding the resource failed.
    ResourceRead { path: String, source: io::Error },
    /// No SQL path is registered for the operation.
    NoDescriptorFound { operation: String },
    MalformedParameters(String),
    Mapping(MappingError),
    NoSuchRow,
    MultipleRowsReturned { count: usize },
    Execution(ExecutorError),
    /// Eager loading stopped at `path`.
    Preload { path: String, source: Box<RepoError> },
}

impl RepoError {
    pub fn kind(&self) -> RepoErrorKind {
        match self {
            Self::ResourceNotFound { .. } => RepoErrorKind::ResourceNotFound,
            Self::ResourceRead { .. } => RepoErrorKind::ResourceReadError,
            Self::NoDescriptorFound { .. } => RepoErrorKind::NoDescriptorFound,
            Self::MalformedParameters(_) => RepoErrorKind::MalformedParameters,
            Self::Mapping(_) => RepoErrorKind::MappingFailure,
            Self::NoSuchRow => RepoErrorKind::NoSuchRow,
            Self::MultipleRowsReturned { .. } => RepoErrorKind::MultipleRowsReturned,
            Self::Execution(_) => RepoErrorKind::ExecutionFailure,
            Self::Preload { .. } => RepoErrorKind::PreloadFailure,
        }
    }

    /// Short machine-friendly code used in log lines.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            RepoErrorKind::ResourceNotFound => "resource_not_found",
            RepoErrorKind::ResourceReadError => "resource_read_error",
            RepoErrorKind::NoDescriptorFound => "no_descriptor_found",
            RepoErrorKind::MalformedParameters => "malformed_parameters",
            RepoErrorKind::MappingFailure => "mapping_failure",
            RepoErrorKind::NoSuchRow => "no_such_row",
            RepoErrorKind::MultipleRowsReturned => "multiple_rows_returned",
            RepoErrorKind::ExecutionFailure => "execution_failure",
            RepoErrorKind::PreloadFailure => "preload_failure",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceNotFound { path } => write!(f, "SQL resource not found: {path}"),
            Self::ResourceRead { path, source } => {
                write!(f, "error reading SQL resource `{path}`: {source}")
            }
            Self::NoDescriptorFound { operation } => {
                write!(f, "no SQL path registered for operation `{operation}`")
            }
            Self::MalformedParameters(message) => write!(f, "malformed parameters: {message}"),
            Self::Mapping(err) => write!(f, "row mapping failed: {err}"),
            Self::NoSuchRow => write!(f, "query returned no rows, expected exactly one"),
            Self::MultipleRowsReturned { count } => {
                write!(f, "query returned {count} rows, expected exactly one")
            }
            Self::Execution(err) => write!(f, "statement execution failed: {err}"),
            Self::Preload { path, source } => {
                write!(f, "failed to preload SQL for path `{path}`: {source}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ResourceRead { source, .. } => Some(source),
            Self::Mapping(err) => Some(err),
            Self::Execution(err) => Some(&**err),
            Self::Preload { source, .. } => Some(&**source),
            Self::ResourceNotFound { .. }
            | Self::NoDescriptorFound { .. }
            | Self::MalformedParameters(_)
            | Self::NoSuchRow
            | Self::MultipleRowsReturned { .. } => None,
        }
    }
}

impl From<MappingError> for RepoError {
    fn from(value: MappingError) -> Self {
        Self::Mapping(value)
    }
}
