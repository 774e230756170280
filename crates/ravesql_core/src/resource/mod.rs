//! SQL resource retrieval and caching.
//!
//! # Responsibility
//! - Resolve logical SQL paths to text through a pluggable store.
//! - Memoize loaded text for the lifetime of the owning repository.
//!
//! # Invariants
//! - The resource content is opaque; only its path matters here.

pub mod cache;
pub mod store;

pub use cache::ResourceCache;
pub use store::{
    is_valid_logical_path, DirectoryResourceStore, FetchError, ResourceStore, StaticResourceStore,
};
