// SPDX-License-Identifier: Apache-2.0
//! Document storage.
//!
//! [`DocumentStore`] is the storage contract the rest of the system
//! consumes: create, update (failing when absent) and predicate query
//! with collapse/sort/projection/limit. [`MemoryStore`] is the bundled
//! implementation. [`Catalog`] layers the typed, versioned document
//! operations (datasets, maps, templates, user data) on top of any
//! store.

pub mod catalog;
pub mod memory;

pub use catalog::{Catalog, VersionSelector};
pub use memory::MemoryStore;

use netmap_filter::Predicate;
use serde_json::Value;
use thiserror::Error;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed document or logical id does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// Optimistic version check failed on update.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the caller based its update on.
        expected: u64,
        /// Version actually stored.
        actual: u64,
    },
    /// A stored document failed to decode into its typed form.
    #[error("document decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    /// Seed file I/O failure.
    #[error("seed load failed: {0}")]
    Io(#[from] std::io::Error),
    /// A store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// One sort key for a query.
#[derive(Debug, Clone)]
pub struct SortKey {
    /// Top-level field to sort by.
    pub field: String,
    /// Descending when set.
    pub descending: bool,
}

impl SortKey {
    /// Descending sort on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Query shaping options beyond the predicate itself.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Return only the highest-`version` document per distinct value of
    /// this top-level field.
    pub collapse_key: Option<String>,
    /// Stable sort keys, applied innermost-last.
    pub sort: Vec<SortKey>,
    /// Restrict returned documents to these top-level fields.
    pub fields: Option<Vec<String>>,
    /// Cap on returned documents.
    pub limit: Option<usize>,
}

/// The storage contract.
pub trait DocumentStore: Send + Sync {
    /// Insert a document under `id`.
    fn create(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Replace the document under `id`, failing with
    /// [`StoreError::NotFound`] when absent.
    fn update(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Return the documents matching `predicate`, shaped by `options`.
    fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<Vec<Value>, StoreError>;
}
