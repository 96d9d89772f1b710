//! Vector index store
//!
//! The pipeline sees the store only through [`IndexStore`] (named
//! collections) and [`Collection`] (upsert / query / count). Entries are
//! replace-on-write: upserting an existing id supersedes the whole entry.

mod ann;
mod sqlite;

pub use ann::{AnnHit, AnnIndex, AnnParams, AnnRow};
pub use sqlite::{SqliteCollection, SqliteStore};

use crate::records::{Attributes, DocType, NormalizedRecord};
use ahash::AHashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Predicate not supported: {0}")]
    PredicateUnsupported(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One embedded record as written to the store
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub id: String,
    pub doc_type: DocType,
    pub embedding: Vec<f32>,
    pub document: String,
    pub attributes: Attributes,
}

impl IndexedEntry {
    pub fn new(record: NormalizedRecord, embedding: Vec<f32>) -> Self {
        Self {
            id: record.id,
            doc_type: record.doc_type,
            embedding,
            document: record.text,
            attributes: record.attributes,
        }
    }
}

/// One ranked query result
#[derive(Debug, Clone)]
pub struct StoreHit {
    pub id: String,
    pub doc_type: DocType,
    /// Cosine distance, lower is closer
    pub distance: f32,
    pub document: String,
    pub attributes: Attributes,
}

/// Store-side filter applied during a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    DocType(DocType),
}

impl Predicate {
    pub fn matches(&self, doc_type: DocType) -> bool {
        match self {
            Predicate::DocType(wanted) => *wanted == doc_type,
        }
    }
}

/// A named set of indexed entries
pub trait Collection {
    fn name(&self) -> &str;

    /// Write a batch atomically; either every entry lands or none does
    fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), StoreError>;

    /// Up to `k` nearest entries, closest first
    fn query(
        &self,
        vector: &[f32],
        k: usize,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<StoreHit>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    fn ids(&self) -> Result<AHashSet<String>, StoreError>;
}

/// Capability set of the persisted index store
pub trait IndexStore {
    type Collection: Collection;

    /// Create a collection; fails if the name is taken
    fn create(&self, name: &str) -> Result<Self::Collection, StoreError>;

    /// Open an existing collection
    fn get(&self, name: &str) -> Result<Option<Self::Collection>, StoreError>;

    /// Drop a collection and every entry in it
    fn delete(&self, name: &str) -> Result<(), StoreError>;
}
