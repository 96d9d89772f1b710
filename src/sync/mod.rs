//! Index synchronization
//!
//! Decides whether the stored collection still reflects the current record
//! set and, when it does not, rebuilds it from scratch in fixed-size
//! embed+upsert batches. This is the only component that creates, deletes,
//! or bulk-writes collections.

use crate::config::Config;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::records::{normalize_value, NormalizedRecord, RecordSource};
use crate::store::{Collection, IndexStore, IndexedEntry, StoreError};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How a stored collection is compared with the current record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalenessPolicy {
    /// Compare item count with the number of distinct record ids.
    /// Swapping one record for another of the same total is not detected.
    #[default]
    Count,
    /// Compare the stored id set with the current one
    Ids,
}

impl FromStr for StalenessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(StalenessPolicy::Count),
            "ids" => Ok(StalenessPolicy::Ids),
            other => Err(format!(
                "unknown staleness policy '{}', expected 'count' or 'ids'",
                other
            )),
        }
    }
}

/// Outcome of a synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Stored collection matched, nothing re-embedded
    Fresh,
    /// No collection existed; created and populated
    Created,
    /// Stored collection was stale; dropped and rebuilt
    Rebuilt,
    /// Existing empty collection populated in place
    Populated,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStatus::Fresh => "fresh",
            SyncStatus::Created => "created",
            SyncStatus::Rebuilt => "rebuilt",
            SyncStatus::Populated => "populated",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("upsert failed: {0}")]
    Store(#[from] StoreError),

    #[error("embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// A batch that could not be embedded or written
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    /// 1-based batch number
    pub batch: usize,
    pub first_id: String,
    pub size: usize,
    pub error: String,
}

/// Result of [`IndexSynchronizer::sync`]
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub collection: String,
    /// Raw elements supplied, well-formed or not
    pub records: usize,
    /// Malformed records excluded before embedding
    pub skipped: usize,
    pub batches: usize,
    pub indexed: usize,
    pub failed_batches: Vec<BatchFailure>,
    /// Items in the collection after the run
    pub stored_items: usize,
    pub duration_ms: u64,
}

/// Synchronizer settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub collection: String,
    pub batch_size: usize,
    pub staleness: StalenessPolicy,
}

impl SyncConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.index.collection.clone(),
            batch_size: config.embedding.batch_size,
            staleness: config.index.staleness,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Keeps one collection in step with a [`RecordSource`]
pub struct IndexSynchronizer {
    provider: Arc<dyn EmbeddingProvider>,
    config: SyncConfig,
}

impl IndexSynchronizer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: SyncConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Bring the configured collection up to date and return it.
    ///
    /// Store-level failures (open, create, delete) abort; a failing batch
    /// is logged and recorded in the report while later batches proceed.
    pub fn sync<S: IndexStore>(
        &self,
        source: &RecordSource,
        store: &S,
    ) -> Result<(S::Collection, SyncReport), StoreError> {
        let start = Instant::now();
        let name = self.config.collection.as_str();
        let current_ids = source.ids();

        let (collection, status) = match store.get(name)? {
            Some(existing) => {
                let stored = existing.count()?;
                let matches = self.matches_records(&existing, stored, &current_ids)?;

                if matches && stored > 0 {
                    info!(
                        "Collection '{}' unchanged ({} items), reusing stored embeddings",
                        name, stored
                    );
                    let report = SyncReport {
                        status: SyncStatus::Fresh,
                        collection: name.to_string(),
                        records: source.len(),
                        skipped: 0,
                        batches: 0,
                        indexed: 0,
                        failed_batches: Vec::new(),
                        stored_items: stored,
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                    return Ok((existing, report));
                }

                if matches {
                    (existing, SyncStatus::Populated)
                } else {
                    info!(
                        "Collection '{}' is stale (stored: {}, records: {}), rebuilding",
                        name,
                        stored,
                        current_ids.len()
                    );
                    drop(existing);
                    store.delete(name)?;
                    (store.create(name)?, SyncStatus::Rebuilt)
                }
            }
            None => {
                info!("Collection '{}' not found, creating", name);
                (store.create(name)?, SyncStatus::Created)
            }
        };

        let mut report = self.rebuild(source, &collection);
        report.status = status;
        report.stored_items = collection.count()?;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Sync of '{}' {}: {} indexed, {} skipped, {} of {} batches failed, {} items stored ({}ms)",
            name,
            report.status,
            report.indexed,
            report.skipped,
            report.failed_batches.len(),
            report.batches,
            report.stored_items,
            report.duration_ms
        );

        Ok((collection, report))
    }

    fn matches_records<C: Collection>(
        &self,
        collection: &C,
        stored: usize,
        current_ids: &AHashSet<String>,
    ) -> Result<bool, StoreError> {
        if stored != current_ids.len() {
            return Ok(false);
        }
        match self.config.staleness {
            StalenessPolicy::Count => Ok(true),
            StalenessPolicy::Ids => Ok(collection.ids()? == *current_ids),
        }
    }

    /// Normalize every record and write them in batches
    fn rebuild<C: Collection>(&self, source: &RecordSource, collection: &C) -> SyncReport {
        let mut normalized = Vec::with_capacity(source.len());
        let mut skipped = 0;

        for (doc_type, value) in source.iter() {
            match normalize_value(value, doc_type) {
                Ok(record) => normalized.push(record),
                Err(e) => {
                    warn!("Skipping malformed record: {}", e);
                    skipped += 1;
                }
            }
        }

        let batch_size = self.config.batch_size.max(1);
        let batches = normalized.len().div_ceil(batch_size);
        let mut indexed = 0;
        let mut failed_batches = Vec::new();

        if normalized.is_empty() {
            info!("No valid records to embed");
        } else {
            info!(
                "Embedding {} records in {} batches (batch size {})",
                normalized.len(),
                batches,
                batch_size
            );
        }

        for (i, chunk) in normalized.chunks(batch_size).enumerate() {
            match self.process_batch(chunk, collection) {
                Ok(count) => {
                    indexed += count;
                    debug!("Batch {}/{} stored ({} items)", i + 1, batches, count);
                }
                Err(e) => {
                    let first_id = chunk
                        .first()
                        .map(|r| r.id.clone())
                        .unwrap_or_else(|| "N/A".to_string());
                    warn!(
                        "Batch {}/{} failed (first id: {}): {}",
                        i + 1,
                        batches,
                        first_id,
                        e
                    );
                    failed_batches.push(BatchFailure {
                        batch: i + 1,
                        first_id,
                        size: chunk.len(),
                        error: e.to_string(),
                    });
                }
            }
        }

        SyncReport {
            status: SyncStatus::Populated,
            collection: collection.name().to_string(),
            records: source.len(),
            skipped,
            batches,
            indexed,
            failed_batches,
            stored_items: 0,
            duration_ms: 0,
        }
    }

    /// Embed one batch and write it with a single store call
    fn process_batch<C: Collection>(
        &self,
        chunk: &[NormalizedRecord],
        collection: &C,
    ) -> Result<usize, BatchError> {
        let texts: Vec<String> = chunk.iter().map(|r| r.text.clone()).collect();

        let embeddings = self.provider.embed_batch(&texts)?;

        if embeddings.len() != chunk.len() {
            return Err(BatchError::CountMismatch {
                expected: chunk.len(),
                actual: embeddings.len(),
            });
        }

        let entries: Vec<IndexedEntry> = chunk
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(record, embedding)| IndexedEntry::new(record, embedding))
            .collect();

        collection.upsert(&entries)?;

        Ok(entries.len())
    }
}
