//! SQLite-backed index store
//!
//! Entries (vector, document, flattened attributes, variant tag) are
//! persisted per collection. Queries run against an HNSW graph that is
//! rebuilt lazily whenever the collection's write version moves.

use super::{
    AnnIndex, AnnParams, AnnRow, Collection, IndexStore, IndexedEntry, Predicate, StoreError,
    StoreHit,
};
use crate::records::{Attributes, DocType};
use ahash::AHashSet;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

const DB_FILE: &str = "index.sqlite";

/// Persisted store of named collections
pub struct SqliteStore {
    pool: DbPool,
    params: AnnParams,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the store inside `dir`
    pub fn open(dir: &Path, params: AnnParams) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DB_FILE);

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))?;

            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
        }

        let store = Self { pool, params, path };
        store.migrate()?;

        tracing::debug!("Opened index store at {}", store.path.display());

        Ok(store)
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of every collection in the store
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = get_conn(&self.pool)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying index store migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    fn handle(&self, id: i64, name: &str) -> SqliteCollection {
        SqliteCollection {
            pool: self.pool.clone(),
            id,
            name: name.to_string(),
            params: self.params,
            cache: RefCell::new(None),
        }
    }
}

impl IndexStore for SqliteStore {
    type Collection = SqliteCollection;

    fn create(&self, name: &str) -> Result<SqliteCollection, StoreError> {
        if self.get(name)?.is_some() {
            return Err(StoreError::CollectionExists(name.to_string()));
        }

        let conn = get_conn(&self.pool)?;
        conn.execute(
            "INSERT INTO collections (name, created_at) VALUES (?1, datetime('now'))",
            params![name],
        )?;
        let id = conn.last_insert_rowid();

        tracing::info!("Created collection '{}'", name);

        Ok(self.handle(id, name))
    }

    fn get(&self, name: &str) -> Result<Option<SqliteCollection>, StoreError> {
        let conn = get_conn(&self.pool)?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id.map(|id| self.handle(id, name)))
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut conn = get_conn(&self.pool)?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM entries WHERE collection_id IN (SELECT id FROM collections WHERE name = ?1)",
            params![name],
        )?;
        let removed = tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        tx.commit()?;

        if removed == 0 {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }

        tracing::info!("Deleted collection '{}'", name);
        Ok(())
    }
}

struct CachedIndex {
    version: i64,
    index: AnnIndex,
}

/// Handle to one collection of a [`SqliteStore`]
pub struct SqliteCollection {
    pool: DbPool,
    id: i64,
    name: String,
    params: AnnParams,
    cache: RefCell<Option<CachedIndex>>,
}

impl SqliteCollection {
    fn version(&self, conn: &Connection) -> Result<i64, StoreError> {
        conn.query_row(
            "SELECT version FROM collections WHERE id = ?1",
            params![self.id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::CollectionNotFound(self.name.clone()))
    }

    fn ensure_index(&self, conn: &Connection, version: i64) -> Result<(), StoreError> {
        if let Some(cached) = self.cache.borrow().as_ref() {
            if cached.version == version {
                return Ok(());
            }
        }

        let dimension: Option<i64> = conn.query_row(
            "SELECT dimension FROM collections WHERE id = ?1",
            params![self.id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, doc_type, embedding FROM entries WHERE collection_id = ?1 ORDER BY id",
        )?;
        let raw_rows = stmt
            .query_map(params![self.id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(raw_rows.len());
        for (id, doc_type, blob) in raw_rows {
            let doc_type = parse_doc_type(&doc_type)?;
            items.push((AnnRow { id, doc_type }, decode_vector(&blob)?));
        }

        tracing::debug!(
            "Building HNSW graph for '{}' ({} vectors, version {})",
            self.name,
            items.len(),
            version
        );

        let index = AnnIndex::build(self.params, dimension.unwrap_or(0) as usize, items)?;
        *self.cache.borrow_mut() = Some(CachedIndex { version, index });

        Ok(())
    }

    fn hydrate(&self, conn: &Connection, id: &str) -> Result<(String, Attributes), StoreError> {
        let (document, metadata): (String, String) = conn.query_row(
            "SELECT document, metadata FROM entries WHERE collection_id = ?1 AND id = ?2",
            params![self.id, id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let attributes = serde_json::from_str(&metadata)
            .map_err(|e| StoreError::Serialization(format!("metadata of {}: {}", id, e)))?;

        Ok((document, attributes))
    }
}

impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), StoreError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let dimension = first.embedding.len();
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            return Err(StoreError::InvalidDimension {
                expected: dimension,
                actual: bad.embedding.len(),
            });
        }

        let mut conn = get_conn(&self.pool)?;
        let tx = conn.transaction()?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT dimension FROM collections WHERE id = ?1",
                params![self.id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::CollectionNotFound(self.name.clone()))?;

        match stored {
            Some(expected) if expected as usize != dimension => {
                return Err(StoreError::InvalidDimension {
                    expected: expected as usize,
                    actual: dimension,
                });
            }
            Some(_) => {}
            None => {
                tx.execute(
                    "UPDATE collections SET dimension = ?1 WHERE id = ?2",
                    params![dimension as i64, self.id],
                )?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO entries
                    (collection_id, id, doc_type, document, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for entry in entries {
                let metadata = serde_json::to_string(&entry.attributes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                stmt.execute(params![
                    self.id,
                    entry.id,
                    entry.doc_type.as_str(),
                    entry.document,
                    metadata,
                    encode_vector(&entry.embedding),
                ])?;
            }
        }

        tx.execute(
            "UPDATE collections SET version = version + 1 WHERE id = ?1",
            params![self.id],
        )?;
        tx.commit()?;

        self.cache.borrow_mut().take();

        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<StoreHit>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = get_conn(&self.pool)?;
        let version = self.version(&conn)?;
        self.ensure_index(&conn, version)?;

        let doc_type = predicate.map(|p| match p {
            Predicate::DocType(doc_type) => *doc_type,
        });

        let ann_hits = match self.cache.borrow().as_ref() {
            Some(cached) => cached.index.search(vector, k, doc_type)?,
            None => Vec::new(),
        };

        let mut hits = Vec::with_capacity(ann_hits.len());
        for hit in ann_hits {
            let (document, attributes) = self.hydrate(&conn, &hit.id)?;
            hits.push(StoreHit {
                id: hit.id,
                doc_type: hit.doc_type,
                distance: hit.distance,
                document,
                attributes,
            });
        }

        Ok(hits)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = get_conn(&self.pool)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection_id = ?1",
            params![self.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn ids(&self) -> Result<AHashSet<String>, StoreError> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare("SELECT id FROM entries WHERE collection_id = ?1")?;
        let ids = stmt
            .query_map(params![self.id], |row| row.get(0))?
            .collect::<Result<AHashSet<String>, _>>()?;
        Ok(ids)
    }
}

fn get_conn(pool: &DbPool) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
    pool.get()
        .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))
}

fn parse_doc_type(raw: &str) -> Result<DocType, StoreError> {
    raw.parse().map_err(StoreError::Serialization)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Serialization(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Store migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        dimension INTEGER,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE entries (
        collection_id INTEGER NOT NULL,
        id TEXT NOT NULL,
        doc_type TEXT NOT NULL,
        document TEXT NOT NULL,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (collection_id, id),
        FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_entries_doc_type ON entries(collection_id, doc_type);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::AttrValue;
    use tempfile::TempDir;

    fn entry(id: &str, doc_type: DocType, embedding: Vec<f32>) -> IndexedEntry {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), AttrValue::from(id));
        attributes.insert("doc_type".to_string(), AttrValue::from(doc_type.as_str()));
        IndexedEntry {
            id: id.to_string(),
            doc_type,
            embedding,
            document: format!("document {}", id),
            attributes,
        }
    }

    fn open(temp: &TempDir) -> SqliteStore {
        SqliteStore::open(temp.path(), AnnParams::default()).unwrap()
    }

    #[test]
    fn test_collection_lifecycle() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        assert!(store.get("people").unwrap().is_none());
        let collection = store.create("people").unwrap();
        assert_eq!(collection.name(), "people");
        assert_eq!(collection.count().unwrap(), 0);

        assert!(matches!(
            store.create("people"),
            Err(StoreError::CollectionExists(_))
        ));
        assert_eq!(store.list().unwrap(), vec!["people".to_string()]);

        store.delete("people").unwrap();
        assert!(store.get("people").unwrap().is_none());
        assert!(matches!(
            store.delete("people"),
            Err(StoreError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_lookup_of_missing_collection_is_read_only() {
        let temp = TempDir::new().unwrap();
        {
            let store = open(&temp);
            assert!(store.get("talent_index").unwrap().is_none());
            assert!(store.list().unwrap().is_empty());
        }

        let store = open(&temp);
        assert!(store.get("talent_index").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_whole_entry() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let collection = store.create("people").unwrap();

        collection
            .upsert(&[entry("a", DocType::Employee, vec![1.0, 0.0])])
            .unwrap();
        let mut replacement = entry("a", DocType::Employee, vec![0.0, 1.0]);
        replacement.document = "rewritten".to_string();
        collection.upsert(&[replacement]).unwrap();

        assert_eq!(collection.count().unwrap(), 1);
        let hits = collection.query(&[0.0, 1.0], 1, None).unwrap();
        assert_eq!(hits[0].document, "rewritten");
        assert!(hits[0].distance < 0.01);
    }

    #[test]
    fn test_query_with_predicate() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let collection = store.create("mixed").unwrap();

        collection
            .upsert(&[
                entry("e1", DocType::Employee, vec![1.0, 0.0, 0.0]),
                entry("j1", DocType::Job, vec![0.8, 0.2, 0.0]),
                entry("e2", DocType::Employee, vec![0.0, 0.0, 1.0]),
            ])
            .unwrap();

        let all = collection.query(&[1.0, 0.0, 0.0], 10, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "e1");
        assert_eq!(all[0].attributes["name"], AttrValue::from("e1"));

        let jobs = collection
            .query(&[1.0, 0.0, 0.0], 10, Some(&Predicate::DocType(DocType::Job)))
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].doc_type, DocType::Job);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = open(&temp);
            let collection = store.create("people").unwrap();
            collection
                .upsert(&[
                    entry("a", DocType::Employee, vec![1.0, 0.0]),
                    entry("b", DocType::Job, vec![0.0, 1.0]),
                ])
                .unwrap();
        }

        let store = open(&temp);
        let collection = store.get("people").unwrap().unwrap();
        assert_eq!(collection.count().unwrap(), 2);

        let ids = collection.ids().unwrap();
        assert!(ids.contains("a") && ids.contains("b"));
    }

    #[test]
    fn test_dimension_is_fixed_by_first_write() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let collection = store.create("people").unwrap();

        collection
            .upsert(&[entry("a", DocType::Employee, vec![1.0, 0.0])])
            .unwrap();
        let result = collection.upsert(&[entry("b", DocType::Employee, vec![1.0, 0.0, 0.0])]);
        assert!(matches!(result, Err(StoreError::InvalidDimension { .. })));
        assert_eq!(collection.count().unwrap(), 1);
    }

    #[test]
    fn test_other_handle_sees_new_writes() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let writer = store.create("people").unwrap();
        let reader = store.get("people").unwrap().unwrap();

        writer
            .upsert(&[entry("a", DocType::Employee, vec![1.0, 0.0])])
            .unwrap();
        assert_eq!(reader.query(&[1.0, 0.0], 5, None).unwrap().len(), 1);

        writer
            .upsert(&[entry("b", DocType::Employee, vec![0.0, 1.0])])
            .unwrap();
        assert_eq!(reader.query(&[1.0, 0.0], 5, None).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_collection_query() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let collection = store.create("empty").unwrap();
        assert!(collection.query(&[1.0, 0.0], 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_vector_encoding() {
        let vector = vec![0.5, -1.25, 3.0];
        assert_eq!(decode_vector(&encode_vector(&vector)).unwrap(), vector);
        assert!(decode_vector(&[0, 1, 2]).is_err());
    }
}
