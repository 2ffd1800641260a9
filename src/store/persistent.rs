// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Filesystem-backed document store (§4.4): one pretty-printed JSON
//! file per document, a write-through cache fronting disk, and a
//! per-collection semaphore serialising writes so a crash between
//! serialise and rename can never leave a torn file on disk.

use crate::cache::{LruCache, LruConfig};
use crate::clock::Clock;
use crate::document::Document;
use crate::error::{DocbaseError, DocbaseResult};
use crate::store::layout::{collection_dir, document_path, temp_document_path};
use crate::store::Store;
use crate::value::Value;
use chrono::Duration as ChronoDuration;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

type CacheKey = (String, String);

/// Tunables for [`PersistentStore::new`].
#[derive(Debug, Clone)]
pub struct PersistentStoreConfig {
    pub max_cache_item_count: Option<usize>,
    pub max_cache_size_in_bytes: Option<usize>,
    /// How long a cached document is trusted before a read falls back
    /// to disk (§4.4: "if now - updatedAt < cacheExpiration").
    pub cache_expiration: ChronoDuration,
}

impl Default for PersistentStoreConfig {
    fn default() -> Self {
        Self {
            max_cache_item_count: Some(10_000),
            max_cache_size_in_bytes: Some(64 * 1024 * 1024),
            cache_expiration: ChronoDuration::minutes(5),
        }
    }
}

pub struct PersistentStore {
    base_path: PathBuf,
    cache: LruCache<CacheKey, Document>,
    cache_expiration: ChronoDuration,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
}

impl PersistentStore {
    pub fn new(base_path: impl Into<PathBuf>, config: PersistentStoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: LruCache::new(LruConfig {
                max_items: config.max_cache_item_count,
                max_bytes: config.max_cache_size_in_bytes,
                default_ttl: None,
            }),
            cache_expiration: config.cache_expiration,
            write_locks: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Ensures the base directory exists and returns the collection
    /// names discovered on disk (§4.4: "lazily enumerates collection
    /// subdirectories").
    pub async fn initialize(&self) -> DocbaseResult<Vec<String>> {
        tokio::fs::create_dir_all(&self.base_path).await.map_err(|e| DocbaseError::IoError {
            operation: "initialize".to_string(),
            reason: e.to_string(),
        })?;
        self.list_collections().await
    }

    pub async fn list_collections(&self) -> DocbaseResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(DocbaseError::IoError { operation: "list_collections".to_string(), reason: e.to_string() }),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| DocbaseError::IoError {
            operation: "list_collections".to_string(),
            reason: e.to_string(),
        })? {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Flushes pending writes. A no-op barrier in this write-through
    /// design (§4.4), provided so a host can call it unconditionally.
    pub async fn save_changes(&self) -> DocbaseResult<()> {
        Ok(())
    }

    async fn lock_for(&self, collection: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(locks.entry(collection.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    fn cache_key(collection: &str, id: &str) -> CacheKey {
        (collection.to_string(), id.to_string())
    }

    /// Reads a document through the write-through cache (§4.4: "Read
    /// path"). A cache hit older than `cache_expiration` is treated as
    /// a miss and reloaded from disk.
    async fn read_through(&self, collection: &str, id: &str) -> DocbaseResult<Option<Document>> {
        let key = Self::cache_key(collection, id);
        if let Some(cached) = self.cache.get(&key) {
            if self.clock.now() - cached.updated_at < self.cache_expiration {
                return Ok(Some(cached));
            }
            self.cache.remove(&key);
        }
        match self.read_from_disk(collection, id).await? {
            Some(doc) => {
                self.cache.set(key, doc.clone(), None);
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn read_from_disk(&self, collection: &str, id: &str) -> DocbaseResult<Option<Document>> {
        let path = document_path(&self.base_path, collection, id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DocbaseError::IoError { operation: "read_document".to_string(), reason: e.to_string() }),
        };
        serde_json::from_str::<Document>(&content)
            .map(Some)
            .map_err(|e| DocbaseError::Corrupt { collection: collection.to_string(), id: id.to_string(), reason: e.to_string() })
    }

    /// Serialises `doc` to a temp file in the collection directory and
    /// atomically renames it over the target path (§4.4: "crash-safety
    /// ... a crash between serialise and rename leaves the prior
    /// committed version intact").
    async fn write_to_disk(&self, collection: &str, id: &str, doc: &Document) -> DocbaseResult<()> {
        let dir = collection_dir(&self.base_path, collection);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| DocbaseError::IoError {
            operation: "create_collection_dir".to_string(),
            reason: e.to_string(),
        })?;

        let body = serde_json::to_string_pretty(doc).map_err(|e| DocbaseError::Internal {
            reason: format!("failed to serialise document: {}", e),
        })?;

        let temp_path = temp_document_path(&self.base_path, collection, id);
        tokio::fs::write(&temp_path, body.as_bytes()).await.map_err(|e| DocbaseError::IoError {
            operation: "write_temp".to_string(),
            reason: e.to_string(),
        })?;

        let final_path = document_path(&self.base_path, collection, id);
        tokio::fs::rename(&temp_path, &final_path).await.map_err(|e| DocbaseError::IoError {
            operation: "rename_into_place".to_string(),
            reason: e.to_string(),
        })
    }
}

impl Store for PersistentStore {
    async fn insert(&self, collection: &str, id: &str, data: IndexMap<String, Value>) -> DocbaseResult<Document> {
        let lock = self.lock_for(collection).await;
        let _guard = lock.lock().await;

        if self.read_from_disk(collection, id).await?.is_some() {
            return Err(DocbaseError::DuplicateId { collection: collection.to_string(), id: id.to_string() });
        }

        let doc = Document::new(id, data, self.clock.now());
        self.write_to_disk(collection, id, &doc).await?;
        self.cache.set(Self::cache_key(collection, id), doc.clone(), None);
        Ok(doc)
    }

    /// Version is read back from the on-disk document before the
    /// update is applied, so monotonicity survives a process restart.
    async fn update(&self, collection: &str, id: &str, data: IndexMap<String, Value>) -> DocbaseResult<Document> {
        let lock = self.lock_for(collection).await;
        let _guard = lock.lock().await;

        let mut doc = self
            .read_from_disk(collection, id)
            .await?
            .ok_or_else(|| DocbaseError::NotFound { collection: collection.to_string(), id: id.to_string() })?;
        doc.apply_update(data, self.clock.now());
        self.write_to_disk(collection, id, &doc).await?;
        self.cache.set(Self::cache_key(collection, id), doc.clone(), None);
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: &str) -> DocbaseResult<Option<Document>> {
        self.read_through(collection, id).await
    }

    async fn delete(&self, collection: &str, id: &str) -> DocbaseResult<bool> {
        let lock = self.lock_for(collection).await;
        let _guard = lock.lock().await;

        let path = document_path(&self.base_path, collection, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.cache.remove(&Self::cache_key(collection, id));
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DocbaseError::IoError { operation: "delete_document".to_string(), reason: e.to_string() }),
        }
    }

    async fn get_all(&self, collection: &str) -> DocbaseResult<Vec<Document>> {
        let dir = collection_dir(&self.base_path, collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DocbaseError::IoError { operation: "get_all".to_string(), reason: e.to_string() }),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| DocbaseError::IoError {
            operation: "get_all".to_string(),
            reason: e.to_string(),
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| DocbaseError::IoError {
                operation: "get_all".to_string(),
                reason: e.to_string(),
            })?;
            let id_hint = path.file_stem().and_then(|s| s.to_str()).unwrap_or("?").to_string();
            let doc: Document = serde_json::from_str(&content).map_err(|e| DocbaseError::Corrupt {
                collection: collection.to_string(),
                id: id_hint,
                reason: e.to_string(),
            })?;
            docs.push(doc);
        }
        Ok(docs)
    }

    async fn count(&self, collection: &str) -> DocbaseResult<usize> {
        Ok(self.get_all(collection).await?.len())
    }

    async fn exists(&self, collection: &str, id: &str) -> DocbaseResult<bool> {
        Ok(self.read_through(collection, id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::Utc;
    use tempfile::tempdir;

    fn store(dir: &std::path::Path) -> PersistentStore {
        PersistentStore::new(dir.to_path_buf(), PersistentStoreConfig::default(), Arc::new(FixedClock::new(Utc::now())))
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.initialize().await.unwrap();

        let mut data = IndexMap::new();
        data.insert("age".to_string(), Value::I64(30));
        store.insert("users", "u1", data).await.unwrap();

        let path = document_path(dir.path(), "users", "u1");
        assert!(path.exists());

        let fetched = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(fetched.data.get("age"), Some(&Value::I64(30)));
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.insert("users", "u1", IndexMap::new()).await.unwrap();
        let err = store.insert("users", "u1", IndexMap::new()).await.unwrap_err();
        assert!(matches!(err, DocbaseError::DuplicateId { .. }));
    }

    #[tokio::test]
    async fn update_missing_fails_not_found() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let err = store.update("users", "ghost", IndexMap::new()).await.unwrap_err();
        assert!(matches!(err, DocbaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_missing_returns_false_without_error() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(!store.delete("users", "ghost").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_not_deleted() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = document_path(dir.path(), "users", "u1");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{ not valid json").await.unwrap();

        let err = store.get("users", "u1").await.unwrap_err();
        assert!(matches!(err, DocbaseError::Corrupt { .. }));
        assert!(path.exists(), "corrupt file must not be auto-deleted");
    }

    #[tokio::test]
    async fn interrupted_rename_leaves_prior_committed_version_intact() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let mut data = IndexMap::new();
        data.insert("v".to_string(), Value::I64(1));
        store.insert("users", "u1", data).await.unwrap();

        // Simulate a crash between serialise and rename: a stray temp
        // file exists but was never renamed into place.
        let temp_path = temp_document_path(dir.path(), "users", "u1");
        tokio::fs::write(&temp_path, b"{\"id\":\"u1\",\"data\":{\"v\":999}").await.unwrap();

        let fetched = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(fetched.data.get("v"), Some(&Value::I64(1)));
    }

    #[tokio::test]
    async fn update_continues_version_from_disk_after_cache_eviction() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.insert("users", "u1", IndexMap::new()).await.unwrap();
        store.update("users", "u1", IndexMap::new()).await.unwrap();
        store.cache.clear();

        let updated = store.update("users", "u1", IndexMap::new()).await.unwrap();
        assert_eq!(updated.version, 3);
    }

    #[tokio::test]
    async fn initialize_discovers_existing_collections() {
        let dir = tempdir().unwrap();
        let first = store(dir.path());
        first.insert("users", "u1", IndexMap::new()).await.unwrap();

        let fresh = store(dir.path());
        let collections = fresh.initialize().await.unwrap();
        assert_eq!(collections, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn get_all_lists_every_document_in_a_collection() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.insert("users", "u1", IndexMap::new()).await.unwrap();
        store.insert("users", "u2", IndexMap::new()).await.unwrap();

        let mut ids: Vec<String> = store.get_all("users").await.unwrap().into_iter().map(|d| d.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(store.count("users").await.unwrap(), 2);
    }
}
