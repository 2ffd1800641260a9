// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! In-memory collection map (§4.3): `collectionName -> (documentId ->
//! Document)`, with per-collection mutual exclusion and no built-in
//! optimistic concurrency control (§4.3: "the version field is
//! advisory").

use crate::clock::Clock;
use crate::document::Document;
use crate::error::{DocbaseError, DocbaseResult};
use crate::store::Store;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Collection = Arc<RwLock<IndexMap<String, Document>>>;

/// The in-memory document store (§4.3).
///
/// The outer map (which collections exist) is itself guarded by a
/// `RwLock` so creating a brand-new collection never blocks readers of
/// unrelated collections; each collection's documents then live behind
/// their own lock, giving the per-collection mutual exclusion §4.3 and
/// §5 require ("no cross-collection locks are ever acquired together:
/// deadlock impossible by construction").
pub struct DocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    clock: Arc<dyn Clock>,
}

impl DocumentStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { collections: RwLock::new(HashMap::new()), clock }
    }

    async fn collection(&self, name: &str) -> Collection {
        if let Some(existing) = self.collections.read().await.get(name) {
            return Arc::clone(existing);
        }
        let mut collections = self.collections.write().await;
        Arc::clone(
            collections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(IndexMap::new()))),
        )
    }

    /// Lists the names of collections known to this store (created by
    /// at least one write or explicitly hydrated).
    pub async fn collection_names(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }
}

impl Store for DocumentStore {
    /// Fails with `DuplicateId` if `(collection, id)` already exists
    /// (§4.3). `createdAt = updatedAt = now`, `version = 1`.
    async fn insert(&self, collection: &str, id: &str, data: IndexMap<String, Value>) -> DocbaseResult<Document> {
        let coll = self.collection(collection).await;
        let mut guard = coll.write().await;
        if guard.contains_key(id) {
            return Err(DocbaseError::DuplicateId { collection: collection.to_string(), id: id.to_string() });
        }
        let doc = Document::new(id, data, self.clock.now());
        guard.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    /// Fails with `NotFound` if missing (§4.3). `createdAt` is
    /// preserved; the caller cannot override it.
    async fn update(&self, collection: &str, id: &str, data: IndexMap<String, Value>) -> DocbaseResult<Document> {
        let coll = self.collection(collection).await;
        let mut guard = coll.write().await;
        let doc = guard
            .get_mut(id)
            .ok_or_else(|| DocbaseError::NotFound { collection: collection.to_string(), id: id.to_string() })?;
        doc.apply_update(data, self.clock.now());
        Ok(doc.clone())
    }

    async fn get(&self, collection: &str, id: &str) -> DocbaseResult<Option<Document>> {
        let coll = self.collection(collection).await;
        let guard = coll.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn delete(&self, collection: &str, id: &str) -> DocbaseResult<bool> {
        let coll = self.collection(collection).await;
        let mut guard = coll.write().await;
        Ok(guard.shift_remove(id).is_some())
    }

    async fn get_all(&self, collection: &str) -> DocbaseResult<Vec<Document>> {
        let coll = self.collection(collection).await;
        let guard = coll.read().await;
        Ok(guard.values().cloned().collect())
    }

    async fn count(&self, collection: &str) -> DocbaseResult<usize> {
        let coll = self.collection(collection).await;
        let guard = coll.read().await;
        Ok(guard.len())
    }

    async fn exists(&self, collection: &str, id: &str) -> DocbaseResult<bool> {
        let coll = self.collection(collection).await;
        let guard = coll.read().await;
        Ok(guard.contains_key(id))
    }
}
