// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Document storage: the in-memory collection map (§4.3) and its
//! filesystem-backed extension (§4.4).

pub mod layout;
pub mod memory;
pub mod persistent;

pub use memory::DocumentStore;
pub use persistent::PersistentStore;

use crate::document::Document;
use crate::error::DocbaseResult;
use crate::value::Value;
use indexmap::IndexMap;

/// The CRUD surface both [`DocumentStore`] and [`PersistentStore`]
/// implement (§4.3/§4.4), so [`crate::query::executor`] and
/// [`crate::bulk`] can stay generic over either backing rather than
/// depending on one concretely.
///
/// Uses native async-fn-in-trait rather than `async-trait` boxing,
/// since every caller is generic over a concrete `S: Store` and never
/// needs `dyn Store`.
pub trait Store: Send + Sync {
    async fn insert(&self, collection: &str, id: &str, data: IndexMap<String, Value>) -> DocbaseResult<Document>;

    async fn update(&self, collection: &str, id: &str, data: IndexMap<String, Value>) -> DocbaseResult<Document>;

    async fn get(&self, collection: &str, id: &str) -> DocbaseResult<Option<Document>>;

    async fn delete(&self, collection: &str, id: &str) -> DocbaseResult<bool>;

    async fn get_all(&self, collection: &str) -> DocbaseResult<Vec<Document>>;

    async fn count(&self, collection: &str) -> DocbaseResult<usize>;

    async fn exists(&self, collection: &str, id: &str) -> DocbaseResult<bool>;
}
