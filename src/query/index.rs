// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Optional per-field secondary indexes (§4.7) backed by [`BTreeIndex`].
//!
//! Indexes are built from a point-in-time document snapshot and are
//! never kept in sync with subsequent writes automatically — the
//! caller decides when to rebuild. This mirrors the explicit Non-goal
//! that index maintenance is not wired into the write path.

use crate::btree::BTreeIndex;
use crate::document::Document;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// A total-order wrapper around [`Value`] so it can key a [`BTreeIndex`].
///
/// `Value::compare` is a *partial* order (it returns `None` for `Null`
/// paired with a non-null, and for any pair of `List`/`Map` values).
/// `IndexKey` extends it to a total order by falling back to a fixed
/// type rank, then to the values' canonical JSON text, whenever
/// `compare` can't decide. The fallback exists only to give the tree a
/// consistent place to put a key — it has no query-visible meaning.
#[derive(Debug, Clone)]
pub struct IndexKey(pub Value);

impl IndexKey {
    pub fn new(value: Value) -> Self {
        IndexKey(value)
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::I64(_) | Value::F64(_) | Value::Decimal(_) => 2,
        Value::Str(_) => 3,
        Value::Ts(_) => 4,
        Value::List(_) => 5,
        Value::Map(_) => 6,
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        if let Some(ordering) = self.0.compare(&other.0) {
            return ordering;
        }
        let (ra, rb) = (type_rank(&self.0), type_rank(&other.0));
        if ra != rb {
            ra.cmp(&rb)
        } else {
            self.0.to_json().to_string().cmp(&other.0.to_json().to_string())
        }
    }
}

/// A single field's index: `IndexKey -> documentId`, duplicate keys
/// allowed (§4.1).
pub struct FieldIndex {
    tree: BTreeIndex<IndexKey, String>,
}

impl FieldIndex {
    /// Builds an index over `field` from a document snapshot. Documents
    /// where `field` is absent are not indexed (they can never satisfy
    /// an equality or range predicate on that field anyway).
    pub fn build(field: &str, documents: &[Document], btree_degree: usize) -> crate::error::DocbaseResult<Self> {
        let mut tree = BTreeIndex::new(btree_degree)?;
        for doc in documents {
            if let Some(value) = doc.resolve_path(field) {
                tree.insert(IndexKey::new(value.clone()), doc.id.clone());
            }
        }
        Ok(Self { tree })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Document ids whose indexed field equals `value` exactly.
    pub fn equals(&self, value: &Value) -> Vec<String> {
        self.tree.get_values(&IndexKey::new(value.clone()))
    }

    /// Document ids whose indexed field falls in `[lo, hi]` inclusive.
    pub fn range(&self, lo: &Value, hi: &Value) -> Vec<String> {
        self.tree
            .range_query(&IndexKey::new(lo.clone()), &IndexKey::new(hi.clone()))
            .into_iter()
            .map(|(_, id)| id)
            .collect()
    }
}

/// A per-collection registry of field indexes, rebuilt on demand.
#[derive(Default)]
pub struct IndexRegistry {
    fields: HashMap<String, FieldIndex>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self { fields: HashMap::new() }
    }

    /// (Re)builds the index for `field` from the given snapshot,
    /// replacing any prior index for that field.
    pub fn rebuild(&mut self, field: &str, documents: &[Document], btree_degree: usize) -> crate::error::DocbaseResult<()> {
        let index = FieldIndex::build(field, documents, btree_degree)?;
        self.fields.insert(field.to_string(), index);
        Ok(())
    }

    pub fn drop_index(&mut self, field: &str) {
        self.fields.remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&FieldIndex> {
        self.fields.get(field)
    }

    pub fn has_index(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}
