// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! The document type and its versioned metadata (§3).

use crate::value::Value;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single document stored in a collection.
///
/// On-disk shape (§6): `{id, data, createdAt, updatedAt, version}`,
/// pretty-printed, camelCase property names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub data: IndexMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Document {
    /// Constructs a brand-new document as `Insert` would (§4.3):
    /// `createdAt = updatedAt = now`, `version = 1`.
    pub fn new(id: impl Into<String>, data: IndexMap<String, Value>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            data,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Applies an `Update` (§4.3): bumps `version`, sets `updatedAt = now`,
    /// preserves `createdAt`, replaces `data` with the caller's.
    pub fn apply_update(&mut self, data: IndexMap<String, Value>, now: DateTime<Utc>) {
        self.data = data;
        self.updated_at = now;
        self.version += 1;
    }

    /// Resolves a dotted field path against this document's body.
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.data.get(first)?;
        for segment in segments {
            current = match current {
                Value::Map(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Serialises `self.data` as a `Value::Map` for uniform path resolution
    /// and projection logic that otherwise only knows about `Value`.
    pub fn data_as_value(&self) -> Value {
        Value::Map(self.data.clone())
    }
}
