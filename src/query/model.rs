// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! The query AST (§3, §4.5): `Query`, `Condition`, `SortField`,
//! `QueryOptions` and the result/projection shapes the executor
//! produces.

use crate::document::Document;
use crate::value::Value;
use indexmap::IndexMap;

/// A comparison or structural operator on a leaf condition (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    Exists,
    Regex,
}

impl Op {
    /// Maps a `$`-prefixed wire token to its operator, or `None` if the
    /// token is not recognised (§4.5: unknown operator tokens fail).
    pub fn from_token(token: &str) -> Option<Op> {
        match token {
            "$eq" => Some(Op::Eq),
            "$ne" => Some(Op::Ne),
            "$lt" => Some(Op::Lt),
            "$lte" => Some(Op::Lte),
            "$gt" => Some(Op::Gt),
            "$gte" => Some(Op::Gte),
            "$in" => Some(Op::In),
            "$nin" => Some(Op::Nin),
            "$exists" => Some(Op::Exists),
            "$regex" => Some(Op::Regex),
            _ => None,
        }
    }
}

/// Node of the filter AST rooted at `Query::filter` (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Leaf { field: String, op: Op, operand: Value },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

/// Pagination and execution controls (§3). `limit: None` means
/// unbounded, matching the spec's `ℕ∪{∞}` domain.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub limit: Option<u64>,
    pub skip: u64,
    pub include_total_count: bool,
    pub timeout_ms: Option<u64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { limit: None, skip: 0, include_total_count: false, timeout_ms: None }
    }
}

/// The immutable query triple from §3, expanded with a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<Condition>,
    pub sort: Vec<SortField>,
    pub options: QueryOptions,
    pub projection: Option<IndexMap<String, bool>>,
}

/// A document as shaped by a query's projection (§4.5, §4.7): `_id` is
/// included unless explicitly excluded, and `data` is pruned to the
/// listed truthy fields when a projection is present.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedDocument {
    pub id: Option<String>,
    pub data: IndexMap<String, Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub version: u64,
}

impl ProjectedDocument {
    pub fn unprojected(doc: &Document) -> Self {
        Self {
            id: Some(doc.id.clone()),
            data: doc.data.clone(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            version: doc.version,
        }
    }
}

/// The pipeline's output (§4.7): `total_count` is populated only when
/// `QueryOptions::include_total_count` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub documents: Vec<ProjectedDocument>,
    pub total_count: Option<usize>,
}
