// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! The query pipeline (§4.7): `Load -> Filter -> Sort -> Skip -> Limit
//! -> Project`, generic over any [`Store`] implementation.

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::{DocbaseError, DocbaseResult};
use crate::query::filter;
use crate::query::index::IndexRegistry;
use crate::query::model::{Condition, Op, ProjectedDocument, Query, QueryResult, SortDirection, SortField};
use crate::store::Store;
use crate::value::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Runs `query` against `store`, consulting `registry` (if any) for
/// index-pruned loading. Cancellation and timeout are both checked at
/// every stage boundary (§4.7, §5); either failure yields no partial
/// results.
pub async fn execute<S: Store>(
    store: &S,
    registry: Option<&IndexRegistry>,
    query: &Query,
    cancel: &CancelToken,
) -> DocbaseResult<QueryResult> {
    let timeout_ms = query.options.timeout_ms.unwrap_or(0);
    let deadline = if timeout_ms > 0 { Some(Instant::now() + Duration::from_millis(timeout_ms)) } else { None };

    check_stage(cancel, deadline, timeout_ms, "load")?;
    let candidates = load(store, registry, query).await?;

    check_stage(cancel, deadline, timeout_ms, "filter")?;
    let filtered: Vec<Document> = candidates.into_iter().filter(|doc| filter::matches(doc, &query.filter)).collect();

    check_stage(cancel, deadline, timeout_ms, "sort")?;
    let mut sorted = filtered;
    sort_documents(&mut sorted, &query.sort);

    check_stage(cancel, deadline, timeout_ms, "skip_limit")?;
    let total = sorted.len();
    let skipped = sorted.into_iter().skip(query.options.skip as usize);
    let limited: Vec<Document> = match query.options.limit {
        Some(limit) => skipped.take(limit as usize).collect(),
        None => skipped.collect(),
    };

    check_stage(cancel, deadline, timeout_ms, "project")?;
    let documents = limited.iter().map(|doc| project(doc, &query.projection)).collect();

    let total_count = if query.options.include_total_count { Some(total) } else { None };
    Ok(QueryResult { documents, total_count })
}

fn check_stage(cancel: &CancelToken, deadline: Option<Instant>, timeout_ms: u64, stage: &str) -> DocbaseResult<()> {
    if cancel.is_cancelled() {
        return Err(DocbaseError::Cancelled { operation: format!("query.{}", stage) });
    }
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(DocbaseError::TimedOut { operation: format!("query.{}", stage), timeout_ms });
        }
    }
    Ok(())
}

/// Loads candidate documents. When the filter carries a top-level
/// equality or range leaf on an indexed field, the index narrows the
/// scan; the Filter stage re-validates every candidate regardless, so
/// an index that over-selects (e.g. a coarse range) never produces a
/// wrong answer, only a wider candidate set (§4.7).
async fn load<S: Store>(store: &S, registry: Option<&IndexRegistry>, query: &Query) -> DocbaseResult<Vec<Document>> {
    if let Some(registry) = registry {
        if let Some(ids) = indexed_candidate_ids(&query.filter, registry) {
            let mut docs = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(doc) = store.get(&query.collection, &id).await? {
                    docs.push(doc);
                }
            }
            return Ok(docs);
        }
    }
    store.get_all(&query.collection).await
}

fn indexed_candidate_ids(filter: &Option<Condition>, registry: &IndexRegistry) -> Option<Vec<String>> {
    let cond = filter.as_ref()?;
    let leaves = top_level_leaves(cond)?;

    for leaf in &leaves {
        if let Condition::Leaf { field, op: Op::Eq, operand } = leaf {
            if let Some(index) = registry.get(field) {
                return Some(index.equals(operand));
            }
        }
    }

    let mut bounds: HashMap<&str, (Option<&Value>, Option<&Value>)> = HashMap::new();
    for leaf in &leaves {
        if let Condition::Leaf { field, op, operand } = leaf {
            match op {
                Op::Gte | Op::Gt => bounds.entry(field.as_str()).or_default().0 = Some(operand),
                Op::Lte | Op::Lt => bounds.entry(field.as_str()).or_default().1 = Some(operand),
                _ => {}
            }
        }
    }
    for (field, (lo, hi)) in bounds {
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if let Some(index) = registry.get(field) {
                return Some(index.range(lo, hi));
            }
        }
    }
    None
}

/// Top-level leaves of a filter usable for index pruning: either a
/// single leaf, or the leaf members of a top-level `$and` (nested
/// `$or`/`$not` members are ignored — they can't narrow the scan
/// without risking missing matches).
fn top_level_leaves(cond: &Condition) -> Option<Vec<&Condition>> {
    match cond {
        Condition::Leaf { .. } => Some(vec![cond]),
        Condition::And(items) => {
            let leaves: Vec<&Condition> = items.iter().filter(|item| matches!(item, Condition::Leaf { .. })).collect();
            if leaves.is_empty() {
                None
            } else {
                Some(leaves)
            }
        }
        _ => None,
    }
}

fn sort_documents(docs: &mut [Document], sort: &[SortField]) {
    docs.sort_by(|a, b| {
        for field in sort {
            let ordering = compare_with_nulls(a.resolve_path(&field.field), b.resolve_path(&field.field), field.direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Null sorts last ascending, first descending (§4.7, Sybase-style). An
/// absent field is treated as null.
fn compare_with_nulls(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let a_null = matches!(a, None | Some(Value::Null));
    let b_null = matches!(b, None | Some(Value::Null));
    match (a_null, b_null) {
        (true, true) => Ordering::Equal,
        (true, false) => {
            if direction == SortDirection::Asc {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (false, true) => {
            if direction == SortDirection::Asc {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, false) => {
            let cmp = a.unwrap().compare(b.unwrap()).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => cmp,
                SortDirection::Desc => cmp.reverse(),
            }
        }
    }
}

fn project(doc: &Document, projection: &Option<IndexMap<String, bool>>) -> ProjectedDocument {
    let Some(spec) = projection else {
        return ProjectedDocument::unprojected(doc);
    };
    let mut data = IndexMap::new();
    for (field, wanted) in spec {
        if field != "_id" && *wanted {
            if let Some(value) = doc.data.get(field) {
                data.insert(field.clone(), value.clone());
            }
        }
    }
    let include_id = spec.get("_id").copied().unwrap_or(true);
    ProjectedDocument {
        id: if include_id { Some(doc.id.clone()) } else { None },
        data,
        created_at: doc.created_at,
        updated_at: doc.updated_at,
        version: doc.version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::query::model::QueryOptions;
    use crate::store::DocumentStore;
    use chrono::Utc;
    use std::sync::Arc;

    async fn store_with_ages(ages: &[i64]) -> DocumentStore {
        let store = DocumentStore::new(Arc::new(FixedClock::new(Utc::now())));
        for (i, age) in ages.iter().enumerate() {
            let mut data = IndexMap::new();
            data.insert("age".to_string(), Value::I64(*age));
            store.insert("users", &format!("u{}", i), data).await.unwrap();
        }
        store
    }

    fn leaf(field: &str, op: Op, operand: Value) -> Condition {
        Condition::Leaf { field: field.to_string(), op, operand }
    }

    #[tokio::test]
    async fn scenario_2_range_filter_sort_desc_limit() {
        let store = store_with_ages(&[17, 20, 40, 70]).await;
        let query = Query {
            collection: "users".to_string(),
            filter: Some(Condition::And(vec![leaf("age", Op::Gte, Value::I64(18)), leaf("age", Op::Lte, Value::I64(65))])),
            sort: vec![SortField { field: "age".to_string(), direction: SortDirection::Desc }],
            options: QueryOptions { limit: Some(2), ..Default::default() },
            projection: None,
        };
        let result = execute(&store, None, &query, &CancelToken::new()).await.unwrap();
        let ages: Vec<i64> = result.documents.iter().map(|d| match d.data.get("age") { Some(Value::I64(n)) => *n, _ => panic!() }).collect();
        assert_eq!(ages, vec![40, 20]);
    }

    #[tokio::test]
    async fn empty_filter_matches_all() {
        let store = store_with_ages(&[1, 2, 3]).await;
        let query = Query { collection: "users".to_string(), filter: None, sort: vec![], options: QueryOptions::default(), projection: None };
        let result = execute(&store, None, &query, &CancelToken::new()).await.unwrap();
        assert_eq!(result.documents.len(), 3);
    }

    #[tokio::test]
    async fn limit_zero_returns_empty_but_still_counts() {
        let store = store_with_ages(&[1, 2, 3]).await;
        let query = Query {
            collection: "users".to_string(),
            filter: None,
            sort: vec![],
            options: QueryOptions { limit: Some(0), include_total_count: true, ..Default::default() },
            projection: None,
        };
        let result = execute(&store, None, &query, &CancelToken::new()).await.unwrap();
        assert!(result.documents.is_empty());
        assert_eq!(result.total_count, Some(3));
    }

    #[tokio::test]
    async fn cancellation_reports_cancelled_with_no_results() {
        let store = store_with_ages(&[1]).await;
        let query = Query { collection: "users".to_string(), filter: None, sort: vec![], options: QueryOptions::default(), projection: None };
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = execute(&store, None, &query, &cancel).await.unwrap_err();
        assert!(matches!(err, DocbaseError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn elapsed_timeout_reports_timed_out() {
        let store = store_with_ages(&[1]).await;
        let query = Query {
            collection: "users".to_string(),
            filter: None,
            sort: vec![],
            options: QueryOptions { timeout_ms: Some(1), ..Default::default() },
            projection: None,
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = execute(&store, None, &query, &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, DocbaseError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn null_sorts_last_ascending_and_first_descending() {
        let store = DocumentStore::new(Arc::new(FixedClock::new(Utc::now())));
        store.insert("users", "with_age", IndexMap::from([("age".to_string(), Value::I64(5))])).await.unwrap();
        store.insert("users", "without_age", IndexMap::new()).await.unwrap();

        let asc = Query {
            collection: "users".to_string(),
            filter: None,
            sort: vec![SortField { field: "age".to_string(), direction: SortDirection::Asc }],
            options: QueryOptions::default(),
            projection: None,
        };
        let result = execute(&store, None, &asc, &CancelToken::new()).await.unwrap();
        assert_eq!(result.documents.last().unwrap().id.as_deref(), Some("without_age"));

        let desc = Query { sort: vec![SortField { field: "age".to_string(), direction: SortDirection::Desc }], ..asc };
        let result = execute(&store, None, &desc, &CancelToken::new()).await.unwrap();
        assert_eq!(result.documents.first().unwrap().id.as_deref(), Some("without_age"));
    }

    #[tokio::test]
    async fn projection_excludes_id_when_explicitly_false() {
        let store = DocumentStore::new(Arc::new(FixedClock::new(Utc::now())));
        store.insert("users", "u1", IndexMap::from([("name".to_string(), Value::Str("a".to_string()))])).await.unwrap();
        let query = Query {
            collection: "users".to_string(),
            filter: None,
            sort: vec![],
            options: QueryOptions::default(),
            projection: Some(IndexMap::from([("_id".to_string(), false), ("name".to_string(), true)])),
        };
        let result = execute(&store, None, &query, &CancelToken::new()).await.unwrap();
        assert_eq!(result.documents[0].id, None);
        assert_eq!(result.documents[0].data.get("name"), Some(&Value::Str("a".to_string())));
    }

    #[tokio::test]
    async fn index_pruned_equality_matches_unpruned_scan() {
        let store = store_with_ages(&[10, 20, 10, 30]).await;
        let docs = store.get_all("users").await.unwrap();
        let mut registry = IndexRegistry::new();
        registry.rebuild("age", &docs, 2).unwrap();

        let query = Query { collection: "users".to_string(), filter: Some(leaf("age", Op::Eq, Value::I64(10))), sort: vec![], options: QueryOptions::default(), projection: None };
        let with_index = execute(&store, Some(&registry), &query, &CancelToken::new()).await.unwrap();
        let without_index = execute(&store, None, &query, &CancelToken::new()).await.unwrap();
        assert_eq!(with_index.documents.len(), 2);
        assert_eq!(with_index.documents.len(), without_index.documents.len());
    }
}
