// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tolerant JSON → `Query` parser (§4.5).
//!
//! Top-level keys are matched case-insensitively; any top-level key the
//! parser doesn't recognise is folded into the filter as an implicit
//! equality condition on that field name ("tolerant mode").

use crate::error::{DocbaseError, DocbaseResult};
use crate::query::model::{Condition, Op, Query, QueryOptions, SortDirection, SortField};
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::Value as Json;

fn parse_error(reason: impl Into<String>, fragment: &Json) -> DocbaseError {
    DocbaseError::ParseError { reason: reason.into(), fragment: fragment.to_string() }
}

/// Parses a JSON value into a `Query` (§4.5).
pub fn parse(json: &Json) -> DocbaseResult<Query> {
    let obj = json.as_object().ok_or_else(|| parse_error("query root must be a JSON object", json))?;

    let mut collection = None;
    let mut explicit_filter = None;
    let mut sort = Vec::new();
    let mut options = QueryOptions::default();
    let mut projection = None;
    let mut tolerant_fields: Vec<(String, Json)> = Vec::new();

    for (key, value) in obj {
        let lower = key.to_lowercase();
        match lower.as_str() {
            "collection" | "collectionname" => {
                collection = Some(value.as_str().ok_or_else(|| parse_error("collection name must be a string", value))?.to_string());
            }
            "filter" => {
                explicit_filter = Some(parse_filter_object(value)?);
            }
            "sort" => {
                sort = parse_sort(value)?;
            }
            "options" => {
                options = parse_options(value)?;
            }
            "projection" => {
                projection = Some(parse_projection(value)?);
            }
            _ => tolerant_fields.push((key.clone(), value.clone())),
        }
    }

    let collection = collection.ok_or_else(|| parse_error("missing required 'collection' field", json))?;

    let filter = match (explicit_filter, tolerant_fields.is_empty()) {
        (None, true) => None,
        (explicit, _) => {
            let mut conditions = Vec::new();
            if let Some(cond) = explicit {
                conditions.push(cond);
            }
            for (field, value) in tolerant_fields {
                conditions.extend(parse_field_entry(&field, &value)?);
            }
            Some(fold_and(conditions))
        }
    };

    Ok(Query { collection, filter, sort, options, projection })
}

fn fold_and(mut conditions: Vec<Condition>) -> Condition {
    if conditions.len() == 1 {
        conditions.pop().unwrap()
    } else {
        Condition::And(conditions)
    }
}

/// A filter object is an implicit AND over its entries (§4.5). `$and`,
/// `$or`, `$not`, `$nor` combine sub-conditions at any level.
fn parse_filter_object(json: &Json) -> DocbaseResult<Condition> {
    let obj = json.as_object().ok_or_else(|| parse_error("filter must be a JSON object", json))?;
    let mut conditions = Vec::new();
    for (key, value) in obj {
        match key.as_str() {
            "$and" => conditions.push(Condition::And(parse_condition_array(value)?)),
            "$or" => conditions.push(Condition::Or(parse_condition_array(value)?)),
            "$nor" => conditions.push(Condition::Not(Box::new(Condition::Or(parse_condition_array(value)?)))),
            "$not" => conditions.push(Condition::Not(Box::new(parse_filter_object(value)?))),
            field => conditions.extend(parse_field_entry(field, value)?),
        }
    }
    Ok(fold_and(conditions))
}

fn parse_condition_array(json: &Json) -> DocbaseResult<Vec<Condition>> {
    let items = json.as_array().ok_or_else(|| parse_error("logical combinator requires an array operand", json))?;
    items.iter().map(parse_filter_object).collect()
}

/// A single `field: value` entry. If `value` is an object whose keys
/// are all `$`-operators, it expands to a conjunction of leaf
/// conditions (§4.5); otherwise it's an implicit `$eq`.
fn parse_field_entry(field: &str, value: &Json) -> DocbaseResult<Vec<Condition>> {
    if let Some(obj) = value.as_object() {
        if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) {
            let mut out = Vec::with_capacity(obj.len());
            for (token, operand_json) in obj {
                let op = Op::from_token(token).ok_or_else(|| parse_error(format!("unknown operator '{}'", token), value))?;
                let operand = parse_operand(op, operand_json)?;
                out.push(Condition::Leaf { field: field.to_string(), op, operand });
            }
            return Ok(out);
        }
    }
    let operand = Value::from_json(value)?;
    Ok(vec![Condition::Leaf { field: field.to_string(), op: Op::Eq, operand }])
}

fn parse_operand(op: Op, json: &Json) -> DocbaseResult<Value> {
    match op {
        Op::In | Op::Nin if !json.is_array() => Err(parse_error(format!("{:?} requires an array operand", op), json)),
        Op::Exists if !json.is_boolean() => Err(parse_error("$exists requires a boolean operand", json)),
        Op::Regex if !json.is_string() => Err(parse_error("$regex requires a string operand", json)),
        _ => Value::from_json(json),
    }
}

/// Accepts either `{field: direction}` (key order significant) or
/// `[{field: direction}, …]` (§4.5).
fn parse_sort(json: &Json) -> DocbaseResult<Vec<SortField>> {
    if let Some(obj) = json.as_object() {
        return obj.iter().map(|(field, dir)| Ok(SortField { field: field.clone(), direction: parse_direction(dir) })).collect();
    }
    if let Some(items) = json.as_array() {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let obj = item.as_object().ok_or_else(|| parse_error("sort array entries must be objects", item))?;
            for (field, dir) in obj {
                out.push(SortField { field: field.clone(), direction: parse_direction(dir) });
            }
        }
        return Ok(out);
    }
    Err(parse_error("sort must be an object or array", json))
}

/// Numeric sign: `>= 0` is ascending, `< 0` is descending. An unknown
/// string direction defaults to ascending (§4.5).
fn parse_direction(json: &Json) -> SortDirection {
    match json {
        Json::Number(n) => {
            if n.as_f64().unwrap_or(0.0) < 0.0 {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            }
        }
        Json::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Desc,
        _ => SortDirection::Asc,
    }
}

fn parse_options(json: &Json) -> DocbaseResult<QueryOptions> {
    let obj = json.as_object().ok_or_else(|| parse_error("options must be a JSON object", json))?;
    let mut options = QueryOptions::default();
    for (key, value) in obj {
        match key.to_lowercase().as_str() {
            "limit" => options.limit = value.as_u64(),
            "skip" => options.skip = value.as_u64().unwrap_or(0),
            "includetotalcount" => options.include_total_count = value.as_bool().unwrap_or(false),
            "timeoutms" | "timeout" => options.timeout_ms = value.as_u64(),
            _ => {}
        }
    }
    Ok(options)
}

/// Mapping of field → truthy (§4.5): numeric 0 is false, non-zero true,
/// booleans literal.
fn parse_projection(json: &Json) -> DocbaseResult<IndexMap<String, bool>> {
    let obj = json.as_object().ok_or_else(|| parse_error("projection must be a JSON object", json))?;
    let mut out = IndexMap::new();
    for (field, value) in obj {
        let truthy = Value::from_json(value)?.is_truthy();
        out.insert(field.clone(), truthy);
    }
    Ok(out)
}

/// Renders a `Query` back to JSON, the inverse of [`parse`]. Used by
/// the parser-idempotence property (§8): `parse(render(q))` must equal
/// `q` as an AST, independent of JSON key order.
pub fn render(query: &Query) -> Json {
    let mut obj = serde_json::Map::new();
    obj.insert("collection".to_string(), Json::String(query.collection.clone()));
    if let Some(filter) = &query.filter {
        obj.insert("filter".to_string(), render_condition(filter));
    }
    if !query.sort.is_empty() {
        let items: Vec<Json> = query
            .sort
            .iter()
            .map(|s| {
                let mut m = serde_json::Map::new();
                let dir = match s.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                m.insert(s.field.clone(), Json::Number(dir.into()));
                Json::Object(m)
            })
            .collect();
        obj.insert("sort".to_string(), Json::Array(items));
    }
    let mut opts = serde_json::Map::new();
    if let Some(limit) = query.options.limit {
        opts.insert("limit".to_string(), Json::Number(limit.into()));
    }
    opts.insert("skip".to_string(), Json::Number(query.options.skip.into()));
    opts.insert("includeTotalCount".to_string(), Json::Bool(query.options.include_total_count));
    if let Some(timeout) = query.options.timeout_ms {
        opts.insert("timeoutMs".to_string(), Json::Number(timeout.into()));
    }
    obj.insert("options".to_string(), Json::Object(opts));
    if let Some(projection) = &query.projection {
        let mut proj = serde_json::Map::new();
        for (field, truthy) in projection {
            proj.insert(field.clone(), Json::Bool(*truthy));
        }
        obj.insert("projection".to_string(), Json::Object(proj));
    }
    Json::Object(obj)
}

fn render_condition(cond: &Condition) -> Json {
    match cond {
        Condition::Leaf { field, op, operand } => {
            let token = match op {
                Op::Eq => "$eq",
                Op::Ne => "$ne",
                Op::Lt => "$lt",
                Op::Lte => "$lte",
                Op::Gt => "$gt",
                Op::Gte => "$gte",
                Op::In => "$in",
                Op::Nin => "$nin",
                Op::Exists => "$exists",
                Op::Regex => "$regex",
            };
            let mut inner = serde_json::Map::new();
            inner.insert(token.to_string(), operand.to_json());
            let mut outer = serde_json::Map::new();
            outer.insert(field.clone(), Json::Object(inner));
            Json::Object(outer)
        }
        Condition::And(conds) => {
            let mut m = serde_json::Map::new();
            m.insert("$and".to_string(), Json::Array(conds.iter().map(render_condition).collect()));
            Json::Object(m)
        }
        Condition::Or(conds) => {
            let mut m = serde_json::Map::new();
            m.insert("$or".to_string(), Json::Array(conds.iter().map(render_condition).collect()));
            Json::Object(m)
        }
        Condition::Not(inner) => {
            let mut m = serde_json::Map::new();
            m.insert("$not".to_string(), render_condition(inner));
            Json::Object(m)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_collection_is_parse_error() {
        let err = parse(&json!({"filter": {}})).unwrap_err();
        assert!(matches!(err, DocbaseError::ParseError { .. }));
    }

    #[test]
    fn non_object_root_is_parse_error() {
        let err = parse(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, DocbaseError::ParseError { .. }));
    }

    #[test]
    fn scenario_2_range_sort_limit() {
        let q = parse(&json!({
            "collection": "users",
            "filter": {"age": {"$gte": 18, "$lte": 65}},
            "sort": {"age": -1},
            "options": {"limit": 2}
        }))
        .unwrap();
        assert_eq!(q.collection, "users");
        assert_eq!(q.sort, vec![SortField { field: "age".to_string(), direction: SortDirection::Desc }]);
        assert_eq!(q.options.limit, Some(2));
        assert!(matches!(q.filter, Some(Condition::And(_))));
    }

    #[test]
    fn tolerant_mode_treats_unknown_top_level_key_as_filter() {
        let q = parse(&json!({"collection": "users", "status": "active"})).unwrap();
        match q.filter {
            Some(Condition::Leaf { field, op, operand }) => {
                assert_eq!(field, "status");
                assert_eq!(op, Op::Eq);
                assert_eq!(operand, Value::Str("active".to_string()));
            }
            other => panic!("expected a leaf condition, got {:?}", other),
        }
    }

    #[test]
    fn unknown_operator_token_fails() {
        let err = parse(&json!({"collection": "users", "filter": {"age": {"$bogus": 1}}})).unwrap_err();
        assert!(matches!(err, DocbaseError::ParseError { .. }));
    }

    #[test]
    fn in_without_array_fails() {
        let err = parse(&json!({"collection": "users", "filter": {"age": {"$in": 5}}})).unwrap_err();
        assert!(matches!(err, DocbaseError::ParseError { .. }));
    }

    #[test]
    fn nor_is_not_of_or() {
        let q = parse(&json!({
            "collection": "users",
            "filter": {"$nor": [{"age": 1}, {"age": 2}]}
        }))
        .unwrap();
        assert!(matches!(q.filter, Some(Condition::Not(_))));
    }

    #[test]
    fn sort_array_form_preserves_order() {
        let q = parse(&json!({
            "collection": "users",
            "sort": [{"age": "desc"}, {"name": "asc"}]
        }))
        .unwrap();
        assert_eq!(
            q.sort,
            vec![
                SortField { field: "age".to_string(), direction: SortDirection::Desc },
                SortField { field: "name".to_string(), direction: SortDirection::Asc },
            ]
        );
    }

    #[test]
    fn parse_then_render_then_parse_round_trips() {
        let original = parse(&json!({
            "collection": "users",
            "filter": {"age": {"$gte": 18}},
            "sort": [{"age": -1}],
            "options": {"limit": 5, "skip": 1, "includeTotalCount": true}
        }))
        .unwrap();
        let rendered = render(&original);
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn projection_truthiness_rules() {
        let proj = parse_projection(&json!({"name": 1, "age": 0, "active": true})).unwrap();
        assert_eq!(proj.get("name"), Some(&true));
        assert_eq!(proj.get("age"), Some(&false));
        assert_eq!(proj.get("active"), Some(&true));
    }
}
