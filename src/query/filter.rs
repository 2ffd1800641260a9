// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Recursive filter AST evaluator (§4.6).

use crate::document::Document;
use crate::query::model::{Condition, Op};
use crate::value::Value;
use regex::Regex;
use std::cmp::Ordering;

/// Evaluates `filter` against `doc`. An absent filter (`None`) matches
/// every document (§4.6: "for an empty filter, returns true").
pub fn matches(doc: &Document, filter: &Option<Condition>) -> bool {
    match filter {
        None => true,
        Some(cond) => eval(doc, cond),
    }
}

fn eval(doc: &Document, cond: &Condition) -> bool {
    match cond {
        Condition::Leaf { field, op, operand } => eval_leaf(doc, field, *op, operand),
        Condition::And(conds) => conds.iter().all(|c| eval(doc, c)),
        Condition::Or(conds) => conds.iter().any(|c| eval(doc, c)),
        Condition::Not(inner) => !eval(doc, inner),
    }
}

fn eval_leaf(doc: &Document, field: &str, op: Op, operand: &Value) -> bool {
    match op {
        Op::Exists => {
            let resolves = doc.resolve_path(field).is_some();
            match operand {
                Value::Bool(want) => resolves == *want,
                _ => resolves,
            }
        }
        Op::Regex => match (doc.resolve_path(field), operand) {
            (Some(Value::Str(s)), Value::Str(pattern)) => Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false),
            _ => false,
        },
        Op::In => match doc.resolve_path(field) {
            Some(resolved) => in_operator(resolved, operand),
            None => false,
        },
        Op::Nin => match doc.resolve_path(field) {
            Some(resolved) => !in_operator(resolved, operand),
            None => true,
        },
        Op::Eq | Op::Ne | Op::Lt | Op::Lte | Op::Gt | Op::Gte => match doc.resolve_path(field) {
            Some(resolved) => compare_op(resolved, op, operand),
            None => false,
        },
    }
}

/// `$in`: true iff `operand` (always a list) contains an element equal
/// to `resolved`, or, when `resolved` is itself a list, any of its
/// elements appears in `operand` (§4.6).
fn in_operator(resolved: &Value, operand: &Value) -> bool {
    let Some(candidates) = operand.as_list() else { return false };
    if let Some(items) = resolved.as_list() {
        items.iter().any(|item| candidates.iter().any(|c| c.values_equal(item)))
    } else {
        candidates.iter().any(|c| c.values_equal(resolved))
    }
}

fn compare_op(resolved: &Value, op: Op, operand: &Value) -> bool {
    match op {
        Op::Eq => resolved.values_equal(operand),
        Op::Ne => !resolved.values_equal(operand),
        Op::Lt => matches!(resolved.compare(operand), Some(Ordering::Less)),
        Op::Lte => matches!(resolved.compare(operand), Some(Ordering::Less) | Some(Ordering::Equal)),
        Op::Gt => matches!(resolved.compare(operand), Some(Ordering::Greater)),
        Op::Gte => matches!(resolved.compare(operand), Some(Ordering::Greater) | Some(Ordering::Equal)),
        _ => unreachable!("handled by caller"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        let mut data = indexmap::IndexMap::new();
        for (k, v) in pairs {
            data.insert(k.to_string(), v.clone());
        }
        Document::new("u1", data, Utc::now())
    }

    fn leaf(field: &str, op: Op, operand: Value) -> Condition {
        Condition::Leaf { field: field.to_string(), op, operand }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&doc(&[]), &None));
    }

    #[test]
    fn eq_and_ne_leaf() {
        let d = doc(&[("age", Value::I64(30))]);
        assert!(matches(&d, &Some(leaf("age", Op::Eq, Value::I64(30)))));
        assert!(matches(&d, &Some(leaf("age", Op::Ne, Value::I64(31)))));
    }

    #[test]
    fn range_leaf_combination() {
        let d = doc(&[("age", Value::I64(40))]);
        let cond = Condition::And(vec![
            leaf("age", Op::Gte, Value::I64(18)),
            leaf("age", Op::Lte, Value::I64(65)),
        ]);
        assert!(matches(&d, &Some(cond)));
    }

    #[test]
    fn comparison_on_missing_field_is_false() {
        let d = doc(&[]);
        assert!(!matches(&d, &Some(leaf("age", Op::Gt, Value::I64(0)))));
    }

    #[test]
    fn exists_true_and_false() {
        let d = doc(&[("age", Value::I64(1))]);
        assert!(matches(&d, &Some(leaf("age", Op::Exists, Value::Bool(true)))));
        assert!(matches(&d, &Some(leaf("missing", Op::Exists, Value::Bool(false)))));
        assert!(!matches(&d, &Some(leaf("age", Op::Exists, Value::Bool(false)))));
    }

    #[test]
    fn in_and_nin() {
        let d = doc(&[("status", Value::Str("active".to_string()))]);
        let list = Value::List(vec![Value::Str("active".to_string()), Value::Str("pending".to_string())]);
        assert!(matches(&d, &Some(leaf("status", Op::In, list.clone()))));
        assert!(!matches(&d, &Some(leaf("status", Op::Nin, list))));
    }

    #[test]
    fn in_matches_when_resolved_field_is_itself_a_list() {
        let d = doc(&[("tags", Value::List(vec![Value::Str("a".to_string()), Value::Str("b".to_string())]))]);
        let operand = Value::List(vec![Value::Str("b".to_string())]);
        assert!(matches(&d, &Some(leaf("tags", Op::In, operand))));
    }

    #[test]
    fn regex_against_non_string_is_false() {
        let d = doc(&[("age", Value::I64(1))]);
        assert!(!matches(&d, &Some(leaf("age", Op::Regex, Value::Str("^1$".to_string())))));
    }

    #[test]
    fn regex_matches_substring_without_anchoring() {
        let d = doc(&[("name", Value::Str("Alice Cooper".to_string()))]);
        assert!(matches(&d, &Some(leaf("name", Op::Regex, Value::Str("Cooper$".to_string())))));
    }

    #[test]
    fn not_negates() {
        let d = doc(&[("age", Value::I64(30))]);
        let cond = Condition::Not(Box::new(leaf("age", Op::Eq, Value::I64(30))));
        assert!(!matches(&d, &Some(cond)));
    }

    #[test]
    fn nested_dotted_path_resolution() {
        let mut inner = indexmap::IndexMap::new();
        inner.insert("age".to_string(), Value::I64(25));
        let d = doc(&[("profile", Value::Map(inner))]);
        assert!(matches(&d, &Some(leaf("profile.age", Op::Eq, Value::I64(25)))));
    }

    #[test]
    fn or_short_circuits_on_first_true() {
        let d = doc(&[("age", Value::I64(30))]);
        let cond = Condition::Or(vec![leaf("age", Op::Eq, Value::I64(30)), leaf("missing", Op::Eq, Value::I64(1))]);
        assert!(matches(&d, &Some(cond)));
    }
}
