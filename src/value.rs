// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! The closed set of value types a document field may hold (§3, §9).
//!
//! `Value` serialises to JSON using a small MongoDB-extended-JSON-style
//! convention so that round-tripping through disk never loses the
//! distinction between, say, a decimal and a plain string: `Decimal` is
//! wrapped as `{"$decimal": "12.34"}` and `Ts` as `{"$date": "<rfc3339>"}`.
//! Every other variant maps directly onto its natural JSON shape.

use crate::error::{DocbaseError, DocbaseResult};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use std::cmp::Ordering;
use std::str::FromStr;

const DECIMAL_TAG: &str = "$decimal";
const DATE_TAG: &str = "$date";

/// A document field value.
///
/// Field order within `Map` is preserved (`IndexMap`, not `HashMap`) so
/// that documents round-trip to the same pretty-printed JSON they were
/// read from.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Ts(DateTime<Utc>),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Resolves a dotted path (`a.b.c`) against this value, treating
    /// `self` as the root document body.
    ///
    /// Returns `None` if any intermediate segment is absent or not a map
    /// (§4.6: "a missing intermediate segment yields absent").
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Value::Map(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// SQL-like ordering used by comparison operators (§4.6).
    ///
    /// Returns `None` when the two values are not comparable under this
    /// scheme (cross-type comparisons other than numeric widening, or
    /// anything involving `Null` other than `Null == Null`).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            (Ts(a), Ts(b)) => a.partial_cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (da, db) = (a.as_decimal()?, b.as_decimal()?);
                da.partial_cmp(&db)
            }
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_) | Value::Decimal(_))
    }

    /// Widens any numeric variant to `Decimal` for cross-representation
    /// comparison (i64 vs f64 vs Decimal all compare numerically, §4.6).
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::I64(i) => Some(Decimal::from(*i)),
            Value::F64(f) => Decimal::from_f64_retain(*f),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// True iff `self` equals `other` under `$eq` semantics.
    pub fn values_equal(&self, other: &Value) -> bool {
        matches!(self.compare(other), Some(Ordering::Equal))
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Truthiness used by projection specs (§4.5): numeric 0 is false,
    /// non-zero numeric is true, booleans literal.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::I64(i) => *i != 0,
            Value::F64(f) => *f != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Null => false,
            _ => true,
        }
    }

    /// Converts to a plain `serde_json::Value`, using the `$decimal`/`$date`
    /// tagging convention for the two variants JSON cannot represent
    /// natively without ambiguity.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::I64(i) => serde_json::Value::Number(Number::from(*i)),
            Value::F64(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => {
                let mut obj = serde_json::Map::new();
                obj.insert(DECIMAL_TAG.to_string(), serde_json::Value::String(d.to_string()));
                serde_json::Value::Object(obj)
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Ts(t) => {
                let mut obj = serde_json::Map::new();
                obj.insert(DATE_TAG.to_string(), serde_json::Value::String(t.to_rfc3339()));
                serde_json::Value::Object(obj)
            }
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }

    /// Converts from a plain `serde_json::Value`, recognising the
    /// `$decimal`/`$date` tagging convention produced by `to_json`.
    pub fn from_json(json: &serde_json::Value) -> DocbaseResult<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::I64(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::F64(f))
                } else {
                    Err(DocbaseError::ParseError {
                        reason: "numeric value out of range".to_string(),
                        fragment: n.to_string(),
                    })
                }
            }
            serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
            serde_json::Value::Array(items) => {
                let values = items.iter().map(Value::from_json).collect::<DocbaseResult<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            serde_json::Value::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(serde_json::Value::String(s)) = obj.get(DECIMAL_TAG) {
                        let d = Decimal::from_str(s).map_err(|e| DocbaseError::ParseError {
                            reason: format!("invalid decimal: {}", e),
                            fragment: s.clone(),
                        })?;
                        return Ok(Value::Decimal(d));
                    }
                    if let Some(serde_json::Value::String(s)) = obj.get(DATE_TAG) {
                        let ts = DateTime::parse_from_rfc3339(s)
                            .map_err(|e| DocbaseError::ParseError {
                                reason: format!("invalid timestamp: {}", e),
                                fragment: s.clone(),
                            })?
                            .with_timezone(&Utc);
                        return Ok(Value::Ts(ts));
                    }
                }
                let mut map = IndexMap::new();
                for (k, v) in obj {
                    map.insert(k.clone(), Value::from_json(v)?);
                }
                Ok(Value::Map(map))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(&json).map_err(de::Error::custom)
    }
}
