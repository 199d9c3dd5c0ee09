// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter expressions over record documents.
//!
//! Filters use a Mongo-style JSON syntax, evaluated against the document form
//! of a [`Record`](crate::record::Record):
//!
//! ```json
//! { "_meta.stored_type": "geometry_msgs/Pose",
//!   "payload.position.x": { "$gte": 1, "$lt": 4 },
//!   "$or": [ { "_meta.name": { "$exists": false } }, { "_meta.name": "keep" } ] }
//! ```
//!
//! # Supported syntax
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{"a.b": v}` | field equals `v` (any element if the field is an array) |
//! | `$eq` `$ne` `$lt` `$lte` `$gt` `$gte` | comparison with a single operand |
//! | `$in` `$nin` | membership, operand must be an array |
//! | `$exists` | presence, operand must be a boolean |
//! | `$and` `$or` `$nor` | logical operators over a non-empty array of filters |
//!
//! Entries of one object are combined with AND. Numbers compare numerically,
//! strings lexicographically; values of different types never compare.
//! A filter is parsed once with [`Filter::parse`] so malformed input fails
//! before any store is touched.

use crate::error::FilterError;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document (`{}`).
    All,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    /// A condition on the value at a dotted path.
    Field { path: String, condition: Condition },
}

/// Condition applied to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    /// Several operators on one field, e.g. `{"$gte": 1, "$lt": 5}`.
    All(Vec<Condition>),
}

impl Filter {
    /// Parse and validate a JSON filter.
    pub fn parse(value: &Value) -> Result<Filter, FilterError> {
        let obj = value
            .as_object()
            .ok_or_else(|| FilterError::NotAnObject(json_type(value).to_string()))?;

        let mut clauses = Vec::with_capacity(obj.len());
        for (key, operand) in obj {
            let clause = match key.as_str() {
                "$and" => Filter::And(parse_list(key, operand)?),
                "$or" => Filter::Or(parse_list(key, operand)?),
                "$nor" => Filter::Nor(parse_list(key, operand)?),
                op if op.starts_with('$') => {
                    return Err(FilterError::UnknownOperator(op.to_string()))
                }
                path => {
                    validate_path(path)?;
                    Filter::Field {
                        path: path.to_string(),
                        condition: Condition::parse(path, operand)?,
                    }
                }
            };
            clauses.push(clause);
        }

        Ok(match clauses.len() {
            0 => Filter::All,
            1 => clauses.into_iter().next().unwrap_or(Filter::All),
            _ => Filter::And(clauses),
        })
    }

    /// Parse a filter from JSON text (e.g. a command-line argument).
    pub fn from_json_str(text: &str) -> Result<Filter, FilterError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| FilterError::Json(e.to_string()))?;
        Self::parse(&value)
    }

    /// Equality condition on a path.
    pub fn equals(path: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Field {
            path: path.into(),
            condition: Condition::Eq(value.into()),
        }
    }

    /// Arbitrary condition on a path.
    pub fn field(path: impl Into<String>, condition: Condition) -> Filter {
        Filter::Field {
            path: path.into(),
            condition,
        }
    }

    /// Conjunction of two filters. `All` is the identity; nested `And`s are flattened.
    pub fn and(self, other: Filter) -> Filter {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Filter::All => {}
                Filter::And(inner) => parts.extend(inner),
                f => parts.push(f),
            }
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.into_iter().next().unwrap_or(Filter::All),
            _ => Filter::And(parts),
        }
    }

    /// True if this filter matches everything.
    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    /// Evaluate against a JSON document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::And(fs) => fs.iter().all(|f| f.matches(doc)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(doc)),
            Filter::Nor(fs) => !fs.iter().any(|f| f.matches(doc)),
            Filter::Field { path, condition } => condition.matches(lookup(doc, path)),
        }
    }

    /// Canonical JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::All => Value::Object(Map::new()),
            Filter::And(fs) => logical("$and", fs),
            Filter::Or(fs) => logical("$or", fs),
            Filter::Nor(fs) => logical("$nor", fs),
            Filter::Field { path, condition } => {
                let mut obj = Map::new();
                obj.insert(path.clone(), condition.to_json());
                Value::Object(obj)
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Condition {
    fn parse(path: &str, operand: &Value) -> Result<Condition, FilterError> {
        let ops = match operand {
            Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => obj,
            literal => return Ok(Condition::Eq(literal.clone())),
        };
        if !ops.keys().all(|k| k.starts_with('$')) {
            return Err(FilterError::MixedCondition(path.to_string()));
        }

        let mut conditions = Vec::with_capacity(ops.len());
        for (op, arg) in ops {
            conditions.push(match op.as_str() {
                "$eq" => Condition::Eq(arg.clone()),
                "$ne" => Condition::Ne(arg.clone()),
                "$lt" => Condition::Lt(arg.clone()),
                "$lte" => Condition::Lte(arg.clone()),
                "$gt" => Condition::Gt(arg.clone()),
                "$gte" => Condition::Gte(arg.clone()),
                "$in" => Condition::In(array_operand(op, arg)?),
                "$nin" => Condition::Nin(array_operand(op, arg)?),
                "$exists" => Condition::Exists(arg.as_bool().ok_or_else(|| {
                    FilterError::BadOperand {
                        operator: op.clone(),
                        expected: "a boolean",
                    }
                })?),
                other => return Err(FilterError::UnknownOperator(other.to_string())),
            });
        }

        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Condition::All(conditions)
        })
    }

    /// Evaluate against a field value (`None` when the path is missing).
    pub fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Eq(target) => field_eq(field, target),
            Condition::Ne(target) => !field_eq(field, target),
            Condition::Lt(target) => field_cmp(field, target, |o| o == Ordering::Less),
            Condition::Lte(target) => field_cmp(field, target, |o| o != Ordering::Greater),
            Condition::Gt(target) => field_cmp(field, target, |o| o == Ordering::Greater),
            Condition::Gte(target) => field_cmp(field, target, |o| o != Ordering::Less),
            Condition::In(targets) => targets.iter().any(|t| field_eq(field, t)),
            Condition::Nin(targets) => !targets.iter().any(|t| field_eq(field, t)),
            Condition::Exists(expected) => field.is_some() == *expected,
            Condition::All(conds) => conds.iter().all(|c| c.matches(field)),
        }
    }

    fn to_json(&self) -> Value {
        let single = |op: &str, v: Value| {
            let mut obj = Map::new();
            obj.insert(op.to_string(), v);
            Value::Object(obj)
        };
        match self {
            // Object literals would read back as operator objects otherwise.
            Condition::Eq(v) if v.is_object() => single("$eq", v.clone()),
            Condition::Eq(v) => v.clone(),
            Condition::Ne(v) => single("$ne", v.clone()),
            Condition::Lt(v) => single("$lt", v.clone()),
            Condition::Lte(v) => single("$lte", v.clone()),
            Condition::Gt(v) => single("$gt", v.clone()),
            Condition::Gte(v) => single("$gte", v.clone()),
            Condition::In(vs) => single("$in", Value::Array(vs.clone())),
            Condition::Nin(vs) => single("$nin", Value::Array(vs.clone())),
            Condition::Exists(b) => single("$exists", Value::Bool(*b)),
            Condition::All(conds) => {
                let mut obj = Map::new();
                for c in conds {
                    match c.to_json() {
                        Value::Object(inner) => obj.extend(inner),
                        literal => {
                            obj.insert("$eq".to_string(), literal);
                        }
                    }
                }
                Value::Object(obj)
            }
        }
    }
}

/// Resolve a dotted path. Numeric segments index into arrays.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn parse_list(op: &str, operand: &Value) -> Result<Vec<Filter>, FilterError> {
    let items = operand
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| FilterError::BadOperand {
            operator: op.to_string(),
            expected: "a non-empty array of filters",
        })?;
    items.iter().map(Filter::parse).collect()
}

fn array_operand(op: &str, operand: &Value) -> Result<Vec<Value>, FilterError> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| FilterError::BadOperand {
            operator: op.to_string(),
            expected: "an array",
        })
}

fn validate_path(path: &str) -> Result<(), FilterError> {
    if path.split('.').any(str::is_empty) {
        return Err(FilterError::EmptyPath);
    }
    Ok(())
}

fn logical(op: &str, filters: &[Filter]) -> Value {
    let mut obj = Map::new();
    obj.insert(
        op.to_string(),
        Value::Array(filters.iter().map(Filter::to_json).collect()),
    );
    Value::Object(obj)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn field_eq(field: Option<&Value>, target: &Value) -> bool {
    match field {
        None => target.is_null(),
        Some(Value::Array(items)) if !target.is_array() => {
            items.iter().any(|item| value_eq(item, target))
        }
        Some(value) => value_eq(value, target),
    }
}

fn field_cmp(field: Option<&Value>, target: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |v: &Value| compare(v, target).is_some_and(&accept);
    match field {
        None => false,
        Some(Value::Array(items)) if !target.is_array() => items.iter().any(check),
        Some(value) => check(value),
    }
}

/// Ordering between two JSON values of the same kind; `None` across kinds.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "_id": "0000000000000001",
            "payload": { "position": { "x": 3, "y": 1.5 }, "tags": ["a", "b"] },
            "_meta": { "stored_type": "geometry_msgs/Pose", "inserted_at": 1000, "name": "p1" }
        })
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let f = Filter::parse(&json!({})).unwrap();
        assert!(f.is_all());
        assert!(f.matches(&doc()));
        assert!(f.matches(&json!(null)));
    }

    #[test]
    fn test_stored_type_equality() {
        let f = Filter::parse(&json!({"_meta.stored_type": "geometry_msgs/Pose"})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"_meta.stored_type": "geometry_msgs/Wrench"})).unwrap();
        assert!(!f.matches(&doc()));
    }

    #[test]
    fn test_range_operators() {
        let f = Filter::parse(&json!({"payload.position.x": {"$gte": 3, "$lt": 4}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"_meta.inserted_at": {"$lt": 1000}})).unwrap();
        assert!(!f.matches(&doc()));
        let f = Filter::parse(&json!({"_meta.inserted_at": {"$lte": 1000}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"payload.position.y": {"$gt": 1}})).unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn test_integer_and_float_compare_equal() {
        let f = Filter::parse(&json!({"payload.position.x": 3.0})).unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn test_cross_type_never_matches() {
        let f = Filter::parse(&json!({"payload.position.x": {"$lt": "9"}})).unwrap();
        assert!(!f.matches(&doc()));
        let f = Filter::parse(&json!({"payload.position.x": {"$gte": "0"}})).unwrap();
        assert!(!f.matches(&doc()));
    }

    #[test]
    fn test_missing_field() {
        let f = Filter::parse(&json!({"_meta.missing": null})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"_meta.missing": {"$exists": false}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"_meta.name": {"$exists": true}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"_meta.missing": {"$gt": 0}})).unwrap();
        assert!(!f.matches(&doc()));
    }

    #[test]
    fn test_array_field_matches_any_element() {
        let f = Filter::parse(&json!({"payload.tags": "b"})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"payload.tags.0": "a"})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"payload.tags": ["a", "b"]})).unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn test_in_nin() {
        let f = Filter::parse(&json!({"_meta.name": {"$in": ["p0", "p1"]}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"_meta.name": {"$nin": ["p0", "p1"]}})).unwrap();
        assert!(!f.matches(&doc()));
    }

    #[test]
    fn test_logical_operators() {
        let f = Filter::parse(&json!({
            "$or": [{"_meta.name": "zz"}, {"payload.position.x": 3}]
        }))
        .unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({
            "$nor": [{"_meta.name": "zz"}, {"payload.position.x": 3}]
        }))
        .unwrap();
        assert!(!f.matches(&doc()));
        let f = Filter::parse(&json!({
            "$and": [{"_meta.name": "p1"}, {"payload.position.x": 4}]
        }))
        .unwrap();
        assert!(!f.matches(&doc()));
    }

    #[test]
    fn test_malformed_filters() {
        assert!(matches!(
            Filter::parse(&json!([1])),
            Err(FilterError::NotAnObject(t)) if t == "array"
        ));
        assert!(matches!(
            Filter::parse(&json!({"$where": "1"})),
            Err(FilterError::UnknownOperator(_))
        ));
        assert!(matches!(
            Filter::parse(&json!({"a": {"$regex": "x"}})),
            Err(FilterError::UnknownOperator(_))
        ));
        assert!(matches!(
            Filter::parse(&json!({"a": {"$in": 3}})),
            Err(FilterError::BadOperand { .. })
        ));
        assert!(matches!(
            Filter::parse(&json!({"a": {"$exists": "yes"}})),
            Err(FilterError::BadOperand { .. })
        ));
        assert!(matches!(
            Filter::parse(&json!({"$or": []})),
            Err(FilterError::BadOperand { .. })
        ));
        assert!(matches!(
            Filter::parse(&json!({"a": {"$gt": 1, "b": 2}})),
            Err(FilterError::MixedCondition(_))
        ));
        assert!(matches!(Filter::parse(&json!({"a..b": 1})), Err(FilterError::EmptyPath)));
        assert!(matches!(Filter::from_json_str("{not json"), Err(FilterError::Json(_))));
    }

    #[test]
    fn test_and_flattens_and_drops_all() {
        let a = Filter::equals("a", 1);
        let b = Filter::equals("b", 2);
        assert_eq!(Filter::All.and(a.clone()), a);
        let ab = a.clone().and(b.clone());
        assert_eq!(ab, Filter::And(vec![a.clone(), b.clone()]));
        let abc = ab.and(Filter::equals("c", 3));
        assert!(matches!(abc, Filter::And(ref v) if v.len() == 3));
    }

    #[test]
    fn test_to_json_reparses_to_same_filter() {
        let raw = json!({
            "_meta.stored_type": "geometry_msgs/Pose",
            "payload.position": {"$eq": {"x": 3}},
            "$or": [{"a": {"$in": [1, 2]}}, {"b": {"$exists": false}}]
        });
        let parsed = Filter::parse(&raw).unwrap();
        let again = Filter::parse(&parsed.to_json()).unwrap();
        assert_eq!(parsed, again);
    }

    #[test]
    fn test_lookup_paths() {
        let d = doc();
        assert_eq!(lookup(&d, "_meta.name"), Some(&json!("p1")));
        assert_eq!(lookup(&d, "payload.tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&d, "payload.tags.x"), None);
        assert_eq!(lookup(&d, "payload.position.x.y"), None);
    }
}
