use std::cmp::Ordering;

use lazy_regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::{error::StoreResult, StoreError};

// ---------------------------------------------------------------------------
// Field paths
// ---------------------------------------------------------------------------

/// Looks up a dotted path (`address.city`) inside a document.
pub fn resolve_field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, part| match current {
        Value::Object(map) => map.get(part),
        _ => None,
    })
}

fn resolve_field_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(doc, |current, part| match current {
        Value::Object(map) => map.get_mut(part),
        _ => None,
    })
}

/// Writes `value` at a dotted path, creating intermediate objects.
pub fn set_field(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        let entry = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry;
    }
}

pub fn remove_field(doc: &mut Value, path: &str) {
    let (parent, last) = match path.rsplit_once('.') {
        Some((parent, last)) => (resolve_field_mut(doc, parent), last),
        None => (Some(doc), path),
    };
    if let Some(Value::Object(map)) = parent {
        map.remove(last);
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Equality where `1` and `1.0` are the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Ordering between two values of the same kind; `None` across kinds.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order used for sorting: missing/null < numbers < strings < objects < arrays < booleans.
pub fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// A parsed filter document, validated once and evaluated per document.
#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Nor(Vec<Predicate>),
    Field {
        path: String,
        conditions: Vec<Condition>,
    },
}

#[derive(Debug, Clone)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Not(Vec<Condition>),
}

impl Predicate {
    pub fn parse(filter: &Value) -> StoreResult<Predicate> {
        let Value::Object(map) = filter else {
            return Err(StoreError::InvalidFilter(filter.to_string()));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let clause = match key.as_str() {
                "$and" => Predicate::And(Self::parse_list(key, value)?),
                "$or" => Predicate::Or(Self::parse_list(key, value)?),
                "$nor" => Predicate::Nor(Self::parse_list(key, value)?),
                op if op.starts_with('$') => {
                    return Err(StoreError::UnknownOperator(op.to_string()));
                }
                path => Predicate::Field {
                    path: path.to_string(),
                    conditions: Condition::parse_all(value)?,
                },
            };
            clauses.push(clause);
        }

        Ok(Predicate::And(clauses))
    }

    fn parse_list(op: &str, value: &Value) -> StoreResult<Vec<Predicate>> {
        match value {
            Value::Array(items) if !items.is_empty() => items.iter().map(Self::parse).collect(),
            _ => Err(StoreError::InvalidFilter(format!(
                "{op} expects a non-empty array"
            ))),
        }
    }

    pub fn test(&self, doc: &Value) -> bool {
        match self {
            Predicate::And(clauses) => clauses.iter().all(|c| c.test(doc)),
            Predicate::Or(clauses) => clauses.iter().any(|c| c.test(doc)),
            Predicate::Nor(clauses) => !clauses.iter().any(|c| c.test(doc)),
            Predicate::Field { path, conditions } => {
                let actual = resolve_field(doc, path);
                conditions.iter().all(|c| c.test(actual))
            }
        }
    }
}

fn is_operator_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

impl Condition {
    /// A bare value means equality; an object of `$` keys is a set of operators.
    pub fn parse_all(value: &Value) -> StoreResult<Vec<Condition>> {
        if !is_operator_object(value) {
            if let Value::Object(map) = value {
                if map.keys().any(|k| k.starts_with('$')) {
                    return Err(StoreError::InvalidFilter(format!(
                        "cannot mix operators and fields in {value}"
                    )));
                }
            }
            return Ok(vec![Condition::Eq(value.clone())]);
        }

        let Value::Object(ops) = value else {
            return Ok(vec![Condition::Eq(value.clone())]);
        };

        let mut conditions = Vec::with_capacity(ops.len());
        for (op, arg) in ops {
            let condition = match op.as_str() {
                "$eq" => Condition::Eq(arg.clone()),
                "$ne" => Condition::Ne(arg.clone()),
                "$gt" => Condition::Gt(arg.clone()),
                "$gte" => Condition::Gte(arg.clone()),
                "$lt" => Condition::Lt(arg.clone()),
                "$lte" => Condition::Lte(arg.clone()),
                "$in" => Condition::In(Self::array_arg(op, arg)?),
                "$nin" => Condition::Nin(Self::array_arg(op, arg)?),
                "$exists" => {
                    let flag = arg
                        .as_bool()
                        .or_else(|| arg.as_i64().map(|n| n != 0))
                        .ok_or_else(|| {
                            StoreError::InvalidFilter(format!("$exists expects a boolean, got {arg}"))
                        })?;
                    Condition::Exists(flag)
                }
                "$regex" => {
                    let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                    Condition::Regex(Self::regex_arg(arg, options)?)
                }
                "$options" if ops.contains_key("$regex") => continue,
                "$not" => {
                    if !is_operator_object(arg) {
                        return Err(StoreError::InvalidFilter(
                            "$not expects an operator object".to_string(),
                        ));
                    }
                    Condition::Not(Self::parse_all(arg)?)
                }
                other => return Err(StoreError::UnknownOperator(other.to_string())),
            };
            conditions.push(condition);
        }

        Ok(conditions)
    }

    fn array_arg(op: &str, arg: &Value) -> StoreResult<Vec<Value>> {
        arg.as_array()
            .cloned()
            .ok_or_else(|| StoreError::InvalidFilter(format!("{op} expects an array")))
    }

    fn regex_arg(arg: &Value, options: &str) -> StoreResult<Regex> {
        let pattern = arg
            .as_str()
            .ok_or_else(|| StoreError::InvalidFilter("$regex expects a string".to_string()))?;
        RegexBuilder::new(pattern)
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .dot_matches_new_line(options.contains('s'))
            .ignore_whitespace(options.contains('x'))
            .build()
            .map_err(|e| StoreError::InvalidFilter(e.to_string()))
    }

    pub fn test(&self, actual: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => eq_matches(actual, expected),
            Condition::Ne(expected) => !eq_matches(actual, expected),
            Condition::Gt(expected) => cmp_matches(actual, expected, Ordering::is_gt),
            Condition::Gte(expected) => cmp_matches(actual, expected, Ordering::is_ge),
            Condition::Lt(expected) => cmp_matches(actual, expected, Ordering::is_lt),
            Condition::Lte(expected) => cmp_matches(actual, expected, Ordering::is_le),
            Condition::In(candidates) => candidates.iter().any(|c| eq_matches(actual, c)),
            Condition::Nin(candidates) => !candidates.iter().any(|c| eq_matches(actual, c)),
            Condition::Exists(flag) => actual.is_some() == *flag,
            Condition::Regex(re) => match actual {
                Some(Value::String(s)) => re.is_match(s),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| item.as_str().is_some_and(|s| re.is_match(s))),
                _ => false,
            },
            Condition::Not(conditions) => !conditions.iter().all(|c| c.test(actual)),
        }
    }
}

// Arrays match when either the whole array or one of its elements matches.
fn eq_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(value @ Value::Array(items)) => {
            values_equal(value, expected) || items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

fn cmp_matches(actual: Option<&Value>, expected: &Value, accept: fn(Ordering) -> bool) -> bool {
    match actual {
        None => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, expected).is_some_and(accept)),
        Some(value) => compare_values(value, expected).is_some_and(accept),
    }
}
