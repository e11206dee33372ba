use std::cmp::Ordering;

use serde_json::{json, Map, Value};

use crate::{
    error::StoreResult,
    helpers::{
        filter_helpers::{remove_field, resolve_field, set_field, sort_cmp, values_equal, Predicate},
        projection_helpers::{Projection, ID_FIELD},
    },
    models::sort::SortOrder,
    StoreError,
};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Predicate),
    Sort(Vec<(String, SortOrder)>),
    Project(Projection),
    Skip(u64),
    Limit(u64),
    Count(String),
    Unwind { path: String, preserve_empty: bool },
    Group {
        key: Value,
        accumulators: Vec<(String, Accumulator)>,
    },
    AddFields(Vec<(String, Value)>),
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    Sum(Value),
    Avg(Value),
    Min(Value),
    Max(Value),
    First(Value),
    Last(Value),
    Push(Value),
}

/// Parses and validates every stage before any document is touched.
pub fn parse_pipeline(stages: &[Value]) -> StoreResult<Vec<Stage>> {
    stages.iter().map(parse_stage).collect()
}

fn parse_stage(stage: &Value) -> StoreResult<Stage> {
    let (name, arg) = match stage.as_object() {
        Some(map) if map.len() == 1 => map.iter().next().ok_or_else(|| malformed(stage))?,
        _ => return Err(malformed(stage)),
    };

    match name.as_str() {
        "$match" => Ok(Stage::Match(Predicate::parse(arg)?)),
        "$sort" => Ok(Stage::Sort(parse_sort_spec(arg)?)),
        "$project" => Ok(Stage::Project(Projection::parse(arg)?)),
        "$skip" => Ok(Stage::Skip(arg.as_u64().ok_or_else(|| malformed(stage))?)),
        "$limit" => match arg.as_u64() {
            Some(n) if n > 0 => Ok(Stage::Limit(n)),
            _ => Err(malformed(stage)),
        },
        "$count" => match arg.as_str() {
            Some(field) if !field.is_empty() && !field.starts_with('$') && !field.contains('.') => {
                Ok(Stage::Count(field.to_string()))
            }
            _ => Err(malformed(stage)),
        },
        "$unwind" => parse_unwind(arg).ok_or_else(|| malformed(stage)),
        "$group" => parse_group(arg).and_then(|g| g.ok_or_else(|| malformed(stage))),
        "$addFields" => match arg.as_object() {
            Some(fields) => Ok(Stage::AddFields(
                fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            None => Err(malformed(stage)),
        },
        other => Err(StoreError::UnknownStage(other.to_string())),
    }
}

fn malformed(stage: &Value) -> StoreError {
    StoreError::MalformedStage(stage.to_string())
}

/// `{"field": 1, "other": -1}` into ordered sort keys.
pub fn parse_sort_spec(spec: &Value) -> StoreResult<Vec<(String, SortOrder)>> {
    let map = match spec.as_object() {
        Some(map) if !map.is_empty() => map,
        _ => return Err(malformed(&json!({ "$sort": spec }))),
    };
    map.iter()
        .map(|(field, dir)| match dir.as_i64() {
            Some(1) => Ok((field.clone(), SortOrder::Asc)),
            Some(-1) => Ok((field.clone(), SortOrder::Desc)),
            _ => Err(malformed(&json!({ "$sort": spec }))),
        })
        .collect()
}

fn field_ref(value: &Value) -> Option<String> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix('$'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_unwind(arg: &Value) -> Option<Stage> {
    match arg {
        Value::String(_) => Some(Stage::Unwind {
            path: field_ref(arg)?,
            preserve_empty: false,
        }),
        Value::Object(map) => Some(Stage::Unwind {
            path: field_ref(map.get("path")?)?,
            preserve_empty: map
                .get("preserveNullAndEmptyArrays")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        _ => None,
    }
}

fn parse_group(arg: &Value) -> StoreResult<Option<Stage>> {
    let Some(map) = arg.as_object() else {
        return Ok(None);
    };
    let Some(key) = map.get(ID_FIELD) else {
        return Ok(None);
    };

    let mut accumulators = Vec::new();
    for (field, spec) in map.iter().filter(|(k, _)| k.as_str() != ID_FIELD) {
        let (op, expr) = match spec.as_object() {
            Some(acc) if acc.len() == 1 => match acc.iter().next() {
                Some(entry) => entry,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        let expr = expr.clone();
        let accumulator = match op.as_str() {
            "$sum" => Accumulator::Sum(expr),
            "$avg" => Accumulator::Avg(expr),
            "$min" => Accumulator::Min(expr),
            "$max" => Accumulator::Max(expr),
            "$first" => Accumulator::First(expr),
            "$last" => Accumulator::Last(expr),
            "$push" => Accumulator::Push(expr),
            other => return Err(StoreError::UnknownOperator(other.to_string())),
        };
        accumulators.push((field.clone(), accumulator));
    }

    Ok(Some(Stage::Group {
        key: key.clone(),
        accumulators,
    }))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// `"$field"` reads from the document; objects evaluate member-wise; anything else is literal.
fn eval(doc: &Value, expr: &Value) -> Value {
    match expr {
        Value::String(_) => match field_ref(expr) {
            Some(path) => resolve_field(doc, &path).cloned().unwrap_or(Value::Null),
            None => expr.clone(),
        },
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), eval(doc, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Stable multi-key sort.
pub fn sort_documents(docs: &mut [Value], keys: &[(String, SortOrder)]) {
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|(field, order)| {
                let ord = sort_cmp(resolve_field(a, field), resolve_field(b, field));
                match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

pub fn run_pipeline(mut docs: Vec<Value>, stages: &[Stage]) -> Vec<Value> {
    for stage in stages {
        docs = match stage {
            Stage::Match(predicate) => docs.into_iter().filter(|d| predicate.test(d)).collect(),
            Stage::Sort(keys) => {
                sort_documents(&mut docs, keys);
                docs
            }
            Stage::Project(projection) => docs.iter().map(|d| projection.apply(d)).collect(),
            Stage::Skip(n) => docs.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => docs.into_iter().take(*n as usize).collect(),
            Stage::Count(field) => {
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Map::new();
                    out.insert(field.clone(), Value::from(docs.len() as u64));
                    vec![Value::Object(out)]
                }
            }
            Stage::Unwind {
                path,
                preserve_empty,
            } => unwind(docs, path, *preserve_empty),
            Stage::Group { key, accumulators } => group(&docs, key, accumulators),
            Stage::AddFields(fields) => docs
                .into_iter()
                .map(|mut doc| {
                    for (field, expr) in fields {
                        let value = eval(&doc, expr);
                        set_field(&mut doc, field, value);
                    }
                    doc
                })
                .collect(),
        };
    }
    docs
}

fn unwind(docs: Vec<Value>, path: &str, preserve_empty: bool) -> Vec<Value> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match resolve_field(&doc, path).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    set_field(&mut copy, path, item);
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) => {
                if preserve_empty {
                    let mut copy = doc;
                    remove_field(&mut copy, path);
                    out.push(copy);
                }
            }
            None | Some(Value::Null) => {
                if preserve_empty {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    out
}

fn group(docs: &[Value], key: &Value, accumulators: &[(String, Accumulator)]) -> Vec<Value> {
    // Groups keep the order in which their key first appeared.
    let mut groups: Vec<(Value, Vec<&Value>)> = Vec::new();
    for doc in docs {
        let k = eval(doc, key);
        match groups.iter_mut().find(|(existing, _)| values_equal(existing, &k)) {
            Some((_, members)) => members.push(doc),
            None => groups.push((k, vec![doc])),
        }
    }

    groups
        .into_iter()
        .map(|(k, members)| {
            let mut out = Map::new();
            out.insert(ID_FIELD.to_string(), k);
            for (field, accumulator) in accumulators {
                out.insert(field.clone(), accumulate(&members, accumulator));
            }
            Value::Object(out)
        })
        .collect()
}

fn accumulate(members: &[&Value], accumulator: &Accumulator) -> Value {
    let values = |expr: &Value| -> Vec<Value> { members.iter().map(|d| eval(d, expr)).collect() };
    let numbers =
        |expr: &Value| -> Vec<f64> { values(expr).iter().filter_map(Value::as_f64).collect() };

    match accumulator {
        Accumulator::Sum(expr) => number_to_value(numbers(expr).iter().sum()),
        Accumulator::Avg(expr) => {
            let nums = numbers(expr);
            if nums.is_empty() {
                Value::Null
            } else {
                number_to_value(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        Accumulator::Min(expr) => values(expr)
            .into_iter()
            .filter(|v| !v.is_null())
            .min_by(|a, b| sort_cmp(Some(a), Some(b)))
            .unwrap_or(Value::Null),
        Accumulator::Max(expr) => values(expr)
            .into_iter()
            .filter(|v| !v.is_null())
            .max_by(|a, b| sort_cmp(Some(a), Some(b)))
            .unwrap_or(Value::Null),
        Accumulator::First(expr) => members.first().map(|d| eval(d, expr)).unwrap_or(Value::Null),
        Accumulator::Last(expr) => members.last().map(|d| eval(d, expr)).unwrap_or(Value::Null),
        Accumulator::Push(expr) => Value::Array(values(expr)),
    }
}
