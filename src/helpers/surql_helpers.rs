use serde_json::{Map, Value};

use crate::{
    error::StoreResult,
    helpers::{
        filter_helpers::{Condition, Predicate},
        pipeline_helpers::{parse_pipeline, Stage},
        projection_helpers::{Projection, ID_FIELD},
    },
    models::sort::SortOrder,
    store::FindOptions,
    validators::field_validator::{quote_field_path, validate_field_path},
    StoreError,
};

/// Parameter every compiled statement reads its table name from.
pub const COLLECTION_PARAM: &str = "collection";

const SOURCE: &str = "type::table($collection)";

/// SurrealQL text plus the parameters it references.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Map<String, Value>,
}

#[derive(Default)]
struct Binder {
    bindings: Map<String, Value>,
}

impl Binder {
    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.bindings.len());
        self.bindings.insert(name.clone(), value);
        format!("${name}")
    }

    fn finish(self, sql: String) -> CompiledQuery {
        CompiledQuery {
            sql,
            bindings: self.bindings,
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

fn join(parts: Vec<String>, op: &str) -> String {
    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", parts.join(op))
    }
}

/// `None` means the predicate accepts every record.
fn compile_predicate(predicate: &Predicate, binder: &mut Binder) -> StoreResult<Option<String>> {
    match predicate {
        Predicate::And(clauses) => {
            let mut parts = Vec::new();
            for clause in clauses {
                if let Some(part) = compile_predicate(clause, binder)? {
                    parts.push(part);
                }
            }
            Ok((!parts.is_empty()).then(|| join(parts, " AND ")))
        }
        Predicate::Or(clauses) | Predicate::Nor(clauses) => {
            let mut parts = Vec::new();
            let mut always = false;
            for clause in clauses {
                match compile_predicate(clause, binder)? {
                    Some(part) => parts.push(part),
                    None => always = true,
                }
            }
            let negate = matches!(predicate, Predicate::Nor(_));
            Ok(match (always, negate) {
                (true, false) => None,
                (true, true) => Some("false".to_string()),
                (false, false) => Some(join(parts, " OR ")),
                (false, true) => Some(format!("!({})", parts.join(" OR "))),
            })
        }
        Predicate::Field { path, conditions } => {
            let field = quote_field_path(path)?;
            let parts = conditions
                .iter()
                .map(|c| compile_condition(&field, c, binder))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(Some(join(parts, " AND ")))
        }
    }
}

fn compile_condition(field: &str, condition: &Condition, binder: &mut Binder) -> StoreResult<String> {
    let sql = match condition {
        Condition::Eq(Value::Null) => format!("({field} = NONE OR {field} = NULL)"),
        Condition::Eq(v) => format!("{field} = {}", binder.bind(v.clone())),
        Condition::Ne(v) => format!("{field} != {}", binder.bind(v.clone())),
        Condition::Gt(v) => format!("{field} > {}", binder.bind(v.clone())),
        Condition::Gte(v) => format!("{field} >= {}", binder.bind(v.clone())),
        Condition::Lt(v) => format!("{field} < {}", binder.bind(v.clone())),
        Condition::Lte(v) => format!("{field} <= {}", binder.bind(v.clone())),
        Condition::In(vs) => format!("{field} INSIDE {}", binder.bind(Value::Array(vs.clone()))),
        Condition::Nin(vs) => {
            format!("{field} NOTINSIDE {}", binder.bind(Value::Array(vs.clone())))
        }
        Condition::Exists(true) => format!("{field} != NONE"),
        Condition::Exists(false) => format!("{field} = NONE"),
        Condition::Regex(_) => return Err(StoreError::UnknownOperator("$regex".to_string())),
        Condition::Not(inner) => {
            let parts = inner
                .iter()
                .map(|c| compile_condition(field, c, binder))
                .collect::<StoreResult<Vec<_>>>()?;
            format!("!({})", parts.join(" AND "))
        }
    };
    Ok(sql)
}

fn where_clause(filter: &Value, binder: &mut Binder) -> StoreResult<String> {
    let predicate = Predicate::parse(filter)?;
    Ok(compile_predicate(&predicate, binder)?
        .map(|cond| format!(" WHERE {cond}"))
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Clauses
// ---------------------------------------------------------------------------

/// Record ids live in `id`; the document-style `_id` key maps onto it.
fn surreal_field(field: &str) -> StoreResult<String> {
    if field == ID_FIELD || field == "id" {
        Ok("id".to_string())
    } else {
        quote_field_path(field)
    }
}

pub fn select_clause(projection: Option<&Value>) -> StoreResult<String> {
    match projection {
        Some(spec) => projection_columns(&Projection::parse(spec)?),
        None => Ok("*".to_string()),
    }
}

fn projection_columns(projection: &Projection) -> StoreResult<String> {
    match projection {
        Projection::Include { fields, keep_id } => {
            let mut columns = Vec::with_capacity(fields.len() + 1);
            if *keep_id {
                columns.push("id".to_string());
            }
            for field in fields.iter().filter(|f| f.as_str() != "id") {
                columns.push(surreal_field(field)?);
            }
            Ok(columns.join(", "))
        }
        Projection::Exclude { fields } if fields.is_empty() => Ok("*".to_string()),
        Projection::Exclude { fields } => {
            let omitted = fields
                .iter()
                .map(|f| surreal_field(f))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(format!("* OMIT {}", omitted.join(", ")))
        }
    }
}

fn order_clause(keys: &[(String, SortOrder)]) -> StoreResult<String> {
    let keys = keys
        .iter()
        .map(|(field, order)| Ok(format!("{} {order}", surreal_field(field)?)))
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(keys.join(", "))
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

pub fn compile_count(filter: &Value) -> StoreResult<CompiledQuery> {
    let mut binder = Binder::default();
    let where_sql = where_clause(filter, &mut binder)?;
    Ok(binder.finish(format!(
        "SELECT count() AS total FROM {SOURCE}{where_sql} GROUP ALL"
    )))
}

pub fn compile_find(options: &FindOptions) -> StoreResult<CompiledQuery> {
    let mut binder = Binder::default();
    let select = select_clause(options.projection.as_ref())?;
    let where_sql = where_clause(&options.filter, &mut binder)?;
    let order_sql = match &options.sort {
        Some(sort) => format!(" ORDER BY {}", order_clause(std::slice::from_ref(sort))?),
        None => String::new(),
    };

    Ok(binder.finish(format!(
        "SELECT {select} FROM {SOURCE}{where_sql}{order_sql} LIMIT {} START {}",
        options.limit, options.skip
    )))
}

/// Each stage wraps the previous statement in a sub-select.
pub fn compile_pipeline(pipeline: &[Value]) -> StoreResult<CompiledQuery> {
    let mut binder = Binder::default();
    let mut sql = format!("SELECT * FROM {SOURCE}");

    for stage in parse_pipeline(pipeline)? {
        sql = match stage {
            Stage::Match(predicate) => match compile_predicate(&predicate, &mut binder)? {
                Some(cond) => format!("SELECT * FROM ({sql}) WHERE {cond}"),
                None => sql,
            },
            Stage::Sort(keys) => format!("SELECT * FROM ({sql}) ORDER BY {}", order_clause(&keys)?),
            Stage::Project(projection) => {
                format!("SELECT {} FROM ({sql})", projection_columns(&projection)?)
            }
            Stage::Skip(n) => format!("SELECT * FROM ({sql}) START {n}"),
            Stage::Limit(n) => format!("SELECT * FROM ({sql}) LIMIT {n}"),
            Stage::Count(field) => {
                let field = validate_field_path(&field)?;
                format!("SELECT count() AS {field} FROM ({sql}) GROUP ALL")
            }
            Stage::Unwind { .. } => return Err(StoreError::UnknownStage("$unwind".to_string())),
            Stage::Group { .. } => return Err(StoreError::UnknownStage("$group".to_string())),
            Stage::AddFields(_) => return Err(StoreError::UnknownStage("$addFields".to_string())),
        };
    }

    Ok(binder.finish(sql))
}
