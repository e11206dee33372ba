use serde_json::{Map, Value};

use crate::{
    error::StoreResult,
    helpers::filter_helpers::{remove_field, resolve_field, set_field},
    StoreError,
};

/// Key every stored document carries; kept by projections unless excluded.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include { fields: Vec<String>, keep_id: bool },
    Exclude { fields: Vec<String> },
}

impl Projection {
    pub fn parse(spec: &Value) -> StoreResult<Projection> {
        let Value::Object(map) = spec else {
            return Err(StoreError::InvalidProjection(spec.to_string()));
        };

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut keep_id = true;

        for (field, flag) in map {
            let include = match flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                other => {
                    return Err(StoreError::InvalidProjection(format!(
                        "{field}: expected 0/1, got {other}"
                    )))
                }
            };
            match (field.as_str(), include) {
                (ID_FIELD, flag) => keep_id = flag,
                (_, true) => included.push(field.clone()),
                (_, false) => excluded.push(field.clone()),
            }
        }

        if !included.is_empty() && !excluded.is_empty() {
            return Err(StoreError::InvalidProjection(
                "cannot mix inclusion and exclusion".to_string(),
            ));
        }

        if !included.is_empty() || (map.contains_key(ID_FIELD) && keep_id) {
            Ok(Projection::Include {
                fields: included,
                keep_id,
            })
        } else {
            if !keep_id {
                excluded.push(ID_FIELD.to_string());
            }
            Ok(Projection::Exclude { fields: excluded })
        }
    }

    pub fn apply(&self, doc: &Value) -> Value {
        match self {
            Projection::Include { fields, keep_id } => {
                let mut out = Value::Object(Map::new());
                if *keep_id {
                    if let Some(id) = doc.get(ID_FIELD) {
                        set_field(&mut out, ID_FIELD, id.clone());
                    }
                }
                for field in fields {
                    if let Some(value) = resolve_field(doc, field) {
                        set_field(&mut out, field, value.clone());
                    }
                }
                out
            }
            Projection::Exclude { fields } => {
                let mut out = doc.clone();
                for field in fields {
                    remove_field(&mut out, field);
                }
                out
            }
        }
    }
}
