use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    error::StoreResult,
    helpers::{
        filter_helpers::Predicate,
        pipeline_helpers::{parse_pipeline, run_pipeline, sort_documents},
        projection_helpers::{Projection, ID_FIELD},
    },
    store::{FindOptions, Store},
    StoreError,
};

#[derive(Default)]
struct Collections {
    next_id: u64,
    docs: HashMap<String, Vec<Value>>,
}

/// In-process document store keeping collections in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends documents, assigning a numeric `_id` to those without one.
    /// Returns the ids in insertion order.
    pub async fn insert_many(
        &self,
        collection: &str,
        docs: impl IntoIterator<Item = Value>,
    ) -> StoreResult<Vec<Value>> {
        let mut inner = self.inner.write().await;
        let mut prepared = Vec::new();
        for mut doc in docs {
            if !doc.is_object() {
                return Err(StoreError::InvalidDocument(format!(
                    "documents must be objects, got {doc}"
                )));
            }
            if let Some(map) = doc.as_object_mut().filter(|m| !m.contains_key(ID_FIELD)) {
                inner.next_id += 1;
                map.insert(ID_FIELD.to_string(), Value::from(inner.next_id));
            }
            prepared.push(doc);
        }

        let ids = prepared.iter().map(|d| d[ID_FIELD].clone()).collect();
        inner
            .docs
            .entry(collection.to_string())
            .or_default()
            .extend(prepared);

        tracing::debug!("Inserted documents into {}", collection);
        Ok(ids)
    }

    pub async fn drop_collection(&self, collection: &str) {
        self.inner.write().await.docs.remove(collection);
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .docs
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<u64> {
        let predicate = Predicate::parse(filter)?;
        let inner = self.inner.read().await;
        let total = inner
            .docs
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|d| predicate.test(d)).count());
        Ok(total as u64)
    }

    async fn find(&self, collection: &str, options: &FindOptions) -> StoreResult<Vec<Value>> {
        let predicate = Predicate::parse(&options.filter)?;
        let projection = options.projection.as_ref().map(Projection::parse).transpose()?;

        let mut matched: Vec<Value> = {
            let inner = self.inner.read().await;
            inner
                .docs
                .get(collection)
                .map(|docs| docs.iter().filter(|d| predicate.test(d)).cloned().collect())
                .unwrap_or_default()
        };

        if let Some(sort) = &options.sort {
            sort_documents(&mut matched, std::slice::from_ref(sort));
        }

        Ok(matched
            .into_iter()
            .skip(options.skip as usize)
            .take(options.limit as usize)
            .map(|doc| match &projection {
                Some(projection) => projection.apply(&doc),
                None => doc,
            })
            .collect())
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> StoreResult<Vec<Value>> {
        let stages = parse_pipeline(pipeline)?;
        let docs = self
            .inner
            .read()
            .await
            .docs
            .get(collection)
            .cloned()
            .unwrap_or_default();
        Ok(run_pipeline(docs, &stages))
    }
}
