#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use paginated_query::{error::StoreResult, FindOptions, MemoryStore, Store, StoreError};
use serde_json::{json, Value};

pub const COLLECTION: &str = "TodoTest";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `todo-0` .. `todo-{n-1}`, all active, `price` equal to the index.
pub fn todo_docs(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "title": format!("todo-{i}"),
                "status": "active",
                "price": i,
            })
        })
        .collect()
}

pub async fn seeded_store(n: usize) -> MemoryStore {
    init_tracing();
    let store = MemoryStore::new();
    store
        .insert_many(COLLECTION, todo_docs(n))
        .await
        .expect("seeding the memory store failed");
    store
}

fn is_count_pipeline(pipeline: &[Value]) -> bool {
    pipeline
        .last()
        .and_then(|stage| stage.get("$count"))
        .is_some()
}

/// Wraps a [`MemoryStore`], counting calls and optionally failing or
/// stalling one phase.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub calls: AtomicUsize,
    pub fail_count: bool,
    pub fail_fetch: bool,
    pub delay: Option<Duration>,
    /// Replaces the rows of the counting pipeline when set.
    pub count_rows: Option<Vec<Value>>,
}

impl ScriptedStore {
    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, failing: bool) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(StoreError::Db("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for ScriptedStore {
    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<u64> {
        self.enter(self.fail_count).await?;
        self.inner.count(collection, filter).await
    }

    async fn find(&self, collection: &str, options: &FindOptions) -> StoreResult<Vec<Value>> {
        self.enter(self.fail_fetch).await?;
        self.inner.find(collection, options).await
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> StoreResult<Vec<Value>> {
        let counting = is_count_pipeline(pipeline);
        let failing = if counting {
            self.fail_count
        } else {
            self.fail_fetch
        };
        self.enter(failing).await?;
        match &self.count_rows {
            Some(rows) if counting => Ok(rows.clone()),
            _ => self.inner.aggregate(collection, pipeline).await,
        }
    }
}
