use async_trait::async_trait;
use serde_json::Value;
use surrealdb::{
    engine::any::{self, Any},
    opt::auth::Root,
    Surreal,
};

use crate::{
    config::SurrealConfig,
    error::{StoreError, StoreResult},
    helpers::surql_helpers::{
        compile_count, compile_find, compile_pipeline, CompiledQuery, COLLECTION_PARAM,
    },
    models::database_helpers::CountResult,
    store::{FindOptions, Store},
    Result,
};

/// [`Store`] backed by a SurrealDB connection; collections are tables.
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    pub async fn connect(config: &SurrealConfig) -> Result<Self> {
        tracing::info!("Connecting to database at: {}", config.url);

        let db = any::connect(&config.url).await?;
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root { username, password }).await?;
        }
        db.use_ns(&config.namespace).use_db(&config.database).await?;

        tracing::info!("Database connected successfully!");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    async fn rows(&self, collection: &str, compiled: CompiledQuery) -> StoreResult<Vec<Value>> {
        let CompiledQuery { sql, mut bindings } = compiled;
        bindings.insert(COLLECTION_PARAM.to_string(), Value::from(collection));
        tracing::debug!(%sql, "surrealql");

        let mut response = self.db.query(sql).bind(Value::Object(bindings)).await?;
        let result: surrealdb::Value = response.take(0)?;

        match result.into_inner().into_json() {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(StoreError::MalformedResult(other.to_string())),
        }
    }
}

#[async_trait]
impl Store for SurrealStore {
    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<u64> {
        let CompiledQuery { sql, mut bindings } = compile_count(filter)?;
        bindings.insert(COLLECTION_PARAM.to_string(), Value::from(collection));

        let mut response = self.db.query(sql).bind(Value::Object(bindings)).await?;
        let count: Option<CountResult> = response.take(0)?;

        Ok(count.map(|c| c.total).unwrap_or(0))
    }

    async fn find(&self, collection: &str, options: &FindOptions) -> StoreResult<Vec<Value>> {
        let compiled = compile_find(options)?;
        self.rows(collection, compiled).await
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> StoreResult<Vec<Value>> {
        let compiled = compile_pipeline(pipeline)?;
        self.rows(collection, compiled).await
    }
}
