use std::env;

use crate::Result;

/// Connection settings for [`SurrealStore`](crate::store::surreal_store::SurrealStore).
#[derive(Clone, Debug)]
pub struct SurrealConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SurrealConfig {
    /// Reads `DB_URL`, `DB_NS`, `DB_NAME` and the optional `DB_USER` /
    /// `DB_PASSWORD`, loading a `.env` file first when there is one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            url: env::var("DB_URL")?,
            namespace: env::var("DB_NS")?,
            database: env::var("DB_NAME")?,
            username: env::var("DB_USER").ok(),
            password: env::var("DB_PASSWORD").ok(),
        })
    }

    pub fn in_memory(namespace: &str, database: &str) -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: namespace.to_string(),
            database: database.to_string(),
            username: None,
            password: None,
        }
    }
}
