// SPDX-License-Identifier: MIT

//! API schema catalog
//!
//! Maps a schema key to a declarative endpoint shape. API blocks consume one
//! entry to pre-populate their ports; the engine never reads the catalog.

mod schema;

pub use schema::{ApiSchema, SchemaField, SchemaInput};

use crate::bdk::error::{FlowError, Result};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct SchemaCatalog {
    schemas: Arc<RwLock<IndexMap<String, ApiSchema>>>,
}

impl SchemaCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self {
            schemas: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Catalog holding the built-in entries
    pub fn builtin() -> Self {
        Self {
            schemas: Arc::new(RwLock::new(schema::BUILTIN_SCHEMAS.clone())),
        }
    }

    pub async fn register(&self, key: impl Into<String>, schema: ApiSchema) {
        let mut schemas = self.schemas.write().await;
        schemas.insert(key.into(), schema);
    }

    pub async fn get(&self, key: &str) -> Option<ApiSchema> {
        let schemas = self.schemas.read().await;
        schemas.get(key).cloned()
    }

    /// All entries in registration order
    pub async fn list(&self) -> IndexMap<String, ApiSchema> {
        self.schemas.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.schemas.read().await.len()
    }

    /// Merge entries from a JSON or YAML file (`key -> schema` map).
    ///
    /// Returns the number of entries loaded.
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let entries: IndexMap<String, ApiSchema> = match path.extension().and_then(|e| e.to_str())
        {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(FlowError::config(format!(
                    "Unsupported schema file extension: {:?}",
                    other
                )))
            }
        };

        let count = entries.len();
        let mut schemas = self.schemas.write().await;
        schemas.extend(entries);
        log::info!("Loaded {} API schema(s) from {}", count, path.display());
        Ok(count)
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
