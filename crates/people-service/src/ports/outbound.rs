//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the people service requires the host to provide.

use crate::domain::errors::StoreError;
use async_trait::async_trait;

/// String key/value store holding JSON blobs.
///
/// Production: any shared cache speaking get/set.
/// Testing and single-process runs: `InMemoryStore`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}
