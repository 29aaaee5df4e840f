//! In-memory key/value store.

use crate::domain::errors::StoreError;
use crate::ports::outbound::KeyValueStore;
use async_trait::async_trait;
use dashmap::DashMap;

/// Process-local store, shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: DashMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.get(key).map(|value| value.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.contains_key(key))
    }
}
