//! In-process store

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{KeyValueStore, StoreError, StorePath};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StorePath, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &StorePath) -> Option<Value> {
        self.entries.lock().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        debug!("memory store set {}", path);
        self.entries.lock().await.insert(path.clone(), value);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
