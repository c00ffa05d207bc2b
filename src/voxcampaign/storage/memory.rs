//! In-memory [`ObjectStore`], used by the test suite and the load-test
//! harness; a real deployment plugs in an S3/GCS-backed implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{VoxError, VoxResult};

use super::ObjectStore;

#[derive(Default, Clone)]
pub struct InMemoryStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> VoxResult<()> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> VoxResult<Vec<u8>> {
        self.objects.read().await.get(key).cloned().ok_or_else(|| VoxError::ObjectNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> VoxResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> VoxResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }
}
