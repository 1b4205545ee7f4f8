use crate::TokenStorage;
use async_trait::async_trait;
use portico_core::GatewayError;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local storage. Credentials are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl TokenStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), GatewayError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
