//! In-memory key store for tests and ephemeral installs.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::key_store::KeyStore;

/// Key store backed by a `HashMap`. Nothing survives the process.
#[derive(Default)]
pub struct MemoryKeyStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn load(&self, id: &str) -> anyhow::Result<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(id).cloned())
    }

    async fn store(&self, id: &str, value: &str) -> anyhow::Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(id.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(id);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_load_delete() {
        let store = MemoryKeyStore::new();
        assert!(store.load("slot").await.unwrap().is_none());

        store.store("slot", "abc").await.unwrap();
        assert_eq!(store.load("slot").await.unwrap().as_deref(), Some("abc"));

        store.store("slot", "def").await.unwrap();
        assert_eq!(store.load("slot").await.unwrap().as_deref(), Some("def"));

        store.delete("slot").await.unwrap();
        store.delete("slot").await.unwrap();
        assert!(store.load("slot").await.unwrap().is_none());
    }
}
