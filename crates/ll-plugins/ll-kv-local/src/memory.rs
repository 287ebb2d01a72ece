//! In-memory `KvStore`. Contents live as long as the store value.

use async_trait::async_trait;
use dashmap::DashMap;
use ll_core::traits::KvStore;

#[derive(Default)]
pub struct MemoryKvStore {
    slots: DashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.slots.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.slots.remove(key);
        Ok(())
    }
}
