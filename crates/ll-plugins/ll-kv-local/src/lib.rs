//! # ll-kv-local
//! living-library/crates/ll-plugins/ll-kv-local/src/lib.rs
//! Local implementations of `KvStore`.
//! Features: hashed, directory-sharded slot files and an in-memory map for tests and ephemeral runs.

mod memory;

pub use memory::MemoryKvStore;

use async_trait::async_trait;
use ll_core::traits::KvStore;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

pub struct FileKvStore {
    /// Root directory for all slots (e.g., "./data/slots")
    root_path: PathBuf,
}

impl FileKvStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root_path: root }
    }

    /// Slot keys carry user ids and emails, so they are hashed before touching the filesystem.
    /// Layout: "ab/cd/abcd...hash.json"
    fn slot_path(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        let mut path = self.root_path.clone();
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(format!("{hash}.json"));
        path
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(self.slot_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a sibling temp file and renames it over the slot, so a crash
    /// mid-write never leaves a truncated blob behind.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let target_path = self.slot_path(key);
        let parent = target_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("slot path has no parent: {}", target_path.display()))?;
        fs::create_dir_all(parent).await?;

        let tmp_path = target_path.with_extension("json.tmp");
        fs::write(&tmp_path, value.as_bytes()).await?;
        fs::rename(&tmp_path, &target_path).await?;
        tracing::trace!(key, bytes = value.len(), "slot written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        match fs::remove_file(self.slot_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
