//! Slot names and JSON (de)serialization over a `KvStore`.
//!
//! Persistence failures are logged and swallowed here; callers keep their
//! in-memory state either way.

use ll_core::traits::KvStore;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) const COMMUNITY_SLOT: &str = "community_data";

pub(crate) fn stories_slot(uid: &str) -> String {
    format!("stories_{uid}")
}

pub(crate) fn profile_slot(uid: &str) -> String {
    format!("profile_{uid}")
}

pub(crate) fn bookmarks_slot(uid: &str) -> String {
    format!("bookmarks_{uid}")
}

pub(crate) fn jobs_slot(uid: &str) -> String {
    format!("jobs_{uid}")
}

/// Reads and decodes a slot. Missing, unreadable, and unparseable slots all
/// yield `None`.
pub(crate) async fn load<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> Option<T> {
    let raw = match kv.get(key).await {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::error!(key, error = %e, "failed to read slot");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(key, error = %e, "failed to parse slot");
            None
        }
    }
}

pub(crate) async fn save<T: Serialize + ?Sized>(kv: &dyn KvStore, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(key, error = %e, "could not serialize slot");
            return;
        }
    };
    if let Err(e) = kv.set(key, &raw).await {
        tracing::error!(key, error = %e, "could not save slot");
    }
}
