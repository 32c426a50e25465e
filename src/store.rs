//! Snapshot persistence: the key-value store seam and the persisted record.
//!
//! The manager never talks to a concrete storage medium. It addresses an
//! abstract string store by key and persists exactly one JSON record per
//! configured snapshot id. Durability is the backend's concern.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A key-value string store with get/set/remove semantics.
///
/// Implementations are expected to be externally synchronized; the manager
/// issues all calls from a single logical thread. Last write wins.
pub trait SnapshotStore: Send + Sync {
    /// Read the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`, overwriting any prior value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the value stored under `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str);
}

/// The persisted snapshot record.
///
/// Wire format is fixed: `{"htmlSnapshot": string, "expired": number}` with
/// `expired` as absolute epoch milliseconds. A record is valid only while
/// `now < expired`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Serialized page markup, self-contained when images were inlined
    #[serde(rename = "htmlSnapshot")]
    pub html_snapshot: String,

    /// Absolute expiry, epoch milliseconds
    pub expired: u64,
}

impl SnapshotRecord {
    /// Build a record expiring `ttl_ms` after `now_ms`.
    pub fn new(html_snapshot: String, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            html_snapshot,
            expired: now_ms.saturating_add(ttl_ms),
        }
    }

    /// Whether the record is stale at `now_ms`. Equality counts as expired.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expired <= now_ms
    }

    /// Decode a stored value.
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(Error::from)
    }

    /// Encode for storage.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }
}

/// In-memory store backed by a mutex-guarded map.
///
/// Useful for tests and for hosts that bring their own persistence layer and
/// only flush on shutdown.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        assert!(store.get("k").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
        store.remove("k");
        assert!(store.get("k").is_none());
        // removing again is harmless
        store.remove("k");
    }

    #[test]
    fn record_wire_format_is_stable() {
        let rec = SnapshotRecord::new("<html></html>".into(), 1_000, 500);
        let raw = rec.encode().unwrap();
        assert_eq!(raw, r#"{"htmlSnapshot":"<html></html>","expired":1500}"#);

        let back = SnapshotRecord::decode(&raw).unwrap();
        assert_eq!(back.html_snapshot, "<html></html>");
        assert_eq!(back.expired, 1500);
    }

    #[test]
    fn expiry_boundary_is_exact() {
        let rec = SnapshotRecord {
            html_snapshot: String::new(),
            expired: 1_000,
        };
        assert!(rec.is_expired(1_001));
        assert!(rec.is_expired(1_000), "equality counts as expired");
        assert!(!rec.is_expired(999));
    }

    #[test]
    fn decode_rejects_malformed_values() {
        assert!(SnapshotRecord::decode("not json").is_err());
        assert!(SnapshotRecord::decode(r#"{"expired":1}"#).is_err());
    }
}
