//! # Secure Storage
//!
//! Key/value API whose keys and values are sealed by the [`StorageCodec`]
//! before they reach the backing [`KeyValueStore`].
//!
//! ## Operations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SECURE STORAGE                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SecureStorage                                                  │   │
//! │  │  ─────────────                                                  │   │
//! │  │                                                                 │   │
//! │  │  • set_item / get_item / remove_item                           │   │
//! │  │  • merge_item        - deep-merge JSON objects                 │   │
//! │  │  • get_all_keys      - decrypted keys                          │   │
//! │  │  • multi_get / multi_set / multi_merge / multi_remove          │   │
//! │  │  • clear             - wipe the backing store                  │   │
//! │  │                                                                 │   │
//! │  └───────────────────────────┬─────────────────────────────────────┘   │
//! │                              │ sealed key → sealed value               │
//! │                              ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyValueStore trait                                            │   │
//! │  │                                                                 │   │
//! │  │  MemoryStore (in-process)   |   host persistence (bindings)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! The backing store only ever sees ciphertext. Keys are sealed in
//! device-bound mode so the same plaintext key always maps to the same
//! stored key; values use hard mode when the storage was opened with it.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use super::codec::StorageCodec;
use crate::error::{Error, Result};

// ============================================================================
// PERSISTENCE TRAIT
// ============================================================================

/// Persistence collaborator holding already-sealed strings
pub trait KeyValueStore: Send + Sync {
    /// Stored value for `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove; true if something was removed
    fn remove(&self, key: &str) -> Result<bool>;

    /// All stored keys
    fn keys(&self) -> Result<Vec<String>>;

    /// Remove everything
    fn clear(&self) -> Result<()>;
}

/// In-memory [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

// ============================================================================
// SECURE STORAGE
// ============================================================================

/// Encrypted key/value storage
///
/// Writes are serialized so a merge's read-modify-write never interleaves
/// with another write through the same instance.
pub struct SecureStorage<S: KeyValueStore = MemoryStore> {
    store: S,
    codec: StorageCodec,
    hard_mode: bool,
    writes: Mutex<()>,
}

impl<S: KeyValueStore> SecureStorage<S> {
    /// Wrap `store`, sealing with `codec`
    pub fn new(store: S, codec: StorageCodec) -> Self {
        Self {
            store,
            codec,
            hard_mode: false,
            writes: Mutex::new(()),
        }
    }

    /// Seal values with a random nonce per write
    pub fn with_hard_mode(mut self, hard_mode: bool) -> Self {
        self.hard_mode = hard_mode;
        self
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store `value` under `key`
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.writes.lock();
        self.write_item(key, value)
    }

    fn write_item(&self, key: &str, value: &str) -> Result<()> {
        let (sealed_key, sealed_value) = self.codec.encode_entry(key, value, self.hard_mode)?;
        self.store.set(&sealed_key, &sealed_value)
    }

    /// Value stored under `key`
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let sealed_key = self.codec.encode_key(key)?;
        match self.store.get(&sealed_key)? {
            Some(sealed_value) => Ok(Some(
                self.codec.decrypt_value(&sealed_value, self.hard_mode)?,
            )),
            None => Ok(None),
        }
    }

    /// Deep-merge the JSON object `value` into the JSON object under `key`
    ///
    /// Behaves like [`set_item`](Self::set_item) when nothing is stored yet.
    pub fn merge_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.writes.lock();
        let merged = match self.get_item(key)? {
            Some(existing) => merge_json(&existing, value)?,
            None => {
                parse_object(value)?;
                value.to_string()
            }
        };
        self.write_item(key, &merged)
    }

    /// Remove `key`
    pub fn remove_item(&self, key: &str) -> Result<()> {
        let sealed_key = self.codec.encode_key(key)?;
        let _guard = self.writes.lock();
        let removed = self.store.remove(&sealed_key)?;
        debug!(removed, "remove_item");
        Ok(())
    }

    /// All plaintext keys
    pub fn get_all_keys(&self) -> Result<Vec<String>> {
        self.store
            .keys()?
            .iter()
            .map(|sealed| self.codec.decode_key(sealed))
            .collect()
    }

    /// Values for several keys, in request order
    pub fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        keys.iter()
            .map(|key| Ok((key.to_string(), self.get_item(key)?)))
            .collect()
    }

    /// Store several pairs
    pub fn multi_set(&self, pairs: &[(&str, &str)]) -> Result<()> {
        pairs
            .iter()
            .try_for_each(|(key, value)| self.set_item(key, value))
    }

    /// Merge several pairs
    pub fn multi_merge(&self, pairs: &[(&str, &str)]) -> Result<()> {
        pairs
            .iter()
            .try_for_each(|(key, value)| self.merge_item(key, value))
    }

    /// Remove several keys
    pub fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        keys.iter().try_for_each(|key| self.remove_item(key))
    }

    /// Remove everything from the backing store
    pub fn clear(&self) -> Result<()> {
        let _guard = self.writes.lock();
        self.store.clear()
    }
}

impl SecureStorage<MemoryStore> {
    /// In-memory storage sealed with `codec`
    pub fn in_memory(codec: StorageCodec) -> Self {
        Self::new(MemoryStore::new(), codec)
    }
}

// ============================================================================
// JSON MERGE
// ============================================================================

fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| Error::MalformedInput(format!("merge value is not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(Error::MalformedInput("merge value is not a JSON object".into()));
    }
    Ok(value)
}

/// Deep-merge `patch` into `base`; both must be JSON objects
pub fn merge_json(base: &str, patch: &str) -> Result<String> {
    let mut base = parse_object(base)?;
    let patch = parse_object(patch)?;
    merge_values(&mut base, patch);
    Ok(serde_json::to_string(&base)?)
}

fn merge_values(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_values(existing, value)
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SecureStorage {
        SecureStorage::in_memory(StorageCodec::new("test-secret").unwrap())
    }

    #[test]
    fn test_set_and_get() {
        let storage = storage();
        storage.set_item("token", "abc123").unwrap();
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("abc123"));
        assert_eq!(storage.get_item("missing").unwrap(), None);
    }

    #[test]
    fn test_backing_store_sees_only_ciphertext() {
        let storage = storage();
        storage.set_item("token", "abc123").unwrap();

        let keys = storage.store().keys().unwrap();
        assert_eq!(keys.len(), 1);
        assert_ne!(keys[0], "token");
        let stored = storage.store().get(&keys[0]).unwrap().unwrap();
        assert!(!stored.contains("abc123"));
    }

    #[test]
    fn test_overwrite() {
        let storage = storage();
        storage.set_item("k", "v1").unwrap();
        storage.set_item("k", "v2").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(storage.store().len(), 1);
    }

    #[test]
    fn test_hard_mode_roundtrip() {
        let storage = storage().with_hard_mode(true);
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_remove_and_clear() {
        let storage = storage();
        storage.multi_set(&[("a", "1"), ("b", "2"), ("c", "3")]).unwrap();

        storage.remove_item("a").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);

        storage.multi_remove(&["b"]).unwrap();
        assert_eq!(storage.get_all_keys().unwrap(), vec!["c".to_string()]);

        storage.clear().unwrap();
        assert!(storage.store().is_empty());
    }

    #[test]
    fn test_get_all_keys() {
        let storage = storage();
        storage.multi_set(&[("x", "1"), ("y", "2")]).unwrap();
        let mut keys = storage.get_all_keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_multi_get_preserves_order() {
        let storage = storage();
        storage.multi_set(&[("a", "1"), ("b", "2")]).unwrap();
        let values = storage.multi_get(&["b", "missing", "a"]).unwrap();
        assert_eq!(
            values,
            vec![
                ("b".to_string(), Some("2".to_string())),
                ("missing".to_string(), None),
                ("a".to_string(), Some("1".to_string())),
            ]
        );
    }

    #[test]
    fn test_merge_item() {
        let storage = storage();
        storage
            .set_item("prefs", r#"{"theme":"dark","limits":{"daily":100,"weekly":500}}"#)
            .unwrap();
        storage
            .merge_item("prefs", r#"{"limits":{"daily":200},"lang":"en"}"#)
            .unwrap();

        let merged: Value =
            serde_json::from_str(&storage.get_item("prefs").unwrap().unwrap()).unwrap();
        assert_eq!(merged["theme"], "dark");
        assert_eq!(merged["lang"], "en");
        assert_eq!(merged["limits"]["daily"], 200);
        assert_eq!(merged["limits"]["weekly"], 500);
    }

    #[test]
    fn test_merge_into_missing_sets() {
        let storage = storage();
        storage.multi_merge(&[("new", r#"{"a":1}"#)]).unwrap();
        assert_eq!(storage.get_item("new").unwrap().as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_merge_rejects_non_objects() {
        let storage = storage();
        storage.set_item("n", "42").unwrap();
        assert!(matches!(
            storage.merge_item("n", r#"{"a":1}"#),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            storage.merge_item("other", "not json"),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_concurrent_merges_keep_every_field() {
        use std::sync::Arc;
        use std::thread;

        for _ in 0..20 {
            let storage = Arc::new(storage());
            storage.set_item("prefs", "{}").unwrap();

            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let storage = storage.clone();
                    thread::spawn(move || {
                        storage
                            .merge_item("prefs", &format!(r#"{{"f{}":{}}}"#, i, i))
                            .unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let merged: Value =
                serde_json::from_str(&storage.get_item("prefs").unwrap().unwrap()).unwrap();
            let fields = merged.as_object().unwrap();
            assert_eq!(fields.len(), 8);
            for i in 0..8 {
                assert_eq!(fields[&format!("f{}", i)], i);
            }
        }
    }

    #[test]
    fn test_different_secret_cannot_read() {
        let store = MemoryStore::new();
        let writer = SecureStorage::new(store, StorageCodec::new("secret-a").unwrap());
        writer.set_item("k", "v").unwrap();

        let sealed_keys = writer.store().keys().unwrap();
        let reader_codec = StorageCodec::new("secret-b").unwrap();
        assert!(reader_codec.decode_key(&sealed_keys[0]).is_err());
    }
}
