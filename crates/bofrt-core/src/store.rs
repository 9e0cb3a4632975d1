//! Key/value store correlating module state across invocations.
//!
//! The store records associations only. Values are `Copy` handles (a raw
//! address for C modules, an arena [`Handle`](crate::arena::Handle) for Rust
//! ones); the store never owns or frees what they refer to.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::config::RuntimeConfig;

/// An address stored on behalf of a C module. Never dereferenced here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpaqueAddr(pub usize);

impl OpaqueAddr {
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        OpaqueAddr(ptr as usize)
    }

    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

pub struct ContextStore<V> {
    entries: Mutex<HashMap<String, V>>,
    max_entries: usize,
}

impl<V: Copy> ContextStore<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    /// Inserts or overwrites. Returns false, leaving the store unchanged, when
    /// a new key would exceed the entry cap or the table cannot grow.
    pub fn put(&self, key: &str, value: V) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            log::error!("context store lock poisoned; put({key:?}) refused");
            return false;
        };
        if let Some(slot) = entries.get_mut(key) {
            *slot = value;
            return true;
        }
        if entries.len() >= self.max_entries {
            log::warn!(
                "context store full ({} entries); put({key:?}) refused",
                self.max_entries
            );
            return false;
        }
        if entries.try_reserve(1).is_err() {
            log::error!("context store allocation failed; put({key:?}) refused");
            return false;
        }
        entries.insert(key.to_string(), value);
        true
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let Ok(entries) = self.entries.lock() else {
            log::error!("context store lock poisoned; get({key:?}) returns absent");
            return None;
        };
        entries.get(key).copied()
    }

    /// Removes the association. The referenced object is left alone.
    pub fn remove(&self, key: &str) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            log::error!("context store lock poisoned; remove({key:?}) refused");
            return false;
        };
        entries.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

/// The process-wide store shared by every module in the process.
pub fn global() -> &'static ContextStore<OpaqueAddr> {
    static GLOBAL: OnceLock<ContextStore<OpaqueAddr>> = OnceLock::new();
    GLOBAL.get_or_init(|| ContextStore::new(RuntimeConfig::global().store_max_entries as usize))
}
