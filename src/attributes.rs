//! The immutable key/value store backing a [`crate::session::Session`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::Value;

/// Copy-on-write attribute map.
///
/// Cloning is a reference-count bump. Every write returns a new store and
/// leaves the receiver untouched; entries not named by the write are shared
/// in value with the receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributeStore(Arc<BTreeMap<String, Value>>);

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Returns a store with `key` bound to `value`.
    pub fn with(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.0).insert(key.into(), value);
        next
    }

    /// Returns a store with every entry of `entries` bound, later entries
    /// winning over earlier ones.
    pub fn with_all<K: Into<String>>(&self, entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return self.clone();
        }
        let mut next = self.clone();
        let map = Arc::make_mut(&mut next.0);
        for (key, value) in entries {
            map.insert(key.into(), value);
        }
        next
    }

    /// Returns a store without `key`. Removing an absent key is a no-op.
    pub fn without(&self, key: &str) -> Self {
        if !self.contains(key) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.0).remove(key);
        next
    }

    pub fn without_all<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) -> Self {
        let present: Vec<K> = keys
            .into_iter()
            .filter(|k| self.contains(k.as_ref()))
            .collect();
        if present.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        let map = Arc::make_mut(&mut next.0);
        for key in present {
            map.remove(key.as_ref());
        }
        next
    }

    /// Returns a store keeping only the entries whose key satisfies `keep`.
    pub fn retain(&self, keep: impl Fn(&str) -> bool) -> Self {
        if self.keys().all(|k| keep(k)) {
            return self.clone();
        }
        let kept: BTreeMap<String, Value> = self
            .iter()
            .filter(|(k, _)| keep(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        AttributeStore(Arc::new(kept))
    }

    /// Whether both stores share the same underlying map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for AttributeStore {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        AttributeStore(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }
}
