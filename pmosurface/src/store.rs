//! Authoritative state map.
//!
//! One store per controller. A key is present iff its value is known;
//! absence means "unknown", distinct from false/zero. The store only
//! diffs; notification and fan-out are orchestrated by the controller so
//! that every write, whatever its origin, flows through one propagation
//! mechanism.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use pmostate::{StateKey, StateValue, StateValueError};

#[derive(Clone, Debug)]
struct StoredEntry {
    value: StateValue,
    last_modified: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Deep-equal to the stored value: no fan-out, no notification.
    Unchanged,
    Changed,
}

#[derive(Default)]
pub struct StateStore {
    entries: RwLock<HashMap<StateKey, StoredEntry>>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("known_keys", &self.entries.read().unwrap().len())
            .finish()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authoritative write. Validates the value against the key's
    /// declared shape, then applies the no-op-on-unchanged rule.
    pub fn write(
        &self,
        key: StateKey,
        value: StateValue,
    ) -> Result<WriteOutcome, StateValueError> {
        if value.shape() != key.shape() {
            return Err(StateValueError::ShapeMismatch(key.shape(), value.shape()));
        }

        let mut entries = self.entries.write().unwrap();
        if let Some(existing) = entries.get(&key) {
            if existing.value == value {
                return Ok(WriteOutcome::Unchanged);
            }
        }
        entries.insert(
            key,
            StoredEntry {
                value,
                last_modified: Utc::now(),
            },
        );
        Ok(WriteOutcome::Changed)
    }

    /// Makes a key unknown again. Unchanged when it already was.
    pub fn clear(&self, key: StateKey) -> WriteOutcome {
        match self.entries.write().unwrap().remove(&key) {
            Some(_) => WriteOutcome::Changed,
            None => WriteOutcome::Unchanged,
        }
    }

    /// Current value, or `None` for unknown.
    pub fn get(&self, key: StateKey) -> Option<StateValue> {
        self.entries.read().unwrap().get(&key).map(|e| e.value.clone())
    }

    pub fn last_modified(&self, key: StateKey) -> Option<DateTime<Utc>> {
        self.entries.read().unwrap().get(&key).map(|e| e.last_modified)
    }

    /// Every known (key, value), in key-declaration order, for the full
    /// snapshot a late-joining receiver gets at registration.
    pub fn snapshot(&self) -> Vec<(StateKey, StateValue)> {
        let entries = self.entries.read().unwrap();
        StateKey::ALL
            .iter()
            .filter_map(|key| entries.get(key).map(|e| (*key, e.value.clone())))
            .collect()
    }

    pub fn known_len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}
