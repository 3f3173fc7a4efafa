//! Node kind registry with deferred definition.
//!
//! Kinds mirror how a host registers custom node types: a node can sit in
//! the tree before its kind is defined, and discovery must wait for the
//! definition instead of mis-classifying the node. Observers fire when a
//! kind becomes defined so pending registrations can flush.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub type KindObserver = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub struct KindRegistry {
    defined: RwLock<HashSet<String>>,
    observers: RwLock<Vec<(u64, KindObserver)>>,
    next_observer: AtomicU64,
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("defined", &*self.defined.read().unwrap())
            .finish()
    }
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defined(&self, kind: &str) -> bool {
        self.defined.read().unwrap().contains(kind)
    }

    /// Defines a kind. Returns false when it was already defined (the
    /// observers are not re-notified).
    pub fn define(&self, kind: impl Into<String>) -> bool {
        let kind = kind.into();
        if !self.defined.write().unwrap().insert(kind.clone()) {
            return false;
        }

        let observers: Vec<KindObserver> = self
            .observers
            .read()
            .unwrap()
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer(&kind);
        }
        true
    }

    pub fn observe(&self, observer: KindObserver) -> u64 {
        let token = self.next_observer.fetch_add(1, Ordering::Relaxed);
        self.observers.write().unwrap().push((token, observer));
        token
    }

    pub fn unobserve(&self, token: u64) {
        self.observers
            .write()
            .unwrap()
            .retain(|(id, _)| *id != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_notifies_once() {
        let kinds = KindRegistry::new();
        let seen = Arc::new(RwLock::new(Vec::new()));
        let sink = Arc::clone(&seen);
        kinds.observe(Arc::new(move |kind| {
            sink.write().unwrap().push(kind.to_string());
        }));

        assert!(kinds.define("play-toggle"));
        assert!(!kinds.define("play-toggle"));
        assert!(kinds.is_defined("play-toggle"));
        assert_eq!(*seen.read().unwrap(), vec!["play-toggle".to_string()]);
    }
}
