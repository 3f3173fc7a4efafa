//! Change-notification bus.
//!
//! Every real state change is broadcast here so third parties can observe
//! the controller without being receivers. Dead subscribers are pruned on
//! broadcast.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};

use pmostate::{StateKey, StateValue};

/// One change notification, named per the key's declared notification
/// name (`paused` -> `pausedchange`).
#[derive(Clone, Debug)]
pub struct StateChange {
    /// Identifier of the emitting controller.
    pub controller: String,
    pub key: StateKey,
    /// The key's notification name.
    pub notification: &'static str,
    /// New value; `None` when the key became unknown.
    pub value: Option<StateValue>,
}

#[derive(Clone, Default)]
pub struct StateChangeBus {
    subscribers: Arc<Mutex<Vec<Sender<StateChange>>>>,
}

impl StateChangeBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<StateChange> {
        let (tx, rx) = unbounded::<StateChange>();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn broadcast(&self, change: StateChange) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}
