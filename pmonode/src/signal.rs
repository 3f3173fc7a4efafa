//! Bubbling request signals.
//!
//! Une intention nommée ("play", "seek", ...) remonte du nœud émetteur
//! vers ses ancêtres jusqu'à ce qu'un handler la consomme. Un signal
//! consommé ne continue jamais plus haut.

use std::sync::Arc;

use pmostate::StateValue;

use crate::node::SurfaceNode;

/// A named intent flowing from a receiver to whoever consumes it.
#[derive(Clone, Debug)]
pub struct RequestSignal {
    pub name: String,
    pub payload: Option<StateValue>,
}

impl RequestSignal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: StateValue) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal stops here.
    Consumed,
    /// Keep bubbling.
    Pass,
}

pub type SignalHandler =
    Arc<dyn Fn(&RequestSignal, &Arc<SurfaceNode>) -> SignalOutcome + Send + Sync>;

/// Dispatches a signal from `origin`, bubbling ancestor-by-ancestor and
/// crossing scope boundaries through their anchor nodes. Returns true
/// when some handler consumed the signal.
pub fn dispatch(origin: &Arc<SurfaceNode>, signal: &RequestSignal) -> bool {
    let mut cursor = Some(Arc::clone(origin));
    while let Some(node) = cursor {
        for handler in node.request_handlers() {
            if handler(signal, origin) == SignalOutcome::Consumed {
                return true;
            }
        }
        cursor = match node.parent() {
            Some(parent) => Some(parent),
            // Top of a nested scope: continue at the hosting node.
            None => node.owner().and_then(|scope| scope.anchor()),
        };
    }
    false
}
