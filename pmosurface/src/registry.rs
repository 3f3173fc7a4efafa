//! Receiver registry.
//!
//! Tracks the live set of nodes that receive state fan-out. Entries keep
//! registration order; registrations pair by node identity so a tree
//! *move* never churns an existing receiver. Nodes of not-yet-defined
//! custom kinds are parked and reconsidered when the kind is defined.
//!
//! Past registration, the registry makes no distinction between
//! descendant receivers and by-reference receivers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, warn};

use pmonode::{KindRegistry, NodeId, SurfaceNode};
use pmostate::{StateKey, StateValue, codec};

use crate::store::StateStore;

/// Attribute naming this node's controller by identifier (by-reference
/// association, may cross encapsulation boundaries).
pub const ATTR_CONTROLLER_REF: &str = "controller";
/// Attribute listing the state keys a node mirrors, by attribute name
/// (e.g. `state-keys="paused current-time"`).
pub const ATTR_STATE_KEYS: &str = "state-keys";
/// Marker attribute: the node is a media source candidate, never a
/// receiver.
pub const ATTR_MEDIA_MARKER: &str = "media";

/// How a receiver was addressed. Kept for diagnostics only; fan-out
/// never special-cases the origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverOrigin {
    Descendant,
    Reference,
}

#[derive(Clone)]
struct ReceiverEntry {
    node: Weak<SurfaceNode>,
    identity: NodeId,
    /// Keys this receiver supports (slots plus listed attributes).
    keys: HashSet<StateKey>,
    /// Capability cache: keys with a property slot, probed once at
    /// registration and never re-checked per fan-out.
    property_keys: HashSet<StateKey>,
    origin: ReceiverOrigin,
}

/// Outcome of considering a node for registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Considered {
    Registered,
    /// Kind not defined yet; parked until it is.
    Parked,
    Ignored,
}

#[derive(Default)]
pub struct ReceiverRegistry {
    entries: RwLock<Vec<ReceiverEntry>>,
    pending_kinds: RwLock<HashMap<String, Vec<Weak<SurfaceNode>>>>,
}

impl std::fmt::Debug for ReceiverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverRegistry")
            .field("entries", &self.entries.read().unwrap().len())
            .field("pending_kinds", &self.pending_kinds.read().unwrap().len())
            .finish()
    }
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Considers a node for registration. Registration immediately sends
    /// the full current snapshot of every key the receiver supports, so a
    /// late joiner never waits for the next change. Re-considering an
    /// already-registered node is a no-op (no duplicate, no re-send).
    pub fn consider(
        &self,
        node: &Arc<SurfaceNode>,
        origin: ReceiverOrigin,
        kinds: &KindRegistry,
        store: &StateStore,
    ) -> Considered {
        if self.is_registered(node.identity()) {
            return Considered::Registered;
        }

        let (keys, property_keys) = match receiver_keys(node, kinds) {
            Eligibility::Receiver {
                keys,
                property_keys,
            } => (keys, property_keys),
            Eligibility::Deferred => {
                self.pending_kinds
                    .write()
                    .unwrap()
                    .entry(node.kind().to_string())
                    .or_default()
                    .push(Arc::downgrade(node));
                debug!(kind = node.kind(), "receiver parked until kind is defined");
                return Considered::Parked;
            }
            Eligibility::Ineligible => return Considered::Ignored,
        };

        let entry = ReceiverEntry {
            node: Arc::downgrade(node),
            identity: node.identity(),
            keys,
            property_keys,
            origin,
        };
        self.entries.write().unwrap().push(entry.clone());
        debug!(
            kind = node.kind(),
            origin = ?origin,
            keys = entry.keys.len(),
            "receiver registered"
        );

        self.snapshot_to(&entry, store);
        Considered::Registered
    }

    /// Removes a receiver. Unregistering a node that was never
    /// registered (or twice) is a tolerated no-op.
    pub fn unregister(&self, node: &Arc<SurfaceNode>) -> bool {
        let identity = node.identity();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|e| e.identity != identity);
        entries.len() != before
    }

    pub fn is_registered(&self, identity: NodeId) -> bool {
        self.entries
            .read()
            .unwrap()
            .iter()
            .any(|e| e.identity == identity)
    }

    /// How a registered receiver was addressed, for move reconciliation.
    pub fn origin_of(&self, identity: NodeId) -> Option<ReceiverOrigin> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .find(|e| e.identity == identity)
            .map(|e| e.origin)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Nodes parked for this kind, in parking order.
    pub fn take_pending(&self, kind: &str) -> Vec<Arc<SurfaceNode>> {
        let parked = self.pending_kinds.write().unwrap().remove(kind);
        parked
            .unwrap_or_default()
            .into_iter()
            .filter_map(|weak| weak.upgrade())
            .collect()
    }

    /// Recomputes a registered receiver's supported keys after its
    /// declaration changed, sending the snapshot of newly supported keys.
    pub fn refresh_keys(&self, node: &Arc<SurfaceNode>, kinds: &KindRegistry, store: &StateStore) {
        let Eligibility::Receiver {
            keys,
            property_keys,
        } = receiver_keys(node, kinds)
        else {
            self.unregister(node);
            return;
        };

        let refreshed = {
            let mut entries = self.entries.write().unwrap();
            let Some(entry) = entries.iter_mut().find(|e| e.identity == node.identity()) else {
                return;
            };
            let added: HashSet<StateKey> = keys.difference(&entry.keys).copied().collect();
            entry.keys = keys;
            entry.property_keys = property_keys;
            let mut refreshed = entry.clone();
            refreshed.keys = added;
            refreshed
        };
        self.snapshot_to(&refreshed, store);
    }

    /// Fans one key out to every current receiver, in registration order.
    /// `None` means the key became unknown. A failing receiver is skipped
    /// with a diagnostic; the batch always completes.
    pub fn deliver_all(&self, key: StateKey, value: Option<&StateValue>) {
        let entries: Vec<ReceiverEntry> = self.entries.read().unwrap().clone();
        for entry in &entries {
            // A receiver unregistered mid-batch (e.g. by an earlier
            // receiver's callback) is skipped, not delivered to.
            if entry.keys.contains(&key) && self.is_registered(entry.identity) {
                deliver_one(entry, key, value);
            }
        }
    }

    fn snapshot_to(&self, entry: &ReceiverEntry, store: &StateStore) {
        for (key, value) in store.snapshot() {
            if entry.keys.contains(&key) {
                deliver_one(entry, key, Some(&value));
            }
        }
    }
}

enum Eligibility {
    Receiver {
        keys: HashSet<StateKey>,
        property_keys: HashSet<StateKey>,
    },
    Deferred,
    Ineligible,
}

/// A node is a receiver when it declares supported keys, either through
/// property slots (named by key) or through the `state-keys` listing
/// attribute (named by mirror attribute). Custom kinds (name containing
/// `-`) may gain their slots only once defined, so undefined ones defer.
fn receiver_keys(node: &Arc<SurfaceNode>, kinds: &KindRegistry) -> Eligibility {
    if node.has_attribute(ATTR_MEDIA_MARKER) {
        return Eligibility::Ineligible;
    }
    if node.kind().contains('-') && !kinds.is_defined(node.kind()) {
        return Eligibility::Deferred;
    }

    let mut keys = HashSet::new();
    let mut property_keys = HashSet::new();

    for name in node.slot_names() {
        match StateKey::from_name(&name) {
            Some(key) => {
                keys.insert(key);
                property_keys.insert(key);
            }
            None => debug!(slot = %name, kind = node.kind(), "slot matches no state key"),
        }
    }

    if let Some(listing) = node.attribute(ATTR_STATE_KEYS) {
        for word in listing.split_whitespace() {
            match StateKey::from_attribute(word) {
                Some(key) => {
                    keys.insert(key);
                }
                None => warn!(
                    attribute = %word,
                    kind = node.kind(),
                    "listed attribute matches no state key"
                ),
            }
        }
    }

    if keys.is_empty() {
        Eligibility::Ineligible
    } else {
        Eligibility::Receiver {
            keys,
            property_keys,
        }
    }
}

/// Writes one key to one receiver: property slot when cached as present,
/// attribute mirroring otherwise (attribute removed for false/unknown).
/// Property precedence is a hard rule: when the slot is used, the
/// attribute is left untouched.
fn deliver_one(entry: &ReceiverEntry, key: StateKey, value: Option<&StateValue>) {
    let Some(node) = entry.node.upgrade() else {
        debug!(key = %key, "receiver dropped between diff and fan-out, skipped");
        return;
    };

    if entry.property_keys.contains(&key) {
        if !node.assign_slot(key.name(), value.cloned()) {
            // The slot vanished after registration; fall back rather than
            // lose the update, and keep going for the other receivers.
            warn!(key = %key, kind = node.kind(), "cached property slot is gone");
            mirror_attribute(&node, key, value);
        }
        return;
    }

    mirror_attribute(&node, key, value);
}

fn mirror_attribute(node: &Arc<SurfaceNode>, key: StateKey, value: Option<&StateValue>) {
    match value.and_then(codec::encode) {
        Some(text) => {
            node.set_attribute(key.attribute(), &text);
        }
        None => {
            node.remove_attribute(key.attribute());
        }
    }
}
