//! Surface tree nodes.
//!
//! A [`SurfaceNode`] is deliberately dumb: a kind name, a string attribute
//! map, children, and two engine-facing extension points: typed property
//! slots (per-name callbacks accepting a raw [`StateValue`]) and an opaque
//! attachment used to hand adapters to whoever observes the tree.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use pmostate::StateValue;

use crate::signal::SignalHandler;
use crate::tree::ScopeRoot;

/// Node identity, stable for the node's lifetime.
///
/// This is not the textual `id` attribute: identity is what mutation
/// observers pair removals and additions with when a node moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> NodeId {
    NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
}

/// A typed property slot: receives raw values instead of attribute text.
/// `None` means the value became unknown.
pub type PropertySlot = Arc<dyn Fn(Option<StateValue>) + Send + Sync>;

pub struct SurfaceNode {
    identity: NodeId,
    kind: String,
    attributes: RwLock<BTreeMap<String, String>>,
    parent: RwLock<Weak<SurfaceNode>>,
    children: RwLock<Vec<Arc<SurfaceNode>>>,
    slots: RwLock<HashMap<String, PropertySlot>>,
    attachment: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
    handlers: RwLock<Vec<(u64, SignalHandler)>>,
    next_handler: AtomicU64,
    owner: RwLock<Weak<ScopeRoot>>,
    hosted_scope: RwLock<Option<Arc<ScopeRoot>>>,
}

impl std::fmt::Debug for SurfaceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceNode")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .field("attributes", &*self.attributes.read().unwrap())
            .field("children", &self.children.read().unwrap().len())
            .field("slots", &self.slots.read().unwrap().len())
            .finish()
    }
}

impl SurfaceNode {
    /// Creates a detached node of the given kind.
    pub fn new(kind: impl Into<String>) -> Arc<SurfaceNode> {
        Arc::new(SurfaceNode {
            identity: next_node_id(),
            kind: kind.into(),
            attributes: RwLock::new(BTreeMap::new()),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
            slots: RwLock::new(HashMap::new()),
            attachment: RwLock::new(None),
            handlers: RwLock::new(Vec::new()),
            next_handler: AtomicU64::new(1),
            owner: RwLock::new(Weak::new()),
            hosted_scope: RwLock::new(None),
        })
    }

    /// Creates a detached node carrying an `id` attribute.
    pub fn with_id(kind: impl Into<String>, id: impl Into<String>) -> Arc<SurfaceNode> {
        let node = Self::new(kind);
        node.attributes
            .write()
            .unwrap()
            .insert("id".to_string(), id.into());
        node
    }

    pub fn identity(&self) -> NodeId {
        self.identity
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The textual `id` attribute, if any.
    pub fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().unwrap().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.read().unwrap().contains_key(name)
    }

    /// Writes an attribute. Returns false (and emits nothing) when the
    /// attribute already holds exactly this text.
    pub fn set_attribute(self: &Arc<Self>, name: &str, value: &str) -> bool {
        let old = {
            let mut attributes = self.attributes.write().unwrap();
            match attributes.get(name) {
                Some(existing) if existing == value => return false,
                _ => attributes.insert(name.to_string(), value.to_string()),
            }
        };
        if let Some(scope) = self.owner() {
            scope.attribute_mutated(self, name, old);
        }
        true
    }

    /// Removes an attribute. Returns false when it was absent.
    pub fn remove_attribute(self: &Arc<Self>, name: &str) -> bool {
        let old = self.attributes.write().unwrap().remove(name);
        match old {
            None => false,
            Some(old) => {
                if let Some(scope) = self.owner() {
                    scope.attribute_mutated(self, name, Some(old));
                }
                true
            }
        }
    }

    /// Installs a typed property slot for a state-key name.
    pub fn install_slot(&self, name: impl Into<String>, slot: PropertySlot) {
        self.slots.write().unwrap().insert(name.into(), slot);
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.read().unwrap().contains_key(name)
    }

    /// Names of every installed slot.
    pub fn slot_names(&self) -> Vec<String> {
        self.slots.read().unwrap().keys().cloned().collect()
    }

    /// Assigns a raw value through the named slot. Returns false when the
    /// node has no such slot.
    pub fn assign_slot(&self, name: &str, value: Option<StateValue>) -> bool {
        let slot = self.slots.read().unwrap().get(name).cloned();
        match slot {
            Some(slot) => {
                slot(value);
                true
            }
            None => false,
        }
    }

    /// Attaches an opaque payload (e.g. a media adapter handle).
    pub fn attach(&self, payload: Arc<dyn Any + Send + Sync>) {
        *self.attachment.write().unwrap() = Some(payload);
    }

    /// The attachment downcast to a concrete type.
    pub fn attachment<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let attachment = self.attachment.read().unwrap().clone()?;
        attachment.downcast::<T>().ok()
    }

    pub fn parent(&self) -> Option<Arc<SurfaceNode>> {
        self.parent.read().unwrap().upgrade()
    }

    pub fn children(&self) -> Vec<Arc<SurfaceNode>> {
        self.children.read().unwrap().clone()
    }

    /// The scope this node currently belongs to.
    pub fn owner(&self) -> Option<Arc<ScopeRoot>> {
        self.owner.read().unwrap().upgrade()
    }

    /// True if `self` is `other` or one of its ancestors. The ancestor
    /// chain crosses encapsulation boundaries through the hosting node,
    /// like signal bubbling does.
    pub fn contains(self: &Arc<Self>, other: &Arc<SurfaceNode>) -> bool {
        let mut cursor = Some(Arc::clone(other));
        while let Some(node) = cursor {
            if Arc::ptr_eq(&node, self) {
                return true;
            }
            cursor = match node.parent() {
                Some(parent) => Some(parent),
                None => node.owner().and_then(|scope| scope.anchor()),
            };
        }
        false
    }

    /// Marks this node as hosting a nested scope (encapsulation boundary).
    pub fn host_scope(self: &Arc<Self>, scope: Arc<ScopeRoot>) {
        scope.set_anchor(self);
        *self.hosted_scope.write().unwrap() = Some(scope);
    }

    pub fn hosted_scope(&self) -> Option<Arc<ScopeRoot>> {
        self.hosted_scope.read().unwrap().clone()
    }

    /// Registers a request-signal handler; returns its removal token.
    pub fn on_request(&self, handler: SignalHandler) -> u64 {
        let token = self.next_handler.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().unwrap().push((token, handler));
        token
    }

    pub fn remove_request_handler(&self, token: u64) {
        self.handlers
            .write()
            .unwrap()
            .retain(|(id, _)| *id != token);
    }

    pub(crate) fn request_handlers(&self) -> Vec<SignalHandler> {
        self.handlers
            .read()
            .unwrap()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    pub(crate) fn set_parent(&self, parent: Option<&Arc<SurfaceNode>>) {
        *self.parent.write().unwrap() = match parent {
            Some(parent) => Arc::downgrade(parent),
            None => Weak::new(),
        };
    }

    pub(crate) fn add_child(&self, child: Arc<SurfaceNode>) {
        self.children.write().unwrap().push(child);
    }

    pub(crate) fn remove_child(&self, child: &Arc<SurfaceNode>) -> bool {
        let mut children = self.children.write().unwrap();
        let before = children.len();
        children.retain(|c| !Arc::ptr_eq(c, child));
        children.len() != before
    }

    pub(crate) fn set_owner(&self, owner: Option<&Arc<ScopeRoot>>) {
        *self.owner.write().unwrap() = match owner {
            Some(owner) => Arc::downgrade(owner),
            None => Weak::new(),
        };
    }

    /// Depth-first walk over this node and its descendants, crossing into
    /// hosted scopes (encapsulation boundaries are visible to discovery).
    pub fn walk(self: &Arc<Self>, visit: &mut dyn FnMut(&Arc<SurfaceNode>)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
        if let Some(scope) = self.hosted_scope() {
            scope.root().walk(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_unique() {
        let a = SurfaceNode::new("play-toggle");
        let b = SurfaceNode::new("play-toggle");
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_attribute_write_is_idempotent() {
        let node = SurfaceNode::new("seek-slider");
        assert!(node.set_attribute("current-time", "5"));
        assert!(!node.set_attribute("current-time", "5"));
        assert!(node.set_attribute("current-time", "6"));
        assert_eq!(node.attribute("current-time").as_deref(), Some("6"));
    }

    #[test]
    fn test_slot_assignment() {
        let node = SurfaceNode::new("volume-slider");
        let seen = Arc::new(RwLock::new(Vec::new()));
        let sink = Arc::clone(&seen);
        node.install_slot(
            "volume",
            Arc::new(move |value| sink.write().unwrap().push(value)),
        );

        assert!(node.has_slot("volume"));
        assert!(node.assign_slot("volume", Some(StateValue::Number(0.5))));
        assert!(!node.assign_slot("muted", Some(StateValue::Flag(true))));
        assert_eq!(seen.read().unwrap().len(), 1);
    }

    #[test]
    fn test_attachment_downcast() {
        let node = SurfaceNode::new("video");
        node.attach(Arc::new(42u32));
        assert_eq!(node.attachment::<u32>().as_deref(), Some(&42));
        assert!(node.attachment::<String>().is_none());
    }
}
