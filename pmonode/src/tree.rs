//! Scoped documents and mutation observation.
//!
//! A [`ScopeRoot`] owns one tree of nodes and an id-index for that tree.
//! Nested scopes model encapsulation boundaries: a node can host a child
//! scope whose subtree has its own id-namespace but is still reached by
//! subtree discovery ([`SurfaceNode::walk`]) and by bubbling signals.
//!
//! Every structural or attribute mutation commits first, then observers
//! run synchronously on the caller's thread, in mutation order. Batches
//! bubble to ancestor scopes so a document-level observer sees mutations
//! inside nested scopes too.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use crate::errors::NodeError;
use crate::kinds::KindRegistry;
use crate::node::SurfaceNode;

/// One observed mutation.
///
/// A node present in both `added` and `removed` of a single
/// `ChildrenChanged` batch has *moved*; observers must pair the two by
/// node identity instead of unregistering and re-registering it.
#[derive(Clone)]
pub enum MutationBatch {
    ChildrenChanged {
        added: Vec<Arc<SurfaceNode>>,
        removed: Vec<Arc<SurfaceNode>>,
    },
    AttributeChanged {
        node: Arc<SurfaceNode>,
        name: String,
        old: Option<String>,
    },
}

pub type MutationObserver = Arc<dyn Fn(&MutationBatch) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

pub struct ScopeRoot {
    root: RwLock<Option<Arc<SurfaceNode>>>,
    kinds: Arc<KindRegistry>,
    id_index: RwLock<HashMap<String, Weak<SurfaceNode>>>,
    observers: RwLock<Vec<(ObserverId, MutationObserver)>>,
    next_observer: AtomicU64,
    /// The node hosting this scope, when nested.
    anchor: RwLock<Weak<SurfaceNode>>,
}

impl std::fmt::Debug for ScopeRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRoot")
            .field("root", &self.root.read().unwrap().as_ref().map(|r| r.kind().to_string()))
            .field("ids", &self.id_index.read().unwrap().len())
            .field("observers", &self.observers.read().unwrap().len())
            .finish()
    }
}

impl ScopeRoot {
    /// Creates a document root with its own kind registry.
    pub fn new(root_kind: impl Into<String>) -> Arc<ScopeRoot> {
        Self::with_kinds(root_kind, Arc::new(KindRegistry::new()))
    }

    fn with_kinds(root_kind: impl Into<String>, kinds: Arc<KindRegistry>) -> Arc<ScopeRoot> {
        let scope = Arc::new(ScopeRoot {
            root: RwLock::new(None),
            kinds,
            id_index: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            next_observer: AtomicU64::new(1),
            anchor: RwLock::new(Weak::new()),
        });

        let root = SurfaceNode::new(root_kind);
        root.set_owner(Some(&scope));
        *scope.root.write().unwrap() = Some(root);
        scope
    }

    /// Creates a nested scope sharing this document's kind registry.
    ///
    /// Attach it with [`SurfaceNode::host_scope`] on the hosting node.
    pub fn nested(&self, root_kind: impl Into<String>) -> Arc<ScopeRoot> {
        Self::with_kinds(root_kind, Arc::clone(&self.kinds))
    }

    pub fn root(&self) -> Arc<SurfaceNode> {
        self.root
            .read()
            .unwrap()
            .clone()
            .expect("scope root node is set at construction")
    }

    pub fn kinds(&self) -> &Arc<KindRegistry> {
        &self.kinds
    }

    pub(crate) fn set_anchor(&self, node: &Arc<SurfaceNode>) {
        *self.anchor.write().unwrap() = Arc::downgrade(node);
    }

    /// The node hosting this scope, when nested.
    pub fn anchor(&self) -> Option<Arc<SurfaceNode>> {
        self.anchor.read().unwrap().upgrade()
    }

    pub fn observe(&self, observer: MutationObserver) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.write().unwrap().push((id, observer));
        id
    }

    pub fn unobserve(&self, id: ObserverId) {
        self.observers
            .write()
            .unwrap()
            .retain(|(oid, _)| *oid != id);
    }

    /// Appends a detached node (with its subtree) under `parent`.
    pub fn append(
        self: &Arc<Self>,
        parent: &Arc<SurfaceNode>,
        child: &Arc<SurfaceNode>,
    ) -> Result<(), NodeError> {
        if child.parent().is_some() || child.owner().is_some() {
            return Err(NodeError::AlreadyAttached(child.kind().to_string()));
        }
        if !parent
            .owner()
            .map(|scope| Arc::ptr_eq(&scope, self))
            .unwrap_or(false)
        {
            return Err(NodeError::Detached(parent.kind().to_string()));
        }
        if child.contains(parent) {
            return Err(NodeError::WouldCycle(
                child.kind().to_string(),
                parent.kind().to_string(),
            ));
        }

        child.set_parent(Some(parent));
        parent.add_child(Arc::clone(child));
        self.adopt(child);

        self.notify(&MutationBatch::ChildrenChanged {
            added: vec![Arc::clone(child)],
            removed: vec![],
        });
        Ok(())
    }

    /// Detaches a node (with its subtree) from its parent.
    pub fn remove(self: &Arc<Self>, child: &Arc<SurfaceNode>) -> Result<(), NodeError> {
        let parent = child
            .parent()
            .ok_or_else(|| NodeError::Detached(child.kind().to_string()))?;
        parent.remove_child(child);
        child.set_parent(None);
        self.orphan(child);

        self.notify(&MutationBatch::ChildrenChanged {
            added: vec![],
            removed: vec![Arc::clone(child)],
        });
        Ok(())
    }

    /// Re-parents an attached node inside this scope, as one batch: the
    /// node appears in both `removed` and `added` so observers can tell a
    /// move from a departure.
    pub fn move_to(
        self: &Arc<Self>,
        new_parent: &Arc<SurfaceNode>,
        child: &Arc<SurfaceNode>,
    ) -> Result<(), NodeError> {
        let old_parent = child
            .parent()
            .ok_or_else(|| NodeError::Detached(child.kind().to_string()))?;
        if child.contains(new_parent) {
            return Err(NodeError::WouldCycle(
                child.kind().to_string(),
                new_parent.kind().to_string(),
            ));
        }

        old_parent.remove_child(child);
        child.set_parent(Some(new_parent));
        new_parent.add_child(Arc::clone(child));

        self.notify(&MutationBatch::ChildrenChanged {
            added: vec![Arc::clone(child)],
            removed: vec![Arc::clone(child)],
        });
        Ok(())
    }

    /// Looks up a node by textual id inside this scope only.
    pub fn find_by_id(&self, id: &str) -> Option<Arc<SurfaceNode>> {
        self.id_index.read().unwrap().get(id)?.upgrade()
    }

    /// Resolves an identifier from this scope outward: the scope itself
    /// first, then each ancestor scope through the anchor chain. This is
    /// how by-reference association crosses encapsulation boundaries
    /// without a tree walk.
    pub fn resolve_reference(&self, id: &str) -> Option<Arc<SurfaceNode>> {
        if let Some(node) = self.find_by_id(id) {
            return Some(node);
        }
        let parent_scope = self.anchor()?.owner()?;
        parent_scope.resolve_reference(id)
    }

    pub(crate) fn attribute_mutated(
        self: &Arc<Self>,
        node: &Arc<SurfaceNode>,
        name: &str,
        old: Option<String>,
    ) {
        if name == "id" {
            let mut index = self.id_index.write().unwrap();
            if let Some(old_id) = &old {
                index.remove(old_id);
            }
            if let Some(new_id) = node.id() {
                index.insert(new_id, Arc::downgrade(node));
            }
        }

        self.notify(&MutationBatch::AttributeChanged {
            node: Arc::clone(node),
            name: name.to_string(),
            old,
        });
    }

    /// Delivers a batch to this scope's observers, then bubbles it to the
    /// ancestor scope so document-level observers see nested mutations.
    fn notify(self: &Arc<Self>, batch: &MutationBatch) {
        let observers: Vec<MutationObserver> = self
            .observers
            .read()
            .unwrap()
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer(batch);
        }

        if let Some(anchor) = self.anchor() {
            if let Some(parent_scope) = anchor.owner() {
                parent_scope.notify(batch);
            }
        }
    }

    /// Takes ownership of a freshly-attached subtree: owner pointers and
    /// id indexing, children only (nodes of hosted scopes keep their own
    /// scope).
    fn adopt(self: &Arc<Self>, node: &Arc<SurfaceNode>) {
        node.set_owner(Some(self));
        if let Some(id) = node.id() {
            let mut index = self.id_index.write().unwrap();
            if index.contains_key(&id) {
                debug!(id = %id, "duplicate id in scope, keeping first");
            } else {
                index.insert(id, Arc::downgrade(node));
            }
        }
        for child in node.children() {
            self.adopt(&child);
        }
    }

    fn orphan(self: &Arc<Self>, node: &Arc<SurfaceNode>) {
        node.set_owner(None);
        if let Some(id) = node.id() {
            let mut index = self.id_index.write().unwrap();
            let indexed_here = index
                .get(&id)
                .map(|weak| weak.upgrade().map(|n| Arc::ptr_eq(&n, node)).unwrap_or(true))
                .unwrap_or(false);
            if indexed_here {
                index.remove(&id);
            }
        }
        for child in node.children() {
            self.orphan(&child);
        }
    }
}
