//! Surface controller façade.
//!
//! One controller per control surface: it owns the authoritative state
//! store, the receiver registry, the request router subscription and the
//! position animator, and it is the only component allowed to act on the
//! adopted media source. Higher layers interact with the surface through
//! this type only.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use pmonode::{
    MutationBatch, NodeId, ObserverId, RequestSignal, ScopeRoot, SignalOutcome, SurfaceNode,
};
use pmostate::{StateKey, StateValue, TimeRange};

use crate::animator::{FrameClock, PositionAnimator, ThreadFrameClock};
use crate::config::{SurfaceConfig, get_config};
use crate::errors::SurfaceError;
use crate::events::{StateChange, StateChangeBus};
use crate::registry::{
    ATTR_CONTROLLER_REF, ATTR_MEDIA_MARKER, ATTR_STATE_KEYS, ReceiverOrigin, ReceiverRegistry,
};
use crate::router::RequestRouter;
use crate::source::{AuxSignal, MediaNotification, MediaSource, SourceHandle};
use crate::store::{StateStore, WriteOutcome};

struct AdoptedSource {
    handle: Arc<dyn MediaSource>,
    /// Identity of the media-marked node behind the source, when adopted
    /// from the tree.
    node_identity: Option<NodeId>,
}

/// Attachment installed on the host node so receivers can resolve their
/// controller through the owning document instead of a process-wide
/// registry.
pub struct ControllerHandle(std::sync::Weak<SurfaceController>);

pub struct SurfaceController {
    id: String,
    host: Arc<SurfaceNode>,
    document: Arc<ScopeRoot>,
    store: StateStore,
    registry: ReceiverRegistry,
    bus: StateChangeBus,
    animator: Arc<PositionAnimator>,
    source: RwLock<Option<AdoptedSource>>,
    scrubbing: AtomicBool,
    visible: AtomicBool,
    config: SurfaceConfig,
    document_observer: RwLock<Option<ObserverId>>,
    kind_observer: RwLock<Option<u64>>,
    request_handler: RwLock<Option<u64>>,
}

impl std::fmt::Debug for SurfaceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceController")
            .field("id", &self.id)
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("source_adopted", &self.source_adopted())
            .finish()
    }
}

impl SurfaceController {
    /// Creates a controller on an attached host node, with the process
    /// configuration and a thread-backed frame clock.
    pub fn new(host: &Arc<SurfaceNode>) -> Result<Arc<SurfaceController>, SurfaceError> {
        let config = get_config().clone();
        let clock = Arc::new(ThreadFrameClock::new(config.frame_period()));
        Self::with_config(host, config, clock)
    }

    /// Creates a controller with an explicit configuration and frame
    /// clock (tests drive frames manually).
    pub fn with_config(
        host: &Arc<SurfaceNode>,
        config: SurfaceConfig,
        clock: Arc<dyn FrameClock>,
    ) -> Result<Arc<SurfaceController>, SurfaceError> {
        let scope = host
            .owner()
            .ok_or_else(|| SurfaceError::HostDetached(host.kind().to_string()))?;
        let document = document_root(&scope);

        let id = match host.id() {
            Some(id) => id,
            None => {
                let id = format!("surface-{}", Uuid::new_v4());
                host.set_attribute("id", &id);
                id
            }
        };

        let controller = Arc::new_cyclic(|weak: &std::sync::Weak<SurfaceController>| {
            let animator_sink = weak.clone();
            let animator = PositionAnimator::new(
                clock,
                Arc::new(move |value| {
                    if let Some(controller) = animator_sink.upgrade() {
                        controller.animated_position(value);
                    }
                }),
            );

            SurfaceController {
                id: id.clone(),
                host: Arc::clone(host),
                document: Arc::clone(&document),
                store: StateStore::new(),
                registry: ReceiverRegistry::new(),
                bus: StateChangeBus::new(),
                animator,
                source: RwLock::new(None),
                scrubbing: AtomicBool::new(false),
                visible: AtomicBool::new(true),
                config,
                document_observer: RwLock::new(None),
                kind_observer: RwLock::new(None),
                request_handler: RwLock::new(None),
            }
        });

        controller.wire(host);
        Ok(controller)
    }

    /// Installs the router subscription, the mutation observer and the
    /// kind observer, then runs the initial discovery scans.
    fn wire(self: &Arc<Self>, host: &Arc<SurfaceNode>) {
        host.attach(Arc::new(ControllerHandle(Arc::downgrade(self))));

        let weak = Arc::downgrade(self);
        let token = host.on_request(Arc::new(move |signal, _origin| match weak.upgrade() {
            Some(controller) => controller.handle_request(signal),
            None => SignalOutcome::Pass,
        }));
        *self.request_handler.write().unwrap() = Some(token);

        let weak = Arc::downgrade(self);
        let observer = self.document.observe(Arc::new(move |batch| {
            if let Some(controller) = weak.upgrade() {
                controller.on_mutation(batch);
            }
        }));
        *self.document_observer.write().unwrap() = Some(observer);

        let weak = Arc::downgrade(self);
        let kind_token = self.document.kinds().observe(Arc::new(move |kind| {
            if let Some(controller) = weak.upgrade() {
                controller.on_kind_defined(kind);
            }
        }));
        *self.kind_observer.write().unwrap() = Some(kind_token);

        // Initial discovery: the host subtree for descendants and media
        // candidates, the whole document for by-reference receivers.
        self.scan_subtree(host);
        let mut referencing = Vec::new();
        self.document.root().walk(&mut |node| {
            if node.attribute(ATTR_CONTROLLER_REF).as_deref() == Some(self.id.as_str()) {
                referencing.push(Arc::clone(node));
            }
        });
        for node in &referencing {
            self.associate(node);
        }

        info!(controller = %self.id, "control surface wired");
    }

    /// Controller identifier (the host node's id).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolves the controller a node's `controller` attribute names,
    /// escalating scope by scope from the node's own root. This is the
    /// only lookup path: controllers are reachable through the document
    /// that owns them, not through any global.
    pub fn resolve_for(node: &Arc<SurfaceNode>) -> Option<Arc<SurfaceController>> {
        let id = node.attribute(ATTR_CONTROLLER_REF)?;
        let scope = node.owner()?;
        let host = scope.resolve_reference(&id)?;
        host.attachment::<ControllerHandle>()?.0.upgrade()
    }

    pub fn host(&self) -> &Arc<SurfaceNode> {
        &self.host
    }

    // =====================================================================
    // State store access
    // =====================================================================

    /// Authoritative write: no-op on deep-equal values, otherwise one
    /// change notification and one fan-out to every receiver.
    pub fn set_state(&self, key: StateKey, value: StateValue) -> Result<(), SurfaceError> {
        self.apply(key, Some(value))
    }

    /// Makes a key unknown; mirrored attributes disappear.
    pub fn clear_state(&self, key: StateKey) -> Result<(), SurfaceError> {
        self.apply(key, None)
    }

    /// Current value, or `None` for unknown.
    pub fn get_state(&self, key: StateKey) -> Option<StateValue> {
        self.store.get(key)
    }

    /// Change notifications for every key, named per key.
    pub fn subscribe_changes(&self) -> Receiver<StateChange> {
        self.bus.subscribe()
    }

    fn apply(&self, key: StateKey, value: Option<StateValue>) -> Result<(), SurfaceError> {
        let outcome = match &value {
            Some(value) => self.store.write(key, value.clone())?,
            None => self.store.clear(key),
        };
        if outcome == WriteOutcome::Changed {
            self.bus.broadcast(StateChange {
                controller: self.id.clone(),
                key,
                notification: key.notification(),
                value: value.clone(),
            });
            self.registry.deliver_all(key, value.as_ref());
        }
        Ok(())
    }

    // =====================================================================
    // Receiver lifecycle
    // =====================================================================

    /// Registers an out-of-tree receiver by explicit reference. Safe to
    /// call for nodes living inside unrelated encapsulation boundaries.
    pub fn associate(&self, node: &Arc<SurfaceNode>) {
        self.registry
            .consider(node, ReceiverOrigin::Reference, self.document.kinds(), &self.store);
    }

    /// Unregisters a receiver. Tolerated no-op for unknown nodes.
    pub fn unassociate(&self, node: &Arc<SurfaceNode>) {
        self.registry.unregister(node);
    }

    /// Number of live receivers, for diagnostics.
    pub fn receiver_count(&self) -> usize {
        self.registry.len()
    }

    // =====================================================================
    // Media source lifecycle
    // =====================================================================

    /// Adopts a media source explicitly. Rejects sources without the
    /// minimum command surface. Tears down the previous source first.
    pub fn adopt_source(self: &Arc<Self>, source: Arc<dyn MediaSource>) -> Result<(), SurfaceError> {
        self.adopt(source, None)
    }

    fn adopt(
        self: &Arc<Self>,
        source: Arc<dyn MediaSource>,
        node_identity: Option<NodeId>,
    ) -> Result<(), SurfaceError> {
        let caps = source.capabilities();
        if !caps.is_adoptable() {
            warn!(
                source = %source.description(),
                "source adoption rejected: no transport command surface"
            );
            return Err(SurfaceError::unsupported_source(
                &source.description(),
                "no transport command surface",
            ));
        }

        self.detach_source();

        let weak = Arc::downgrade(self);
        source.install_sink(Arc::new(move |notification| {
            if let Some(controller) = weak.upgrade() {
                controller.ingest(notification);
            }
        }));
        info!(controller = %self.id, source = %source.description(), "media source adopted");
        *self.source.write().unwrap() = Some(AdoptedSource {
            handle: source,
            node_identity,
        });
        Ok(())
    }

    /// Adoption candidate from the tree: first qualifying media-marked
    /// node in document order wins, later ones are ignored.
    fn try_adopt_node(self: &Arc<Self>, node: &Arc<SurfaceNode>) {
        if self.source.read().unwrap().is_some() {
            debug!(kind = node.kind(), "media source already adopted, candidate ignored");
            return;
        }
        match node.attachment::<SourceHandle>() {
            Some(handle) => {
                let _ = self.adopt(Arc::clone(&handle.0), Some(node.identity()));
            }
            None => warn!(
                kind = node.kind(),
                "media-marked node carries no source handle, adoption rejected"
            ),
        }
    }

    /// Clears the sink on the current source, if any. Stored state stays
    /// known until the next source reports fresh values.
    pub fn detach_source(&self) {
        if let Some(adopted) = self.source.write().unwrap().take() {
            adopted.handle.clear_sink();
            info!(controller = %self.id, "media source detached");
        }
        self.animator.stop();
    }

    pub fn source_adopted(&self) -> bool {
        self.source.read().unwrap().is_some()
    }

    fn current_source(&self) -> Option<Arc<dyn MediaSource>> {
        self.source
            .read()
            .unwrap()
            .as_ref()
            .map(|adopted| Arc::clone(&adopted.handle))
    }

    // =====================================================================
    // Ingestion: one propagation path regardless of signal origin
    // =====================================================================

    /// Ingests a native media-source notification.
    pub fn ingest(self: &Arc<Self>, notification: MediaNotification) {
        let result = match notification {
            MediaNotification::Play => self
                .set_state(StateKey::Paused, StateValue::Flag(false))
                .and_then(|_| self.set_state(StateKey::Ended, StateValue::Flag(false))),
            MediaNotification::Pause => self.set_state(StateKey::Paused, StateValue::Flag(true)),
            MediaNotification::TimeUpdate(seconds) => {
                self.set_state(StateKey::CurrentTime, StateValue::Number(seconds))
            }
            MediaNotification::DurationChange(seconds) => {
                self.set_state(StateKey::Duration, StateValue::Number(seconds))
            }
            MediaNotification::VolumeChange { volume, muted } => self
                .set_state(StateKey::Volume, StateValue::Number(volume))
                .and_then(|_| self.set_state(StateKey::Muted, StateValue::Flag(muted)))
                .and_then(|_| {
                    let level = self.config.volume_level(volume, muted);
                    self.set_state(StateKey::VolumeLevel, StateValue::Text(level.to_string()))
                }),
            MediaNotification::RateChange(rate) => {
                self.set_state(StateKey::PlaybackRate, StateValue::Number(rate))
            }
            MediaNotification::Progress(range) => {
                self.set_state(StateKey::Buffered, StateValue::Pair(range))
            }
            MediaNotification::SeekableChange(range) => {
                self.set_state(StateKey::Seekable, StateValue::Pair(range))
            }
            MediaNotification::ReadinessChange(level) => {
                self.set_state(StateKey::Readiness, StateValue::Number(level as f64))
            }
            MediaNotification::Ended => self
                .set_state(StateKey::Ended, StateValue::Flag(true))
                .and_then(|_| self.set_state(StateKey::Paused, StateValue::Flag(true))),
            MediaNotification::TracksChange(tracks) => {
                self.set_state(StateKey::SubtitlesList, StateValue::Records(tracks))
            }
            MediaNotification::ShowingTracksChange(tracks) => {
                self.set_state(StateKey::SubtitlesShowing, StateValue::Records(tracks))
            }
        };
        if let Err(err) = result {
            // Shape mismatches here are programming errors in the
            // ingestion table itself.
            error!(controller = %self.id, error = %err, "notification ingestion failed");
        }

        self.sync_animator();
    }

    /// Ingests an auxiliary capability signal. Same store, same diff,
    /// same fan-out as media notifications.
    pub fn ingest_aux(self: &Arc<Self>, signal: AuxSignal) {
        let result = match signal {
            AuxSignal::FullscreenChange(active) => {
                self.set_state(StateKey::IsFullscreen, StateValue::Flag(active))
            }
            AuxSignal::PipChange(active) => self.set_state(StateKey::IsPip, StateValue::Flag(active)),
            AuxSignal::CastingChange(active) => {
                self.set_state(StateKey::IsCasting, StateValue::Flag(active))
            }
            AuxSignal::CastAvailability(available) => {
                self.set_state(StateKey::CastAvailable, StateValue::Flag(available))
            }
            AuxSignal::AirplayAvailability(available) => {
                self.set_state(StateKey::AirplayAvailable, StateValue::Flag(available))
            }
            AuxSignal::Loading(loading) => {
                self.set_state(StateKey::Loading, StateValue::Flag(loading))
            }
        };
        if let Err(err) = result {
            error!(controller = %self.id, error = %err, "capability ingestion failed");
        }
    }

    // =====================================================================
    // Animator wiring
    // =====================================================================

    /// Reconciles the animator with the stored transport state. The
    /// controller is the animator's owner: visibility loss stops it and
    /// only this reconciliation restarts it.
    fn sync_animator(&self) {
        let playing = matches!(
            self.store.get(StateKey::Paused),
            Some(StateValue::Flag(false))
        );
        let visible = self.visible.load(Ordering::SeqCst);

        if !(playing && visible) {
            self.animator.stop();
            return;
        }

        let position = match self.store.get(StateKey::CurrentTime) {
            Some(StateValue::Number(n)) => n,
            _ => 0.0,
        };
        let rate = match self.store.get(StateKey::PlaybackRate) {
            Some(StateValue::Number(n)) => n,
            _ => 1.0,
        };
        let end = match self.store.get(StateKey::Duration) {
            Some(StateValue::Number(n)) => n,
            _ => f64::MAX,
        };
        let bounds = TimeRange::new(0.0, end);

        if self.animator.is_running() {
            self.animator.update(position, rate, bounds);
        } else {
            self.animator.start(position, rate, bounds);
        }
    }

    /// Animator frame output. Suppressed while the user scrubs so the
    /// drag gesture is not fought by the animation.
    fn animated_position(self: &Arc<Self>, value: f64) {
        if self.scrubbing.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.set_state(StateKey::CurrentTime, StateValue::Number(value)) {
            error!(controller = %self.id, error = %err, "animated position write failed");
        }
    }

    /// Marks the beginning of a scrub gesture on a position-bound control.
    pub fn begin_scrub(&self) {
        self.scrubbing.store(true, Ordering::SeqCst);
    }

    pub fn end_scrub(&self) {
        self.scrubbing.store(false, Ordering::SeqCst);
    }

    /// Host visibility: an invisible surface must not animate. Becoming
    /// visible again restarts the animator only through this owner call.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
        if visible {
            self.sync_animator();
        } else {
            self.animator.set_visible(false);
        }
    }

    /// Direct access for hosts that need to drive frames or assert state.
    pub fn animator(&self) -> &Arc<PositionAnimator> {
        &self.animator
    }

    // =====================================================================
    // Request routing
    // =====================================================================

    /// Synthetic entry point for out-of-tree receivers: same table, same
    /// policy as bubbling signals.
    pub fn submit_request(self: &Arc<Self>, signal: &RequestSignal) {
        self.handle_request(signal);
    }

    fn handle_request(self: &Arc<Self>, signal: &RequestSignal) -> SignalOutcome {
        if !RequestRouter::handles(&signal.name) {
            return SignalOutcome::Pass;
        }

        let source = self.current_source();
        match RequestRouter::route(source.as_ref(), signal) {
            Ok(()) => {}
            Err(SurfaceError::NoSubtitles) => {
                // Authoring problem: surfaced loudly on purpose.
                error!(controller = %self.id, signal = %signal.name, "no subtitle track available");
            }
            Err(err @ SurfaceError::BadRequestPayload(_, _)) => {
                warn!(controller = %self.id, error = %err, "request skipped");
            }
            Err(err) => {
                warn!(controller = %self.id, signal = %signal.name, error = %err, "request failed");
            }
        }
        // Requests never re-bubble past the controller.
        SignalOutcome::Consumed
    }

    // =====================================================================
    // Tree observation
    // =====================================================================

    fn on_mutation(self: &Arc<Self>, batch: &MutationBatch) {
        match batch {
            MutationBatch::ChildrenChanged { added, removed } => {
                let added_ids: HashSet<NodeId> =
                    added.iter().map(|node| node.identity()).collect();
                let moved: HashSet<NodeId> = removed
                    .iter()
                    .map(|node| node.identity())
                    .filter(|identity| added_ids.contains(identity))
                    .collect();

                for node in removed {
                    if !moved.contains(&node.identity()) {
                        self.subtree_removed(node);
                    }
                }
                for node in added {
                    if !moved.contains(&node.identity()) {
                        self.scan_subtree(node);
                    }
                }
                for node in added {
                    if moved.contains(&node.identity()) {
                        self.reconcile_moved(node);
                    }
                }
            }
            MutationBatch::AttributeChanged { node, name, old } => {
                self.attribute_changed(node, name, old.as_deref());
            }
        }
    }

    /// Explicit tree-walk-on-mutation: every node of an added subtree is
    /// considered for adoption, by-reference association or descendant
    /// registration.
    fn scan_subtree(self: &Arc<Self>, root: &Arc<SurfaceNode>) {
        let mut nodes = Vec::new();
        root.walk(&mut |node| nodes.push(Arc::clone(node)));
        for node in &nodes {
            self.consider_node(node);
        }
    }

    fn consider_node(self: &Arc<Self>, node: &Arc<SurfaceNode>) {
        if node.has_attribute(ATTR_MEDIA_MARKER) {
            self.try_adopt_node(node);
            return;
        }
        if node.attribute(ATTR_CONTROLLER_REF).as_deref() == Some(self.id.as_str()) {
            self.associate(node);
            return;
        }
        if self.host.contains(node) && !Arc::ptr_eq(node, &self.host) {
            self.registry.consider(
                node,
                ReceiverOrigin::Descendant,
                self.document.kinds(),
                &self.store,
            );
        }
    }

    fn subtree_removed(self: &Arc<Self>, root: &Arc<SurfaceNode>) {
        let adopted_identity = self
            .source
            .read()
            .unwrap()
            .as_ref()
            .and_then(|adopted| adopted.node_identity);

        let mut nodes = Vec::new();
        root.walk(&mut |node| nodes.push(Arc::clone(node)));
        for node in &nodes {
            if self.registry.unregister(node) {
                debug!(kind = node.kind(), "receiver unregistered on removal");
            }
            if adopted_identity == Some(node.identity()) {
                self.detach_source();
            }
        }
    }

    /// A moved receiver keeps its registration and capability cache; no
    /// unregister/register churn and no snapshot re-send. Nodes that
    /// moved across the host boundary are reconciled instead.
    fn reconcile_moved(self: &Arc<Self>, root: &Arc<SurfaceNode>) {
        let mut nodes = Vec::new();
        root.walk(&mut |node| nodes.push(Arc::clone(node)));
        for node in &nodes {
            match self.registry.origin_of(node.identity()) {
                None => self.consider_node(node),
                Some(ReceiverOrigin::Reference) => {}
                Some(ReceiverOrigin::Descendant) => {
                    if !self.host.contains(node) {
                        self.registry.unregister(node);
                        debug!(kind = node.kind(), "receiver moved out of the surface");
                    }
                }
            }
        }
    }

    fn attribute_changed(self: &Arc<Self>, node: &Arc<SurfaceNode>, name: &str, old: Option<&str>) {
        match name {
            ATTR_CONTROLLER_REF => {
                let current = node.attribute(ATTR_CONTROLLER_REF);
                if old == Some(self.id.as_str()) && current.as_deref() != Some(self.id.as_str()) {
                    self.unassociate(node);
                }
                if current.as_deref() == Some(self.id.as_str()) {
                    self.associate(node);
                }
            }
            ATTR_STATE_KEYS => {
                if self.registry.is_registered(node.identity()) {
                    self.registry
                        .refresh_keys(node, self.document.kinds(), &self.store);
                } else {
                    self.consider_node(node);
                }
            }
            ATTR_MEDIA_MARKER => {
                if node.has_attribute(ATTR_MEDIA_MARKER) {
                    self.registry.unregister(node);
                    self.try_adopt_node(node);
                } else {
                    let adopted_identity = self
                        .source
                        .read()
                        .unwrap()
                        .as_ref()
                        .and_then(|adopted| adopted.node_identity);
                    if adopted_identity == Some(node.identity()) {
                        self.detach_source();
                    }
                }
            }
            _ => {}
        }
    }

    fn on_kind_defined(self: &Arc<Self>, kind: &str) {
        for node in self.registry.take_pending(kind) {
            self.consider_node(&node);
        }
    }
}

impl Drop for SurfaceController {
    fn drop(&mut self) {
        if let Some(adopted) = self.source.write().unwrap().take() {
            adopted.handle.clear_sink();
        }
        self.animator.stop();
        if let Some(observer) = self.document_observer.write().unwrap().take() {
            self.document.unobserve(observer);
        }
        if let Some(token) = self.kind_observer.write().unwrap().take() {
            self.document.kinds().unobserve(token);
        }
        if let Some(token) = self.request_handler.write().unwrap().take() {
            self.host.remove_request_handler(token);
        }
    }
}

/// Walks to the topmost scope through the anchor chain.
fn document_root(scope: &Arc<ScopeRoot>) -> Arc<ScopeRoot> {
    let mut current = Arc::clone(scope);
    loop {
        let parent = current.anchor().and_then(|anchor| anchor.owner());
        match parent {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}
