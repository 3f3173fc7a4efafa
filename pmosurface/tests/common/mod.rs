//! Shared helpers for the surface integration tests: a scripted media
//! source and canned receiver nodes.

use std::sync::{Arc, RwLock};

use pmonode::{PropertySlot, ScopeRoot, SurfaceNode};
use pmostate::{MediaTrack, StateKey, StateValue};
use pmosurface::{
    ATTR_STATE_KEYS, CaptionCommands, FrameClock, ManualFrameClock, MediaNotification, MediaSource,
    NotificationSink, PresentationCommands, SourceCapabilities, SurfaceConfig, SurfaceController,
    SurfaceError, TransportCommands, VolumeCommands,
};

/// Scripted media source: records every command, pushes notifications by
/// hand, and replays an initial state when a sink is installed.
#[derive(Default)]
pub struct FakeMediaSource {
    sink: RwLock<Option<NotificationSink>>,
    commands: RwLock<Vec<String>>,
    pub tracks: RwLock<Vec<MediaTrack>>,
    initial: RwLock<Vec<MediaNotification>>,
    transportless: bool,
}

impl FakeMediaSource {
    pub fn new() -> Arc<FakeMediaSource> {
        Arc::new(Self::default())
    }

    /// A candidate with no transport surface, for adoption-rejection
    /// tests.
    pub fn transportless() -> Arc<FakeMediaSource> {
        Arc::new(FakeMediaSource {
            transportless: true,
            ..Self::default()
        })
    }

    /// Notifications replayed as soon as a sink is installed, the way a
    /// real source reports its current state on attachment.
    pub fn with_initial(notifications: Vec<MediaNotification>) -> Arc<FakeMediaSource> {
        let source = Self::new();
        *source.initial.write().unwrap() = notifications;
        source
    }

    pub fn emit(&self, notification: MediaNotification) {
        let sink = self.sink.read().unwrap().clone();
        if let Some(sink) = sink {
            sink(notification);
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    pub fn sink_installed(&self) -> bool {
        self.sink.read().unwrap().is_some()
    }

    fn record(&self, command: impl Into<String>) -> Result<(), SurfaceError> {
        self.commands.write().unwrap().push(command.into());
        Ok(())
    }
}

impl TransportCommands for FakeMediaSource {
    fn play(&self) -> Result<(), SurfaceError> {
        self.record("play")
    }
    fn pause(&self) -> Result<(), SurfaceError> {
        self.record("pause")
    }
    fn seek(&self, seconds: f64) -> Result<(), SurfaceError> {
        self.record(format!("seek {}", seconds))
    }
    fn set_playback_rate(&self, rate: f64) -> Result<(), SurfaceError> {
        self.record(format!("rate {}", rate))
    }
}

impl VolumeCommands for FakeMediaSource {
    fn set_volume(&self, volume: f64) -> Result<(), SurfaceError> {
        self.record(format!("volume {}", volume))
    }
    fn set_muted(&self, muted: bool) -> Result<(), SurfaceError> {
        self.record(format!("muted {}", muted))
    }
}

impl PresentationCommands for FakeMediaSource {
    fn enter_fullscreen(&self) -> Result<(), SurfaceError> {
        self.record("enter-fullscreen")
    }
    fn exit_fullscreen(&self) -> Result<(), SurfaceError> {
        self.record("exit-fullscreen")
    }
    fn enter_pip(&self) -> Result<(), SurfaceError> {
        self.record("enter-pip")
    }
    fn exit_pip(&self) -> Result<(), SurfaceError> {
        self.record("exit-pip")
    }
    fn enter_cast(&self) -> Result<(), SurfaceError> {
        self.record("enter-cast")
    }
    fn exit_cast(&self) -> Result<(), SurfaceError> {
        self.record("exit-cast")
    }
}

impl CaptionCommands for FakeMediaSource {
    fn text_tracks(&self) -> Vec<MediaTrack> {
        self.tracks.read().unwrap().clone()
    }
    fn show_subtitles(&self, language: &str) -> Result<(), SurfaceError> {
        self.record(format!("show-subtitles {}", language))
    }
    fn hide_subtitles(&self) -> Result<(), SurfaceError> {
        self.record("hide-subtitles")
    }
}

impl MediaSource for FakeMediaSource {
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            has_transport: !self.transportless,
            has_volume: true,
            has_fullscreen: true,
            has_pip: true,
            has_cast: true,
            has_text_tracks: true,
        }
    }

    fn install_sink(&self, sink: NotificationSink) {
        *self.sink.write().unwrap() = Some(Arc::clone(&sink));
        let initial = self.initial.read().unwrap().clone();
        for notification in initial {
            sink(notification);
        }
    }

    fn clear_sink(&self) {
        *self.sink.write().unwrap() = None;
    }

    fn description(&self) -> String {
        "fake media source".to_string()
    }
}

/// A surface document with a wired controller driven by a manual frame
/// clock.
pub struct Surface {
    pub scope: Arc<ScopeRoot>,
    pub host: Arc<SurfaceNode>,
    pub controller: Arc<SurfaceController>,
    pub clock: Arc<ManualFrameClock>,
}

pub fn build_surface() -> Surface {
    let scope = ScopeRoot::new("document");
    let host = SurfaceNode::with_id("surface", "main-surface");
    scope.append(&scope.root(), &host).unwrap();

    let clock = Arc::new(ManualFrameClock::new());
    let clock_dyn: Arc<dyn FrameClock> = Arc::clone(&clock) as Arc<dyn FrameClock>;
    let controller =
        SurfaceController::with_config(&host, SurfaceConfig::default(), clock_dyn)
            .unwrap();

    Surface {
        scope,
        host,
        controller,
        clock,
    }
}

/// Attribute-only receiver: mirrors the listed attributes.
pub fn mirror_node(kind: &str, listing: &str) -> Arc<SurfaceNode> {
    let node = SurfaceNode::new(kind);
    node.set_attribute(ATTR_STATE_KEYS, listing);
    node
}

/// Receiver with a recording property slot for one key.
pub fn slot_node(kind: &str, key: StateKey) -> (Arc<SurfaceNode>, Arc<RwLock<Vec<Option<StateValue>>>>) {
    let node = SurfaceNode::new(kind);
    let values = Arc::new(RwLock::new(Vec::new()));
    let sink = Arc::clone(&values);
    let slot: PropertySlot = Arc::new(move |value| sink.write().unwrap().push(value));
    node.install_slot(key.name(), slot);
    (node, values)
}
