//! Media source interface.
//!
//! The media source is an external collaborator: the engine only consumes
//! its command surface and its change notifications. Backends implement
//! the capability traits below and report what they actually support
//! through [`SourceCapabilities`], the way renderer backends advertise
//! their service set in PMOMusic.

use std::sync::Arc;

use pmostate::{MediaTrack, TimeRange};

use crate::errors::SurfaceError;

/// What a candidate source actually supports.
///
/// Adoption requires at least `has_transport`; everything else degrades
/// gracefully (the corresponding requests become no-ops).
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceCapabilities {
    pub has_transport: bool,
    pub has_volume: bool,
    pub has_fullscreen: bool,
    pub has_pip: bool,
    pub has_cast: bool,
    pub has_text_tracks: bool,
}

impl SourceCapabilities {
    /// Minimum surface required for adoption.
    pub fn is_adoptable(&self) -> bool {
        self.has_transport
    }
}

/// Transport commands (lecture / pause / seek / vitesse).
pub trait TransportCommands {
    fn play(&self) -> Result<(), SurfaceError>;
    fn pause(&self) -> Result<(), SurfaceError>;
    /// Seek to an absolute position in seconds.
    fn seek(&self, seconds: f64) -> Result<(), SurfaceError>;
    fn set_playback_rate(&self, rate: f64) -> Result<(), SurfaceError>;
}

/// Volume and mute commands.
pub trait VolumeCommands {
    /// Logical volume in `0.0..=1.0`.
    fn set_volume(&self, volume: f64) -> Result<(), SurfaceError>;
    fn set_muted(&self, muted: bool) -> Result<(), SurfaceError>;
}

/// Presentation-mode commands (fullscreen, picture-in-picture, cast).
pub trait PresentationCommands {
    fn enter_fullscreen(&self) -> Result<(), SurfaceError>;
    fn exit_fullscreen(&self) -> Result<(), SurfaceError>;
    fn enter_pip(&self) -> Result<(), SurfaceError>;
    fn exit_pip(&self) -> Result<(), SurfaceError>;
    fn enter_cast(&self) -> Result<(), SurfaceError>;
    fn exit_cast(&self) -> Result<(), SurfaceError>;
}

/// Text-track commands.
pub trait CaptionCommands {
    /// Tracks the source can show.
    fn text_tracks(&self) -> Vec<MediaTrack>;
    fn show_subtitles(&self, language: &str) -> Result<(), SurfaceError>;
    fn hide_subtitles(&self) -> Result<(), SurfaceError>;
}

/// Native change notifications pushed by the source.
#[derive(Clone, Debug)]
pub enum MediaNotification {
    Play,
    Pause,
    TimeUpdate(f64),
    DurationChange(f64),
    VolumeChange { volume: f64, muted: bool },
    RateChange(f64),
    Progress(TimeRange),
    SeekableChange(TimeRange),
    ReadinessChange(u8),
    Ended,
    TracksChange(Vec<MediaTrack>),
    ShowingTracksChange(Vec<MediaTrack>),
}

/// Auxiliary capability signals, sourced from platform capabilities
/// rather than the media source's native event set. They flow through
/// the same store/diff/fan-out path as media notifications.
#[derive(Clone, Copy, Debug)]
pub enum AuxSignal {
    FullscreenChange(bool),
    PipChange(bool),
    CastingChange(bool),
    CastAvailability(bool),
    AirplayAvailability(bool),
    Loading(bool),
}

/// Sink installed by the controller on the adopted source.
pub type NotificationSink = Arc<dyn Fn(MediaNotification) + Send + Sync>;

/// The aggregate source contract.
///
/// Implementations should report their current state through the sink as
/// soon as one is installed: the store is purely in-memory and rebuilt
/// from the source on (re)attachment.
pub trait MediaSource:
    TransportCommands + VolumeCommands + PresentationCommands + CaptionCommands + Send + Sync
{
    fn capabilities(&self) -> SourceCapabilities;
    fn install_sink(&self, sink: NotificationSink);
    fn clear_sink(&self);
    /// Human-readable backend name, used in diagnostics.
    fn description(&self) -> String {
        "media source".to_string()
    }
}

/// Attachment payload carried by a media-marked node so the engine can
/// reach the backend behind it.
#[derive(Clone)]
pub struct SourceHandle(pub Arc<dyn MediaSource>);

impl SourceHandle {
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self(source)
    }
}
