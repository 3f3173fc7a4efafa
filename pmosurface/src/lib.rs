//! # pmosurface - Playable-media control surface engine
//!
//! A control surface is a tree of independent, loosely-coupled UI nodes
//! (buttons, sliders, menus, displays) that must all stay synchronized
//! with one authoritative media state without knowing about each other.
//! This crate is the state distribution engine behind such a surface:
//!
//! - a [`SurfaceController`] keeps one canonical state map per surface,
//!   fed by the adopted [`MediaSource`]'s notifications and by auxiliary
//!   capability signals;
//! - a receiver registry discovers interested nodes anywhere in the tree
//!   (including nested encapsulation boundaries) and by explicit
//!   reference, and fans diffed state out to them (typed property slot
//!   first, textual attribute mirror otherwise);
//! - a request router carries bubbling UI intents ("play", "seek", ...)
//!   back to the single authority allowed to act on the source;
//! - a [`PositionAnimator`] interpolates the playback position between
//!   sparse authoritative updates.
//!
//! Rendering of the individual controls is out of scope: nodes come from
//! [`pmonode`], vocabulary and codec from [`pmostate`].

pub mod animator;
pub mod config;
pub mod controller;
pub mod errors;
pub mod events;
pub mod registry;
pub mod router;
pub mod source;
pub mod store;

pub use animator::{FrameClock, ManualFrameClock, PositionAnimator, ThreadFrameClock};
pub use config::{SurfaceConfig, get_config};
pub use controller::{ControllerHandle, SurfaceController};
pub use errors::SurfaceError;
pub use events::{StateChange, StateChangeBus};
pub use registry::{
    ATTR_CONTROLLER_REF, ATTR_MEDIA_MARKER, ATTR_STATE_KEYS, ReceiverOrigin, ReceiverRegistry,
};
pub use router::RequestRouter;
pub use source::{
    AuxSignal, CaptionCommands, MediaNotification, MediaSource, NotificationSink,
    PresentationCommands, SourceCapabilities, SourceHandle, TransportCommands, VolumeCommands,
};
pub use store::{StateStore, WriteOutcome};

pub use pmostate::{MediaTrack, StateKey, StateValue, TimeRange, ValueShape};
