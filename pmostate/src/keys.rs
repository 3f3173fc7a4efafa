//! The fixed vocabulary of media-state keys.
//!
//! Chaque clé déclare sa forme de valeur, l'attribut utilisé pour le
//! miroir textuel, le nom de sa notification de changement et les signaux
//! de requête qui demandent sa modification.
//!
//! Keys are declared through the [`state_keys!`] macro so the table stays
//! in one place; the enum gives exhaustive matching to the codec and the
//! propagation engine.

use crate::model::ValueShape;

/// Static definition attached to each [`StateKey`] variant.
#[derive(Debug)]
pub struct StateKeyDef {
    /// Stable symbolic name, e.g. `currentTime`.
    pub name: &'static str,
    /// Kebab-case attribute used for textual mirroring, e.g. `current-time`.
    pub attribute: &'static str,
    /// Declared value shape.
    pub shape: ValueShape,
    /// Change-notification name, `lowercase(name) + "change"`.
    pub notification: &'static str,
    /// Request-signal names asking for a change of this key (maybe empty).
    pub requests: &'static [&'static str],
}

macro_rules! state_keys {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident => {
                name: $name:literal,
                attribute: $attribute:literal,
                shape: $shape:ident,
                notification: $notification:literal,
                requests: [ $($request:literal),* $(,)? ] $(,)?
            }
        ),+ $(,)?
    ) => {
        /// One media-state key.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum StateKey {
            $( $(#[$meta])* $variant, )+
        }

        impl StateKey {
            /// Every declared key, in declaration order.
            pub const ALL: &'static [StateKey] = &[ $( StateKey::$variant, )+ ];

            /// The static definition for this key.
            pub const fn def(&self) -> &'static StateKeyDef {
                match self {
                    $(
                        StateKey::$variant => &StateKeyDef {
                            name: $name,
                            attribute: $attribute,
                            shape: ValueShape::$shape,
                            notification: $notification,
                            requests: &[ $($request,)* ],
                        },
                    )+
                }
            }
        }
    };
}

state_keys! {
    /// Whether playback is paused.
    Paused => {
        name: "paused",
        attribute: "paused",
        shape: Flag,
        notification: "pausedchange",
        requests: ["play", "pause"],
    },
    /// Whether the source is muted.
    Muted => {
        name: "muted",
        attribute: "muted",
        shape: Flag,
        notification: "mutedchange",
        requests: ["mute", "unmute"],
    },
    /// Volume in `0.0..=1.0`.
    Volume => {
        name: "volume",
        attribute: "volume",
        shape: Number,
        notification: "volumechange",
        requests: ["set-volume"],
    },
    /// Coarse volume bucket derived from volume + muted:
    /// `off`, `low`, `medium` or `high`.
    VolumeLevel => {
        name: "volumeLevel",
        attribute: "volume-level",
        shape: Text,
        notification: "volumelevelchange",
        requests: [],
    },
    /// Current playback position in seconds.
    CurrentTime => {
        name: "currentTime",
        attribute: "current-time",
        shape: Number,
        notification: "currenttimechange",
        requests: ["seek"],
    },
    /// Media duration in seconds.
    Duration => {
        name: "duration",
        attribute: "duration",
        shape: Number,
        notification: "durationchange",
        requests: [],
    },
    /// Playback rate, 1.0 = realtime.
    PlaybackRate => {
        name: "playbackRate",
        attribute: "playback-rate",
        shape: Number,
        notification: "playbackratechange",
        requests: ["set-playback-rate"],
    },
    /// Furthest buffered range.
    Buffered => {
        name: "buffered",
        attribute: "buffered",
        shape: Pair,
        notification: "bufferedchange",
        requests: [],
    },
    /// Seekable range.
    Seekable => {
        name: "seekable",
        attribute: "seekable",
        shape: Pair,
        notification: "seekablechange",
        requests: [],
    },
    /// Source readiness level (0..=4).
    Readiness => {
        name: "readiness",
        attribute: "readiness",
        shape: Number,
        notification: "readinesschange",
        requests: [],
    },
    /// Playback reached the end of the media.
    Ended => {
        name: "ended",
        attribute: "ended",
        shape: Flag,
        notification: "endedchange",
        requests: [],
    },
    /// The source is loading data.
    Loading => {
        name: "loading",
        attribute: "loading",
        shape: Flag,
        notification: "loadingchange",
        requests: [],
    },
    /// The surface is presented fullscreen.
    IsFullscreen => {
        name: "isFullscreen",
        attribute: "fullscreen",
        shape: Flag,
        notification: "isfullscreenchange",
        requests: ["enter-fullscreen", "exit-fullscreen"],
    },
    /// The surface is presented picture-in-picture.
    IsPip => {
        name: "isPip",
        attribute: "pip",
        shape: Flag,
        notification: "ispipchange",
        requests: ["enter-pip", "exit-pip"],
    },
    /// Playback is being cast to a remote endpoint.
    IsCasting => {
        name: "isCasting",
        attribute: "casting",
        shape: Flag,
        notification: "iscastingchange",
        requests: ["enter-cast", "exit-cast"],
    },
    /// A cast endpoint is available.
    CastAvailable => {
        name: "castAvailable",
        attribute: "cast-available",
        shape: Flag,
        notification: "castavailablechange",
        requests: [],
    },
    /// An airplay endpoint is available.
    AirplayAvailable => {
        name: "airplayAvailable",
        attribute: "airplay-available",
        shape: Flag,
        notification: "airplayavailablechange",
        requests: [],
    },
    /// Text tracks offered by the source.
    SubtitlesList => {
        name: "subtitlesList",
        attribute: "subtitles-list",
        shape: Records,
        notification: "subtitleslistchange",
        requests: [],
    },
    /// Text tracks currently showing.
    SubtitlesShowing => {
        name: "subtitlesShowing",
        attribute: "subtitles-showing",
        shape: Records,
        notification: "subtitlesshowingchange",
        requests: ["show-subtitles", "hide-subtitles"],
    },
}

impl StateKey {
    pub fn name(&self) -> &'static str {
        self.def().name
    }

    pub fn attribute(&self) -> &'static str {
        self.def().attribute
    }

    pub fn shape(&self) -> ValueShape {
        self.def().shape
    }

    pub fn notification(&self) -> &'static str {
        self.def().notification
    }

    pub fn requests(&self) -> &'static [&'static str] {
        self.def().requests
    }

    /// Looks up a key by its symbolic name.
    pub fn from_name(name: &str) -> Option<StateKey> {
        StateKey::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Looks up a key by its mirror attribute.
    pub fn from_attribute(attribute: &str) -> Option<StateKey> {
        StateKey::ALL
            .iter()
            .copied()
            .find(|k| k.attribute() == attribute)
    }

    /// The key targeted by a request signal, if any.
    pub fn for_request(signal: &str) -> Option<StateKey> {
        StateKey::ALL
            .iter()
            .copied()
            .find(|k| k.requests().contains(&signal))
    }
}

// Display = nom symbolique, utilisé dans les logs et les erreurs.
impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
