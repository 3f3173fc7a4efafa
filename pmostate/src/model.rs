//! Value shapes and values carried by the state store.

use serde::{Deserialize, Serialize};

use crate::errors::StateValueError;

/// The declared shape of a state key's value.
///
/// The engine supports a fixed, small set of shapes; there is no open-ended
/// value model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueShape {
    /// Boolean-presence: mirrored as attribute present/absent.
    Flag,
    /// A single f64.
    Number,
    /// Free-form text.
    Text,
    /// A numeric pair (e.g. a buffered or seekable range).
    Pair,
    /// A list of simple records (e.g. available text tracks).
    Records,
}

impl std::fmt::Display for ValueShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueShape::Flag => "flag",
            ValueShape::Number => "number",
            ValueShape::Text => "text",
            ValueShape::Pair => "pair",
            ValueShape::Records => "records",
        };
        write!(f, "{}", name)
    }
}

/// A closed numeric range, used for buffered/seekable state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Descriptor for one text track (captions, subtitles).
///
/// Field order in the attribute encoding is `kind:language:label`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub kind: String,
    pub language: String,
    pub label: String,
}

impl MediaTrack {
    pub fn new(
        kind: impl Into<String>,
        language: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            language: language.into(),
            label: label.into(),
        }
    }
}

/// One media-state value.
///
/// Deep equality (`PartialEq`) is the store's no-op test: writing a value
/// equal to the stored one must not fan out. Float comparison keeps IEEE
/// semantics (NaN != NaN), comme dans le modèle UPnP du projet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Pair(TimeRange),
    Records(Vec<MediaTrack>),
}

impl StateValue {
    /// Returns the shape this value belongs to.
    pub fn shape(&self) -> ValueShape {
        match self {
            StateValue::Flag(_) => ValueShape::Flag,
            StateValue::Number(_) => ValueShape::Number,
            StateValue::Text(_) => ValueShape::Text,
            StateValue::Pair(_) => ValueShape::Pair,
            StateValue::Records(_) => ValueShape::Records,
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, StateValue::Flag(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, StateValue::Number(_))
    }

    /// The flag value, or an error if the shape does not match.
    pub fn as_flag(&self) -> Result<bool, StateValueError> {
        match self {
            StateValue::Flag(b) => Ok(*b),
            other => Err(StateValueError::shape_mismatch(ValueShape::Flag, other)),
        }
    }

    pub fn as_number(&self) -> Result<f64, StateValueError> {
        match self {
            StateValue::Number(n) => Ok(*n),
            other => Err(StateValueError::shape_mismatch(ValueShape::Number, other)),
        }
    }

    pub fn as_text(&self) -> Result<&str, StateValueError> {
        match self {
            StateValue::Text(s) => Ok(s),
            other => Err(StateValueError::shape_mismatch(ValueShape::Text, other)),
        }
    }

    pub fn as_pair(&self) -> Result<TimeRange, StateValueError> {
        match self {
            StateValue::Pair(r) => Ok(*r),
            other => Err(StateValueError::shape_mismatch(ValueShape::Pair, other)),
        }
    }

    pub fn as_records(&self) -> Result<&[MediaTrack], StateValueError> {
        match self {
            StateValue::Records(list) => Ok(list),
            other => Err(StateValueError::shape_mismatch(ValueShape::Records, other)),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Flag(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<TimeRange> for StateValue {
    fn from(value: TimeRange) -> Self {
        StateValue::Pair(value)
    }
}

impl From<Vec<MediaTrack>> for StateValue {
    fn from(value: Vec<MediaTrack>) -> Self {
        StateValue::Records(value)
    }
}
