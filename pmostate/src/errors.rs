use thiserror::Error;

use crate::model::{StateValue, ValueShape};

#[derive(Error, Debug)]
pub enum StateValueError {
    #[error("expected a {0} value, got a {1} value")]
    ShapeMismatch(ValueShape, ValueShape),
    #[error("cannot parse '{1}' as {0}")]
    ParseError(ValueShape, String),
    #[error("malformed numeric pair '{0}'")]
    MalformedPair(String),
    #[error("malformed record token '{0}'")]
    MalformedRecord(String),
    #[error("unknown state key '{0}'")]
    UnknownKey(String),
}

impl StateValueError {
    pub fn shape_mismatch(expected: ValueShape, got: &StateValue) -> Self {
        StateValueError::ShapeMismatch(expected, got.shape())
    }

    pub fn parse_error(shape: ValueShape, text: &str) -> Self {
        StateValueError::ParseError(shape, text.to_string())
    }

    pub fn unknown_key(name: &str) -> Self {
        StateValueError::UnknownKey(name.to_string())
    }
}
