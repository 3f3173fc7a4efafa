//! Textual attribute encodings for each value shape.
//!
//! The codec is the fallback half of the two-tier addressing protocol: a
//! receiver without a typed property slot for a key gets the value
//! mirrored onto an attribute instead. Encodings are stable and
//! round-trip safe (`decode(shape, encode(v)) == v`).
//!
//! - `Flag` : attribute present (empty text) = true, absent = false.
//! - `Number` : decimal string.
//! - `Text` : verbatim.
//! - `Pair` : `start:end`.
//! - `Records` : whitespace-joined tokens, one per record, fields joined
//!   by `:` and percent-encoded so separators never collide with content.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::errors::StateValueError;
use crate::model::{MediaTrack, StateValue, TimeRange, ValueShape};

/// Characters that must never appear raw inside a record field: the token
/// separator (space), the field separator (`:`) and the escape character
/// itself.
const RECORD_FIELD: &AsciiSet = &CONTROLS.add(b' ').add(b':').add(b'%');

/// Encodes a value into its attribute text.
///
/// Returns `None` when the attribute must be removed instead of written:
/// a false flag has no textual form (presence *is* the encoding).
pub fn encode(value: &StateValue) -> Option<String> {
    match value {
        StateValue::Flag(true) => Some(String::new()),
        StateValue::Flag(false) => None,
        StateValue::Number(n) => Some(format_number(*n)),
        StateValue::Text(s) => Some(s.clone()),
        StateValue::Pair(range) => Some(format!(
            "{}:{}",
            format_number(range.start),
            format_number(range.end)
        )),
        StateValue::Records(list) => Some(
            list.iter()
                .map(encode_record)
                .collect::<Vec<_>>()
                .join(" "),
        ),
    }
}

/// Decodes attribute text back into a value of the given shape.
///
/// The caller handles attribute *absence* (unknown / false flag); this
/// function only sees present attributes.
pub fn decode(shape: ValueShape, text: &str) -> Result<StateValue, StateValueError> {
    match shape {
        ValueShape::Flag => Ok(StateValue::Flag(true)),
        ValueShape::Number => parse_number(text)
            .map(StateValue::Number)
            .ok_or_else(|| StateValueError::parse_error(shape, text)),
        ValueShape::Text => Ok(StateValue::Text(text.to_string())),
        ValueShape::Pair => {
            let (start, end) = text
                .split_once(':')
                .ok_or_else(|| StateValueError::MalformedPair(text.to_string()))?;
            match (parse_number(start), parse_number(end)) {
                (Some(start), Some(end)) => Ok(StateValue::Pair(TimeRange::new(start, end))),
                _ => Err(StateValueError::MalformedPair(text.to_string())),
            }
        }
        ValueShape::Records => {
            let mut records = Vec::new();
            for token in text.split_whitespace() {
                records.push(decode_record(token)?);
            }
            Ok(StateValue::Records(records))
        }
    }
}

fn format_number(n: f64) -> String {
    // Rust's f64 Display already prints the shortest round-trippable form.
    format!("{}", n)
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

fn encode_record(track: &MediaTrack) -> String {
    format!(
        "{}:{}:{}",
        utf8_percent_encode(&track.kind, RECORD_FIELD),
        utf8_percent_encode(&track.language, RECORD_FIELD),
        utf8_percent_encode(&track.label, RECORD_FIELD)
    )
}

fn decode_record(token: &str) -> Result<MediaTrack, StateValueError> {
    let mut fields = token.splitn(3, ':');
    let (Some(kind), Some(language), Some(label)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(StateValueError::MalformedRecord(token.to_string()));
    };

    Ok(MediaTrack {
        kind: decode_field(kind, token)?,
        language: decode_field(language, token)?,
        label: decode_field(label, token)?,
    })
}

fn decode_field(field: &str, token: &str) -> Result<String, StateValueError> {
    percent_decode_str(field)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| StateValueError::MalformedRecord(token.to_string()))
}
