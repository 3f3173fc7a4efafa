use thiserror::Error;

use pmostate::StateValueError;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("{0} cannot be adopted as a media source: {1}")]
    UnsupportedSource(String, String),
    #[error("no media source is adopted")]
    NoSourceAdopted,
    #[error("request '{0}' carries a malformed payload: {1}")]
    BadRequestPayload(String, String),
    #[error("request '{0}' is not a declared request signal")]
    UnknownRequest(String),
    #[error("no subtitle track is available on the adopted source")]
    NoSubtitles,
    #[error("controller host node {0} is not attached to a scope")]
    HostDetached(String),
    #[error("media source command '{0}' failed: {1}")]
    SourceCommand(String, String),
    #[error(transparent)]
    State(#[from] StateValueError),
}

impl SurfaceError {
    pub fn unsupported_source(kind: &str, reason: &str) -> Self {
        SurfaceError::UnsupportedSource(kind.to_string(), reason.to_string())
    }

    pub fn bad_payload(signal: &str, detail: &str) -> Self {
        SurfaceError::BadRequestPayload(signal.to_string(), detail.to_string())
    }

    pub fn source_command(command: &str, detail: impl std::fmt::Display) -> Self {
        SurfaceError::SourceCommand(command.to_string(), detail.to_string())
    }
}
