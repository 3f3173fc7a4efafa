//! Request router.
//!
//! One action per declared request-signal name, invoked against the
//! adopted media source. The router never touches the state store: state
//! only ever flows back through the source's own notifications, so the UI
//! can never show an optimistic value the source then contradicts.

use std::sync::Arc;

use tracing::debug;

use pmonode::RequestSignal;
use pmostate::StateValue;

use crate::errors::SurfaceError;
use crate::source::MediaSource;

/// The actions bound to request-signal names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RouteAction {
    Play,
    Pause,
    Mute,
    Unmute,
    SetVolume,
    Seek,
    SetPlaybackRate,
    EnterFullscreen,
    ExitFullscreen,
    EnterPip,
    ExitPip,
    EnterCast,
    ExitCast,
    ShowSubtitles,
    HideSubtitles,
}

impl RouteAction {
    fn from_signal(name: &str) -> Option<RouteAction> {
        let action = match name {
            "play" => RouteAction::Play,
            "pause" => RouteAction::Pause,
            "mute" => RouteAction::Mute,
            "unmute" => RouteAction::Unmute,
            "set-volume" => RouteAction::SetVolume,
            "seek" => RouteAction::Seek,
            "set-playback-rate" => RouteAction::SetPlaybackRate,
            "enter-fullscreen" => RouteAction::EnterFullscreen,
            "exit-fullscreen" => RouteAction::ExitFullscreen,
            "enter-pip" => RouteAction::EnterPip,
            "exit-pip" => RouteAction::ExitPip,
            "enter-cast" => RouteAction::EnterCast,
            "exit-cast" => RouteAction::ExitCast,
            "show-subtitles" => RouteAction::ShowSubtitles,
            "hide-subtitles" => RouteAction::HideSubtitles,
            _ => return None,
        };
        Some(action)
    }
}

pub struct RequestRouter;

impl RequestRouter {
    /// True when the name is a declared request signal, i.e. what the
    /// router subscribes to at the controller.
    pub fn handles(name: &str) -> bool {
        RouteAction::from_signal(name).is_some()
    }

    /// Executes the action bound to `signal` against the adopted source.
    ///
    /// No adopted source is a legitimate no-op: controls may fire before
    /// a source is attached. Payload validation failures surface as
    /// [`SurfaceError::BadRequestPayload`] for the caller to log and
    /// swallow; they must never abort the surface.
    pub fn route(
        source: Option<&Arc<dyn MediaSource>>,
        signal: &RequestSignal,
    ) -> Result<(), SurfaceError> {
        let action = RouteAction::from_signal(&signal.name)
            .ok_or_else(|| SurfaceError::UnknownRequest(signal.name.clone()))?;

        let Some(source) = source else {
            debug!(signal = %signal.name, "request before a source is adopted, ignored");
            return Ok(());
        };

        let caps = source.capabilities();
        match action {
            RouteAction::Play => source.play(),
            RouteAction::Pause => source.pause(),
            RouteAction::Seek => {
                let target = require_number(signal)?;
                if target < 0.0 {
                    return Err(SurfaceError::bad_payload(
                        &signal.name,
                        "seek target must be non-negative",
                    ));
                }
                source.seek(target)
            }
            RouteAction::SetPlaybackRate => {
                let rate = require_number(signal)?;
                if rate <= 0.0 {
                    return Err(SurfaceError::bad_payload(
                        &signal.name,
                        "playback rate must be positive",
                    ));
                }
                source.set_playback_rate(rate)
            }
            RouteAction::Mute | RouteAction::Unmute if !caps.has_volume => {
                debug!(signal = %signal.name, "source has no volume control, ignored");
                Ok(())
            }
            RouteAction::Mute => source.set_muted(true),
            RouteAction::Unmute => source.set_muted(false),
            RouteAction::SetVolume => {
                if !caps.has_volume {
                    debug!(signal = %signal.name, "source has no volume control, ignored");
                    return Ok(());
                }
                let volume = require_number(signal)?;
                if !(0.0..=1.0).contains(&volume) {
                    return Err(SurfaceError::bad_payload(
                        &signal.name,
                        "volume must be within 0.0..=1.0",
                    ));
                }
                source.set_volume(volume)
            }
            RouteAction::EnterFullscreen | RouteAction::ExitFullscreen if !caps.has_fullscreen => {
                debug!(signal = %signal.name, "source has no fullscreen support, ignored");
                Ok(())
            }
            RouteAction::EnterFullscreen => source.enter_fullscreen(),
            RouteAction::ExitFullscreen => source.exit_fullscreen(),
            RouteAction::EnterPip | RouteAction::ExitPip if !caps.has_pip => {
                debug!(signal = %signal.name, "source has no pip support, ignored");
                Ok(())
            }
            RouteAction::EnterPip => source.enter_pip(),
            RouteAction::ExitPip => source.exit_pip(),
            RouteAction::EnterCast | RouteAction::ExitCast if !caps.has_cast => {
                debug!(signal = %signal.name, "source has no cast support, ignored");
                Ok(())
            }
            RouteAction::EnterCast => source.enter_cast(),
            RouteAction::ExitCast => source.exit_cast(),
            RouteAction::ShowSubtitles => {
                // A missing track list is an authoring problem, not a UI
                // race; the caller reports it at error level.
                let tracks = source.text_tracks();
                if tracks.is_empty() {
                    return Err(SurfaceError::NoSubtitles);
                }
                let language = match optional_text(signal)? {
                    Some(language) => language,
                    None => tracks[0].language.clone(),
                };
                source.show_subtitles(&language)
            }
            RouteAction::HideSubtitles => source.hide_subtitles(),
        }
    }
}

fn require_number(signal: &RequestSignal) -> Result<f64, SurfaceError> {
    match &signal.payload {
        Some(StateValue::Number(n)) if n.is_finite() => Ok(*n),
        Some(other) => Err(SurfaceError::bad_payload(
            &signal.name,
            &format!("expected a finite number, got a {} value", other.shape()),
        )),
        None => Err(SurfaceError::bad_payload(
            &signal.name,
            "missing numeric payload",
        )),
    }
}

fn optional_text(signal: &RequestSignal) -> Result<Option<String>, SurfaceError> {
    match &signal.payload {
        None => Ok(None),
        Some(StateValue::Text(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SurfaceError::bad_payload(
            &signal.name,
            &format!("expected text, got a {} value", other.shape()),
        )),
    }
}
