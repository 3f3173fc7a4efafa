// examples/surface_demo.rs
//
// Demo d'une surface de contrôle complète, sans rendu :
//   - un document avec un contrôleur et quelques contrôles
//   - un contrôle encapsulé associé par référence
//   - une source média scriptée qui pousse ses notifications
//   - affichage des attributs miroités après chaque étape
//
// Build et run (depuis la racine du workspace) :
//   cargo run --example surface_demo -p pmosurface

use std::sync::{Arc, RwLock};

use pmonode::{RequestSignal, ScopeRoot, SurfaceNode, signal};
use pmostate::{MediaTrack, StateKey, StateValue, TimeRange};
use pmosurface::{
    ATTR_CONTROLLER_REF, ATTR_MEDIA_MARKER, ATTR_STATE_KEYS, CaptionCommands, MediaNotification,
    MediaSource, NotificationSink, PresentationCommands, SourceCapabilities, SourceHandle,
    SurfaceController, SurfaceError, TransportCommands, VolumeCommands,
};

/// Source scriptée : confirme chaque commande par la notification
/// native correspondante, comme le ferait un vrai backend.
#[derive(Default)]
struct ScriptedPlayer {
    sink: RwLock<Option<NotificationSink>>,
}

impl ScriptedPlayer {
    fn notify(&self, notification: MediaNotification) {
        let sink = self.sink.read().unwrap().clone();
        if let Some(sink) = sink {
            sink(notification);
        }
    }
}

impl TransportCommands for ScriptedPlayer {
    fn play(&self) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::Play);
        Ok(())
    }
    fn pause(&self) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::Pause);
        Ok(())
    }
    fn seek(&self, seconds: f64) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::TimeUpdate(seconds));
        Ok(())
    }
    fn set_playback_rate(&self, rate: f64) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::RateChange(rate));
        Ok(())
    }
}

impl VolumeCommands for ScriptedPlayer {
    fn set_volume(&self, volume: f64) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::VolumeChange {
            volume,
            muted: false,
        });
        Ok(())
    }
    fn set_muted(&self, muted: bool) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::VolumeChange { volume: 0.8, muted });
        Ok(())
    }
}

impl PresentationCommands for ScriptedPlayer {
    fn enter_fullscreen(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn exit_fullscreen(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn enter_pip(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn exit_pip(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn enter_cast(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn exit_cast(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

impl CaptionCommands for ScriptedPlayer {
    fn text_tracks(&self) -> Vec<MediaTrack> {
        vec![MediaTrack::new("subtitles", "en", "English")]
    }
    fn show_subtitles(&self, language: &str) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::ShowingTracksChange(vec![
            MediaTrack::new("subtitles", language, "English"),
        ]));
        Ok(())
    }
    fn hide_subtitles(&self) -> Result<(), SurfaceError> {
        self.notify(MediaNotification::ShowingTracksChange(vec![]));
        Ok(())
    }
}

impl MediaSource for ScriptedPlayer {
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            has_transport: true,
            has_volume: true,
            has_fullscreen: true,
            has_pip: false,
            has_cast: false,
            has_text_tracks: true,
        }
    }
    fn install_sink(&self, sink: NotificationSink) {
        *self.sink.write().unwrap() = Some(sink);
        // Etat initial, comme un backend réel à l'attachement.
        self.notify(MediaNotification::DurationChange(180.0));
        self.notify(MediaNotification::TimeUpdate(0.0));
        self.notify(MediaNotification::Pause);
        self.notify(MediaNotification::VolumeChange {
            volume: 0.8,
            muted: false,
        });
    }
    fn clear_sink(&self) {
        *self.sink.write().unwrap() = None;
    }
    fn description(&self) -> String {
        "scripted player".to_string()
    }
}

fn show(label: &str, nodes: &[(&str, &Arc<SurfaceNode>)]) {
    println!("\n== {} ==", label);
    for (name, node) in nodes {
        println!("  {:<14} {:?}", name, node);
    }
}

fn main() {
    let _ = tracing_subscriber::fmt::try_init();
    println!("Starting PMOSurface demo...");

    // 1. Le document et le contrôleur.
    let document = ScopeRoot::new("document");
    let host = SurfaceNode::with_id("surface", "demo-surface");
    document.append(&document.root(), &host).unwrap();
    let controller = SurfaceController::new(&host).unwrap();

    // 2. Des contrôles descendants : un bouton play (attribut) et un
    //    affichage de temps (slot typé).
    let play_button = SurfaceNode::new("button");
    play_button.set_attribute(ATTR_STATE_KEYS, "paused");
    document.append(&host, &play_button).unwrap();

    let time_display = SurfaceNode::new("display");
    time_display.install_slot(
        StateKey::CurrentTime.name(),
        Arc::new(|value| {
            if let Some(StateValue::Number(seconds)) = value {
                println!("  [time-display] currentTime = {:.1}s", seconds);
            }
        }),
    );
    time_display.set_attribute(ATTR_STATE_KEYS, "duration");
    document.append(&host, &time_display).unwrap();

    // 3. Un contrôle encapsulé dans un panneau, associé par référence.
    let panel = SurfaceNode::new("panel");
    document.append(&document.root(), &panel).unwrap();
    let panel_scope = document.nested("panel-root");
    panel.host_scope(Arc::clone(&panel_scope));
    let remote_volume = SurfaceNode::new("volume-readout");
    panel_scope.kinds().define("volume-readout");
    remote_volume.set_attribute(ATTR_STATE_KEYS, "volume volume-level muted");
    remote_volume.set_attribute(ATTR_CONTROLLER_REF, "demo-surface");
    panel_scope.append(&panel_scope.root(), &remote_volume).unwrap();

    // 4. La source média, adoptée depuis l'arbre via son marqueur.
    let player = Arc::new(ScriptedPlayer::default());
    let video = SurfaceNode::new("video");
    video.attach(Arc::new(SourceHandle::new(
        Arc::clone(&player) as Arc<dyn MediaSource>
    )));
    video.set_attribute(ATTR_MEDIA_MARKER, "");
    document.append(&host, &video).unwrap();

    show(
        "after attachment",
        &[
            ("play-button", &play_button),
            ("time-display", &time_display),
            ("remote-volume", &remote_volume),
        ],
    );

    // 5. L'utilisateur appuie sur play : le signal remonte, la commande
    //    part vers la source, l'état revient par notification.
    signal::dispatch(&play_button, &RequestSignal::new("play"));
    player.notify(MediaNotification::Progress(TimeRange::new(0.0, 30.0)));
    show("after play", &[("play-button", &play_button)]);

    // 6. Seek depuis un descendant ; volume depuis le contrôle associé
    //    hors arbre, qui passe par l'entrée synthétique du contrôleur.
    signal::dispatch(
        &play_button,
        &RequestSignal::with_payload("seek", StateValue::Number(61.5)),
    );
    controller.submit_request(&RequestSignal::with_payload(
        "set-volume",
        StateValue::Number(0.3),
    ));
    show(
        "after seek + set-volume",
        &[
            ("time-display", &time_display),
            ("remote-volume", &remote_volume),
        ],
    );

    println!(
        "\ncontroller state: paused={:?} currentTime={:?} volumeLevel={:?}",
        controller.get_state(StateKey::Paused),
        controller.get_state(StateKey::CurrentTime),
        controller.get_state(StateKey::VolumeLevel),
    );
    println!("receivers: {}", controller.receiver_count());
    println!("\nDone.");
}
