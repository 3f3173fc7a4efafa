//! Controller scenarios: request routing, source adoption, by-reference
//! association, receiver moves and deferred kinds.

mod common;

use std::sync::Arc;

use common::{FakeMediaSource, build_surface, mirror_node, slot_node};
use pmonode::{RequestSignal, SurfaceNode, signal};
use pmostate::{MediaTrack, StateKey, StateValue, TimeRange};
use pmosurface::{
    ATTR_CONTROLLER_REF, ATTR_MEDIA_MARKER, MediaNotification, MediaSource, SourceHandle,
    SurfaceConfig, SurfaceController,
};

#[test]
fn test_request_without_source_is_silent() {
    let surface = build_surface();
    let button = SurfaceNode::new("button");
    surface.scope.append(&surface.host, &button).unwrap();

    // Consumed by the controller, no source, no state change, no panic.
    assert!(signal::dispatch(&button, &RequestSignal::new("play")));
    assert_eq!(surface.controller.get_state(StateKey::Paused), None);
}

#[test]
fn test_request_bubbles_to_the_source_command() {
    let surface = build_surface();
    let source = FakeMediaSource::new();
    surface
        .controller
        .adopt_source(Arc::clone(&source) as Arc<dyn MediaSource>)
        .unwrap();

    let row = SurfaceNode::new("row");
    let button = SurfaceNode::new("button");
    surface.scope.append(&surface.host, &row).unwrap();
    surface.scope.append(&row, &button).unwrap();

    signal::dispatch(&button, &RequestSignal::new("play"));
    signal::dispatch(
        &button,
        &RequestSignal::with_payload("seek", StateValue::Number(42.0)),
    );
    assert_eq!(source.commands(), vec!["play", "seek 42"]);
}

#[test]
fn test_request_does_not_rebubble_past_the_controller() {
    let surface = build_surface();
    let button = SurfaceNode::new("button");
    surface.scope.append(&surface.host, &button).unwrap();

    let above = Arc::new(std::sync::RwLock::new(0usize));
    let sink = Arc::clone(&above);
    surface.scope.root().on_request(Arc::new(move |_, _| {
        *sink.write().unwrap() += 1;
        pmonode::SignalOutcome::Consumed
    }));

    signal::dispatch(&button, &RequestSignal::new("pause"));
    assert_eq!(*above.read().unwrap(), 0);
}

#[test]
fn test_malformed_payload_is_skipped_without_state_change() {
    let surface = build_surface();
    let source = FakeMediaSource::new();
    surface
        .controller
        .adopt_source(Arc::clone(&source) as Arc<dyn MediaSource>)
        .unwrap();

    let button = SurfaceNode::new("button");
    surface.scope.append(&surface.host, &button).unwrap();
    signal::dispatch(
        &button,
        &RequestSignal::with_payload("seek", StateValue::Text("ten".to_string())),
    );

    assert!(source.commands().is_empty());
    assert_eq!(surface.controller.get_state(StateKey::CurrentTime), None);
}

#[test]
fn test_requests_never_touch_the_store_directly() {
    let surface = build_surface();
    let source = FakeMediaSource::new();
    surface
        .controller
        .adopt_source(Arc::clone(&source) as Arc<dyn MediaSource>)
        .unwrap();

    surface
        .controller
        .submit_request(&RequestSignal::new("play"));
    // Command went out, but paused only changes when the source notifies.
    assert_eq!(source.commands(), vec!["play"]);
    assert_eq!(surface.controller.get_state(StateKey::Paused), None);

    source.emit(MediaNotification::Play);
    assert_eq!(
        surface.controller.get_state(StateKey::Paused),
        Some(StateValue::Flag(false))
    );
}

#[test]
fn test_marked_node_is_adopted_and_feeds_the_store() {
    let surface = build_surface();
    let source = FakeMediaSource::with_initial(vec![
        MediaNotification::DurationChange(61.0),
        MediaNotification::Pause,
    ]);

    let video = SurfaceNode::new("video");
    video.attach(Arc::new(SourceHandle::new(
        Arc::clone(&source) as Arc<dyn MediaSource>
    )));
    video.set_attribute(ATTR_MEDIA_MARKER, "");
    surface.scope.append(&surface.host, &video).unwrap();

    assert!(surface.controller.source_adopted());
    assert!(source.sink_installed());
    assert_eq!(
        surface.controller.get_state(StateKey::Duration),
        Some(StateValue::Number(61.0))
    );
    assert_eq!(
        surface.controller.get_state(StateKey::Paused),
        Some(StateValue::Flag(true))
    );
}

#[test]
fn test_first_marked_node_wins() {
    let surface = build_surface();
    let first = FakeMediaSource::new();
    let second = FakeMediaSource::new();

    for source in [&first, &second] {
        let video = SurfaceNode::new("video");
        video.attach(Arc::new(SourceHandle::new(
            Arc::clone(source) as Arc<dyn MediaSource>
        )));
        video.set_attribute(ATTR_MEDIA_MARKER, "");
        surface.scope.append(&surface.host, &video).unwrap();
    }

    assert!(first.sink_installed());
    assert!(!second.sink_installed());
}

#[test]
fn test_adopting_a_new_source_tears_down_the_previous_sink() {
    let surface = build_surface();
    let first = FakeMediaSource::new();
    let second = FakeMediaSource::new();

    surface
        .controller
        .adopt_source(Arc::clone(&first) as Arc<dyn MediaSource>)
        .unwrap();
    assert!(first.sink_installed());

    surface
        .controller
        .adopt_source(Arc::clone(&second) as Arc<dyn MediaSource>)
        .unwrap();
    assert!(!first.sink_installed());
    assert!(second.sink_installed());
}

#[test]
fn test_source_without_transport_is_rejected() {
    let surface = build_surface();
    let source = FakeMediaSource::transportless();

    let result = surface
        .controller
        .adopt_source(Arc::clone(&source) as Arc<dyn MediaSource>);
    assert!(result.is_err());
    assert!(!surface.controller.source_adopted());
    assert!(!source.sink_installed());
}

#[test]
fn test_removing_the_source_node_detaches_the_source() {
    let surface = build_surface();
    let source = FakeMediaSource::new();

    let video = SurfaceNode::new("video");
    video.attach(Arc::new(SourceHandle::new(
        Arc::clone(&source) as Arc<dyn MediaSource>
    )));
    video.set_attribute(ATTR_MEDIA_MARKER, "");
    surface.scope.append(&surface.host, &video).unwrap();
    assert!(surface.controller.source_adopted());

    surface.scope.remove(&video).unwrap();
    assert!(!surface.controller.source_adopted());
    assert!(!source.sink_installed());
}

#[test]
fn test_by_reference_receiver_across_boundaries() {
    let surface = build_surface();
    surface
        .controller
        .set_state(StateKey::Paused, StateValue::Flag(true))
        .unwrap();

    // A panel with its own encapsulated scope, unrelated to the host
    // subtree.
    let panel = SurfaceNode::new("panel");
    surface.scope.append(&surface.scope.root(), &panel).unwrap();
    let inner = surface.scope.nested("panel-root");
    panel.host_scope(Arc::clone(&inner));

    let remote = mirror_node("display", "paused");
    remote.set_attribute(ATTR_CONTROLLER_REF, "main-surface");
    inner.append(&inner.root(), &remote).unwrap();

    // Registered by reference, snapshot applied immediately.
    assert!(remote.has_attribute("paused"));

    surface
        .controller
        .set_state(StateKey::Paused, StateValue::Flag(false))
        .unwrap();
    assert!(!remote.has_attribute("paused"));
}

#[test]
fn test_repointing_the_reference_moves_the_registration() {
    let surface = build_surface();

    let other_host = SurfaceNode::with_id("surface", "other-surface");
    surface
        .scope
        .append(&surface.scope.root(), &other_host)
        .unwrap();
    let other = SurfaceController::with_config(
        &other_host,
        SurfaceConfig::default(),
        Arc::new(pmosurface::ManualFrameClock::new()),
    )
    .unwrap();

    let remote = mirror_node("display", "paused");
    surface.scope.append(&surface.scope.root(), &remote).unwrap();
    remote.set_attribute(ATTR_CONTROLLER_REF, "main-surface");
    assert_eq!(surface.controller.receiver_count(), 1);
    assert_eq!(other.receiver_count(), 0);

    remote.set_attribute(ATTR_CONTROLLER_REF, "other-surface");
    assert_eq!(surface.controller.receiver_count(), 0);
    assert_eq!(other.receiver_count(), 1);
}

#[test]
fn test_resolve_for_finds_the_controller_through_the_document() {
    let surface = build_surface();

    let panel = SurfaceNode::new("panel");
    surface.scope.append(&surface.scope.root(), &panel).unwrap();
    let inner = surface.scope.nested("panel-root");
    panel.host_scope(Arc::clone(&inner));

    let remote = mirror_node("display", "paused");
    remote.set_attribute(ATTR_CONTROLLER_REF, "main-surface");
    inner.append(&inner.root(), &remote).unwrap();

    let resolved = SurfaceController::resolve_for(&remote).unwrap();
    assert_eq!(resolved.id(), "main-surface");
    assert!(Arc::ptr_eq(&resolved, &surface.controller));

    // Unresolvable references resolve to nothing, silently.
    remote.set_attribute(ATTR_CONTROLLER_REF, "missing-surface");
    assert!(SurfaceController::resolve_for(&remote).is_none());
}

#[test]
fn test_unresolved_reference_is_silently_retried() {
    let surface = build_surface();
    // References an id that resolves to nothing: nobody registers, and
    // nothing throws.
    let remote = mirror_node("display", "paused");
    remote.set_attribute(ATTR_CONTROLLER_REF, "missing-surface");
    surface.scope.append(&surface.scope.root(), &remote).unwrap();
    assert_eq!(surface.controller.receiver_count(), 0);

    // Later mutation points it at a live controller.
    remote.set_attribute(ATTR_CONTROLLER_REF, "main-surface");
    assert_eq!(surface.controller.receiver_count(), 1);
}

#[test]
fn test_moving_a_receiver_causes_no_churn() {
    let surface = build_surface();
    let row = SurfaceNode::new("row");
    surface.scope.append(&surface.host, &row).unwrap();

    let (slider, seen) = slot_node("slider", StateKey::CurrentTime);
    surface.scope.append(&surface.host, &slider).unwrap();
    surface
        .controller
        .set_state(StateKey::CurrentTime, StateValue::Number(5.0))
        .unwrap();
    assert_eq!(seen.read().unwrap().len(), 1);

    // Move inside the surface: registration survives, no snapshot
    // re-send.
    surface.scope.move_to(&row, &slider).unwrap();
    assert_eq!(surface.controller.receiver_count(), 1);
    assert_eq!(seen.read().unwrap().len(), 1);

    // Still live after the move.
    surface
        .controller
        .set_state(StateKey::CurrentTime, StateValue::Number(6.0))
        .unwrap();
    assert_eq!(seen.read().unwrap().len(), 2);
}

#[test]
fn test_moving_a_receiver_out_of_the_surface_unregisters_it() {
    let surface = build_surface();
    let outside = SurfaceNode::new("sidebar");
    surface
        .scope
        .append(&surface.scope.root(), &outside)
        .unwrap();

    let display = mirror_node("display", "paused");
    surface.scope.append(&surface.host, &display).unwrap();
    assert_eq!(surface.controller.receiver_count(), 1);

    surface.scope.move_to(&outside, &display).unwrap();
    assert_eq!(surface.controller.receiver_count(), 0);
}

#[test]
fn test_undefined_kind_registers_once_defined() {
    let surface = build_surface();
    surface
        .controller
        .set_state(StateKey::CurrentTime, StateValue::Number(9.0))
        .unwrap();

    let widget = mirror_node("time-display", "current-time");
    surface.scope.append(&surface.host, &widget).unwrap();
    // Custom kind not defined yet: parked, no mirror.
    assert_eq!(surface.controller.receiver_count(), 0);
    assert!(!widget.has_attribute("current-time"));

    surface.scope.kinds().define("time-display");
    assert_eq!(surface.controller.receiver_count(), 1);
    assert_eq!(widget.attribute("current-time").as_deref(), Some("9"));
}

#[test]
fn test_show_subtitles_uses_the_source_track_list() {
    let surface = build_surface();
    let source = FakeMediaSource::new();
    *source.tracks.write().unwrap() = vec![
        MediaTrack::new("subtitles", "en", "English"),
        MediaTrack::new("subtitles", "fr", "Français"),
    ];
    surface
        .controller
        .adopt_source(Arc::clone(&source) as Arc<dyn MediaSource>)
        .unwrap();

    surface
        .controller
        .submit_request(&RequestSignal::new("show-subtitles"));
    surface
        .controller
        .submit_request(&RequestSignal::with_payload(
            "show-subtitles",
            StateValue::Text("fr".to_string()),
        ));
    assert_eq!(
        source.commands(),
        vec!["show-subtitles en", "show-subtitles fr"]
    );
}

#[test]
fn test_aux_signals_share_the_propagation_path() {
    let surface = build_surface();
    let display = mirror_node("display", "fullscreen cast-available");
    surface.scope.append(&surface.host, &display).unwrap();

    surface
        .controller
        .ingest_aux(pmosurface::AuxSignal::FullscreenChange(true));
    surface
        .controller
        .ingest_aux(pmosurface::AuxSignal::CastAvailability(true));

    assert!(display.has_attribute("fullscreen"));
    assert!(display.has_attribute("cast-available"));

    surface
        .controller
        .ingest_aux(pmosurface::AuxSignal::FullscreenChange(false));
    assert!(!display.has_attribute("fullscreen"));
}

#[test]
fn test_volume_notifications_derive_the_volume_level() {
    let surface = build_surface();
    let source = FakeMediaSource::new();
    surface
        .controller
        .adopt_source(Arc::clone(&source) as Arc<dyn MediaSource>)
        .unwrap();

    source.emit(MediaNotification::VolumeChange {
        volume: 0.9,
        muted: false,
    });
    assert_eq!(
        surface.controller.get_state(StateKey::VolumeLevel),
        Some(StateValue::Text("high".to_string()))
    );

    source.emit(MediaNotification::VolumeChange {
        volume: 0.9,
        muted: true,
    });
    assert_eq!(
        surface.controller.get_state(StateKey::VolumeLevel),
        Some(StateValue::Text("off".to_string()))
    );
}

#[test]
fn test_buffered_range_mirrors_as_a_pair() {
    let surface = build_surface();
    let source = FakeMediaSource::new();
    surface
        .controller
        .adopt_source(Arc::clone(&source) as Arc<dyn MediaSource>)
        .unwrap();
    let display = mirror_node("display", "buffered");
    surface.scope.append(&surface.host, &display).unwrap();

    source.emit(MediaNotification::Progress(TimeRange::new(0.0, 42.5)));
    assert_eq!(display.attribute("buffered").as_deref(), Some("0:42.5"));
}
