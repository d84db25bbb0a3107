//! Control point behaviour over an in-memory transport

mod helpers;

use std::thread;
use std::time::Duration;

use helpers::{
    control_point, control_point_with_icons, last_change, renderer_device, server_device,
    track_didl, with_icon, Recorder,
};
use mediacp::{Action, ControlConfig, DeviceProxy, PlaybackState};
use upnp_api::{ArgValue, Service};

fn with_recorder(config: ControlConfig) -> (mediacp::MediaControl, std::sync::Arc<helpers::MockTransport>, Recorder) {
    let (control, transport) = control_point(config);
    let recorder = Recorder::new();
    control.subscribe_hook("recorder", recorder.hook());
    (control, transport, recorder)
}

#[test]
fn test_preferred_renderer_is_selected_when_found() {
    let (control, transport, recorder) = with_recorder(ControlConfig {
        preferred_renderer: "Living Room".to_string(),
        ..ControlConfig::default()
    });

    transport.announce(renderer_device("udn-1", "Living Room"));

    assert!(control.renderer_is_active("udn-1"));
    let events = recorder.events();
    assert_eq!(events[0], "renderer_found udn-1");
    assert_eq!(events[1], "renderer_selected udn-1");
    // Selection republishes the live state
    assert!(events.contains(&"volume udn-1 0".to_string()));
    assert!(events.contains(&"mute udn-1 false".to_string()));
    assert!(events.contains(&"transport_state udn-1 UNKNOWN".to_string()));
    assert!(events.contains(&"duration udn-1 0".to_string()));
}

#[test]
fn test_other_renderers_are_not_auto_selected() {
    let (control, transport, recorder) = with_recorder(ControlConfig {
        preferred_renderer: "Living Room".to_string(),
        ..ControlConfig::default()
    });

    transport.announce(renderer_device("udn-2", "Kitchen"));

    assert!(!control.renderer_exists());
    assert_eq!(recorder.events(), vec!["renderer_found udn-2"]);
}

#[test]
fn test_preferred_name_set_later_selects_known_renderer() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-2", "Kitchen"));
    assert!(!control.renderer_exists());

    control.set_preferred_renderer("Kitchen");

    assert!(control.renderer_is_active("udn-2"));
}

#[test]
fn test_preferred_server_is_selected_when_found() {
    let (control, transport, recorder) = with_recorder(ControlConfig {
        preferred_server: "NAS".to_string(),
        ..ControlConfig::default()
    });

    transport.announce(server_device("srv-1", "NAS"));

    assert!(control.server_is_active("srv-1"));
    assert_eq!(
        recorder.events(),
        vec!["server_found srv-1", "server_selected srv-1"]
    );
}

#[test]
fn test_losing_selected_renderer_clears_selection_before_lost() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    recorder.clear();

    transport.lose(renderer_device("udn-1", "Living Room"));

    assert_eq!(
        recorder.events(),
        vec!["renderer_selected none", "renderer_lost udn-1"]
    );
    assert!(!control.renderer_exists());
    assert!(control.get_renderer("udn-1").is_none());
    assert_eq!(transport.unsubscribed(), vec!["udn-1"]);
}

#[test]
fn test_losing_unselected_renderer_keeps_selection() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    transport.announce(renderer_device("udn-2", "Kitchen"));
    control.set_renderer("udn-1");
    recorder.clear();

    transport.lose(renderer_device("udn-2", "Kitchen"));

    assert_eq!(recorder.events(), vec!["renderer_lost udn-2"]);
    assert!(control.renderer_is_active("udn-1"));
}

#[test]
fn test_lost_notification_without_udn_matches_by_location() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(server_device("srv-1", "NAS"));
    control.set_server("srv-1");
    recorder.clear();

    let mut partial = server_device("srv-1", "");
    partial.udn = String::new();
    transport.lose(partial);

    assert_eq!(
        recorder.events(),
        vec!["server_selected none", "server_lost srv-1"]
    );
    assert!(control.servers().is_empty());
}

#[test]
fn test_selecting_unknown_udn_clears_selection() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    recorder.clear();

    control.set_renderer("udn-404");

    assert!(!control.renderer_exists());
    assert_eq!(recorder.events(), vec!["renderer_selected none"]);

    transport.lose(renderer_device("udn-1", "Living Room"));
    recorder.clear();
    control.set_renderer("udn-1");
    assert_eq!(recorder.events(), vec!["renderer_selected none"]);
}

#[test]
fn test_duplicate_found_is_ignored() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());

    transport.announce(renderer_device("udn-1", "Living Room"));
    transport.announce(renderer_device("udn-1", "Living Room"));

    assert_eq!(control.renderers().len(), 1);
    assert_eq!(recorder.events(), vec!["renderer_found udn-1"]);
    assert_eq!(transport.subscription_count("udn-1"), 2);
}

#[test]
fn test_found_again_while_subscribing_keeps_subscriptions() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.on_next_subscribe(|transport| {
        transport.announce(renderer_device("udn-1", "Living Room"));
    });

    transport.announce(renderer_device("udn-1", "Living Room"));

    assert_eq!(control.renderers().len(), 1);
    assert_eq!(recorder.events(), vec!["renderer_found udn-1"]);
    assert_eq!(transport.subscription_count("udn-1"), 2);
    assert!(transport.unsubscribed().is_empty());
}

#[test]
fn test_lost_while_subscribing_is_never_indexed() {
    let (control, transport, recorder) = with_recorder(ControlConfig {
        preferred_renderer: "Living Room".to_string(),
        ..ControlConfig::default()
    });
    transport.on_next_subscribe(|transport| {
        transport.lose(renderer_device("udn-1", "Living Room"));
    });

    transport.announce(renderer_device("udn-1", "Living Room"));

    assert!(control.renderers().is_empty());
    assert!(!control.renderer_exists());
    assert!(recorder.events().is_empty());
    assert_eq!(transport.subscription_count("udn-1"), 0);
    assert_eq!(transport.unsubscribed(), vec!["udn-1"]);

    transport.announce(renderer_device("udn-1", "Living Room"));
    assert!(control.renderer_is_active("udn-1"));
}

#[test]
fn test_events_of_inactive_renderer_are_suppressed() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    transport.announce(renderer_device("udn-2", "Kitchen"));
    control.set_renderer("udn-1");
    recorder.clear();

    transport.notify("udn-2", Service::RenderingControl, &last_change(&[("Volume", "40")]));
    assert!(recorder.events().is_empty());

    transport.notify(
        "udn-1",
        Service::RenderingControl,
        &last_change(&[("Volume", "25"), ("Mute", "1")]),
    );
    let events = recorder.events();
    assert!(events.contains(&"volume udn-1 25".to_string()));
    assert!(events.contains(&"mute udn-1 true".to_string()));
}

#[test]
fn test_av_transport_events_are_decoded() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    recorder.clear();

    let metadata = track_didl("64$1", "Blue in Green", "http://nas/blue.flac");
    transport.notify(
        "udn-1",
        Service::AVTransport,
        &last_change(&[
            ("TransportState", "PAUSED_PLAYBACK"),
            ("CurrentTrackDuration", "0:05:37"),
            ("CurrentTrackMetaData", &metadata),
        ]),
    );

    let events = recorder.events();
    assert!(events.contains(&"duration udn-1 337".to_string()));
    assert!(events.contains(&"metadata udn-1 Blue in Green".to_string()));
    assert!(events.contains(&"transport_state udn-1 PAUSED_PLAYBACK".to_string()));
    assert_eq!(
        control.current_renderer().map(|r| r.state()),
        Some(PlaybackState::Paused)
    );
}

#[test]
fn test_mute_event_accepts_upnp_boolean_spellings() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    recorder.clear();

    for value in ["TRUE", "yes", "0", "False", "maybe"] {
        transport.notify("udn-1", Service::RenderingControl, &last_change(&[("Mute", value)]));
    }

    assert_eq!(
        recorder.events(),
        vec![
            "mute udn-1 true",
            "mute udn-1 true",
            "mute udn-1 false",
            "mute udn-1 false",
        ]
    );
}

#[test]
fn test_malformed_event_changes_nothing() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    recorder.clear();

    transport.notify("udn-1", Service::AVTransport, "<Event><InstanceID val=\"0\">");

    assert!(recorder.events().is_empty());
}

#[test]
fn test_play_pause_follows_reported_state() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");

    let report = |state: &str| {
        transport.notify(
            "udn-1",
            Service::AVTransport,
            &last_change(&[("TransportState", state)]),
        )
    };

    transport.clear_sent();
    control.action(Action::PlayPause);
    assert!(transport.commands().is_empty(), "unknown state issues nothing");

    report("STOPPED");
    control.action(Action::PlayPause);
    assert_eq!(transport.commands(), vec!["Play"]);

    report("PLAYING");
    control.action(Action::PlayPause);
    assert_eq!(transport.commands(), vec!["Play", "Pause"]);

    report("TRANSITIONING");
    control.action(Action::PlayPause);
    assert_eq!(transport.commands(), vec!["Play", "Pause"]);

    let play = transport.last("Play").unwrap();
    assert_eq!(play.input.get_str("Speed"), Some("1"));
}

#[test]
fn test_actions_without_renderer_do_nothing() {
    let (control, transport, _) = with_recorder(ControlConfig::default());

    for action in [Action::PlayPause, Action::VolumeUp, Action::Stop, Action::SeekForward] {
        control.action(action);
    }

    assert!(transport.sent().is_empty());
    assert_eq!(control.current_time(), None);
    assert!(control.seek(30).is_ok());
}

#[test]
fn test_volume_steps_are_clamped_to_live_volume() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");

    transport.respond("GetVolume", &[("CurrentVolume", "98")]);
    control.action(Action::VolumeUp);
    let set = transport.last("SetVolume").unwrap();
    assert_eq!(set.input.get_uint("DesiredVolume"), Some(100));
    assert_eq!(set.input.get_str("Channel"), Some("Master"));

    transport.respond("GetVolume", &[("CurrentVolume", "3")]);
    control.action(Action::VolumeDown);
    assert_eq!(
        transport.last("SetVolume").unwrap().input.get_uint("DesiredVolume"),
        Some(0)
    );
}

#[test]
fn test_toggle_mute_inverts_device_state() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");

    transport.respond("GetMute", &[("CurrentMute", "1")]);
    control.action(Action::ToggleMute);

    assert_eq!(
        transport.last("SetMute").unwrap().input.get_bool("DesiredMute"),
        Some(false)
    );
}

#[test]
fn test_seek_steps_use_live_position() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");

    transport.respond("GetPositionInfo", &[("AbsTime", "0:01:00"), ("RelTime", "0:01:00")]);
    control.action(Action::SeekForward);
    let seek = transport.last("Seek").unwrap();
    assert_eq!(seek.input.get_str("Unit"), Some("ABS_TIME"));
    assert_eq!(seek.input.get_str("Target"), Some("00:01:10"));

    transport.respond("GetPositionInfo", &[("AbsTime", "0:00:05"), ("RelTime", "0:00:05")]);
    control.action(Action::SeekBackward);
    assert_eq!(
        transport.last("Seek").unwrap().input.get_str("Target"),
        Some("00:00:00")
    );
}

#[test]
fn test_seek_percent_uses_track_duration() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    transport.respond("GetPositionInfo", &[("TrackDuration", "0:04:00")]);

    control.seek_percent(50.0).unwrap();

    assert_eq!(
        transport.last("Seek").unwrap().input.get_str("Target"),
        Some("00:02:00")
    );
}

#[test]
fn test_seek_publishes_position_at_once() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    recorder.clear();
    transport.respond("GetPositionInfo", &[("AbsTime", "0:02:00"), ("TrackDuration", "0:04:00")]);

    control.seek(120).unwrap();

    // No clock is running: the renderer never reported PLAYING
    assert_eq!(recorder.events(), vec!["time udn-1 120"]);
    assert_eq!(transport.commands(), vec!["Seek"]);
}

#[test]
fn test_failed_action_is_swallowed() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    transport.fail("Stop");

    control.action(Action::Stop);

    assert_eq!(transport.last("Stop").map(|s| s.udn), Some("udn-1".to_string()));
}

#[test]
fn test_every_action_starts_with_instance_id() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    transport.announce(server_device("srv-1", "NAS"));
    control.set_renderer("udn-1");
    control.set_server("srv-1");

    control.action(Action::Stop);
    control.browse("0", 0).unwrap();

    let sent = transport.sent();
    assert!(!sent.is_empty());
    for action in sent {
        let first = action.input.iter().next().map(|(name, value)| (name.to_string(), value.clone()));
        assert_eq!(first, Some(("InstanceID".to_string(), ArgValue::UInt(0))), "{}", action.action);
    }
}

#[test]
fn test_browse_without_server_is_empty() {
    let (control, transport, _) = with_recorder(ControlConfig::default());

    let result = control.browse("0", 0).unwrap();

    assert!(result.containers.is_empty() && result.items.is_empty());
    assert!(transport.sent().is_empty());
}

#[test]
fn test_browse_count_mismatch_returns_what_parsed() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(server_device("srv-1", "NAS"));
    control.set_server("srv-1");
    let didl = track_didl("64$1", "Blue in Green", "http://nas/blue.flac");
    transport.respond(
        "Browse",
        &[
            ("Result", didl.as_str()),
            ("NumberReturned", "2"),
            ("TotalMatches", "2"),
            ("UpdateID", "7"),
        ],
    );

    let result = control.browse("0", 0).unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.number_returned, 2);
    assert!(!result.count_matches());

    let browse = transport.last("Browse").unwrap();
    assert_eq!(browse.service, Service::ContentDirectory);
    assert_eq!(browse.input.get_str("ObjectID"), Some("0"));
    assert_eq!(browse.input.get_str("BrowseFlag"), Some("BrowseDirectChildren"));
    assert_eq!(browse.input.get_uint("StartingIndex"), Some(0));
    assert_eq!(browse.input.get_uint("RequestedCount"), Some(64));
}

#[test]
fn test_browse_error_is_returned() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(server_device("srv-1", "NAS"));
    control.set_server("srv-1");
    transport.fail("Browse");

    assert!(control.browse("0", 0).is_err());
}

#[test]
fn test_browse_metadata_loads_first_resource() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    transport.announce(server_device("srv-1", "NAS"));
    control.set_renderer("udn-1");
    control.set_server("srv-1");
    let didl = track_didl("64$1", "Blue in Green", "http://nas/blue.flac");
    transport.respond(
        "Browse",
        &[("Result", didl.as_str()), ("NumberReturned", "1"), ("TotalMatches", "1")],
    );
    transport.clear_sent();

    control.browse_metadata("64$1").unwrap();

    assert_eq!(
        transport.actions(Service::AVTransport),
        vec!["Stop", "SetAVTransportURI", "Play"]
    );
    let browse = transport.last("Browse").unwrap();
    assert_eq!(browse.input.get_str("BrowseFlag"), Some("BrowseMetadata"));
    let load = transport.last("SetAVTransportURI").unwrap();
    assert_eq!(load.udn, "udn-1");
    assert_eq!(load.input.get_str("CurrentURI"), Some("http://nas/blue.flac"));
    assert_eq!(load.input.get_str("CurrentURIMetaData"), Some(didl.as_str()));
}

#[test]
fn test_browse_metadata_of_container_plays_nothing() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    transport.announce(server_device("srv-1", "NAS"));
    control.set_renderer("udn-1");
    control.set_server("srv-1");
    transport.respond(
        "Browse",
        &[(
            "Result",
            r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/"><container id="1" parentID="0" restricted="1"><dc:title>Music</dc:title></container></DIDL-Lite>"#,
        ), ("NumberReturned", "1")],
    );
    transport.clear_sent();

    control.browse_metadata("1").unwrap();

    assert!(transport.actions(Service::AVTransport).is_empty());
}

#[test]
fn test_browse_metadata_without_renderer_is_noop() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(server_device("srv-1", "NAS"));
    control.set_server("srv-1");

    control.browse_metadata("64$1").unwrap();

    assert!(transport.sent().is_empty());
}

#[test]
fn test_delta_changes_reach_hooks() {
    let (control, _, recorder) = with_recorder(ControlConfig::default());

    control.set_volume_delta(7);
    control.set_seek_delta(30);

    assert_eq!(recorder.events(), vec!["volume_delta 7", "seek_delta 30"]);
    assert_eq!((control.volume_delta(), control.seek_delta()), (7, 30));
}

#[test]
fn test_unsubscribed_hook_stops_receiving() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());

    assert!(control.unsubscribe_hook("recorder"));
    assert!(!control.unsubscribe_hook("recorder"));
    transport.announce(renderer_device("udn-1", "Living Room"));

    assert!(recorder.events().is_empty());
}

#[test]
fn test_hooks_receive_independently() {
    let (control, transport, first) = with_recorder(ControlConfig::default());
    let second = Recorder::new();
    control.subscribe_hook("second", second.hook());

    transport.announce(server_device("srv-1", "NAS"));

    assert_eq!(first.events(), vec!["server_found srv-1"]);
    assert_eq!(second.events(), vec!["server_found srv-1"]);
}

#[test]
fn test_hook_may_call_back_into_control() {
    let (control, transport) = control_point(ControlConfig::default());
    let inner = control.clone();
    control.subscribe_hook(
        "auto-select",
        mediacp::MediaHook::new().on_renderer_found(move |renderer| {
            inner.set_renderer(renderer.udn());
        }),
    );

    transport.announce(renderer_device("udn-1", "Living Room"));

    assert!(control.renderer_is_active("udn-1"));
}

#[test]
fn test_clock_stops_with_lost_renderer() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    transport.respond("GetPositionInfo", &[("AbsTime", "0:00:42"), ("TrackDuration", "0:01:24")]);

    transport.notify(
        "udn-1",
        Service::AVTransport,
        &last_change(&[("TransportState", "PLAYING")]),
    );
    thread::sleep(Duration::from_millis(1500));
    let ticks = recorder
        .events()
        .iter()
        .filter(|event| event.as_str() == "time udn-1 42")
        .count();
    assert!(ticks >= 2, "immediate publish plus at least one tick, got {}", ticks);

    transport.lose(renderer_device("udn-1", "Living Room"));
    recorder.clear();
    thread::sleep(Duration::from_millis(1500));

    assert!(recorder.events().iter().all(|event| !event.starts_with("time")));
}

#[test]
fn test_repeated_playing_restarts_single_clock() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");
    transport.respond("GetPositionInfo", &[("AbsTime", "0:00:42"), ("TrackDuration", "0:01:24")]);

    for _ in 0..3 {
        transport.notify("udn-1", Service::AVTransport, &last_change(&[("TransportState", "PLAYING")]));
    }
    recorder.clear();
    thread::sleep(Duration::from_millis(2500));

    let ticks = recorder
        .events()
        .iter()
        .filter(|event| event.starts_with("time udn-1"))
        .count();
    assert!(
        (1..=3).contains(&ticks),
        "one clock ticks about twice in 2.5 s, got {} ticks",
        ticks
    );
}

#[test]
fn test_leaving_playing_stops_clock() {
    let (control, transport, recorder) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    control.set_renderer("udn-1");

    transport.notify("udn-1", Service::AVTransport, &last_change(&[("TransportState", "PLAYING")]));
    transport.notify("udn-1", Service::AVTransport, &last_change(&[("TransportState", "STOPPED")]));
    recorder.clear();
    thread::sleep(Duration::from_millis(1500));

    assert!(recorder.events().is_empty());
}

#[test]
fn test_shutdown_forgets_devices() {
    let (control, transport, _) = with_recorder(ControlConfig::default());
    transport.announce(renderer_device("udn-1", "Living Room"));
    transport.announce(server_device("srv-1", "NAS"));
    control.set_renderer("udn-1");

    control.shutdown();

    assert!(control.renderers().is_empty());
    assert!(control.servers().is_empty());
    assert!(!control.renderer_exists());
    transport.announce(renderer_device("udn-2", "Kitchen"));
    assert!(control.renderers().is_empty());
}

fn wait_for<T>(mut check: impl FnMut() -> Option<T>) -> Option<T> {
    for _ in 0..100 {
        if let Some(value) = check() {
            return Some(value);
        }
        thread::sleep(Duration::from_millis(20));
    }
    None
}

#[test]
fn test_found_devices_get_cached_icons() {
    let (control, transport) = control_point_with_icons(ControlConfig::default());
    transport.serve("http://mock/udn-1/icon.png", b"renderer-png");
    transport.serve("http://mock/srv-1/icon.png", b"server-png");

    transport.announce(with_icon(
        renderer_device("udn-1", "Living Room"),
        "http://mock/udn-1/icon.png",
    ));
    transport.announce(with_icon(server_device("srv-1", "NAS"), "http://mock/srv-1/icon.png"));

    let renderer = control.get_renderer("udn-1").unwrap();
    let server = control.get_server("srv-1").unwrap();
    let renderer_icon = wait_for(|| renderer.icon()).expect("renderer icon cached");
    let server_icon = wait_for(|| server.icon()).expect("server icon cached");

    assert_eq!(std::fs::read(&renderer_icon).unwrap(), b"renderer-png");
    assert_eq!(std::fs::read(&server_icon).unwrap(), b"server-png");
    assert_ne!(renderer_icon, server_icon);

    control.shutdown();
    assert!(!renderer_icon.exists());
}

#[test]
fn test_icon_download_failure_leaves_icon_unset() {
    let (control, transport) = control_point_with_icons(ControlConfig::default());

    transport.announce(with_icon(
        renderer_device("udn-1", "Living Room"),
        "http://mock/udn-1/missing.png",
    ));
    transport.announce(renderer_device("udn-2", "Kitchen"));
    thread::sleep(Duration::from_millis(300));

    assert!(control.get_renderer("udn-1").unwrap().icon().is_none());
    assert!(control.get_renderer("udn-2").unwrap().icon().is_none());
}
