mod helpers;

use helpers::*;
use upnp_api::{
    ActionArgs, ApiError, BrowseRequest, BrowseResult, DidlLite, PositionInfo, TransportInfo,
    UpnpClient, ROOT_OBJECT_ID,
};

#[test]
fn test_transport_info_round_trip() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upnp/control/avtransport1")
        .match_header("soapaction", format!("\"{}#GetTransportInfo\"", AVT_TYPE).as_str())
        .match_body(mockito::Matcher::Regex("<InstanceID>0</InstanceID>".to_string()))
        .with_status(200)
        .with_body(soap_response(
            AVT_TYPE,
            "GetTransportInfo",
            &[
                ("CurrentTransportState", "PAUSED_PLAYBACK"),
                ("CurrentTransportStatus", "OK"),
                ("CurrentSpeed", "1"),
            ],
        ))
        .create();

    let client = UpnpClient::new();
    let mut out = TransportInfo::out_args();
    client
        .send_action(
            &format!("{}/upnp/control/avtransport1", server.url()),
            AVT_TYPE,
            "GetTransportInfo",
            &ActionArgs::new().with("InstanceID", 0u32),
            &mut out,
        )
        .unwrap();

    mock.assert();
    let info = TransportInfo::from_args(&out);
    assert_eq!(info.state(), upnp_api::PlaybackState::Paused);
    assert_eq!(info.current_transport_status, "OK");
}

#[test]
fn test_fault_is_reported() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/ctl")
        .with_status(500)
        .with_body(soap_fault(701, "Transition not available"))
        .create();

    let client = UpnpClient::new();
    let err = client
        .send_action(
            &format!("{}/ctl", server.url()),
            AVT_TYPE,
            "Pause",
            &ActionArgs::new().with("InstanceID", 0u32),
            &mut ActionArgs::new(),
        )
        .unwrap_err();

    match err {
        ApiError::SoapFault { code, description } => {
            assert_eq!(code, 701);
            assert_eq!(description, "Transition not available");
        }
        other => panic!("expected fault, got {:?}", other),
    }
}

#[test]
fn test_missing_output_is_reported() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/ctl")
        .with_status(200)
        .with_body(soap_response(AVT_TYPE, "GetPositionInfo", &[("Track", "1")]))
        .create();

    let client = UpnpClient::new();
    let mut out = PositionInfo::out_args();
    let err = client
        .send_action(
            &format!("{}/ctl", server.url()),
            AVT_TYPE,
            "GetPositionInfo",
            &ActionArgs::new().with("InstanceID", 0u32),
            &mut out,
        )
        .unwrap_err();

    assert!(matches!(err, ApiError::MissingArgument(name) if name == "TrackDuration"));
}

#[test]
fn test_unreachable_device_is_network_error() {
    let client = UpnpClient::new();
    let err = client
        .send_action(
            "http://127.0.0.1:1/ctl",
            AVT_TYPE,
            "Stop",
            &ActionArgs::new().with("InstanceID", 0u32),
            &mut ActionArgs::new(),
        )
        .unwrap_err();

    assert!(matches!(err, ApiError::NetworkError(_)));
}

#[test]
fn test_browse_root_children() {
    let didl = load_fixture("browse_root.xml");
    let escaped = xml_escape(&didl);
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/ctl/ContentDir")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex("<ObjectID>0</ObjectID>".to_string()),
            mockito::Matcher::Regex("<BrowseFlag>BrowseDirectChildren</BrowseFlag>".to_string()),
            mockito::Matcher::Regex("<RequestedCount>64</RequestedCount>".to_string()),
        ]))
        .with_status(200)
        .with_body(soap_response(
            CDS_TYPE,
            "Browse",
            &[
                ("Result", escaped.as_str()),
                ("NumberReturned", "3"),
                ("TotalMatches", "3"),
                ("UpdateID", "17"),
            ],
        ))
        .create();

    let client = UpnpClient::new();
    let mut out = BrowseResult::out_args();
    client
        .send_action(
            &format!("{}/ctl/ContentDir", server.url()),
            CDS_TYPE,
            "Browse",
            &BrowseRequest::direct_children(ROOT_OBJECT_ID, 0).to_args(),
            &mut out,
        )
        .unwrap();

    mock.assert();
    let result = BrowseResult::from_args(&out);
    assert!(result.count_matches());
    assert_eq!(result.update_id, 17);
    let titles: Vec<_> = result.containers.iter().map(|c| c.object.title.as_str()).collect();
    assert_eq!(titles, vec!["Music", "Video", "Pictures"]);
    assert_eq!(result.containers[2].child_count, Some(0));
    assert!(result.items.is_empty());
    assert_eq!(result.didl.trim(), didl.trim());
}

#[test]
fn test_track_metadata_fixture() {
    let didl = DidlLite::parse(&load_fixture("track_metadata.xml")).unwrap();
    let item = didl.first_item().unwrap();

    assert_eq!(item.object.title, "Blue in Green");
    assert_eq!(item.object.artist, "Miles Davis");
    assert_eq!(item.object.album, "Kind of Blue");
    assert_eq!(item.object.icon, "http://192.168.1.10:8200/AlbumArt/12-345.jpg");
    let res = item.first_resource().unwrap();
    assert_eq!(res.url, "http://192.168.1.10:8200/MediaItems/345.mp3");
    assert_eq!(res.duration.as_deref(), Some("0:05:37.000"));
    assert_eq!(upnp_api::time_to_seconds(res.duration.as_deref().unwrap()), 337);
}
