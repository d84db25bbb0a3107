//! Request and response types for the AVTransport and ContentDirectory
//! actions a control point uses.
//!
//! Each response type declares its output arguments with `out_args()` and
//! converts the decoded list back with `from_args()`, so callers never
//! handle argument names directly.

use crate::args::ActionArgs;
use crate::didl::{Container, DidlLite, Item};

pub const CHANNEL_MASTER: &str = "Master";
pub const CHANNEL_RF: &str = "RF";
pub const CHANNEL_LF: &str = "LF";

pub const PLAY_SPEED_NORMAL: &str = "1";

/// ContentDirectory root container.
pub const ROOT_OBJECT_ID: &str = "0";

/// Page size requested from servers.
pub const MAX_BROWSE: u32 = 64;

/// Transport state of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Unknown,
    Transitioning,
    Stopped,
    Paused,
    Playing,
}

impl PlaybackState {
    /// Map a `TransportState` value. Anything unrecognised is `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "STOPPED" => PlaybackState::Stopped,
            "PLAYING" => PlaybackState::Playing,
            "PAUSED_PLAYBACK" => PlaybackState::Paused,
            "TRANSITIONING" => PlaybackState::Transitioning,
            _ => PlaybackState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Unknown => "UNKNOWN",
            PlaybackState::Transitioning => "TRANSITIONING",
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Paused => "PAUSED_PLAYBACK",
            PlaybackState::Playing => "PLAYING",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Unit` argument of `Seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    TrackNr,
    AbsTime,
    RelTime,
    Section,
}

impl SeekMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeekMode::TrackNr => "TRACK_NR",
            SeekMode::AbsTime => "ABS_TIME",
            SeekMode::RelTime => "REL_TIME",
            SeekMode::Section => "SECTION",
        }
    }
}

/// Result of `GetTransportInfo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportInfo {
    pub current_transport_state: String,
    /// "OK" unless an error condition exists
    pub current_transport_status: String,
    /// Relative speed, e.g. "1" or "1/2"
    pub current_speed: String,
}

impl TransportInfo {
    pub fn out_args() -> ActionArgs {
        ActionArgs::new()
            .with("CurrentTransportState", "")
            .with("CurrentTransportStatus", "")
            .with("CurrentSpeed", "")
    }

    pub fn from_args(args: &ActionArgs) -> Self {
        let text = |name| args.get_str(name).unwrap_or_default().to_string();
        Self {
            current_transport_state: text("CurrentTransportState"),
            current_transport_status: text("CurrentTransportStatus"),
            current_speed: text("CurrentSpeed"),
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_name(&self.current_transport_state)
    }
}

/// Result of `GetPositionInfo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionInfo {
    pub track: u32,
    pub track_duration: String,
    /// DIDL-Lite of the current track
    pub track_meta_data: String,
    pub track_uri: String,
    pub rel_time: String,
    pub abs_time: String,
    pub rel_count: i64,
    pub abs_count: i64,
}

impl PositionInfo {
    pub fn out_args() -> ActionArgs {
        ActionArgs::new()
            .with("Track", 0u32)
            .with("TrackDuration", "")
            .with("TrackMetaData", "")
            .with("TrackURI", "")
            .with("RelTime", "")
            .with("AbsTime", "")
            // Signed on the wire and often 2147483647, so read as text
            .with("RelCount", "")
            .with("AbsCount", "")
    }

    pub fn from_args(args: &ActionArgs) -> Self {
        let text = |name| args.get_str(name).unwrap_or_default().to_string();
        let count = |name| {
            args.get_str(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or_default()
        };
        Self {
            track: args.get_uint("Track").unwrap_or_default(),
            track_duration: text("TrackDuration"),
            track_meta_data: text("TrackMetaData"),
            track_uri: text("TrackURI"),
            rel_time: text("RelTime"),
            abs_time: text("AbsTime"),
            rel_count: count("RelCount"),
            abs_count: count("AbsCount"),
        }
    }
}

/// Result of `GetMediaInfo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub nr_tracks: u32,
    pub media_duration: String,
    pub current_uri: String,
    pub current_uri_meta_data: String,
    pub next_uri: String,
    pub next_uri_meta_data: String,
    pub play_medium: String,
    pub record_medium: String,
    pub write_status: String,
}

impl MediaInfo {
    pub fn out_args() -> ActionArgs {
        ActionArgs::new()
            .with("NrTracks", 0u32)
            .with("MediaDuration", "")
            .with("CurrentURI", "")
            .with("CurrentURIMetaData", "")
            .with("NextURI", "")
            .with("NextURIMetaData", "")
            .with("PlayMedium", "")
            .with("RecordMedium", "")
            .with("WriteStatus", "")
    }

    pub fn from_args(args: &ActionArgs) -> Self {
        let text = |name| args.get_str(name).unwrap_or_default().to_string();
        Self {
            nr_tracks: args.get_uint("NrTracks").unwrap_or_default(),
            media_duration: text("MediaDuration"),
            current_uri: text("CurrentURI"),
            current_uri_meta_data: text("CurrentURIMetaData"),
            next_uri: text("NextURI"),
            next_uri_meta_data: text("NextURIMetaData"),
            play_medium: text("PlayMedium"),
            record_medium: text("RecordMedium"),
            write_status: text("WriteStatus"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    Metadata,
    DirectChildren,
}

impl BrowseFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseFlag::Metadata => "BrowseMetadata",
            BrowseFlag::DirectChildren => "BrowseDirectChildren",
        }
    }
}

/// Input of ContentDirectory `Browse`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseRequest {
    pub object_id: String,
    pub browse_flag: BrowseFlag,
    pub filter: String,
    pub starting_index: u32,
    pub requested_count: u32,
    pub sort_criteria: String,
}

impl BrowseRequest {
    /// One page of the children of `object_id`, with child counts.
    pub fn direct_children(object_id: &str, starting_index: u32) -> Self {
        Self {
            object_id: object_id.to_string(),
            browse_flag: BrowseFlag::DirectChildren,
            filter: "@childCount".to_string(),
            starting_index,
            requested_count: MAX_BROWSE,
            sort_criteria: String::new(),
        }
    }

    /// Full metadata of `object_id` itself.
    pub fn metadata(object_id: &str) -> Self {
        Self {
            object_id: object_id.to_string(),
            browse_flag: BrowseFlag::Metadata,
            filter: "*".to_string(),
            starting_index: 0,
            requested_count: MAX_BROWSE,
            sort_criteria: String::new(),
        }
    }

    pub fn to_args(&self) -> ActionArgs {
        ActionArgs::new()
            .with("ObjectID", self.object_id.as_str())
            .with("BrowseFlag", self.browse_flag.as_str())
            .with("Filter", self.filter.as_str())
            .with("StartingIndex", self.starting_index)
            .with("RequestedCount", self.requested_count)
            .with("SortCriteria", self.sort_criteria.as_str())
    }
}

/// Output of ContentDirectory `Browse`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowseResult {
    /// The raw DIDL-Lite document
    pub didl: String,
    pub number_returned: u32,
    pub total_matches: u32,
    pub update_id: u32,
    pub containers: Vec<Container>,
    pub items: Vec<Item>,
}

impl BrowseResult {
    pub fn out_args() -> ActionArgs {
        ActionArgs::new()
            .with("Result", "")
            .with("NumberReturned", 0u32)
            .with("TotalMatches", 0u32)
            .with("UpdateID", 0u32)
    }

    /// Build from decoded output arguments.
    ///
    /// A `Result` that is not valid DIDL-Lite is logged and yields no
    /// entries; the counts are kept as reported.
    pub fn from_args(args: &ActionArgs) -> Self {
        let didl = args.get_str("Result").unwrap_or_default().to_string();
        let parsed = if didl.trim().is_empty() {
            DidlLite::default()
        } else {
            DidlLite::parse(&didl).unwrap_or_else(|e| {
                tracing::warn!("Discarding unparsable browse result: {}", e);
                DidlLite::default()
            })
        };

        Self {
            didl,
            number_returned: args.get_uint("NumberReturned").unwrap_or_default(),
            total_matches: args.get_uint("TotalMatches").unwrap_or_default(),
            update_id: args.get_uint("UpdateID").unwrap_or_default(),
            containers: parsed.containers,
            items: parsed.items,
        }
    }

    /// Whether the parsed entries match `NumberReturned`.
    pub fn count_matches(&self) -> bool {
        self.containers.len() + self.items.len() == self.number_returned as usize
    }
}
