//! # UPnP AV API
//!
//! Typed building blocks for talking to UPnP AV media renderers and media
//! servers: the service catalogue, tagged action arguments, a SOAP action
//! client, LastChange event decoding, DIDL-Lite parsing and the response
//! types of the AVTransport and ContentDirectory actions.
//!
//! Everything here is stateless. Device discovery lives in
//! `upnp-discovery` and the control-point logic in `mediacp`.
//!
//! ```no_run
//! use upnp_api::{ActionArgs, TransportInfo, UpnpClient};
//!
//! let client = UpnpClient::new();
//! let mut out = TransportInfo::out_args();
//! client.send_action(
//!     "http://192.168.1.20:49152/upnp/control/avtransport1",
//!     "urn:schemas-upnp-org:service:AVTransport:1",
//!     "GetTransportInfo",
//!     &ActionArgs::new().with("InstanceID", 0u32),
//!     &mut out,
//! )?;
//! println!("{}", TransportInfo::from_args(&out).state());
//! # Ok::<(), upnp_api::ApiError>(())
//! ```

pub mod args;
pub mod client;
pub mod didl;
pub mod error;
pub mod events;
pub mod service;
pub mod time;
pub mod types;
pub mod xml_utils;

pub use args::{parse_bool, ActionArgs, ArgValue};
pub use client::UpnpClient;
pub use didl::{Container, DidlLite, Item, Object, Resource};
pub use error::{ApiError, Result};
pub use events::{decode_notification, extract_property};
pub use service::Service;
pub use time::{time_to_seconds, time_to_string};
pub use types::{
    BrowseFlag, BrowseRequest, BrowseResult, MediaInfo, PlaybackState, PositionInfo, SeekMode,
    TransportInfo, CHANNEL_LF, CHANNEL_MASTER, CHANNEL_RF, MAX_BROWSE, PLAY_SPEED_NORMAL,
    ROOT_OBJECT_ID,
};

// Re-exported so callers can name subscription results without a direct
// dependency on the SOAP crate.
pub use soap_client::SubscriptionResponse;
