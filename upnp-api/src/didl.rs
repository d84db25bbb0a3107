//! DIDL-Lite content metadata.
//!
//! ContentDirectory `Browse` results and the `CurrentTrackMetaData` event
//! variable both carry DIDL-Lite documents:
//!
//! ```xml
//! <DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" ...>
//!   <container id="1" parentID="0" restricted="1" childCount="4">
//!     <dc:title>Music</dc:title>
//!     <upnp:class>object.container.storageFolder</upnp:class>
//!   </container>
//!   <item id="64$0" parentID="64" restricted="1">
//!     <dc:title>Song Title</dc:title>
//!     <upnp:artist>Artist Name</upnp:artist>
//!     <res protocolInfo="http-get:*:audio/mpeg:*" duration="0:03:58">http://host/song.mp3</res>
//!   </item>
//! </DIDL-Lite>
//! ```
//!
//! Documents from real servers vary a lot, so every field is optional and
//! numeric attributes that fail to parse are treated as absent.

use crate::xml_utils;
use crate::Result;
use serde::Deserialize;

/// A parsed DIDL-Lite document, containers and items in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DidlLite {
    pub containers: Vec<Container>,
    pub items: Vec<Item>,
}

/// Fields shared by containers and items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    pub id: String,
    pub parent_id: String,
    pub restricted: bool,
    /// UPnP class, e.g. `object.item.audioItem.musicTrack`
    pub class: String,
    pub title: String,
    /// `upnp:artist`, or `dc:creator` when no artist is given
    pub artist: String,
    pub album: String,
    pub genre: String,
    /// `upnp:icon`, or `upnp:albumArtURI` when no icon is given
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    pub object: Object,
    pub child_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub object: Object,
    pub resources: Vec<Resource>,
}

impl Item {
    /// The first resource, the one a renderer is asked to play.
    pub fn first_resource(&self) -> Option<&Resource> {
        self.resources.first()
    }
}

/// A playable representation of an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    /// e.g. `http-get:*:audio/mpeg:*`
    pub protocol_info: String,
    pub url: String,
    pub size: Option<u64>,
    pub bitrate: Option<u32>,
    /// `H+:MM:SS[.F+]` as sent by the server
    pub duration: Option<String>,
    pub resolution: Option<String>,
}

impl DidlLite {
    /// Parse a DIDL-Lite document.
    ///
    /// # Example
    ///
    /// ```
    /// use upnp_api::didl::DidlLite;
    ///
    /// let didl = DidlLite::parse(
    ///     r#"<DIDL-Lite><item id="7" parentID="1"><dc:title>Song</dc:title></item></DIDL-Lite>"#,
    /// ).unwrap();
    /// assert_eq!(didl.items[0].object.title, "Song");
    /// ```
    pub fn parse(xml: &str) -> Result<Self> {
        let raw: RawDidl = xml_utils::parse(xml)?;
        Ok(raw.into())
    }

    pub fn first_item(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.containers.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Wire structures, namespaces already stripped.

#[derive(Debug, Default, Deserialize)]
struct RawDidl {
    #[serde(rename = "container", default)]
    containers: Vec<RawObject>,
    #[serde(rename = "item", default)]
    items: Vec<RawObject>,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawObject {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@parentID", default)]
    parent_id: String,
    #[serde(rename = "@restricted", default)]
    restricted: Option<String>,
    #[serde(rename = "@childCount", default)]
    child_count: Option<String>,
    #[serde(default)]
    title: Vec<Text>,
    #[serde(default)]
    class: Vec<Text>,
    #[serde(default)]
    artist: Vec<Text>,
    #[serde(default)]
    creator: Vec<Text>,
    #[serde(default)]
    album: Vec<Text>,
    #[serde(default)]
    genre: Vec<Text>,
    #[serde(default)]
    icon: Vec<Text>,
    #[serde(rename = "albumArtURI", default)]
    album_art_uri: Vec<Text>,
    #[serde(default)]
    res: Vec<RawResource>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResource {
    #[serde(rename = "@protocolInfo", default)]
    protocol_info: String,
    #[serde(rename = "@size", default)]
    size: Option<String>,
    #[serde(rename = "@bitrate", default)]
    bitrate: Option<String>,
    #[serde(rename = "@duration", default)]
    duration: Option<String>,
    #[serde(rename = "@resolution", default)]
    resolution: Option<String>,
    #[serde(rename = "$text", default)]
    url: String,
}

fn first(texts: &[Text]) -> Option<String> {
    texts
        .iter()
        .map(|t| t.value.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn lenient<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl RawObject {
    fn into_object(self) -> (Object, Option<String>, Vec<RawResource>) {
        let object = Object {
            id: self.id,
            parent_id: self.parent_id,
            restricted: matches!(self.restricted.as_deref().map(str::trim), Some("1" | "true")),
            class: first(&self.class).unwrap_or_default(),
            title: first(&self.title).unwrap_or_default(),
            artist: first(&self.artist).or_else(|| first(&self.creator)).unwrap_or_default(),
            album: first(&self.album).unwrap_or_default(),
            genre: first(&self.genre).unwrap_or_default(),
            icon: first(&self.icon).or_else(|| first(&self.album_art_uri)).unwrap_or_default(),
        };
        (object, self.child_count, self.res)
    }
}

impl From<RawResource> for Resource {
    fn from(raw: RawResource) -> Self {
        Resource {
            protocol_info: raw.protocol_info,
            url: raw.url.trim().to_string(),
            size: lenient(raw.size),
            bitrate: lenient(raw.bitrate),
            duration: raw.duration,
            resolution: raw.resolution,
        }
    }
}

impl From<RawDidl> for DidlLite {
    fn from(raw: RawDidl) -> Self {
        let containers = raw
            .containers
            .into_iter()
            .map(|c| {
                let (object, child_count, _) = c.into_object();
                Container {
                    object,
                    child_count: lenient(child_count),
                }
            })
            .collect();

        let items = raw
            .items
            .into_iter()
            .map(|i| {
                let (object, _, res) = i.into_object();
                Item {
                    object,
                    resources: res
                        .into_iter()
                        .map(Resource::from)
                        .filter(|r| !r.url.is_empty())
                        .collect(),
                }
            })
            .collect();

        DidlLite { containers, items }
    }
}
