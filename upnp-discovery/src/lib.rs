//! # UPnP Media Device Discovery
//!
//! Finds UPnP AV media renderers and media servers on the local network
//! using SSDP, and resolves each one's description into a [`Device`] with
//! absolute control, event and icon URLs.
//!
//! Two modes are offered:
//!
//! - one-shot: [`get`], [`get_iter`] and [`DiscoveryIterator`] run a single
//!   search round
//! - continuous: [`DiscoveryMonitor`] rescans periodically, listens for SSDP
//!   announcements, and reports devices found and lost
//!
//! ```no_run
//! use upnp_discovery::{get_iter, DeviceEvent};
//!
//! for event in get_iter() {
//!     if let DeviceEvent::Found(device) = event {
//!         println!("{:?} {} at {}", device.kind, device.name, device.location);
//!     }
//! }
//! ```

mod discovery;
mod error;
mod monitor;
mod ssdp;
pub mod device;

pub use discovery::{describe, DiscoveryIterator};
pub use error::{DiscoveryError, Result};
pub use monitor::{DeviceTracker, DiscoveryMonitor, MonitorConfig};

use std::time::Duration;

/// The two device classes a media control point cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// `urn:schemas-upnp-org:device:MediaRenderer`
    Renderer,
    /// `urn:schemas-upnp-org:device:MediaServer`
    Server,
}

impl DeviceKind {
    /// The SSDP search target used for this kind.
    pub fn search_target(&self) -> &'static str {
        match self {
            DeviceKind::Renderer => "urn:schemas-upnp-org:device:MediaRenderer:1",
            DeviceKind::Server => "urn:schemas-upnp-org:device:MediaServer:1",
        }
    }

    /// Device type without version, matching any `:N` suffix.
    pub fn device_type_prefix(&self) -> &'static str {
        match self {
            DeviceKind::Renderer => "urn:schemas-upnp-org:device:MediaRenderer:",
            DeviceKind::Server => "urn:schemas-upnp-org:device:MediaServer:",
        }
    }
}

/// A service advertised in a device description.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEndpoint {
    /// Full versioned type, e.g. `urn:schemas-upnp-org:service:AVTransport:1`
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    /// Empty when the service does not support eventing
    pub event_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
}

/// A discovered renderer or server.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Unique device name, e.g. "uuid:5f9ec1b3-..."
    pub udn: String,
    /// Friendly name as shown to users
    pub name: String,
    pub kind: DeviceKind,
    /// URL of the description document
    pub location: String,
    pub ip_address: String,
    pub model_name: String,
    pub manufacturer: String,
    pub services: Vec<ServiceEndpoint>,
    pub icons: Vec<Icon>,
}

impl Device {
    /// Find a service whose type starts with `type_prefix`.
    ///
    /// Pass an unversioned prefix such as
    /// `urn:schemas-upnp-org:service:AVTransport:` to accept any version.
    pub fn service(&self, type_prefix: &str) -> Option<&ServiceEndpoint> {
        self.services
            .iter()
            .find(|service| service.service_type.starts_with(type_prefix))
    }

    /// URL of the icon closest to `preferred_size` pixels wide.
    ///
    /// PNG wins ties.
    pub fn icon_url(&self, preferred_size: u32) -> Option<&str> {
        self.icons
            .iter()
            .min_by_key(|icon| {
                (
                    icon.width.abs_diff(preferred_size),
                    icon.mime_type != "image/png",
                )
            })
            .map(|icon| icon.url.as_str())
    }

    /// Whether two handles refer to the same physical device.
    pub fn is_same_device(&self, other: &Device) -> bool {
        if !self.udn.is_empty() && !other.udn.is_empty() {
            self.udn == other.udn && self.kind == other.kind
        } else {
            self.location == other.location && self.kind == other.kind
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Found(Device),
    /// Only emitted by [`DiscoveryMonitor`]
    Lost(Device),
}

/// Discover renderers and servers with a 3-second search window.
pub fn get() -> Vec<Device> {
    get_with_timeout(Duration::from_secs(3))
}

pub fn get_with_timeout(timeout: Duration) -> Vec<Device> {
    get_iter_with_timeout(timeout)
        .filter_map(|event| match event {
            DeviceEvent::Found(device) => Some(device),
            DeviceEvent::Lost(_) => None,
        })
        .collect()
}

/// Stream renderers and servers as they are resolved, allowing early exit.
pub fn get_iter() -> DiscoveryIterator {
    get_iter_with_timeout(Duration::from_secs(3))
}

pub fn get_iter_with_timeout(timeout: Duration) -> DiscoveryIterator {
    DiscoveryIterator::new(&[DeviceKind::Renderer, DeviceKind::Server], timeout).unwrap_or_else(|e| {
        tracing::warn!("Discovery unavailable: {}", e);
        DiscoveryIterator::empty()
    })
}
