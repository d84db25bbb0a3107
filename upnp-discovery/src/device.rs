//! Device description parsing.
//!
//! Parses the UPnP device description document fetched from an SSDP
//! LOCATION and turns the matching (possibly embedded) device into a
//! [`Device`] with absolute service and icon URLs.

use crate::error::{DiscoveryError, Result};
use crate::{Device, DeviceKind, Icon, ServiceEndpoint};
use serde::Deserialize;
use url::Url;

/// UPnP device description root element.
#[derive(Debug, Deserialize)]
pub struct Root {
    #[serde(rename = "URLBase", default)]
    pub url_base: Option<String>,
    pub device: DeviceDescription,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(rename = "UDN", default)]
    pub udn: String,
    #[serde(default)]
    pub icon_list: Option<IconList>,
    #[serde(default)]
    pub service_list: Option<ServiceList>,
    #[serde(default)]
    pub device_list: Option<DeviceList>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IconList {
    #[serde(rename = "icon", default)]
    pub icons: Vec<IconDescription>,
}

#[derive(Debug, Deserialize)]
pub struct IconDescription {
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceList {
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceDescription>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceDescription {
    #[serde(rename = "serviceType")]
    pub service_type: String,
    #[serde(rename = "serviceId", default)]
    pub service_id: String,
    #[serde(rename = "controlURL")]
    pub control_url: String,
    #[serde(rename = "eventSubURL", default)]
    pub event_sub_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceList {
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceDescription>,
}

impl Root {
    /// Parse a device description document.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::ParseError` if the XML is malformed or has no
    /// `<device>` element.
    pub fn from_xml(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml)
            .map_err(|e| DiscoveryError::ParseError(format!("Failed to parse device XML: {}", e)))
    }

    /// Build a [`Device`] of the given kind from this description.
    ///
    /// Embedded devices are searched depth-first, so a renderer nested under
    /// a vendor root device is still found. Relative URLs resolve against
    /// `URLBase` when present, otherwise against `location`.
    pub fn to_device(&self, kind: DeviceKind, location: &str) -> Result<Device> {
        let description = self.device.find(kind).ok_or_else(|| {
            DiscoveryError::InvalidDevice(format!(
                "{} does not describe a {}",
                location,
                kind.device_type_prefix()
            ))
        })?;

        let base = match self.url_base.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => base,
            _ => location,
        };
        let base = Url::parse(base)
            .map_err(|e| DiscoveryError::ParseError(format!("Invalid base URL {}: {}", base, e)))?;

        let services = description
            .service_list
            .iter()
            .flat_map(|list| list.services.iter())
            .map(|service| {
                Ok(ServiceEndpoint {
                    service_type: service.service_type.trim().to_string(),
                    service_id: service.service_id.trim().to_string(),
                    control_url: resolve(&base, &service.control_url)?,
                    event_url: resolve(&base, &service.event_sub_url)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Icons with unusable URLs are dropped rather than failing the device
        let icons = description
            .icon_list
            .iter()
            .flat_map(|list| list.icons.iter())
            .filter_map(|icon| {
                Some(Icon {
                    mime_type: icon.mimetype.trim().to_string(),
                    width: icon.width,
                    height: icon.height,
                    url: resolve(&base, &icon.url).ok()?,
                })
            })
            .collect();

        Ok(Device {
            udn: description.udn.trim().to_string(),
            name: description.friendly_name.trim().to_string(),
            kind,
            location: location.to_string(),
            ip_address: extract_ip_from_url(location).unwrap_or_default(),
            model_name: description.model_name.trim().to_string(),
            manufacturer: description.manufacturer.trim().to_string(),
            services,
            icons,
        })
    }
}

impl DeviceDescription {
    /// Find this device or an embedded device of the given kind.
    pub fn find(&self, kind: DeviceKind) -> Option<&DeviceDescription> {
        if self.device_type.trim().starts_with(kind.device_type_prefix()) {
            return Some(self);
        }
        self.device_list
            .iter()
            .flat_map(|list| list.devices.iter())
            .find_map(|embedded| embedded.find(kind))
    }
}

fn resolve(base: &Url, relative: &str) -> Result<String> {
    let relative = relative.trim();
    if relative.is_empty() {
        return Ok(String::new());
    }
    base.join(relative)
        .map(|url| url.to_string())
        .map_err(|e| DiscoveryError::ParseError(format!("Invalid URL {}: {}", relative, e)))
}

/// Extract the host portion of a URL.
///
/// ```
/// use upnp_discovery::device::extract_ip_from_url;
///
/// assert_eq!(
///     extract_ip_from_url("http://192.168.1.40:49152/description.xml"),
///     Some("192.168.1.40".to_string())
/// );
/// ```
pub fn extract_ip_from_url(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}
