//! The read-only face the session manager shows for a discovered device.

use std::path::PathBuf;

use upnp_discovery::Device;

/// Identity, display name and icon of a renderer or server.
pub trait DeviceProxy: Send + Sync {
    /// The underlying discovery record.
    fn device(&self) -> &Device;

    /// Local path of the cached icon, once it has been downloaded.
    fn icon(&self) -> Option<PathBuf>;

    fn udn(&self) -> &str {
        &self.device().udn
    }

    fn name(&self) -> &str {
        &self.device().name
    }

    /// Whether `other` describes the same physical device.
    ///
    /// Lost notifications may carry a record without a UDN, in which case
    /// the description location decides.
    fn same_device(&self, other: &Device) -> bool {
        self.device().is_same_device(other)
    }
}
