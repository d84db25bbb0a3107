//! The device transport seam.
//!
//! The control point never talks to the network directly. Everything it
//! needs from the outside world (discovery callbacks, action invocation,
//! event subscriptions, icon download) goes through [`DeviceTransport`], so
//! the session logic can run against [`upnp::UpnpTransport`] in production
//! and against an in-memory double in tests.

pub mod upnp;

mod eventing;

use std::sync::Arc;

use upnp_api::{ActionArgs, Service};
use upnp_discovery::Device;

use crate::error::Result;

/// Receives the value of an evented state variable each time the device
/// sends it.
pub type NotifyCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Sink for discovery results.
///
/// Called from the transport's discovery thread.
pub trait DiscoveryListener: Send + Sync {
    fn device_found(&self, device: Device);
    /// `device` may carry less information than the one that was found,
    /// so match it with [`Device::is_same_device`].
    fn device_lost(&self, device: Device);
}

pub trait DeviceTransport: Send + Sync {
    /// Begin discovery, reporting devices to `listener` until shutdown.
    fn start(&self, listener: Arc<dyn DiscoveryListener>) -> Result<()>;

    /// Search again now instead of waiting for the next periodic scan.
    fn rescan(&self);

    /// Invoke `action` on `service` of `device`, filling `output` in place.
    ///
    /// Blocks for the network round trip.
    fn send_action(
        &self,
        device: &Device,
        service: Service,
        action: &str,
        input: &ActionArgs,
        output: &mut ActionArgs,
    ) -> Result<()>;

    /// Deliver every new value of `variable` on `service` to `callback`
    /// until [`unsubscribe`](Self::unsubscribe) is called for the device.
    fn subscribe(
        &self,
        device: &Device,
        service: Service,
        variable: &str,
        callback: NotifyCallback,
    ) -> Result<()>;

    /// Drop every subscription held for `device`.
    fn unsubscribe(&self, device: &Device);

    /// URL of the icon to show for `device`, if it has one.
    fn icon_url(&self, device: &Device) -> Option<String>;

    /// Plain HTTP GET.
    fn http_get(&self, url: &str) -> Result<Vec<u8>>;

    /// Stop discovery and eventing. No callbacks run after this returns.
    fn shutdown(&self);
}
