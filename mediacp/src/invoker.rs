//! Action invocation bound to one service of one device.

use std::sync::Arc;

use upnp_api::{ActionArgs, Service};
use upnp_discovery::Device;

use crate::error::Result;
use crate::transport::DeviceTransport;

/// Every renderer and server is driven as a single instance.
pub const INSTANCE_ID: u32 = 0;

/// Sends actions to one service of one device through the transport.
///
/// Every call is prefixed with `InstanceID = 0`, so callers pass only the
/// action's own arguments.
#[derive(Clone)]
pub struct ActionInvoker {
    transport: Arc<dyn DeviceTransport>,
    device: Device,
    service: Service,
}

impl ActionInvoker {
    pub fn new(transport: Arc<dyn DeviceTransport>, device: Device, service: Service) -> Self {
        Self {
            transport,
            device,
            service,
        }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    /// Invoke `action`, filling the declared `output` arguments in place.
    ///
    /// On error `output` is left in an unspecified state.
    pub fn send(&self, action: &str, input: ActionArgs, output: &mut ActionArgs) -> Result<()> {
        let mut args = ActionArgs::new().with("InstanceID", INSTANCE_ID);
        args.extend(input);

        tracing::debug!("{}.{} on {}", self.service.name(), action, self.device.name);
        self.transport
            .send_action(&self.device, self.service, action, &args, output)
    }

    /// Invoke an action whose outputs are not needed.
    pub fn call(&self, action: &str, input: ActionArgs) -> Result<()> {
        self.send(action, input, &mut ActionArgs::new())
    }
}

impl std::fmt::Debug for ActionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionInvoker")
            .field("device", &self.device.udn)
            .field("service", &self.service)
            .finish()
    }
}
