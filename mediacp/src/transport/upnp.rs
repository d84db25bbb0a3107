//! The production transport: SSDP discovery, SOAP actions and GENA
//! eventing over the local network.

use std::sync::Arc;

use parking_lot::Mutex;
use upnp_api::{ActionArgs, Service, UpnpClient};
use upnp_discovery::{Device, DeviceEvent, DeviceKind, DiscoveryMonitor, MonitorConfig, ServiceEndpoint};

use super::eventing::{Eventing, EventingConfig};
use super::{DeviceTransport, DiscoveryListener, NotifyCallback};
use crate::config::TransportConfig;
use crate::error::{ControlError, Result};

/// [`DeviceTransport`] backed by the real network.
///
/// Creating one binds the event callback server right away, so a port
/// conflict is reported before discovery starts.
///
/// ```no_run
/// use mediacp::config::TransportConfig;
/// use mediacp::transport::upnp::UpnpTransport;
///
/// let transport = UpnpTransport::new(TransportConfig::default())?;
/// # Ok::<(), mediacp::ControlError>(())
/// ```
pub struct UpnpTransport {
    config: TransportConfig,
    client: UpnpClient,
    eventing: Eventing,
    monitor: Mutex<Option<DiscoveryMonitor>>,
}

impl UpnpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let client = UpnpClient::new();
        let eventing = Eventing::start(
            client.clone(),
            EventingConfig {
                port_range: config.callback_port_range,
                advertised_ip: config.advertised_ip,
                subscription_timeout: config.subscription_timeout_secs,
            },
        )?;

        Ok(Self {
            config,
            client,
            eventing,
            monitor: Mutex::new(None),
        })
    }

    fn endpoint<'a>(device: &'a Device, service: Service) -> Result<&'a ServiceEndpoint> {
        device
            .service(service.urn_prefix())
            .ok_or_else(|| ControlError::MissingService {
                device: device.name.clone(),
                service,
            })
    }
}

/// Key under which a device's subscriptions are filed.
fn device_key(device: &Device) -> String {
    if device.udn.is_empty() {
        device.location.clone()
    } else {
        device.udn.clone()
    }
}

impl DeviceTransport for UpnpTransport {
    fn start(&self, listener: Arc<dyn DiscoveryListener>) -> Result<()> {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return Err(ControlError::Transport("discovery already started".to_string()));
        }

        let config = MonitorConfig {
            kinds: vec![DeviceKind::Renderer, DeviceKind::Server],
            search_timeout: self.config.search_timeout(),
            rescan_interval: self.config.rescan_interval(),
            missed_scans_before_lost: self.config.missed_scans_before_lost,
            listen_for_announcements: self.config.listen_for_announcements,
        };
        *monitor = Some(DiscoveryMonitor::start(config, move |event| match event {
            DeviceEvent::Found(device) => listener.device_found(device),
            DeviceEvent::Lost(device) => listener.device_lost(device),
        }));
        tracing::info!("Discovery started");
        Ok(())
    }

    fn rescan(&self) {
        if let Some(monitor) = self.monitor.lock().as_ref() {
            monitor.rescan();
        }
    }

    fn send_action(
        &self,
        device: &Device,
        service: Service,
        action: &str,
        input: &ActionArgs,
        output: &mut ActionArgs,
    ) -> Result<()> {
        let endpoint = Self::endpoint(device, service)?;
        self.client.send_action(
            &endpoint.control_url,
            &endpoint.service_type,
            action,
            input,
            output,
        )?;
        Ok(())
    }

    fn subscribe(
        &self,
        device: &Device,
        service: Service,
        variable: &str,
        callback: NotifyCallback,
    ) -> Result<()> {
        let endpoint = Self::endpoint(device, service)?;
        if endpoint.event_url.is_empty() {
            return Err(ControlError::Transport(format!(
                "{} on {} is not evented",
                service.name(),
                device.name
            )));
        }
        self.eventing
            .subscribe(&device_key(device), &endpoint.event_url, variable, callback)
    }

    fn unsubscribe(&self, device: &Device) {
        self.eventing.unsubscribe(&device_key(device));
    }

    fn icon_url(&self, device: &Device) -> Option<String> {
        device.icon_url(self.config.icon_size).map(str::to_string)
    }

    fn http_get(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.client.get_bytes(url)?)
    }

    fn shutdown(&self) {
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.stop();
        }
        self.eventing.shutdown();
    }
}
