//! An in-memory transport for driving the control point without a network

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use mediacp::transport::{DeviceTransport, DiscoveryListener, NotifyCallback};
use mediacp::{ControlConfig, ControlError, MediaControl, MediaHook};
use parking_lot::Mutex;
use upnp_api::{ActionArgs, ArgValue, Service};
use upnp_discovery::{Device, DeviceKind, Icon, ServiceEndpoint};

/// One action sent through the transport
#[derive(Debug, Clone)]
pub struct SentAction {
    pub udn: String,
    pub service: Service,
    pub action: String,
    pub input: ActionArgs,
}

#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentAction>>,
    responses: Mutex<HashMap<String, Vec<(String, String)>>>,
    failing: Mutex<HashSet<String>>,
    listener: Mutex<Option<Arc<dyn DiscoveryListener>>>,
    subscriptions: Mutex<Vec<(String, Service, NotifyCallback)>>,
    unsubscribed: Mutex<Vec<String>>,
    served: Mutex<HashMap<String, Vec<u8>>>,
    next_subscribe: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Output values returned by every later `action`
    pub fn respond(&self, action: &str, outputs: &[(&str, &str)]) {
        self.responses.lock().insert(
            action.to_string(),
            outputs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        );
    }

    /// Make every later `action` fail with a transport error
    pub fn fail(&self, action: &str) {
        self.failing.lock().insert(action.to_string());
    }

    /// Bytes returned for a later `http_get` of `url`
    pub fn serve(&self, url: &str, bytes: &[u8]) {
        self.served.lock().insert(url.to_string(), bytes.to_vec());
    }

    /// Run `f` inside the next `subscribe`, after it is recorded.
    pub fn on_next_subscribe(self: &Arc<Self>, f: impl FnOnce(Arc<MockTransport>) + Send + 'static) {
        let weak: Weak<MockTransport> = Arc::downgrade(self);
        *self.next_subscribe.lock() = Some(Box::new(move || {
            if let Some(transport) = weak.upgrade() {
                f(transport);
            }
        }));
    }

    pub fn sent(&self) -> Vec<SentAction> {
        self.sent.lock().clone()
    }

    /// Names of the actions sent to `service`, in order
    pub fn actions(&self, service: Service) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|sent| sent.service == service)
            .map(|sent| sent.action.clone())
            .collect()
    }

    /// Names of the actions that change device state, in order
    pub fn commands(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|sent| sent.action.clone())
            .filter(|action| !action.starts_with("Get"))
            .collect()
    }

    pub fn last(&self, action: &str) -> Option<SentAction> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|sent| sent.action == action)
            .cloned()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    pub fn announce(&self, device: Device) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.device_found(device);
        }
    }

    pub fn lose(&self, device: Device) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.device_lost(device);
        }
    }

    /// Deliver a `LastChange` value to the subscriptions of a device
    pub fn notify(&self, udn: &str, service: Service, value: &str) {
        let callbacks: Vec<NotifyCallback> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(sub_udn, sub_service, _)| sub_udn == udn && *sub_service == service)
            .map(|(_, _, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn subscription_count(&self, udn: &str) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|(sub_udn, _, _)| sub_udn == udn)
            .count()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }
}

impl DeviceTransport for MockTransport {
    fn start(&self, listener: Arc<dyn DiscoveryListener>) -> mediacp::Result<()> {
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn rescan(&self) {}

    fn send_action(
        &self,
        device: &Device,
        service: Service,
        action: &str,
        input: &ActionArgs,
        output: &mut ActionArgs,
    ) -> mediacp::Result<()> {
        self.sent.lock().push(SentAction {
            udn: device.udn.clone(),
            service,
            action: action.to_string(),
            input: input.clone(),
        });

        if self.failing.lock().contains(action) {
            return Err(ControlError::Transport(format!("{} failed", action)));
        }

        let scripted = self.responses.lock().get(action).cloned().unwrap_or_default();
        let filled: ActionArgs = output
            .iter()
            .map(|(name, declared)| {
                let text = scripted.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str());
                let value = match (declared, text) {
                    (_, None) => declared.clone(),
                    (ArgValue::Bool(_), Some(text)) => ArgValue::Bool(text == "1" || text == "true"),
                    (ArgValue::UInt(_), Some(text)) => ArgValue::UInt(text.parse().unwrap()),
                    (ArgValue::Str(_), Some(text)) => ArgValue::Str(text.to_string()),
                };
                (name.to_string(), value)
            })
            .collect();
        *output = filled;
        Ok(())
    }

    fn subscribe(
        &self,
        device: &Device,
        service: Service,
        _variable: &str,
        callback: NotifyCallback,
    ) -> mediacp::Result<()> {
        self.subscriptions
            .lock()
            .push((device.udn.clone(), service, callback));
        let next = self.next_subscribe.lock().take();
        if let Some(f) = next {
            f();
        }
        Ok(())
    }

    fn unsubscribe(&self, device: &Device) {
        self.subscriptions.lock().retain(|(udn, _, _)| *udn != device.udn);
        self.unsubscribed.lock().push(device.udn.clone());
    }

    fn icon_url(&self, device: &Device) -> Option<String> {
        device.icon_url(24).map(str::to_string)
    }

    fn http_get(&self, url: &str) -> mediacp::Result<Vec<u8>> {
        self.served
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| ControlError::Transport(format!("nothing served at {}", url)))
    }

    fn shutdown(&self) {
        self.listener.lock().take();
    }
}

fn endpoint(service: &str, udn: &str) -> ServiceEndpoint {
    ServiceEndpoint {
        service_type: format!("urn:schemas-upnp-org:service:{}:1", service),
        service_id: format!("urn:upnp-org:serviceId:{}", service),
        control_url: format!("http://mock/{}/{}/control", udn, service),
        event_url: format!("http://mock/{}/{}/event", udn, service),
    }
}

pub fn renderer_device(udn: &str, name: &str) -> Device {
    Device {
        udn: udn.to_string(),
        name: name.to_string(),
        kind: DeviceKind::Renderer,
        location: format!("http://mock/{}/description.xml", udn),
        ip_address: "127.0.0.1".to_string(),
        model_name: "Mock Renderer".to_string(),
        manufacturer: "mediacp".to_string(),
        services: vec![
            endpoint("AVTransport", udn),
            endpoint("RenderingControl", udn),
            endpoint("ConnectionManager", udn),
        ],
        icons: Vec::new(),
    }
}

pub fn server_device(udn: &str, name: &str) -> Device {
    Device {
        udn: udn.to_string(),
        name: name.to_string(),
        kind: DeviceKind::Server,
        location: format!("http://mock/{}/description.xml", udn),
        ip_address: "127.0.0.1".to_string(),
        model_name: "Mock Server".to_string(),
        manufacturer: "mediacp".to_string(),
        services: vec![
            endpoint("ContentDirectory", udn),
            endpoint("ConnectionManager", udn),
        ],
        icons: Vec::new(),
    }
}

/// `device` advertising one 24 px PNG icon at `url`
pub fn with_icon(mut device: Device, url: &str) -> Device {
    device.icons.push(Icon {
        mime_type: "image/png".to_string(),
        width: 24,
        height: 24,
        url: url.to_string(),
    });
    device
}

/// A started control point that caches device icons
pub fn control_point_with_icons(config: ControlConfig) -> (MediaControl, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let control = MediaControl::new(
        transport.clone(),
        ControlConfig {
            cache_icons: true,
            ..config
        },
    );
    control.start().unwrap();
    (control, transport)
}

/// A started control point over a fresh mock transport
pub fn control_point(config: ControlConfig) -> (MediaControl, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let control = MediaControl::new(
        transport.clone(),
        ControlConfig {
            cache_icons: false,
            ..config
        },
    );
    control.start().unwrap();
    (control, transport)
}

/// Hook events recorded as readable strings
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }

    /// A hook filling every slot
    pub fn hook(&self) -> MediaHook {
        use mediacp::DeviceProxy;

        let (a, b, c, d, e, f) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );
        let (g, h, i, j, k, l) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );
        let (m, n) = (self.clone(), self.clone());

        MediaHook::new()
            .on_renderer_found(move |r| a.push(format!("renderer_found {}", r.udn())))
            .on_renderer_lost(move |r| b.push(format!("renderer_lost {}", r.udn())))
            .on_renderer_selected(move |r| {
                c.push(format!("renderer_selected {}", r.map(|r| r.udn()).unwrap_or("none")))
            })
            .on_server_found(move |s| d.push(format!("server_found {}", s.udn())))
            .on_server_lost(move |s| e.push(format!("server_lost {}", s.udn())))
            .on_server_selected(move |s| {
                f.push(format!("server_selected {}", s.map(|s| s.udn()).unwrap_or("none")))
            })
            .on_transport_state(move |r, state| g.push(format!("transport_state {} {}", r.udn(), state)))
            .on_current_track_duration(move |r, secs| h.push(format!("duration {} {}", r.udn(), secs)))
            .on_current_track_meta_data(move |r, item| {
                i.push(format!("metadata {} {}", r.udn(), item.object.title))
            })
            .on_mute(move |r, mute| j.push(format!("mute {} {}", r.udn(), mute)))
            .on_volume(move |r, volume| k.push(format!("volume {} {}", r.udn(), volume)))
            .on_current_time(move |r, secs, _| l.push(format!("time {} {}", r.udn(), secs)))
            .on_set_volume_delta(move |delta| m.push(format!("volume_delta {}", delta)))
            .on_set_seek_delta(move |delta| n.push(format!("seek_delta {}", delta)))
    }
}

/// A RenderingControl or AVTransport `LastChange` value
pub fn last_change(properties: &[(&str, &str)]) -> String {
    let children: String = properties
        .iter()
        .map(|(name, value)| format!(r#"<{} val="{}"/>"#, name, xml_attr(value)))
        .collect();
    format!(
        r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"><InstanceID val="0">{}</InstanceID></Event>"#,
        children
    )
}

pub fn xml_attr(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// DIDL-Lite with one playable item
pub fn track_didl(id: &str, title: &str, url: &str) -> String {
    format!(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><item id="{id}" parentID="1" restricted="1"><dc:title>{title}</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class><res protocolInfo="http-get:*:audio/flac:*" duration="0:04:10">{url}</res></item></DIDL-Lite>"#
    )
}
