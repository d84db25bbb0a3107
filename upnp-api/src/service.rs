/// The UPnP AV services a control point talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Playback control on a renderer (play, pause, stop, seek, URIs)
    AVTransport,
    /// Volume and mute on a renderer
    RenderingControl,
    /// Content browsing on a server
    ContentDirectory,
    /// Protocol and connection info, present on both device classes
    ConnectionManager,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::AVTransport => "AVTransport",
            Service::RenderingControl => "RenderingControl",
            Service::ContentDirectory => "ContentDirectory",
            Service::ConnectionManager => "ConnectionManager",
        }
    }

    /// Service type without version, used to match any advertised version.
    pub fn urn_prefix(&self) -> &'static str {
        match self {
            Service::AVTransport => "urn:schemas-upnp-org:service:AVTransport:",
            Service::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:",
            Service::ContentDirectory => "urn:schemas-upnp-org:service:ContentDirectory:",
            Service::ConnectionManager => "urn:schemas-upnp-org:service:ConnectionManager:",
        }
    }

    /// Version 1 service type, used when a device does not say otherwise.
    pub fn default_service_type(&self) -> &'static str {
        match self {
            Service::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Service::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Service::ContentDirectory => "urn:schemas-upnp-org:service:ContentDirectory:1",
            Service::ConnectionManager => "urn:schemas-upnp-org:service:ConnectionManager:1",
        }
    }
}
