//! The control point session.
//!
//! [`MediaControl`] keeps the renderers and servers found on the network,
//! the current selection of each, and relays device and renderer events to
//! the registered hooks.
//!
//! # Locking
//!
//! Index and selection changes (found, lost, select, preferred names) run
//! under one reentrant operation lock, so they are serialised whichever
//! thread they come from, and a hook may call back into the session. The
//! data itself sits behind a plain mutex that is never held while a hook
//! or a network request runs. Renderer events and playback commands do not
//! take the operation lock; a renderer serialises its own actions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::{Mutex, ReentrantMutex};
use upnp_api::{BrowseResult, SeekMode};
use upnp_discovery::{Device, DeviceKind};

use crate::action::Action;
use crate::config::ControlConfig;
use crate::device::DeviceProxy;
use crate::error::Result;
use crate::hooks::{HookRegistry, MediaHook};
use crate::icons::IconCache;
use crate::renderer::{Renderer, RendererEvent};
use crate::server::Server;
use crate::transport::upnp::UpnpTransport;
use crate::transport::{DeviceTransport, DiscoveryListener};

struct Session {
    renderers: HashMap<String, Arc<Renderer>>,
    /// Renderers found but still subscribing, by index key
    pending_renderers: HashMap<String, Device>,
    servers: HashMap<String, Arc<Server>>,
    current_renderer: Option<Arc<Renderer>>,
    current_server: Option<Arc<Server>>,
    preferred_renderer: String,
    preferred_server: String,
    volume_delta: i32,
    seek_delta: i32,
}

struct ControlInner {
    transport: Arc<dyn DeviceTransport>,
    session: Mutex<Session>,
    op_lock: ReentrantMutex<()>,
    hooks: HookRegistry,
    icons: Option<Arc<IconCache>>,
}

/// Index key: the UDN, or the description location for devices without one.
fn index_key(device: &Device) -> String {
    if device.udn.is_empty() {
        device.location.clone()
    } else {
        device.udn.clone()
    }
}

impl ControlInner {
    fn device_found(self: &Arc<Self>, device: Device) {
        match device.kind {
            DeviceKind::Renderer => self.renderer_found(device),
            DeviceKind::Server => self.server_found(device),
        }
    }

    fn device_lost(&self, device: Device) {
        match device.kind {
            DeviceKind::Renderer => self.renderer_lost(&device),
            DeviceKind::Server => self.server_lost(&device),
        }
    }

    fn renderer_found(self: &Arc<Self>, device: Device) {
        let key = index_key(&device);
        {
            let _op = self.op_lock.lock();
            let mut session = self.session.lock();
            if session.renderers.contains_key(&key)
                || session.pending_renderers.contains_key(&key)
            {
                tracing::debug!("Renderer {} already known", key);
                return;
            }
            session.pending_renderers.insert(key.clone(), device.clone());
        }

        let renderer = Renderer::new(Arc::clone(&self.transport), device);
        let weak: Weak<ControlInner> = Arc::downgrade(self);
        renderer.set_sink(Arc::new(move |renderer: &Arc<Renderer>, event: RendererEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.renderer_event(renderer, event);
            }
        }));
        // Subscribing is a network round trip, kept out of the operation lock
        renderer.attach();

        let selected = {
            let _op = self.op_lock.lock();
            {
                let mut session = self.session.lock();
                if session.pending_renderers.remove(&key).is_none() {
                    // Lost while subscribing
                    drop(session);
                    renderer.detach();
                    return;
                }
                session.renderers.insert(key, Arc::clone(&renderer));
            }
            tracing::info!("Renderer found: {} ({})", renderer.name(), renderer.udn());

            let target = Arc::clone(&renderer);
            self.spawn_icon_fetch(renderer.device().clone(), move |path| target.set_icon(path));

            for f in self.hooks.slots(|h| &h.renderer_found) {
                f(&renderer);
            }
            self.apply_default_renderer()
        };

        if let Some(renderer) = selected {
            renderer.resync();
        }
    }

    fn server_found(&self, device: Device) {
        let _op = self.op_lock.lock();
        let key = index_key(&device);
        let server = {
            let mut session = self.session.lock();
            if session.servers.contains_key(&key) {
                tracing::debug!("Server {} already known", key);
                return;
            }
            let server = Server::new(Arc::clone(&self.transport), device);
            session.servers.insert(key, Arc::clone(&server));
            server
        };
        tracing::info!("Server found: {} ({})", server.name(), server.udn());

        let target = Arc::clone(&server);
        self.spawn_icon_fetch(server.device().clone(), move |path| target.set_icon(path));

        for f in self.hooks.slots(|h| &h.server_found) {
            f(&server);
        }
        self.apply_default_server();
    }

    fn renderer_lost(&self, device: &Device) {
        let _op = self.op_lock.lock();
        let (renderer, was_active) = {
            let mut session = self.session.lock();
            let key = session
                .renderers
                .iter()
                .find(|(_, renderer)| renderer.same_device(device))
                .map(|(key, _)| key.clone());
            let Some(renderer) = key.and_then(|key| session.renderers.remove(&key)) else {
                let pending = session
                    .pending_renderers
                    .iter()
                    .find(|(_, found)| found.is_same_device(device))
                    .map(|(key, _)| key.clone());
                match pending.and_then(|key| session.pending_renderers.remove(&key)) {
                    Some(_) => tracing::debug!("Renderer {} lost while subscribing", device.location),
                    None => tracing::debug!("Lost unknown renderer {}", device.location),
                }
                return;
            };
            let was_active = session
                .current_renderer
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &renderer));
            if was_active {
                session.current_renderer = None;
            }
            (renderer, was_active)
        };
        tracing::info!("Renderer lost: {} ({})", renderer.name(), renderer.udn());

        if was_active {
            for f in self.hooks.slots(|h| &h.renderer_selected) {
                f(None);
            }
        }
        renderer.detach();
        for f in self.hooks.slots(|h| &h.renderer_lost) {
            f(&renderer);
        }
    }

    fn server_lost(&self, device: &Device) {
        let _op = self.op_lock.lock();
        let (server, was_active) = {
            let mut session = self.session.lock();
            let key = session
                .servers
                .iter()
                .find(|(_, server)| server.same_device(device))
                .map(|(key, _)| key.clone());
            let Some(server) = key.and_then(|key| session.servers.remove(&key)) else {
                tracing::debug!("Lost unknown server {}", device.location);
                return;
            };
            let was_active = session
                .current_server
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &server));
            if was_active {
                session.current_server = None;
            }
            (server, was_active)
        };
        tracing::info!("Server lost: {} ({})", server.name(), server.udn());

        if was_active {
            for f in self.hooks.slots(|h| &h.server_selected) {
                f(None);
            }
        }
        for f in self.hooks.slots(|h| &h.server_lost) {
            f(&server);
        }
    }

    /// Relay an event of `renderer` if it is the selected one.
    fn renderer_event(&self, renderer: &Arc<Renderer>, event: RendererEvent) {
        let active = self
            .session
            .lock()
            .current_renderer
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, renderer));
        if !active {
            tracing::trace!("Suppressed {:?} from inactive {}", event, renderer.name());
            return;
        }

        match event {
            RendererEvent::TransportState(state) => {
                for f in self.hooks.slots(|h| &h.transport_state) {
                    f(renderer, state);
                }
            }
            RendererEvent::TrackDuration(seconds) => {
                for f in self.hooks.slots(|h| &h.current_track_duration) {
                    f(renderer, seconds);
                }
            }
            RendererEvent::TrackMetaData(item) => {
                for f in self.hooks.slots(|h| &h.current_track_meta_data) {
                    f(renderer, &item);
                }
            }
            RendererEvent::Mute(mute) => {
                for f in self.hooks.slots(|h| &h.mute) {
                    f(renderer, mute);
                }
            }
            RendererEvent::Volume(volume) => {
                for f in self.hooks.slots(|h| &h.volume) {
                    f(renderer, volume);
                }
            }
            RendererEvent::CurrentTime { seconds, percent } => {
                for f in self.hooks.slots(|h| &h.current_time) {
                    f(renderer, seconds, percent);
                }
            }
        }
    }

    /// Make the renderer with `udn` current; unknown or empty clears the
    /// selection. Callers hold the operation lock and resync the returned
    /// renderer once they release it.
    fn select_renderer(&self, udn: &str) -> Option<Arc<Renderer>> {
        let selected = {
            let mut session = self.session.lock();
            let renderer = session.renderers.get(udn).cloned();
            session.current_renderer = renderer.clone();
            renderer
        };
        match &selected {
            Some(renderer) => tracing::info!("Renderer selected: {}", renderer.name()),
            None if udn.is_empty() => tracing::debug!("Renderer selection cleared"),
            None => tracing::debug!("Unknown renderer {}; selection cleared", udn),
        }

        for f in self.hooks.slots(|h| &h.renderer_selected) {
            f(selected.as_ref());
        }
        selected
    }

    fn select_server(&self, udn: &str) -> Option<Arc<Server>> {
        let selected = {
            let mut session = self.session.lock();
            let server = session.servers.get(udn).cloned();
            session.current_server = server.clone();
            server
        };
        match &selected {
            Some(server) => tracing::info!("Server selected: {}", server.name()),
            None if udn.is_empty() => tracing::debug!("Server selection cleared"),
            None => tracing::debug!("Unknown server {}; selection cleared", udn),
        }

        for f in self.hooks.slots(|h| &h.server_selected) {
            f(selected.as_ref());
        }
        selected
    }

    /// Select the preferred renderer if nothing is selected and it is known.
    fn apply_default_renderer(&self) -> Option<Arc<Renderer>> {
        let udn = {
            let session = self.session.lock();
            if session.current_renderer.is_some() || session.preferred_renderer.is_empty() {
                return None;
            }
            session
                .renderers
                .values()
                .find(|renderer| renderer.name() == session.preferred_renderer)
                .map(|renderer| index_key(renderer.device()))?
        };
        self.select_renderer(&udn)
    }

    fn apply_default_server(&self) -> Option<Arc<Server>> {
        let udn = {
            let session = self.session.lock();
            if session.current_server.is_some() || session.preferred_server.is_empty() {
                return None;
            }
            session
                .servers
                .values()
                .find(|server| server.name() == session.preferred_server)
                .map(|server| index_key(server.device()))?
        };
        self.select_server(&udn)
    }

    fn spawn_icon_fetch(&self, device: Device, store: impl FnOnce(PathBuf) + Send + 'static) {
        let Some(icons) = self.icons.as_ref().map(Arc::clone) else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        let spawned = thread::Builder::new()
            .name("mediacp-icon".to_string())
            .spawn(move || {
                if let Some(path) = icons.fetch(transport.as_ref(), &device) {
                    store(path);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("Icon download not started: {}", e);
        }
    }
}

/// Forwards discovery results to the session without keeping it alive.
struct SessionListener {
    inner: Weak<ControlInner>,
}

impl DiscoveryListener for SessionListener {
    fn device_found(&self, device: Device) {
        if let Some(inner) = self.inner.upgrade() {
            inner.device_found(device);
        }
    }

    fn device_lost(&self, device: Device) {
        if let Some(inner) = self.inner.upgrade() {
            inner.device_lost(device);
        }
    }
}

/// A media control point.
///
/// Cloning is cheap; clones share the same session.
///
/// ```no_run
/// use mediacp::{Action, ControlConfig, MediaControl, MediaHook};
///
/// let control = MediaControl::with_upnp(ControlConfig {
///     preferred_renderer: "Living Room".to_string(),
///     ..ControlConfig::default()
/// })?;
/// control.subscribe_hook(
///     "printer",
///     MediaHook::new().on_transport_state(|renderer, state| {
///         println!("{:?} is {}", renderer, state);
///     }),
/// );
/// control.start()?;
/// control.action(Action::PlayPause);
/// control.shutdown();
/// # Ok::<(), mediacp::ControlError>(())
/// ```
#[derive(Clone)]
pub struct MediaControl {
    inner: Arc<ControlInner>,
}

impl MediaControl {
    pub fn new(transport: Arc<dyn DeviceTransport>, config: ControlConfig) -> Self {
        let icons = if config.cache_icons {
            match IconCache::new() {
                Ok(icons) => Some(Arc::new(icons)),
                Err(e) => {
                    tracing::warn!("Icons will not be cached: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self {
            inner: Arc::new(ControlInner {
                transport,
                session: Mutex::new(Session {
                    renderers: HashMap::new(),
                    pending_renderers: HashMap::new(),
                    servers: HashMap::new(),
                    current_renderer: None,
                    current_server: None,
                    preferred_renderer: config.preferred_renderer,
                    preferred_server: config.preferred_server,
                    volume_delta: config.volume_delta,
                    seek_delta: config.seek_delta,
                }),
                op_lock: ReentrantMutex::new(()),
                hooks: HookRegistry::new(),
                icons,
            }),
        }
    }

    /// A control point on the local network.
    pub fn with_upnp(config: ControlConfig) -> Result<Self> {
        config.validate()?;
        let transport = UpnpTransport::new(config.transport.clone())?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Start discovery. Devices are reported to hooks as they are found.
    pub fn start(&self) -> Result<()> {
        let listener = SessionListener {
            inner: Arc::downgrade(&self.inner),
        };
        self.inner.transport.start(Arc::new(listener))
    }

    /// Search for devices now.
    pub fn rescan(&self) {
        self.inner.transport.rescan();
    }

    /// Stop discovery and eventing and forget every device.
    ///
    /// No hook is called for the devices dropped here. Must not be called
    /// from inside a hook.
    pub fn shutdown(&self) {
        self.inner.transport.shutdown();

        let renderers: Vec<Arc<Renderer>> = {
            let _op = self.inner.op_lock.lock();
            let mut session = self.inner.session.lock();
            session.current_renderer = None;
            session.current_server = None;
            session.servers.clear();
            session.pending_renderers.clear();
            session.renderers.drain().map(|(_, renderer)| renderer).collect()
        };
        for renderer in renderers {
            renderer.detach();
        }
        if let Some(icons) = &self.inner.icons {
            icons.clear();
        }
        tracing::info!("Control point stopped");
    }

    // Hooks

    /// Register `hook` under `key`, replacing any hook with the same key.
    pub fn subscribe_hook(&self, key: impl Into<String>, hook: MediaHook) {
        self.inner.hooks.register(key, hook);
    }

    pub fn unsubscribe_hook(&self, key: &str) -> bool {
        self.inner.hooks.unregister(key)
    }

    // Selection

    /// Select the renderer with `udn`. An unknown or empty UDN clears the
    /// selection.
    ///
    /// A newly selected renderer republishes its volume, mute, transport
    /// state and track duration so hooks can initialise.
    pub fn set_renderer(&self, udn: &str) {
        let selected = {
            let _op = self.inner.op_lock.lock();
            self.inner.select_renderer(udn)
        };
        if let Some(renderer) = selected {
            renderer.resync();
        }
    }

    /// Select the server with `udn`. An unknown or empty UDN clears the
    /// selection.
    pub fn set_server(&self, udn: &str) {
        let _op = self.inner.op_lock.lock();
        self.inner.select_server(udn);
    }

    /// Renderer to select automatically while nothing is selected.
    pub fn set_preferred_renderer(&self, name: &str) {
        let selected = {
            let _op = self.inner.op_lock.lock();
            self.inner.session.lock().preferred_renderer = name.to_string();
            self.inner.apply_default_renderer()
        };
        if let Some(renderer) = selected {
            renderer.resync();
        }
    }

    pub fn set_preferred_server(&self, name: &str) {
        let _op = self.inner.op_lock.lock();
        self.inner.session.lock().preferred_server = name.to_string();
        self.inner.apply_default_server();
    }

    pub fn current_renderer(&self) -> Option<Arc<Renderer>> {
        self.inner.session.lock().current_renderer.clone()
    }

    pub fn current_server(&self) -> Option<Arc<Server>> {
        self.inner.session.lock().current_server.clone()
    }

    pub fn renderers(&self) -> Vec<Arc<Renderer>> {
        self.inner.session.lock().renderers.values().cloned().collect()
    }

    pub fn servers(&self) -> Vec<Arc<Server>> {
        self.inner.session.lock().servers.values().cloned().collect()
    }

    pub fn get_renderer(&self, udn: &str) -> Option<Arc<Renderer>> {
        self.inner.session.lock().renderers.get(udn).cloned()
    }

    pub fn get_server(&self, udn: &str) -> Option<Arc<Server>> {
        self.inner.session.lock().servers.get(udn).cloned()
    }

    pub fn renderer_exists(&self) -> bool {
        self.inner.session.lock().current_renderer.is_some()
    }

    pub fn server_exists(&self) -> bool {
        self.inner.session.lock().current_server.is_some()
    }

    pub fn renderer_is_active(&self, udn: &str) -> bool {
        self.inner
            .session
            .lock()
            .current_renderer
            .as_ref()
            .is_some_and(|renderer| renderer.udn() == udn)
    }

    pub fn server_is_active(&self, udn: &str) -> bool {
        self.inner
            .session
            .lock()
            .current_server
            .as_ref()
            .is_some_and(|server| server.udn() == udn)
    }

    // Deltas

    pub fn volume_delta(&self) -> i32 {
        self.inner.session.lock().volume_delta
    }

    pub fn seek_delta(&self) -> i32 {
        self.inner.session.lock().seek_delta
    }

    pub fn set_volume_delta(&self, delta: i32) {
        self.inner.session.lock().volume_delta = delta;
        for f in self.inner.hooks.slots(|h| &h.set_volume_delta) {
            f(delta);
        }
    }

    pub fn set_seek_delta(&self, delta: i32) {
        self.inner.session.lock().seek_delta = delta;
        for f in self.inner.hooks.slots(|h| &h.set_seek_delta) {
            f(delta);
        }
    }

    // Playback

    /// Run `action` on the selected renderer.
    ///
    /// Does nothing without a selected renderer. Failures are logged only.
    pub fn action(&self, action: Action) {
        let Some(renderer) = self.current_renderer() else {
            tracing::debug!("{:?} ignored: no renderer selected", action);
            return;
        };
        let (volume_delta, seek_delta) = {
            let session = self.inner.session.lock();
            (session.volume_delta, session.seek_delta)
        };

        let result = match action {
            Action::None => Ok(()),
            Action::ToggleMute => renderer.toggle_mute().map(|_| ()),
            Action::VolumeDown => renderer
                .set_relative_volume(volume_delta.saturating_neg())
                .map(|_| ()),
            Action::VolumeUp => renderer.set_relative_volume(volume_delta).map(|_| ()),
            Action::PlayPause => renderer.play_pause(),
            Action::Stop => renderer.stop(),
            Action::SeekBackward => renderer.seek_relative(seek_delta.saturating_neg()),
            Action::SeekForward => renderer.seek_relative(seek_delta),
        };

        if let Err(e) = result {
            tracing::warn!("{:?} on {} failed: {}", action, renderer.name(), e);
        }
    }

    /// Seek the selected renderer to `seconds`.
    pub fn seek(&self, seconds: u32) -> Result<()> {
        match self.current_renderer() {
            Some(renderer) => renderer.seek(SeekMode::AbsTime, &upnp_api::time_to_string(seconds)),
            None => Ok(()),
        }
    }

    /// Seek the selected renderer to `percent` (0..=100) of its track.
    pub fn seek_percent(&self, percent: f64) -> Result<()> {
        match self.current_renderer() {
            Some(renderer) => renderer.seek_percent(percent),
            None => Ok(()),
        }
    }

    /// Position of the selected renderer, `None` without one.
    pub fn current_time(&self) -> Option<u32> {
        self.current_renderer().map(|renderer| renderer.current_time())
    }

    /// Queue `uri` after the current track of the selected renderer.
    pub fn set_next_uri(&self, uri: &str, metadata: &str) -> Result<()> {
        match self.current_renderer() {
            Some(renderer) => renderer.set_next_url(uri, metadata),
            None => Ok(()),
        }
    }

    // Browsing

    /// One page of the children of `object_id` on the selected server.
    ///
    /// Empty without a selected server. Pages hold at most
    /// [`upnp_api::MAX_BROWSE`] entries; pass a larger `starting_index` for
    /// the next one.
    pub fn browse(&self, object_id: &str, starting_index: u32) -> Result<BrowseResult> {
        match self.current_server() {
            Some(server) => server.browse(object_id, starting_index),
            None => Ok(BrowseResult::default()),
        }
    }

    /// Play `object_id` from the selected server on the selected renderer.
    ///
    /// The first resource of the first playable item is loaded together with
    /// the whole metadata document. Nothing happens without a server, a
    /// renderer, or a resource.
    pub fn browse_metadata(&self, object_id: &str) -> Result<()> {
        let (Some(server), Some(renderer)) = (self.current_server(), self.current_renderer()) else {
            tracing::debug!("Nothing to play {} on", object_id);
            return Ok(());
        };

        let result = server.browse_metadata(object_id)?;
        let resource = result
            .items
            .iter()
            .find_map(|item| item.first_resource());
        match resource {
            Some(resource) => renderer.set_url(&resource.url, &result.didl),
            None => {
                tracing::debug!("{} has no playable resource", object_id);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for MediaControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.session.lock();
        f.debug_struct("MediaControl")
            .field("renderers", &session.renderers.len())
            .field("servers", &session.servers.len())
            .field("hooks", &self.inner.hooks.len())
            .finish()
    }
}
