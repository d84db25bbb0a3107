//! Event hooks.
//!
//! A [`MediaHook`] is a bundle of optional callbacks, one per event kind.
//! Subscribers register hooks under a string key with
//! [`MediaControl::subscribe_hook`](crate::MediaControl::subscribe_hook);
//! every event goes to each registered hook that filled the matching slot.
//! Hooks are independent and no delivery order between them is promised.
//!
//! Callbacks run on whichever thread produced the event: the discovery
//! thread, the notification dispatcher, a position clock, or the caller of
//! a control method. They may call back into the control point.
//!
//! ```
//! use mediacp::MediaHook;
//!
//! let hook = MediaHook::new()
//!     .on_renderer_found(|renderer| println!("found {:?}", renderer))
//!     .on_volume(|_, volume| println!("volume {}", volume));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use upnp_api::{Item, PlaybackState};

use crate::renderer::Renderer;
use crate::server::Server;

type Callback<T> = Option<Arc<T>>;

pub type RendererCallback = dyn Fn(&Arc<Renderer>) + Send + Sync;
pub type ServerCallback = dyn Fn(&Arc<Server>) + Send + Sync;
pub type RendererSelectedCallback = dyn Fn(Option<&Arc<Renderer>>) + Send + Sync;
pub type ServerSelectedCallback = dyn Fn(Option<&Arc<Server>>) + Send + Sync;
pub type TransportStateCallback = dyn Fn(&Arc<Renderer>, PlaybackState) + Send + Sync;
pub type SecondsCallback = dyn Fn(&Arc<Renderer>, u32) + Send + Sync;
pub type MetaDataCallback = dyn Fn(&Arc<Renderer>, &Item) + Send + Sync;
pub type MuteCallback = dyn Fn(&Arc<Renderer>, bool) + Send + Sync;
pub type VolumeCallback = dyn Fn(&Arc<Renderer>, u32) + Send + Sync;
pub type CurrentTimeCallback = dyn Fn(&Arc<Renderer>, u32, f64) + Send + Sync;
pub type DeltaCallback = dyn Fn(i32) + Send + Sync;

#[derive(Clone, Default)]
pub struct MediaHook {
    pub renderer_found: Callback<RendererCallback>,
    pub renderer_lost: Callback<RendererCallback>,
    pub renderer_selected: Callback<RendererSelectedCallback>,
    pub server_found: Callback<ServerCallback>,
    pub server_lost: Callback<ServerCallback>,
    pub server_selected: Callback<ServerSelectedCallback>,
    pub transport_state: Callback<TransportStateCallback>,
    pub current_track_duration: Callback<SecondsCallback>,
    pub current_track_meta_data: Callback<MetaDataCallback>,
    pub mute: Callback<MuteCallback>,
    pub volume: Callback<VolumeCallback>,
    /// Position in seconds and in percent of the track (0..=100)
    pub current_time: Callback<CurrentTimeCallback>,
    pub set_volume_delta: Callback<DeltaCallback>,
    pub set_seek_delta: Callback<DeltaCallback>,
}

impl MediaHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_renderer_found(mut self, f: impl Fn(&Arc<Renderer>) + Send + Sync + 'static) -> Self {
        self.renderer_found = Some(Arc::new(f));
        self
    }

    pub fn on_renderer_lost(mut self, f: impl Fn(&Arc<Renderer>) + Send + Sync + 'static) -> Self {
        self.renderer_lost = Some(Arc::new(f));
        self
    }

    /// Called with `None` when the selection is cleared.
    pub fn on_renderer_selected(
        mut self,
        f: impl Fn(Option<&Arc<Renderer>>) + Send + Sync + 'static,
    ) -> Self {
        self.renderer_selected = Some(Arc::new(f));
        self
    }

    pub fn on_server_found(mut self, f: impl Fn(&Arc<Server>) + Send + Sync + 'static) -> Self {
        self.server_found = Some(Arc::new(f));
        self
    }

    pub fn on_server_lost(mut self, f: impl Fn(&Arc<Server>) + Send + Sync + 'static) -> Self {
        self.server_lost = Some(Arc::new(f));
        self
    }

    pub fn on_server_selected(
        mut self,
        f: impl Fn(Option<&Arc<Server>>) + Send + Sync + 'static,
    ) -> Self {
        self.server_selected = Some(Arc::new(f));
        self
    }

    pub fn on_transport_state(
        mut self,
        f: impl Fn(&Arc<Renderer>, PlaybackState) + Send + Sync + 'static,
    ) -> Self {
        self.transport_state = Some(Arc::new(f));
        self
    }

    pub fn on_current_track_duration(
        mut self,
        f: impl Fn(&Arc<Renderer>, u32) + Send + Sync + 'static,
    ) -> Self {
        self.current_track_duration = Some(Arc::new(f));
        self
    }

    pub fn on_current_track_meta_data(
        mut self,
        f: impl Fn(&Arc<Renderer>, &Item) + Send + Sync + 'static,
    ) -> Self {
        self.current_track_meta_data = Some(Arc::new(f));
        self
    }

    pub fn on_mute(mut self, f: impl Fn(&Arc<Renderer>, bool) + Send + Sync + 'static) -> Self {
        self.mute = Some(Arc::new(f));
        self
    }

    pub fn on_volume(mut self, f: impl Fn(&Arc<Renderer>, u32) + Send + Sync + 'static) -> Self {
        self.volume = Some(Arc::new(f));
        self
    }

    pub fn on_current_time(
        mut self,
        f: impl Fn(&Arc<Renderer>, u32, f64) + Send + Sync + 'static,
    ) -> Self {
        self.current_time = Some(Arc::new(f));
        self
    }

    pub fn on_set_volume_delta(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.set_volume_delta = Some(Arc::new(f));
        self
    }

    pub fn on_set_seek_delta(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.set_seek_delta = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for MediaHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = [
            ("renderer_found", self.renderer_found.is_some()),
            ("renderer_lost", self.renderer_lost.is_some()),
            ("renderer_selected", self.renderer_selected.is_some()),
            ("server_found", self.server_found.is_some()),
            ("server_lost", self.server_lost.is_some()),
            ("server_selected", self.server_selected.is_some()),
            ("transport_state", self.transport_state.is_some()),
            ("current_track_duration", self.current_track_duration.is_some()),
            ("current_track_meta_data", self.current_track_meta_data.is_some()),
            ("mute", self.mute.is_some()),
            ("volume", self.volume.is_some()),
            ("current_time", self.current_time.is_some()),
            ("set_volume_delta", self.set_volume_delta.is_some()),
            ("set_seek_delta", self.set_seek_delta.is_some()),
        ];
        let filled: Vec<&str> = slots
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect();
        f.debug_struct("MediaHook").field("slots", &filled).finish()
    }
}

/// Hooks keyed by subscriber name.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<String, Arc<MediaHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` under `key`, replacing any hook already there.
    pub fn register(&self, key: impl Into<String>, hook: MediaHook) {
        let key = key.into();
        if self.hooks.write().insert(key.clone(), Arc::new(hook)).is_some() {
            tracing::debug!("Replaced hook {}", key);
        }
    }

    /// Returns whether a hook was registered under `key`.
    pub fn unregister(&self, key: &str) -> bool {
        self.hooks.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// The callbacks filled for one slot, taken under the lock and returned
    /// so they can be invoked after it is released.
    pub fn slots<T: ?Sized>(&self, pick: impl Fn(&MediaHook) -> &Callback<T>) -> Vec<Arc<T>> {
        self.hooks
            .read()
            .values()
            .filter_map(|hook| pick(hook).clone())
            .collect()
    }
}
