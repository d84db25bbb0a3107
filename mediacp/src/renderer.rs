//! Renderer state machine.
//!
//! A [`Renderer`] wraps the AVTransport and RenderingControl services of a
//! media renderer. Its transport state only changes when the device reports
//! a `TransportState` through eventing; local calls never assume a
//! transition happened. While the state is `PLAYING` a [`PositionClock`]
//! republishes the position every second.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use upnp_api::{
    decode_notification, parse_bool, time_to_seconds, time_to_string, ActionArgs, DidlLite, Item,
    MediaInfo, PlaybackState, PositionInfo, SeekMode, Service, TransportInfo, CHANNEL_MASTER,
    PLAY_SPEED_NORMAL,
};
use upnp_discovery::Device;

use crate::clock::{PositionClock, TICK};
use crate::device::DeviceProxy;
use crate::error::Result;
use crate::invoker::ActionInvoker;
use crate::transport::{DeviceTransport, NotifyCallback};

/// Evented state variable carrying AVTransport and RenderingControl changes.
const LAST_CHANGE: &str = "LastChange";

/// A change reported by a renderer, through eventing or a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    TransportState(PlaybackState),
    TrackDuration(u32),
    /// Metadata of the new track; an empty item when the renderer cleared it
    TrackMetaData(Item),
    Mute(bool),
    Volume(u32),
    /// Position in seconds and as a percentage of the track duration
    CurrentTime { seconds: u32, percent: f64 },
}

pub(crate) type RendererSink = Arc<dyn Fn(&Arc<Renderer>, RendererEvent) + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct Status {
    state: PlaybackState,
    position: u32,
    duration: u32,
}

pub struct Renderer {
    weak_self: Weak<Renderer>,
    device: Device,
    transport: Arc<dyn DeviceTransport>,
    av_transport: ActionInvoker,
    rendering_control: ActionInvoker,
    icon: RwLock<Option<PathBuf>>,
    status: Mutex<Status>,
    sink: RwLock<Option<RendererSink>>,
    clock: Mutex<Option<PositionClock>>,
    detached: AtomicBool,
    // Held for each action, and across multi-action sequences
    action_lock: ReentrantMutex<()>,
}

impl Renderer {
    pub fn new(transport: Arc<dyn DeviceTransport>, device: Device) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            av_transport: ActionInvoker::new(
                Arc::clone(&transport),
                device.clone(),
                Service::AVTransport,
            ),
            rendering_control: ActionInvoker::new(
                Arc::clone(&transport),
                device.clone(),
                Service::RenderingControl,
            ),
            device,
            transport,
            icon: RwLock::new(None),
            status: Mutex::new(Status::default()),
            sink: RwLock::new(None),
            clock: Mutex::new(None),
            detached: AtomicBool::new(false),
            action_lock: ReentrantMutex::new(()),
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.status.lock().state
    }

    /// Last known position in seconds.
    pub fn position(&self) -> u32 {
        self.status.lock().position
    }

    /// Last known track duration in seconds.
    pub fn duration(&self) -> u32 {
        self.status.lock().duration
    }

    pub(crate) fn set_icon(&self, path: PathBuf) {
        *self.icon.write() = Some(path);
    }

    // Volume and mute

    pub fn get_volume(&self) -> Result<u32> {
        let _op = self.action_lock.lock();
        let mut out = ActionArgs::new().with("CurrentVolume", 0u32);
        self.rendering_control.send(
            "GetVolume",
            ActionArgs::new().with("Channel", CHANNEL_MASTER),
            &mut out,
        )?;
        Ok(out.get_uint("CurrentVolume").unwrap_or_default())
    }

    /// Set the master volume; values above 100 are sent as 100.
    pub fn set_volume(&self, volume: u32) -> Result<()> {
        let _op = self.action_lock.lock();
        self.rendering_control.call(
            "SetVolume",
            ActionArgs::new()
                .with("Channel", CHANNEL_MASTER)
                .with("DesiredVolume", volume.min(100)),
        )
    }

    /// Change the volume by `adjustment` relative to the device's current
    /// volume, returning the volume sent.
    pub fn set_relative_volume(&self, adjustment: i32) -> Result<u32> {
        let _op = self.action_lock.lock();
        let target = clamp_volume(self.get_volume()?, adjustment);
        self.set_volume(target)?;
        Ok(target)
    }

    pub fn get_mute(&self) -> Result<bool> {
        let _op = self.action_lock.lock();
        let mut out = ActionArgs::new().with("CurrentMute", false);
        self.rendering_control.send(
            "GetMute",
            ActionArgs::new().with("Channel", CHANNEL_MASTER),
            &mut out,
        )?;
        Ok(out.get_bool("CurrentMute").unwrap_or_default())
    }

    pub fn set_mute(&self, mute: bool) -> Result<()> {
        let _op = self.action_lock.lock();
        self.rendering_control.call(
            "SetMute",
            ActionArgs::new()
                .with("Channel", CHANNEL_MASTER)
                .with("DesiredMute", mute),
        )
    }

    /// Invert the device's mute setting, returning the new value.
    pub fn toggle_mute(&self) -> Result<bool> {
        let _op = self.action_lock.lock();
        let mute = !self.get_mute()?;
        self.set_mute(mute)?;
        Ok(mute)
    }

    // Transport

    pub fn play(&self) -> Result<()> {
        let _op = self.action_lock.lock();
        self.av_transport
            .call("Play", ActionArgs::new().with("Speed", PLAY_SPEED_NORMAL))
    }

    pub fn pause(&self) -> Result<()> {
        let _op = self.action_lock.lock();
        self.av_transport.call("Pause", ActionArgs::new())
    }

    pub fn stop(&self) -> Result<()> {
        let _op = self.action_lock.lock();
        self.av_transport.call("Stop", ActionArgs::new())
    }

    /// Play when paused or stopped, pause when playing, nothing otherwise.
    pub fn play_pause(&self) -> Result<()> {
        match self.state() {
            PlaybackState::Paused | PlaybackState::Stopped => self.play(),
            PlaybackState::Playing => self.pause(),
            state => {
                tracing::debug!("{}: ignoring play/pause while {}", self.device.name, state);
                Ok(())
            }
        }
    }

    /// Load `uri` and start playing it.
    ///
    /// Issues Stop, SetAVTransportURI and Play, with no other action on this
    /// renderer in between. A failing Stop is ignored since an idle renderer
    /// may refuse it.
    pub fn set_url(&self, uri: &str, metadata: &str) -> Result<()> {
        let _op = self.action_lock.lock();
        if let Err(e) = self.stop() {
            tracing::debug!("{}: Stop before load failed: {}", self.device.name, e);
        }
        self.av_transport.call(
            "SetAVTransportURI",
            ActionArgs::new()
                .with("CurrentURI", uri)
                .with("CurrentURIMetaData", metadata),
        )?;
        self.play()
    }

    /// Queue `uri` to play after the current track.
    pub fn set_next_url(&self, uri: &str, metadata: &str) -> Result<()> {
        let _op = self.action_lock.lock();
        self.av_transport.call(
            "SetNextAVTransportURI",
            ActionArgs::new()
                .with("NextURI", uri)
                .with("NextURIMetaData", metadata),
        )
    }

    /// Seek, then publish the new position without waiting for the clock.
    pub fn seek(&self, mode: SeekMode, target: &str) -> Result<()> {
        let _op = self.action_lock.lock();
        self.av_transport.call(
            "Seek",
            ActionArgs::new()
                .with("Unit", mode.as_str())
                .with("Target", target),
        )?;
        self.publish_current_time();
        Ok(())
    }

    /// Seek to an absolute position in seconds.
    pub fn seek_to(&self, seconds: u32) -> Result<()> {
        self.seek(SeekMode::AbsTime, &time_to_string(seconds))
    }

    /// Seek `delta` seconds from the live position, stopping at the start.
    pub fn seek_relative(&self, delta: i32) -> Result<()> {
        let _op = self.action_lock.lock();
        let current = i64::from(self.current_time());
        let target = (current + i64::from(delta)).clamp(0, i64::from(u32::MAX)) as u32;
        self.seek_to(target)
    }

    /// Seek to `percent` (0..=100) of the current track.
    pub fn seek_percent(&self, percent: f64) -> Result<()> {
        let _op = self.action_lock.lock();
        let duration = self.track_duration()?;
        let fraction = if percent.is_finite() {
            percent.clamp(0.0, 100.0) / 100.0
        } else {
            0.0
        };
        self.seek_to((f64::from(duration) * fraction) as u32)
    }

    /// Position in seconds read from the device.
    ///
    /// Uses `AbsTime`, or `RelTime` for devices that do not implement it.
    /// When the request fails the last known position is returned.
    pub fn current_time(&self) -> u32 {
        let _op = self.action_lock.lock();
        let mut out = ActionArgs::new().with("RelTime", "").with("AbsTime", "");
        match self
            .av_transport
            .send("GetPositionInfo", ActionArgs::new(), &mut out)
        {
            Ok(()) => {
                let seconds = position_seconds(
                    out.get_str("AbsTime").unwrap_or_default(),
                    out.get_str("RelTime").unwrap_or_default(),
                );
                self.status.lock().position = seconds;
                seconds
            }
            Err(e) => {
                tracing::warn!("{}: position unavailable: {}", self.device.name, e);
                self.position()
            }
        }
    }

    /// Duration of the current track in seconds, read from the device.
    pub fn track_duration(&self) -> Result<u32> {
        let info = self.get_position_info()?;
        let duration = time_to_seconds(&info.track_duration);
        self.status.lock().duration = duration;
        Ok(duration)
    }

    pub fn get_transport_info(&self) -> Result<TransportInfo> {
        let _op = self.action_lock.lock();
        let mut out = TransportInfo::out_args();
        self.av_transport
            .send("GetTransportInfo", ActionArgs::new(), &mut out)?;
        Ok(TransportInfo::from_args(&out))
    }

    pub fn get_position_info(&self) -> Result<PositionInfo> {
        let _op = self.action_lock.lock();
        let mut out = PositionInfo::out_args();
        self.av_transport
            .send("GetPositionInfo", ActionArgs::new(), &mut out)?;
        Ok(PositionInfo::from_args(&out))
    }

    pub fn get_media_info(&self) -> Result<MediaInfo> {
        let _op = self.action_lock.lock();
        let mut out = MediaInfo::out_args();
        self.av_transport
            .send("GetMediaInfo", ActionArgs::new(), &mut out)?;
        Ok(MediaInfo::from_args(&out))
    }

    /// Re-read volume, mute, transport state and track duration and publish
    /// each. A property that cannot be read is skipped.
    pub fn resync(&self) {
        match self.get_volume() {
            Ok(volume) => self.emit(RendererEvent::Volume(volume)),
            Err(e) => tracing::debug!("{}: resync volume: {}", self.device.name, e),
        }
        match self.get_mute() {
            Ok(mute) => self.emit(RendererEvent::Mute(mute)),
            Err(e) => tracing::debug!("{}: resync mute: {}", self.device.name, e),
        }
        match self.get_transport_info() {
            Ok(info) => self.emit(RendererEvent::TransportState(info.state())),
            Err(e) => tracing::debug!("{}: resync transport state: {}", self.device.name, e),
        }
        match self.track_duration() {
            Ok(duration) => self.emit(RendererEvent::TrackDuration(duration)),
            Err(e) => tracing::debug!("{}: resync duration: {}", self.device.name, e),
        }
    }

    // Eventing

    pub(crate) fn set_sink(&self, sink: RendererSink) {
        *self.sink.write() = Some(sink);
    }

    /// Subscribe to the LastChange variable of both services.
    ///
    /// A renderer without eventing still works; it just never reports state
    /// changes on its own.
    pub(crate) fn attach(&self) {
        let weak = self.weak_self.clone();
        let on_transport: NotifyCallback = Arc::new(move |value: &str| {
            if let Some(renderer) = weak.upgrade() {
                renderer.handle_av_transport_event(value);
            }
        });
        if let Err(e) = self.transport.subscribe(
            &self.device,
            Service::AVTransport,
            LAST_CHANGE,
            on_transport,
        ) {
            tracing::warn!("{}: no AVTransport events: {}", self.device.name, e);
        }

        let weak = self.weak_self.clone();
        let on_rendering: NotifyCallback = Arc::new(move |value: &str| {
            if let Some(renderer) = weak.upgrade() {
                renderer.handle_rendering_control_event(value);
            }
        });
        if let Err(e) = self.transport.subscribe(
            &self.device,
            Service::RenderingControl,
            LAST_CHANGE,
            on_rendering,
        ) {
            tracing::warn!("{}: no RenderingControl events: {}", self.device.name, e);
        }
    }

    /// Stop the clock, drop the event sink and the device subscriptions.
    ///
    /// Nothing is published after this returns.
    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        if let Some(clock) = self.clock.lock().take() {
            clock.stop();
        }
        *self.sink.write() = None;
        self.transport.unsubscribe(&self.device);
    }

    pub(crate) fn handle_av_transport_event(&self, last_change: &str) {
        let properties = decode_notification(last_change);

        if let Some(duration) = properties.get("CurrentTrackDuration") {
            let seconds = time_to_seconds(duration);
            self.status.lock().duration = seconds;
            self.emit(RendererEvent::TrackDuration(seconds));
        }

        if let Some(metadata) = properties.get("CurrentTrackMetaData") {
            let metadata = metadata.trim();
            if metadata.is_empty() || metadata == "NOT_IMPLEMENTED" {
                self.emit(RendererEvent::TrackMetaData(Item::default()));
            } else {
                match DidlLite::parse(metadata) {
                    Ok(didl) => {
                        if let Some(item) = didl.first_item() {
                            self.emit(RendererEvent::TrackMetaData(item.clone()));
                        }
                    }
                    Err(e) => tracing::warn!("{}: unreadable track metadata: {}", self.device.name, e),
                }
            }
        }

        if let Some(state) = properties.get("TransportState") {
            let state = PlaybackState::from_name(state);
            self.status.lock().state = state;
            tracing::debug!("{}: transport state {}", self.device.name, state);
            self.emit(RendererEvent::TransportState(state));
            self.restart_clock(state);
        }
    }

    pub(crate) fn handle_rendering_control_event(&self, last_change: &str) {
        let properties = decode_notification(last_change);

        if let Some(mute) = properties.get("Mute") {
            match parse_bool(mute) {
                Some(mute) => self.emit(RendererEvent::Mute(mute)),
                None => tracing::debug!("{}: bad mute {:?}", self.device.name, mute),
            }
        }

        if let Some(volume) = properties.get("Volume") {
            match volume.trim().parse::<u32>() {
                Ok(volume) => self.emit(RendererEvent::Volume(volume)),
                Err(_) => tracing::debug!("{}: bad volume {:?}", self.device.name, volume),
            }
        }
    }

    /// Publish the position now, then run the clock only while playing.
    fn restart_clock(&self, state: PlaybackState) {
        self.publish_current_time();

        let mut clock = self.clock.lock();
        if let Some(previous) = clock.take() {
            previous.stop();
        }
        if state == PlaybackState::Playing && !self.detached.load(Ordering::SeqCst) {
            *clock = Some(PositionClock::start(self.weak_self.clone(), TICK));
        }
    }

    pub(crate) fn clock_tick(&self, running: &AtomicBool) {
        let seconds = self.current_time();
        // Stopped while the request was in flight
        if !running.load(Ordering::SeqCst) {
            return;
        }
        self.emit_current_time(seconds);
    }

    fn publish_current_time(&self) {
        let seconds = self.current_time();
        self.emit_current_time(seconds);
    }

    fn emit_current_time(&self, seconds: u32) {
        let percent = percent_of(seconds, self.duration());
        self.emit(RendererEvent::CurrentTime { seconds, percent });
    }

    fn emit(&self, event: RendererEvent) {
        let sink = self.sink.read().clone();
        if let (Some(sink), Some(this)) = (sink, self.weak_self.upgrade()) {
            sink(&this, event);
        }
    }
}

impl DeviceProxy for Renderer {
    fn device(&self) -> &Device {
        &self.device
    }

    fn icon(&self) -> Option<PathBuf> {
        self.icon.read().clone()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("udn", &self.device.udn)
            .field("name", &self.device.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Apply a relative change to a volume, keeping it within 0..=100.
pub fn clamp_volume(current: u32, adjustment: i32) -> u32 {
    (i64::from(current) + i64::from(adjustment)).clamp(0, 100) as u32
}

/// Share of `duration` reached at `position`, in percent.
pub fn percent_of(position: u32, duration: u32) -> f64 {
    if duration == 0 {
        return 0.0;
    }
    (f64::from(position) / f64::from(duration) * 100.0).clamp(0.0, 100.0)
}

fn is_time_value(value: &str) -> bool {
    let value = value.trim();
    value.contains(':') && value.starts_with(|c: char| c.is_ascii_digit())
}

fn position_seconds(abs_time: &str, rel_time: &str) -> u32 {
    if is_time_value(abs_time) {
        time_to_seconds(abs_time)
    } else {
        time_to_seconds(rel_time)
    }
}
