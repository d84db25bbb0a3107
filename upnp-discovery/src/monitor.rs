//! Continuous discovery.
//!
//! [`DiscoveryMonitor`] repeats a search round on a background thread and
//! reports devices appearing and disappearing. A device that stops
//! answering is only reported lost after it has been missing from several
//! consecutive rounds, since SSDP answers are UDP and routinely dropped.
//!
//! Alongside the rounds the monitor listens for SSDP announcements: an
//! `ssdp:byebye` reports the device lost at once, and an `ssdp:alive` from
//! an unknown device reports it found without waiting for the next round.

use crate::discovery::{describe, DiscoveryIterator};
use crate::error::Result;
use crate::ssdp::{NotifyListener, SsdpNotification};
use crate::{Device, DeviceEvent, DeviceKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Read timeout of the announcement socket, bounding how long the listener
/// thread outlives a stopped monitor.
const NOTIFY_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub kinds: Vec<DeviceKind>,
    /// How long each search round listens for responses.
    pub search_timeout: Duration,
    /// Pause between two rounds.
    pub rescan_interval: Duration,
    /// Consecutive rounds a device may be missing before it is reported lost.
    pub missed_scans_before_lost: u32,
    /// Also react to `ssdp:alive` and `ssdp:byebye` announcements.
    pub listen_for_announcements: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            kinds: vec![DeviceKind::Renderer, DeviceKind::Server],
            search_timeout: Duration::from_secs(3),
            rescan_interval: Duration::from_secs(30),
            missed_scans_before_lost: 2,
            listen_for_announcements: true,
        }
    }
}

/// Turns successive scan results into found/lost events.
#[derive(Debug)]
pub struct DeviceTracker {
    known: HashMap<(DeviceKind, String), (Device, u32)>,
    missed_scans_before_lost: u32,
}

impl DeviceTracker {
    pub fn new(missed_scans_before_lost: u32) -> Self {
        Self {
            known: HashMap::new(),
            missed_scans_before_lost: missed_scans_before_lost.max(1),
        }
    }

    /// Record the devices seen in one scan round.
    ///
    /// Returns `Found` for devices not seen before (or whose location
    /// changed) and `Lost` for devices missing for too many rounds.
    pub fn update(&mut self, seen: Vec<Device>) -> Vec<DeviceEvent> {
        let mut events = Vec::new();

        for entry in self.known.values_mut() {
            entry.1 += 1;
        }

        for device in seen {
            self.record(device, &mut events);
        }

        let threshold = self.missed_scans_before_lost;
        let lost: Vec<_> = self
            .known
            .iter()
            .filter(|(_, (_, missed))| *missed >= threshold)
            .map(|(key, _)| key.clone())
            .collect();
        for key in lost {
            if let Some((device, _)) = self.known.remove(&key) {
                events.push(DeviceEvent::Lost(device));
            }
        }

        events
    }

    /// Record a device announced outside a scan round.
    pub fn announced(&mut self, device: Device) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        self.record(device, &mut events);
        events
    }

    /// Mark a known device as seen. Returns false when the device is
    /// unknown or now lives at another location.
    pub fn refresh(&mut self, kind: DeviceKind, udn: &str, location: &str) -> bool {
        match self.known.get_mut(&(kind, udn.to_string())) {
            Some((known, missed)) if known.location == location => {
                *missed = 0;
                true
            }
            _ => false,
        }
    }

    /// Forget every device with `udn`, reporting each one lost.
    pub fn byebye(&mut self, udn: &str) -> Vec<DeviceEvent> {
        let gone: Vec<_> = self
            .known
            .keys()
            .filter(|(_, id)| id == udn)
            .cloned()
            .collect();
        gone.into_iter()
            .filter_map(|key| self.known.remove(&key))
            .map(|(device, _)| DeviceEvent::Lost(device))
            .collect()
    }

    fn record(&mut self, device: Device, events: &mut Vec<DeviceEvent>) {
        let key = (device.kind, tracking_id(&device));
        match self.known.get_mut(&key) {
            Some((known, missed)) if known.location == device.location => {
                *missed = 0;
                *known = device;
            }
            Some((known, missed)) => {
                // Same device, new address: the old handle is stale
                events.push(DeviceEvent::Lost(known.clone()));
                events.push(DeviceEvent::Found(device.clone()));
                *known = device;
                *missed = 0;
            }
            None => {
                events.push(DeviceEvent::Found(device.clone()));
                self.known.insert(key, (device, 0));
            }
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.known.values().map(|(device, _)| device)
    }
}

fn tracking_id(device: &Device) -> String {
    if device.udn.is_empty() {
        device.location.clone()
    } else {
        device.udn.clone()
    }
}

/// Turn one announcement into found/lost events.
///
/// Only alive announcements whose NT is the device type of one of `kinds`
/// are looked at; devices send one per advertised type and service.
/// `describe` fetches the description of a device not known yet.
fn apply_notification<D>(
    tracker: &mut DeviceTracker,
    kinds: &[DeviceKind],
    notification: SsdpNotification,
    describe: D,
) -> Vec<DeviceEvent>
where
    D: FnOnce(&str, DeviceKind) -> Result<Device>,
{
    match &notification {
        SsdpNotification::ByeBye { .. } => {
            let events = tracker.byebye(notification.udn());
            if !events.is_empty() {
                tracing::debug!("{} said goodbye", notification.udn());
            }
            events
        }
        SsdpNotification::Alive {
            notification_type,
            location,
            ..
        } => {
            let Some(kind) = kinds
                .iter()
                .copied()
                .find(|kind| notification_type.starts_with(kind.device_type_prefix()))
            else {
                return Vec::new();
            };
            if tracker.refresh(kind, notification.udn(), location) {
                return Vec::new();
            }
            match describe(location.as_str(), kind) {
                Ok(device) => tracker.announced(device),
                Err(e) => {
                    tracing::debug!("Announced device at {} not described: {}", location, e);
                    Vec::new()
                }
            }
        }
    }
}

enum MonitorCommand {
    Rescan,
    Announcement(SsdpNotification),
    Stop,
}

/// Forward announcements to the monitor loop until it stops.
fn spawn_announcement_listener(
    command_tx: mpsc::Sender<MonitorCommand>,
    running: Arc<AtomicBool>,
) {
    let mut listener = match NotifyListener::bind(NOTIFY_POLL) {
        Ok(listener) => listener,
        Err(e) => {
            tracing::warn!("Not listening for SSDP announcements: {}", e);
            return;
        }
    };

    let spawned = thread::Builder::new()
        .name("upnp-ssdp-notify".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                match listener.next_notification() {
                    Ok(Some(notification)) => {
                        if command_tx.send(MonitorCommand::Announcement(notification)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("SSDP announcement listener stopped: {}", e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!("Failed to spawn SSDP announcement thread: {}", e);
    }
}

/// Background discovery loop.
///
/// The callback runs on the monitor thread; it should hand work off rather
/// than block for long, as the next round waits for it.
pub struct DiscoveryMonitor {
    command_tx: mpsc::Sender<MonitorCommand>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DiscoveryMonitor {
    pub fn start<F>(config: MonitorConfig, mut on_event: F) -> Self
    where
        F: FnMut(DeviceEvent) + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        if config.listen_for_announcements {
            spawn_announcement_listener(command_tx.clone(), Arc::clone(&running));
        }

        let handle = thread::Builder::new()
            .name("upnp-discovery".to_string())
            .spawn(move || {
                let mut tracker = DeviceTracker::new(config.missed_scans_before_lost);
                let mut next_round = Instant::now();
                tracing::debug!("Discovery monitor started");

                while thread_running.load(Ordering::SeqCst) {
                    if Instant::now() >= next_round {
                        let seen: Vec<Device> = DiscoveryIterator::new(&config.kinds, config.search_timeout)
                            .unwrap_or_else(|e| {
                                tracing::warn!("Discovery round failed to start: {}", e);
                                DiscoveryIterator::empty()
                            })
                            .filter_map(|event| match event {
                                DeviceEvent::Found(device) => Some(device),
                                DeviceEvent::Lost(_) => None,
                            })
                            .collect();
                        tracing::trace!("Discovery round saw {} devices", seen.len());

                        for event in tracker.update(seen) {
                            if !thread_running.load(Ordering::SeqCst) {
                                break;
                            }
                            on_event(event);
                        }
                        next_round = Instant::now() + config.rescan_interval;
                    }

                    let wait = next_round.saturating_duration_since(Instant::now());
                    match command_rx.recv_timeout(wait) {
                        Ok(MonitorCommand::Rescan) => next_round = Instant::now(),
                        Ok(MonitorCommand::Announcement(notification)) => {
                            let events = apply_notification(
                                &mut tracker,
                                &config.kinds,
                                notification,
                                |location, kind| describe(location, kind, config.search_timeout),
                            );
                            for event in events {
                                if !thread_running.load(Ordering::SeqCst) {
                                    break;
                                }
                                on_event(event);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(MonitorCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("Discovery monitor stopped");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn discovery thread: {}", e);
                running.store(false, Ordering::SeqCst);
                None
            }
        };

        Self {
            command_tx,
            running,
            handle,
        }
    }

    /// Start a new search round now instead of waiting for the interval.
    pub fn rescan(&self) {
        let _ = self.command_tx.send(MonitorCommand::Rescan);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for the current round to finish.
    ///
    /// No events are delivered after this returns.
    pub fn stop(mut self) {
        self.signal_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Discovery thread panicked");
            }
        }
    }

    fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.command_tx.send(MonitorCommand::Stop);
    }
}

impl Drop for DiscoveryMonitor {
    fn drop(&mut self) {
        // Detach: a round in flight may still be waiting on the network
        self.signal_stop();
    }
}
