//! GENA subscriptions for [`UpnpTransport`](super::upnp::UpnpTransport).
//!
//! Three pieces cooperate:
//!
//! - a [`CallbackServer`] on an owned tokio runtime receives NOTIFY requests
//! - a dispatcher thread pulls the accepted notifications, extracts the
//!   subscribed variable and calls the subscriber, one at a time in arrival
//!   order
//! - a renewal task renews every subscription at half its granted lifetime,
//!   resubscribing once when the device refuses the renewal

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use callback_server::{CallbackServer, EventRouter, NotificationPayload};
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use upnp_api::{extract_property, UpnpClient};

use super::NotifyCallback;
use crate::error::{ControlError, Result};

/// How often the renewal task looks for subscriptions due for renewal.
const RENEWAL_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest delay before a renewal, whatever the device granted.
const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub(crate) struct EventingConfig {
    pub port_range: (u16, u16),
    pub advertised_ip: Option<IpAddr>,
    pub subscription_timeout: u32,
}

struct Subscription {
    device_key: String,
    event_url: String,
    callback_url: String,
    variable: String,
    callback: NotifyCallback,
    renew_at: Instant,
}

type SubscriptionTable = Arc<Mutex<HashMap<String, Subscription>>>;

enum Dispatch {
    Notify(NotificationPayload),
    Stop,
}

fn renewal_deadline(granted_seconds: u32) -> Instant {
    let half = Duration::from_secs(u64::from(granted_seconds) / 2);
    Instant::now() + half.max(MIN_RENEWAL_DELAY)
}

pub(crate) struct Eventing {
    client: UpnpClient,
    runtime: Runtime,
    server: Mutex<Option<CallbackServer>>,
    router: Arc<EventRouter>,
    base_url: String,
    subscription_timeout: u32,
    subscriptions: SubscriptionTable,
    next_path: AtomicU64,
    dispatch_tx: std_mpsc::Sender<Dispatch>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    renewal_stop: Mutex<Option<watch::Sender<bool>>>,
}

impl Eventing {
    pub fn start(client: UpnpClient, config: EventingConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("mediacp-events")
            .enable_all()
            .build()?;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<NotificationPayload>();

        // block_on would panic when the caller already runs inside a runtime
        let (ready_tx, ready_rx) = std_mpsc::channel();
        runtime.spawn(async move {
            let server =
                CallbackServer::with_advertised_ip(config.port_range, config.advertised_ip, event_tx)
                    .await;
            let _ = ready_tx.send(server);
        });
        let server = ready_rx
            .recv()
            .map_err(|_| ControlError::Transport("callback server task died".to_string()))??;

        let router = Arc::clone(server.router());
        let base_url = server.base_url().to_string();
        let subscriptions: SubscriptionTable = Arc::new(Mutex::new(HashMap::new()));

        let (dispatch_tx, dispatch_rx) = std_mpsc::channel();
        let forward_tx = dispatch_tx.clone();
        runtime.spawn(async move {
            while let Some(payload) = event_rx.recv().await {
                if forward_tx.send(Dispatch::Notify(payload)).is_err() {
                    break;
                }
            }
        });

        let table = Arc::clone(&subscriptions);
        let dispatcher = thread::Builder::new()
            .name("mediacp-notify".to_string())
            .spawn(move || dispatch_loop(dispatch_rx, table))?;

        let (renewal_stop, renewal_stop_rx) = watch::channel(false);
        runtime.spawn(renewal_task(
            client.clone(),
            Arc::clone(&router),
            Arc::clone(&subscriptions),
            config.subscription_timeout,
            renewal_stop_rx,
        ));

        tracing::info!("Event callbacks served at {}", base_url);

        Ok(Self {
            client,
            runtime,
            server: Mutex::new(Some(server)),
            router,
            base_url,
            subscription_timeout: config.subscription_timeout,
            subscriptions,
            next_path: AtomicU64::new(1),
            dispatch_tx,
            dispatcher: Mutex::new(Some(dispatcher)),
            renewal_stop: Mutex::new(Some(renewal_stop)),
        })
    }

    pub fn subscribe(
        &self,
        device_key: &str,
        event_url: &str,
        variable: &str,
        callback: NotifyCallback,
    ) -> Result<()> {
        let path = self.next_path.fetch_add(1, Ordering::Relaxed);
        let callback_url = format!("{}/notify/{}", self.base_url, path);

        let response = self
            .client
            .subscribe(event_url, &callback_url, self.subscription_timeout)?;
        tracing::debug!(
            "Subscribed to {} on {} as {} ({}s)",
            variable,
            event_url,
            response.sid,
            response.timeout_seconds
        );

        self.subscriptions.lock().insert(
            response.sid.clone(),
            Subscription {
                device_key: device_key.to_string(),
                event_url: event_url.to_string(),
                callback_url,
                variable: variable.to_string(),
                callback,
                renew_at: renewal_deadline(response.timeout_seconds),
            },
        );

        // Notifications arriving before this runs are parked by the router
        let router = Arc::clone(&self.router);
        self.runtime.spawn(async move {
            router.register(response.sid).await;
        });
        Ok(())
    }

    /// Forget every subscription of a device and UNSUBSCRIBE in the
    /// background, since the device may already be unreachable.
    pub fn unsubscribe(&self, device_key: &str) {
        let removed: Vec<(String, Subscription)> = {
            let mut table = self.subscriptions.lock();
            let sids: Vec<String> = table
                .iter()
                .filter(|(_, sub)| sub.device_key == device_key)
                .map(|(sid, _)| sid.clone())
                .collect();
            sids.into_iter()
                .filter_map(|sid| table.remove(&sid).map(|sub| (sid, sub)))
                .collect()
        };

        for (sid, sub) in removed {
            let router = Arc::clone(&self.router);
            let client = self.client.clone();
            self.runtime.spawn(async move {
                router.unregister(&sid).await;
                let result =
                    tokio::task::spawn_blocking(move || client.unsubscribe(&sub.event_url, &sid))
                        .await;
                if let Ok(Err(e)) = result {
                    tracing::debug!("UNSUBSCRIBE failed: {}", e);
                }
            });
        }
    }

    pub fn shutdown(&self) {
        if let Some(stop) = self.renewal_stop.lock().take() {
            let _ = stop.send(true);
        }

        let remaining: Vec<(String, Subscription)> = self.subscriptions.lock().drain().collect();
        for (sid, sub) in remaining {
            if let Err(e) = self.client.unsubscribe(&sub.event_url, &sid) {
                tracing::debug!("UNSUBSCRIBE {} failed: {}", sid, e);
            }
        }

        if let Some(server) = self.server.lock().take() {
            let (done_tx, done_rx) = std_mpsc::channel();
            self.runtime.spawn(async move {
                let _ = server.shutdown().await;
                let _ = done_tx.send(());
            });
            let _ = done_rx.recv_timeout(Duration::from_secs(5));
        }

        let _ = self.dispatch_tx.send(Dispatch::Stop);
        if let Some(handle) = self.dispatcher.lock().take() {
            // A callback may shut the transport down from the dispatcher itself
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!("Notification dispatcher panicked");
            }
        }
        tracing::info!("Eventing stopped");
    }

    #[cfg(test)]
    fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

fn dispatch_loop(rx: std_mpsc::Receiver<Dispatch>, subscriptions: SubscriptionTable) {
    for message in rx {
        let payload = match message {
            Dispatch::Notify(payload) => payload,
            Dispatch::Stop => break,
        };

        let target = subscriptions
            .lock()
            .get(&payload.subscription_id)
            .map(|sub| (Arc::clone(&sub.callback), sub.variable.clone()));
        let Some((callback, variable)) = target else {
            tracing::debug!("Dropping event for stale subscription {}", payload.subscription_id);
            continue;
        };

        match extract_property(&payload.event_xml, &variable) {
            Some(value) => callback(&value),
            None => tracing::trace!(
                "Event {:?} on {} carries no {}",
                payload.sequence,
                payload.subscription_id,
                variable
            ),
        }
    }
    tracing::debug!("Notification dispatcher stopped");
}

async fn renewal_task(
    client: UpnpClient,
    router: Arc<EventRouter>,
    subscriptions: SubscriptionTable,
    requested_timeout: u32,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut check_interval = interval(RENEWAL_CHECK_INTERVAL);

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                renew_due(&client, &router, &subscriptions, requested_timeout).await;
            }
            _ = stop_rx.changed() => break,
        }
    }
    tracing::debug!("Renewal task stopped");
}

async fn renew_due(
    client: &UpnpClient,
    router: &Arc<EventRouter>,
    subscriptions: &SubscriptionTable,
    requested_timeout: u32,
) {
    let now = Instant::now();
    let due: Vec<(String, String)> = subscriptions
        .lock()
        .iter()
        .filter(|(_, sub)| sub.renew_at <= now)
        .map(|(sid, sub)| (sid.clone(), sub.event_url.clone()))
        .collect();

    for (sid, event_url) in due {
        let renewal = {
            let client = client.clone();
            let (sid, event_url) = (sid.clone(), event_url.clone());
            tokio::task::spawn_blocking(move || {
                client.renew_subscription(&event_url, &sid, requested_timeout)
            })
            .await
        };

        match renewal {
            Ok(Ok(granted)) => {
                if let Some(sub) = subscriptions.lock().get_mut(&sid) {
                    sub.renew_at = renewal_deadline(granted);
                }
                tracing::debug!("Renewed {} for {}s", sid, granted);
            }
            Ok(Err(e)) => {
                tracing::warn!("Renewal of {} refused: {}; resubscribing", sid, e);
                resubscribe(client, router, subscriptions, &sid, requested_timeout).await;
            }
            Err(e) => tracing::error!("Renewal worker failed: {}", e),
        }
    }
}

async fn resubscribe(
    client: &UpnpClient,
    router: &Arc<EventRouter>,
    subscriptions: &SubscriptionTable,
    old_sid: &str,
    requested_timeout: u32,
) {
    let Some(old) = subscriptions.lock().remove(old_sid) else {
        // Unsubscribed while the renewal was in flight
        return;
    };
    router.unregister(old_sid).await;

    let response = {
        let client = client.clone();
        let (event_url, callback_url) = (old.event_url.clone(), old.callback_url.clone());
        tokio::task::spawn_blocking(move || {
            client.subscribe(&event_url, &callback_url, requested_timeout)
        })
        .await
    };

    match response {
        Ok(Ok(response)) => {
            tracing::info!("Resubscribed {} as {}", old.event_url, response.sid);
            subscriptions.lock().insert(
                response.sid.clone(),
                Subscription {
                    renew_at: renewal_deadline(response.timeout_seconds),
                    ..old
                },
            );
            router.register(response.sid).await;
        }
        Ok(Err(e)) => tracing::warn!(
            "Dropping subscription to {} on {}: {}",
            old.variable,
            old.event_url,
            e
        ),
        Err(e) => tracing::error!("Resubscribe worker failed: {}", e),
    }
}
