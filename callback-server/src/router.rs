//! Event routing for HTTP callback notifications.
//!
//! The router keeps the set of live subscription IDs and forwards each
//! accepted NOTIFY body to a channel. A device may send its initial event
//! before the SUBSCRIBE response has been processed, so notifications for
//! unknown SIDs are parked in a short-lived backlog and replayed when the SID
//! is registered.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

/// Maximum number of parked notifications.
const BACKLOG_CAPACITY: usize = 64;

/// How long a parked notification waits for its SID to be registered.
const BACKLOG_TTL: Duration = Duration::from_secs(10);

/// An unparsed GENA notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    /// Value of the SID header
    pub subscription_id: String,
    /// Value of the SEQ header, when present and numeric
    pub sequence: Option<u32>,
    /// Raw `e:propertyset` body
    pub event_xml: String,
}

/// What the router did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded to the channel
    Delivered,
    /// Parked until the SID is registered
    Deferred,
    /// Dropped: the backlog is full
    Rejected,
}

#[derive(Default)]
struct RouterState {
    subscriptions: HashSet<String>,
    backlog: VecDeque<(Instant, NotificationPayload)>,
}

impl RouterState {
    fn prune(&mut self, now: Instant) {
        while let Some((parked_at, _)) = self.backlog.front() {
            if now.duration_since(*parked_at) > BACKLOG_TTL {
                self.backlog.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Routes events from HTTP callbacks to a channel.
#[derive(Clone)]
pub struct EventRouter {
    state: Arc<RwLock<RouterState>>,
    event_sender: mpsc::UnboundedSender<NotificationPayload>,
}

impl EventRouter {
    /// ```
    /// use tokio::sync::mpsc;
    /// use callback_server::router::{EventRouter, NotificationPayload};
    ///
    /// let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// let router = EventRouter::new(tx);
    /// ```
    pub fn new(event_sender: mpsc::UnboundedSender<NotificationPayload>) -> Self {
        Self {
            state: Arc::new(RwLock::new(RouterState::default())),
            event_sender,
        }
    }

    /// Register a subscription ID and deliver any notifications parked for it.
    ///
    /// Returns the number of parked notifications delivered.
    pub async fn register(&self, subscription_id: String) -> usize {
        let mut state = self.state.write().await;
        state.prune(Instant::now());

        let (ready, parked): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut state.backlog)
            .into_iter()
            .partition(|(_, payload)| payload.subscription_id == subscription_id);
        state.backlog = parked;
        state.subscriptions.insert(subscription_id);

        let delivered = ready.len();
        for (_, payload) in ready {
            let _ = self.event_sender.send(payload);
        }
        delivered
    }

    pub async fn unregister(&self, subscription_id: &str) {
        let mut state = self.state.write().await;
        state.subscriptions.remove(subscription_id);
        state
            .backlog
            .retain(|(_, payload)| payload.subscription_id != subscription_id);
    }

    pub async fn is_registered(&self, subscription_id: &str) -> bool {
        self.state.read().await.subscriptions.contains(subscription_id)
    }

    /// Route an incoming notification.
    ///
    /// ```
    /// # use tokio::sync::mpsc;
    /// # use callback_server::router::{EventRouter, NotificationPayload, RouteOutcome};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// # let router = EventRouter::new(tx);
    /// router.register("uuid:subscription-123".to_string()).await;
    /// let outcome = router.route_event(NotificationPayload {
    ///     subscription_id: "uuid:subscription-123".to_string(),
    ///     sequence: Some(0),
    ///     event_xml: "<e:propertyset/>".to_string(),
    /// }).await;
    /// assert_eq!(outcome, RouteOutcome::Delivered);
    /// # }
    /// ```
    pub async fn route_event(&self, payload: NotificationPayload) -> RouteOutcome {
        {
            let state = self.state.read().await;
            if state.subscriptions.contains(&payload.subscription_id) {
                // Receiver dropped means the consumer is shutting down
                let _ = self.event_sender.send(payload);
                return RouteOutcome::Delivered;
            }
        }

        let mut state = self.state.write().await;
        // Registered between the two locks
        if state.subscriptions.contains(&payload.subscription_id) {
            let _ = self.event_sender.send(payload);
            return RouteOutcome::Delivered;
        }

        let now = Instant::now();
        state.prune(now);
        if state.backlog.len() >= BACKLOG_CAPACITY {
            return RouteOutcome::Rejected;
        }
        tracing::debug!(
            "Parking notification for unregistered subscription {}",
            payload.subscription_id
        );
        state.backlog.push_back((now, payload));
        RouteOutcome::Deferred
    }
}
