//! HTTP server for receiving UPnP event notifications.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use warp::Filter;

use crate::error::CallbackError;
use crate::router::{EventRouter, NotificationPayload, RouteOutcome};

/// HTTP callback server for receiving GENA NOTIFY requests.
///
/// Binds the first free port in a range on all interfaces and accepts
/// NOTIFY on any path. Accepted notifications go through an [`EventRouter`]
/// to the channel given at construction.
///
/// # Example
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, NotificationPayload};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
///
///     let server = CallbackServer::new((3400, 3500), tx)
///         .await
///         .expect("Failed to create callback server");
///
///     println!("Server listening at: {}", server.base_url());
///
///     while let Some(notification) = rx.recv().await {
///         println!("Event for subscription: {}", notification.subscription_id);
///     }
/// }
/// ```
pub struct CallbackServer {
    port: u16,
    base_url: String,
    event_router: Arc<EventRouter>,
    shutdown_tx: Option<watch::Sender<bool>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Start a server, advertising the address of the default route.
    pub async fn new(
        port_range: (u16, u16),
        event_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Result<Self, CallbackError> {
        Self::with_advertised_ip(port_range, None, event_sender).await
    }

    /// Start a server, advertising `advertised_ip` in callback URLs.
    ///
    /// With `None` the local address is detected from the routing table.
    pub async fn with_advertised_ip(
        port_range: (u16, u16),
        advertised_ip: Option<IpAddr>,
        event_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Result<Self, CallbackError> {
        let local_ip = match advertised_ip {
            Some(ip) => ip,
            None => detect_local_ip(None).ok_or(CallbackError::NoLocalAddress)?,
        };

        let event_router = Arc::new(EventRouter::new(event_sender));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (addr, server) = Self::bind(port_range, event_router.clone(), shutdown_rx)?;
        let port = addr.port();
        let base_url = format!("http://{local_ip}:{port}");

        let server_handle = tokio::spawn(server);
        tracing::info!("Callback server listening on {} (advertised as {})", addr, base_url);

        Ok(Self {
            port,
            base_url,
            event_router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Base URL to embed in SUBSCRIBE CALLBACK headers.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.event_router
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) -> Result<(), CallbackError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }

        tracing::debug!("Callback server on port {} stopped", self.port);
        Ok(())
    }

    /// Bind the first port in the range that accepts a listener.
    fn bind(
        port_range: (u16, u16),
        event_router: Arc<EventRouter>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(SocketAddr, impl std::future::Future<Output = ()>), CallbackError> {
        let (start, end) = port_range;
        let routes = notify_route(event_router).recover(handle_rejection);

        for port in start..=end {
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
            let mut rx = shutdown_rx.clone();
            let signal = async move {
                // A dropped sender also means shutdown
                let _ = rx.changed().await;
            };
            match warp::serve(routes.clone()).try_bind_with_graceful_shutdown(addr, signal) {
                Ok(bound) => return Ok(bound),
                Err(e) => tracing::trace!("Port {} unavailable: {}", port, e),
            }
        }

        Err(CallbackError::NoAvailablePort { start, end })
    }

    fn validate_upnp_headers(
        sid: &Option<String>,
        nt: &Option<String>,
        nts: &Option<String>,
    ) -> bool {
        if sid.is_none() {
            return false;
        }

        if let (Some(nt_val), Some(nts_val)) = (nt, nts) {
            if nt_val != "upnp:event" || nts_val != "upnp:propchange" {
                return false;
            }
        }

        true
    }
}

fn notify_route(
    event_router: Arc<EventRouter>,
) -> impl Filter<Extract = (warp::reply::WithStatus<&'static str>,), Error = warp::Rejection> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(warp::header::optional::<String>("sid"))
        .and(warp::header::optional::<String>("nt"))
        .and(warp::header::optional::<String>("nts"))
        .and(warp::header::optional::<String>("seq"))
        .and(warp::body::bytes())
        .and_then(
            move |method: warp::http::Method,
                  path: warp::path::FullPath,
                  sid: Option<String>,
                  nt: Option<String>,
                  nts: Option<String>,
                  seq: Option<String>,
                  body: bytes::Bytes| {
                let router = event_router.clone();
                async move {
                    if method.as_str() != "NOTIFY" {
                        return Err(warp::reject::not_found());
                    }

                    tracing::trace!(
                        "NOTIFY {} sid={:?} seq={:?} ({} bytes)",
                        path.as_str(),
                        sid,
                        seq,
                        body.len()
                    );

                    if !CallbackServer::validate_upnp_headers(&sid, &nt, &nts) {
                        tracing::debug!("Rejecting NOTIFY with invalid headers on {}", path.as_str());
                        return Err(warp::reject::custom(InvalidUpnpHeaders));
                    }
                    let subscription_id = sid.ok_or_else(|| warp::reject::custom(InvalidUpnpHeaders))?;

                    let payload = NotificationPayload {
                        subscription_id,
                        sequence: seq.and_then(|s| s.trim().parse().ok()),
                        event_xml: String::from_utf8_lossy(&body).into_owned(),
                    };

                    match router.route_event(payload).await {
                        RouteOutcome::Delivered | RouteOutcome::Deferred => Ok(warp::reply::with_status(
                            "",
                            warp::http::StatusCode::OK,
                        )),
                        RouteOutcome::Rejected => Err(warp::reject::custom(UnknownSubscription)),
                    }
                }
            },
        )
}

/// Local address used to reach `route_to`, or the default route when `None`.
///
/// No packets are sent; connecting a UDP socket only consults the routing
/// table.
pub fn detect_local_ip(route_to: Option<IpAddr>) -> Option<IpAddr> {
    let target = route_to.unwrap_or(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(SocketAddr::new(target, 80)).ok()?;
    Some(socket.local_addr().ok()?.ip())
}

#[derive(Debug)]
struct InvalidUpnpHeaders;

impl warp::reject::Reject for InvalidUpnpHeaders {}

#[derive(Debug)]
struct UnknownSubscription;

impl warp::reject::Reject for UnknownSubscription {}

async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.find::<InvalidUpnpHeaders>().is_some() {
        (warp::http::StatusCode::BAD_REQUEST, "Invalid UPnP headers")
    } else if err.find::<UnknownSubscription>().is_some() {
        (warp::http::StatusCode::PRECONDITION_FAILED, "Unknown subscription")
    } else if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Not found")
    } else {
        (warp::http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(warp::reply::with_status(message, code))
}
