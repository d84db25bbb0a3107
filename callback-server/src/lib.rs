//! UPnP GENA callback server.
//!
//! A small HTTP server that receives NOTIFY requests from devices a control
//! point has subscribed to. It knows nothing about device services; it only
//! validates GENA headers and hands the raw property set, keyed by SID, to a
//! channel.
//!
//! - [`CallbackServer`] binds a port from a range and serves NOTIFY on any path
//! - [`EventRouter`] tracks live SIDs and parks notifications that arrive
//!   before their SID is registered
//! - [`NotificationPayload`] carries SID, sequence number and body
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{CallbackServer, NotificationPayload};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callback_server::CallbackError> {
//!     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
//!     let server = CallbackServer::new((3400, 3500), tx).await?;
//!
//!     // SUBSCRIBE with CALLBACK: <{base_url}/...>, then register the returned SID
//!     server.router().register("uuid:subscription-123".to_string()).await;
//!
//!     while let Some(notification) = rx.recv().await {
//!         println!("{}: {}", notification.subscription_id, notification.event_xml);
//!     }
//!     server.shutdown().await
//! }
//! ```

mod error;
pub mod router;
mod server;

pub use error::CallbackError;
pub use router::{EventRouter, NotificationPayload, RouteOutcome};
pub use server::{detect_local_ip, CallbackServer};
