//! # mediacp
//!
//! A UPnP AV media control point. It finds media renderers and media
//! servers on the local network, keeps track of the renderer and server the
//! user picked, browses server content, drives playback and volume on the
//! renderer, and relays what the devices report to any number of
//! independent [`MediaHook`]s.
//!
//! ```no_run
//! use mediacp::{ControlConfig, MediaControl, MediaHook};
//!
//! let control = MediaControl::with_upnp(ControlConfig::default())?;
//! control.subscribe_hook(
//!     "log",
//!     MediaHook::new()
//!         .on_renderer_found(|r| println!("renderer {:?}", r))
//!         .on_server_found(|s| println!("server {:?}", s))
//!         .on_current_time(|_, seconds, percent| println!("{}s ({:.0}%)", seconds, percent)),
//! );
//! control.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! control.shutdown();
//! # Ok::<(), mediacp::ControlError>(())
//! ```
//!
//! The network side sits behind [`transport::DeviceTransport`]; the
//! session logic in [`MediaControl`] never touches sockets itself.

pub mod action;
pub mod clock;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod hooks;
pub mod icons;
pub mod invoker;
pub mod logging;
pub mod renderer;
pub mod server;
pub mod transport;

pub use action::Action;
pub use config::{ControlConfig, TransportConfig};
pub use control::MediaControl;
pub use device::DeviceProxy;
pub use error::{ControlError, Result};
pub use hooks::{HookRegistry, MediaHook};
pub use invoker::ActionInvoker;
pub use renderer::{Renderer, RendererEvent};
pub use server::Server;

pub use upnp_api::{BrowseResult, Container, Item, PlaybackState, Resource, SeekMode};
pub use upnp_discovery::{Device, DeviceKind};
